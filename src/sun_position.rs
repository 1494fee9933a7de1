use crate::types::SolarSample;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;

pub struct SunCalculator {
    latitude: f64,
    longitude: f64,
    angle_precision: f64,
    cache: HashMap<(u32, u32), (f64, f64)>,
}

impl SunCalculator {
    pub fn new(latitude: f64, longitude: f64, angle_precision: f64) -> Self {
        Self {
            latitude,
            longitude,
            angle_precision,
            cache: HashMap::new(),
        }
    }

    /// `(azimuth, elevation)` in degrees, rounded to the configured precision.
    pub fn get_position(&mut self, datetime: &DateTime<Utc>) -> (f64, f64) {
        let key = (datetime.ordinal(), datetime.hour() * 60 + datetime.minute());

        if let Some(&cached) = self.cache.get(&key) {
            return cached;
        }

        let (azimuth, elevation) = self.calculate_position(datetime);
        let rounded = self.round_angles(azimuth, elevation);
        self.cache.insert(key, rounded);
        rounded
    }

    pub fn solar_sample(&mut self, datetime: &DateTime<Utc>) -> SolarSample {
        let (azimuth, elevation) = self.get_position(datetime);
        SolarSample {
            zenith: 90.0 - elevation,
            azimuth,
        }
    }

    /// Samples every `interval_minutes` across one local calendar day.
    ///
    /// Local times that do not exist in `tz` (spring-forward gaps) are skipped.
    pub fn day_series(
        &mut self,
        date: NaiveDate,
        tz: Tz,
        interval_minutes: u32,
    ) -> Vec<(NaiveDateTime, SolarSample)> {
        let mut series = Vec::new();
        let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
            return series;
        };
        let step = Duration::minutes(interval_minutes.max(1) as i64);

        let mut local = midnight;
        while local.date() == date {
            if let Some(zoned) = tz.from_local_datetime(&local).earliest() {
                let utc = zoned.with_timezone(&Utc);
                series.push((local, self.solar_sample(&utc)));
            }
            local += step;
        }

        series
    }

    fn calculate_position(&self, datetime: &DateTime<Utc>) -> (f64, f64) {
        let julian_day = self.julian_day(datetime);
        let equation_of_time = self.equation_of_time(julian_day);
        let declination = self.solar_declination(julian_day);

        let solar_time = self.solar_time(datetime, equation_of_time);
        let hour_angle = 15.0 * (solar_time - 12.0);

        let lat_rad = self.latitude.to_radians();
        let dec_rad = declination.to_radians();
        let hour_rad = hour_angle.to_radians();

        // Solar elevation
        let elevation = (lat_rad.sin() * dec_rad.sin()
            + lat_rad.cos() * dec_rad.cos() * hour_rad.cos())
        .clamp(-1.0, 1.0)
        .asin();

        // Solar azimuth, clockwise from North
        let cos_azimuth = (dec_rad.sin() * lat_rad.cos()
            - dec_rad.cos() * lat_rad.sin() * hour_rad.cos())
            / elevation.cos();
        let azimuth = cos_azimuth.clamp(-1.0, 1.0).acos();

        let azimuth_deg = if hour_rad.sin() > 0.0 {
            360.0 - azimuth.to_degrees()
        } else {
            azimuth.to_degrees()
        };

        (azimuth_deg % 360.0, elevation.to_degrees())
    }

    fn round_angles(&self, azimuth: f64, elevation: f64) -> (f64, f64) {
        let inv_precision = 1.0 / self.angle_precision;
        (
            (azimuth * inv_precision).round() * self.angle_precision,
            (elevation * inv_precision).round() * self.angle_precision,
        )
    }

    /// Julian date including the time of day.
    fn julian_day(&self, datetime: &DateTime<Utc>) -> f64 {
        let a = (14 - datetime.month() as i32) / 12;
        let y = datetime.year() + 4800 - a;
        let m = datetime.month() as i32 + 12 * a - 3;

        let day_number = datetime.day() as i32 + (153 * m + 2) / 5 + 365 * y + y / 4 - y / 100
            + y / 400
            - 32045;
        let day_fraction = (datetime.hour() as f64 - 12.0) / 24.0
            + datetime.minute() as f64 / 1440.0
            + datetime.second() as f64 / 86400.0;

        day_number as f64 + day_fraction
    }

    fn mean_longitude_and_anomaly(julian_day: f64) -> (f64, f64, f64) {
        let n = julian_day - 2451545.0;
        let l = (280.460 + 0.9856474 * n).rem_euclid(360.0);
        let g = (357.528 + 0.9856003 * n).rem_euclid(360.0).to_radians();
        let lambda = (l + 1.915 * g.sin() + 0.020 * (2.0 * g).sin()).to_radians();
        (n, l, lambda)
    }

    /// Minutes between apparent and mean solar time.
    fn equation_of_time(&self, julian_day: f64) -> f64 {
        let (n, l, lambda) = Self::mean_longitude_and_anomaly(julian_day);
        let obliquity = (23.439 - 0.0000004 * n).to_radians();
        let right_ascension = (obliquity.cos() * lambda.sin())
            .atan2(lambda.cos())
            .to_degrees()
            .rem_euclid(360.0);

        let mut diff = l - right_ascension;
        if diff > 180.0 {
            diff -= 360.0;
        } else if diff < -180.0 {
            diff += 360.0;
        }
        4.0 * diff
    }

    fn solar_declination(&self, julian_day: f64) -> f64 {
        let (n, _, lambda) = Self::mean_longitude_and_anomaly(julian_day);
        let obliquity = (23.439 - 0.0000004 * n).to_radians();
        (obliquity.sin() * lambda.sin()).asin().to_degrees()
    }

    fn solar_time(&self, datetime: &DateTime<Utc>, equation_of_time: f64) -> f64 {
        let utc_time = datetime.hour() as f64
            + datetime.minute() as f64 / 60.0
            + datetime.second() as f64 / 3600.0;
        utc_time + equation_of_time / 60.0 + self.longitude / 15.0
    }
}
