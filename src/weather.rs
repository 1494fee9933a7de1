use crate::types::*;
use chrono::NaiveDateTime;
use std::collections::HashMap;

pub const GHI_DECIMALS: i32 = 3;

/// Time-indexed table shared by every point of a batch: measured GHI and solar
/// geometry per timestamp, plus one appended irradiance column per point.
#[derive(Debug, Clone, Default)]
pub struct WeatherTable {
    pub timestamps: Vec<NaiveDateTime>,
    pub ghi: Vec<f64>,
    pub zenith: Vec<f64>,
    pub azimuth: Vec<f64>,
    columns: Vec<(String, Vec<f64>)>,
}

impl WeatherTable {
    /// Left-joins weather readings onto the solar-position timestamps and fills
    /// the gaps between the first and last reading.
    ///
    /// When several readings share a timestamp the first one is kept.
    pub fn merge(positions: &[(NaiveDateTime, SolarSample)], weather: &[(NaiveDateTime, f64)]) -> Self {
        let mut readings: HashMap<NaiveDateTime, f64> = HashMap::with_capacity(weather.len());
        for &(timestamp, ghi) in weather {
            readings.entry(timestamp).or_insert(ghi);
        }

        let mut ghi: Vec<f64> = positions
            .iter()
            .map(|(timestamp, _)| readings.get(timestamp).copied().unwrap_or(f64::NAN))
            .collect();
        interpolate_gaps(&mut ghi);

        Self {
            timestamps: positions.iter().map(|(t, _)| *t).collect(),
            ghi,
            zenith: positions.iter().map(|(_, s)| s.zenith).collect(),
            azimuth: positions.iter().map(|(_, s)| s.azimuth).collect(),
            columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn solar_samples(&self) -> Vec<SolarSample> {
        self.zenith
            .iter()
            .zip(&self.azimuth)
            .map(|(&zenith, &azimuth)| SolarSample { zenith, azimuth })
            .collect()
    }

    pub fn columns(&self) -> &[(String, Vec<f64>)] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn append_column(&mut self, name: String, values: Vec<f64>) -> Result<(), SkyViewError> {
        if values.len() != self.len() {
            return Err(SkyViewError::Dataset(format!(
                "column '{}' has {} values, table has {} rows",
                name,
                values.len(),
                self.len()
            )));
        }
        if self.column(&name).is_some() {
            return Err(SkyViewError::Dataset(format!("column '{}' already exists", name)));
        }
        self.columns.push((name, values));
        Ok(())
    }

    pub fn append_results(&mut self, results: &[PointResult]) -> Result<(), SkyViewError> {
        for result in results {
            self.append_column(result.column_name(), result.irradiance.clone())?;
        }
        Ok(())
    }
}

/// Linear interpolation over NaN runs strictly between the first and last
/// valid values, treating rows as evenly spaced. Values in that span are
/// rounded to [`GHI_DECIMALS`]; leading and trailing NaNs stay untouched.
pub fn interpolate_gaps(values: &mut [f64]) {
    let Some(first) = values.iter().position(|v| !v.is_nan()) else {
        return;
    };
    let Some(last) = values.iter().rposition(|v| !v.is_nan()) else {
        return;
    };

    let mut previous = first;
    for idx in first + 1..=last {
        if values[idx].is_nan() {
            continue;
        }
        let gap = idx - previous;
        if gap > 1 {
            let (start, end) = (values[previous], values[idx]);
            for step in 1..gap {
                let t = step as f64 / gap as f64;
                values[previous + step] = start + (end - start) * t;
            }
        }
        previous = idx;
    }

    let scale = 10f64.powi(GHI_DECIMALS);
    for value in &mut values[first..=last] {
        *value = (*value * scale).round_ties_even() / scale;
    }
}
