use crate::classify::render_labels;
use crate::types::*;
use crate::weather::WeatherTable;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use geo_types::Point;
use image::RgbImage;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIMESTAMP_FORMATS: [&str; 3] = [TIMESTAMP_FORMAT, "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

pub const SOLPOS_DAY: &str = "Day";
pub const SOLPOS_MONTH: &str = "Month";
pub const SOLPOS_ZENITH: &str = "Zenith (refracted)";
pub const SOLPOS_AZIMUTH: &str = "Azimuth angle";
pub const WEATHER_TIMESTAMP: &str = "date_time";
pub const WEATHER_GHI: &str = "GHI";

#[derive(Debug, Deserialize)]
struct HeadingRecord {
    #[serde(rename = "NumId")]
    num_id: String,
    #[serde(rename = "Heading")]
    heading: f64,
    #[serde(rename = "Latitude", default)]
    latitude: Option<f64>,
    #[serde(rename = "Longitude", default)]
    longitude: Option<f64>,
}

pub struct DatasetIO;

impl DatasetIO {
    pub fn panorama_path(paths: &PathsConfig, num_id: &str) -> PathBuf {
        paths.image_dir.join(format!("{}{}", num_id, paths.image_suffix))
    }

    pub fn read_panorama(path: &Path) -> Result<Panorama, SkyViewError> {
        let image = image::open(path)?.to_rgb8();
        let (width, height) = image.dimensions();

        let pixels = ColorGrid::from_shape_fn((height as usize, width as usize), |(row, col)| {
            image.get_pixel(col as u32, row as u32).0
        });

        Panorama::new(pixels)
    }

    pub fn write_color_grid(path: &Path, grid: &ColorGrid) -> Result<(), SkyViewError> {
        let (height, width) = grid.dim();
        let image = RgbImage::from_fn(width as u32, height as u32, |x, y| {
            image::Rgb(grid[[y as usize, x as usize]])
        });
        image.save(path)?;
        Ok(())
    }

    pub fn write_labels(path: &Path, labels: &LabelGrid) -> Result<(), SkyViewError> {
        Self::write_color_grid(path, &render_labels(labels))
    }

    pub fn read_headings(path: &Path) -> Result<Vec<CapturePoint>, SkyViewError> {
        let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;

        let mut points = Vec::new();
        for record in reader.deserialize() {
            let record: HeadingRecord = record?;
            let location = match (record.latitude, record.longitude) {
                (Some(lat), Some(lon)) => Some(Point::new(lon, lat)),
                _ => None,
            };
            points.push(CapturePoint {
                num_id: record.num_id,
                heading: record.heading,
                location,
            });
        }

        Ok(points)
    }

    /// Solar positions for `date`. The first column holds the timestamp; rows of
    /// other days are dropped and the year of the kept rows is set to `date`'s.
    pub fn read_solar_positions(
        path: &Path,
        date: NaiveDate,
    ) -> Result<Vec<(NaiveDateTime, SolarSample)>, SkyViewError> {
        let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
        let headers = reader.headers()?.clone();
        let day_idx = column_index(&headers, SOLPOS_DAY)?;
        let month_idx = column_index(&headers, SOLPOS_MONTH)?;
        let zenith_idx = column_index(&headers, SOLPOS_ZENITH)?;
        let azimuth_idx = column_index(&headers, SOLPOS_AZIMUTH)?;

        let mut positions = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let day = parse_number(&record, day_idx, line)?;
            let month = parse_number(&record, month_idx, line)?;
            if day != date.day() as f64 || month != date.month() as f64 {
                continue;
            }

            let timestamp = parse_timestamp(record.get(0).unwrap_or_default(), line)?;
            let timestamp = timestamp.with_year(date.year()).ok_or_else(|| {
                SkyViewError::Dataset(format!("row {}: {} has no counterpart in {}", line + 1, timestamp, date.year()))
            })?;

            positions.push((
                timestamp,
                SolarSample {
                    zenith: parse_number(&record, zenith_idx, line)?,
                    azimuth: parse_number(&record, azimuth_idx, line)?,
                },
            ));
        }

        Ok(positions)
    }

    /// `(timestamp, GHI)` rows; an empty GHI cell reads as NaN.
    pub fn read_weather(path: &Path) -> Result<Vec<(NaiveDateTime, f64)>, SkyViewError> {
        let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
        let headers = reader.headers()?.clone();
        let time_idx = column_index(&headers, WEATHER_TIMESTAMP)?;
        let ghi_idx = column_index(&headers, WEATHER_GHI)?;

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let timestamp = parse_timestamp(record.get(time_idx).unwrap_or_default(), line)?;
            let ghi = match record.get(ghi_idx) {
                Some(cell) if !cell.is_empty() => parse_number(&record, ghi_idx, line)?,
                _ => f64::NAN,
            };
            rows.push((timestamp, ghi));
        }

        Ok(rows)
    }

    /// Writes the table with NaN rendered as an empty cell.
    pub fn write_csv(path: &Path, table: &WeatherTable) -> Result<(), SkyViewError> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec![
            WEATHER_TIMESTAMP.to_string(),
            WEATHER_GHI.to_string(),
            "Solar Zenith Angle".to_string(),
            "Solar Azimuth Angle".to_string(),
        ];
        header.extend(table.columns().iter().map(|(name, _)| name.clone()));
        writer.write_record(&header)?;

        for row in 0..table.len() {
            let mut record = vec![
                table.timestamps[row].format(TIMESTAMP_FORMAT).to_string(),
                format_cell(table.ghi[row]),
                format_cell(table.zenith[row]),
                format_cell(table.azimuth[row]),
            ];
            record.extend(table.columns().iter().map(|(_, values)| format_cell(values[row])));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize, SkyViewError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| SkyViewError::Dataset(format!("missing column '{}'", name)))
}

fn parse_number(record: &StringRecord, idx: usize, line: usize) -> Result<f64, SkyViewError> {
    let cell = record.get(idx).unwrap_or_default();
    cell.parse::<f64>().map_err(|e| {
        SkyViewError::Dataset(format!("row {}, column {}: '{}' is not a number: {}", line + 1, idx, cell, e))
    })
}

fn parse_timestamp(cell: &str, line: usize) -> Result<NaiveDateTime, SkyViewError> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(cell, format).ok())
        .ok_or_else(|| SkyViewError::Dataset(format!("row {}: unreadable timestamp '{}'", line + 1, cell)))
}

fn format_cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}
