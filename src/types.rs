use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;
use geo::algorithm::centroid::Centroid;
use geo_types::{MultiPoint, Point};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One RGB pixel.
pub type Rgb = [u8; 3];

/// Dense color raster indexed `[[row, col]]`.
pub type ColorGrid = Array2<Rgb>;

/// Per-pixel angle raster in degrees, NaN outside the projection circle.
pub type AngleGrid = Array2<f64>;

pub type LabelGrid = Array2<SkyClass>;

pub const WHITE: Rgb = [255, 255, 255];
pub const GRAY: Rgb = [128, 128, 128];
pub const GREEN: Rgb = [0, 255, 0];
pub const BLACK: Rgb = [0, 0, 0];
pub const RED: Rgb = [255, 0, 0];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Day being processed, `YYYY-MM-DD`.
    pub date: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub site: Option<Site>,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    #[serde(default = "default_angle_precision")]
    pub angle_precision: f64,
    #[serde(default)]
    pub method: ClassificationMethod,
    #[serde(default = "default_smoothing")]
    pub smoothing: Option<SmoothingConfig>,
    #[serde(default)]
    pub cpu_cores: Option<usize>,
    pub paths: PathsConfig,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_interval_minutes() -> u32 {
    10
}

fn default_angle_precision() -> f64 {
    0.01
}

fn default_smoothing() -> Option<SmoothingConfig> {
    Some(SmoothingConfig::default())
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, SkyViewError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SkyViewError> {
        self.day()?;
        self.tz()?;

        if self.interval_minutes == 0 || self.interval_minutes > 24 * 60 {
            return Err(SkyViewError::Config(format!(
                "interval_minutes must be in 1..=1440, got {}",
                self.interval_minutes
            )));
        }
        if !(self.angle_precision > 0.0) {
            return Err(SkyViewError::Config(format!(
                "angle_precision must be positive, got {}",
                self.angle_precision
            )));
        }
        if let Some(smoothing) = &self.smoothing {
            if smoothing.spatial_radius == 0 || !(smoothing.range_radius > 0.0) {
                return Err(SkyViewError::Config(
                    "smoothing radii must be positive".to_string(),
                ));
            }
        }
        if self.cpu_cores == Some(0) {
            return Err(SkyViewError::Config("cpu_cores must be at least 1".to_string()));
        }

        let paths = &self.paths;
        for (name, value) in [
            ("headings", &paths.headings),
            ("weather", &paths.weather),
            ("image_dir", &paths.image_dir),
            ("output", &paths.output),
        ] {
            if value.as_os_str().is_empty() {
                return Err(SkyViewError::Config(format!("paths.{} is empty", name)));
            }
        }

        Ok(())
    }

    pub fn day(&self) -> Result<NaiveDate, SkyViewError> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|e| SkyViewError::Config(format!("invalid date '{}': {}", self.date, e)))
    }

    pub fn day_of_year(&self) -> Result<u32, SkyViewError> {
        Ok(self.day()?.ordinal())
    }

    pub fn tz(&self) -> Result<Tz, SkyViewError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| SkyViewError::Config(format!("invalid timezone '{}': {}", self.timezone, e)))
    }

    pub fn get_cpu_cores(&self) -> usize {
        self.cpu_cores.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Location used for generated solar positions: the configured site, or
    /// the centroid of every capture point that carries coordinates.
    pub fn site_point(&self, points: &[CapturePoint]) -> Result<Point<f64>, SkyViewError> {
        if let Some(site) = &self.site {
            return Ok(Point::new(site.longitude, site.latitude));
        }

        let located: MultiPoint<f64> = points.iter().filter_map(|p| p.location).collect();
        located.centroid().ok_or_else(|| {
            SkyViewError::Config(
                "no site configured and no capture point carries coordinates".to_string(),
            )
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Site {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub headings: PathBuf,
    pub weather: PathBuf,
    #[serde(default)]
    pub solar_positions: Option<PathBuf>,
    pub image_dir: PathBuf,
    #[serde(default = "default_image_suffix")]
    pub image_suffix: String,
    pub output: PathBuf,
    #[serde(default)]
    pub debug_dir: Option<PathBuf>,
}

fn default_image_suffix() -> String {
    "_p1.jpg".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SmoothingConfig {
    pub spatial_radius: usize,
    pub range_radius: f64,
    pub max_iterations: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            spatial_radius: 6,
            range_radius: 5.0,
            max_iterations: 5,
        }
    }
}

/// How fisheye pixels are labelled.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMethod {
    /// Nearest-color lookup for panoramas that were already segmented.
    Palette,
    /// Otsu thresholds on brightness and greenness for raw photos.
    #[default]
    Brightness,
}

/// Panoramic capture location read from the headings table.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturePoint {
    pub num_id: String,
    pub heading: f64,
    pub location: Option<Point<f64>>,
}

/// Cylindrical panorama, one row spanning 360 degrees of azimuth.
#[derive(Debug, Clone)]
pub struct Panorama {
    pixels: ColorGrid,
}

impl Panorama {
    pub const MIN_WIDTH: usize = 8;

    pub fn new(pixels: ColorGrid) -> Result<Self, SkyViewError> {
        let (height, width) = pixels.dim();
        if width != 2 * height || width < Self::MIN_WIDTH {
            return Err(SkyViewError::InvalidPanorama { width, height });
        }
        Ok(Self { pixels })
    }

    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn pixels(&self) -> &ColorGrid {
        &self.pixels
    }
}

/// The three co-registered outputs of the azimuthal projection.
#[derive(Debug, Clone)]
pub struct FisheyeGrids {
    pub color: ColorGrid,
    pub zenith: AngleGrid,
    pub azimuth: AngleGrid,
}

impl FisheyeGrids {
    pub fn side(&self) -> usize {
        self.color.nrows()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkyClass {
    Sky,
    Tree,
    Building,
    Outside,
}

impl SkyClass {
    pub fn color(self) -> Rgb {
        match self {
            SkyClass::Sky => WHITE,
            SkyClass::Tree => GREEN,
            SkyClass::Building => GRAY,
            SkyClass::Outside => BLACK,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub labels: LabelGrid,
    pub svf: f64,
    pub tvf: Option<f64>,
}

/// What stands between a point and the solar disc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Obstruction {
    Unobstructed,
    Tree,
    Building,
}

impl Obstruction {
    pub fn from_class(class: SkyClass) -> Self {
        match class {
            SkyClass::Sky => Obstruction::Unobstructed,
            SkyClass::Tree => Obstruction::Tree,
            _ => Obstruction::Building,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Obstruction::Unobstructed => 0,
            Obstruction::Tree => 1,
            Obstruction::Building => 2,
        }
    }

    /// Numeric series value, NaN when the sun is below the horizon.
    pub fn series_value(obstruction: Option<Obstruction>) -> f64 {
        obstruction.map_or(f64::NAN, |o| o.code() as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarSample {
    pub zenith: f64,
    pub azimuth: f64,
}

#[derive(Debug, Clone)]
pub struct PointResult {
    pub num_id: String,
    pub svf: f64,
    pub tvf: Option<f64>,
    pub obstruction: Vec<Option<Obstruction>>,
    pub irradiance: Vec<f64>,
}

impl PointResult {
    pub fn column_name(&self) -> String {
        format!("ghi_{}", self.num_id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SkyViewError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Panorama must be 2:1 and at least 8 px wide, got {width}x{height}")]
    InvalidPanorama { width: usize, height: usize },
    #[error("Fisheye image has no non-black pixel to threshold")]
    EmptyFisheye,
    #[error("No valid pixel in the zenith/azimuth grids")]
    NoValidPixel,
    #[error("Dataset error: {0}")]
    Dataset(String),
}
