//! Ground-level solar irradiance from street-level panoramas.
//!
//! A panorama is turned north-up, projected to an upward fisheye, segmented
//! into sky, trees and buildings, and combined with solar geometry and
//! measured GHI into an irradiance series per capture point.

pub mod classify;
pub mod dataset;
pub mod decomposition;
pub mod engine;
pub mod irradiance;
pub mod obstruction;
pub mod orient;
pub mod projection;
pub mod smoothing;
pub mod sun_position;
pub mod types;
pub mod weather;

pub use engine::{BatchReport, IrradianceEngine, PointFailure};
pub use types::*;
pub use weather::WeatherTable;
