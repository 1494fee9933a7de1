use crate::decomposition::Decomposition;
use crate::types::*;

/// Default panel efficiency used by [`ghi_to_watts`].
pub const PANEL_EFFICIENCY: f64 = 0.19;
/// Default panel surface in m², used by [`ghi_to_watts`].
pub const PANEL_SURFACE: f64 = 0.0568;

/// Only a fully open line of sight lets the direct beam through; trees and
/// buildings block it alike.
pub fn direct_beam_gate(obstruction: Obstruction) -> f64 {
    match obstruction {
        Obstruction::Unobstructed => 1.0,
        Obstruction::Tree | Obstruction::Building => 0.0,
    }
}

/// Ground-level irradiance at a point: beam term gated by obstruction plus
/// diffuse term scaled by the sky view factor.
///
/// NaN when the measured GHI is missing or the sun is below the horizon.
pub fn ground_irradiance(
    decomposition: &dyn Decomposition,
    ghi: f64,
    zenith_deg: f64,
    obstruction: Option<Obstruction>,
    svf: f64,
    day_of_year: u32,
) -> f64 {
    if ghi.is_nan() || zenith_deg.is_nan() {
        return f64::NAN;
    }
    let Some(obstruction) = obstruction else {
        return f64::NAN;
    };

    let parts = decomposition.decompose(ghi, zenith_deg, day_of_year);
    parts.dni * zenith_deg.to_radians().cos() * direct_beam_gate(obstruction) + svf * parts.dhi
}

/// Irradiance series for one point, aligned with the input rows.
pub fn irradiance_series(
    decomposition: &dyn Decomposition,
    ghi: &[f64],
    zenith: &[f64],
    obstruction: &[Option<Obstruction>],
    svf: f64,
    day_of_year: u32,
) -> Result<Vec<f64>, SkyViewError> {
    if ghi.len() != zenith.len() || ghi.len() != obstruction.len() {
        return Err(SkyViewError::Dataset(format!(
            "series lengths differ: ghi {}, zenith {}, obstruction {}",
            ghi.len(),
            zenith.len(),
            obstruction.len()
        )));
    }

    Ok(ghi
        .iter()
        .zip(zenith)
        .zip(obstruction)
        .map(|((&g, &z), &o)| ground_irradiance(decomposition, g, z, o, svf, day_of_year))
        .collect())
}

/// Electrical output of a small panel receiving `ghi` W/m².
pub fn ghi_to_watts(ghi: f64, efficiency: f64, surface_m2: f64) -> f64 {
    ghi * efficiency * surface_m2
}

pub fn milliamps_to_watts(milliamps: f64, volts: f64) -> f64 {
    (milliamps / 1000.0) * volts
}
