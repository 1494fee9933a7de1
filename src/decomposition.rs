use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Direct-normal and diffuse-horizontal parts of a global horizontal reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub dni: f64,
    pub dhi: f64,
}

/// Splits GHI into beam and diffuse components.
pub trait Decomposition: Send + Sync {
    fn decompose(&self, ghi: f64, zenith_deg: f64, day_of_year: u32) -> Components;
}

/// Erbs, Klein and Duffie (1982) diffuse-fraction correlation.
#[derive(Debug, Clone, Copy)]
pub struct Erbs {
    pub solar_constant: f64,
    pub min_cos_zenith: f64,
    pub max_zenith: f64,
}

impl Default for Erbs {
    fn default() -> Self {
        Self {
            solar_constant: 1366.1,
            min_cos_zenith: 0.065,
            max_zenith: 87.0,
        }
    }
}

impl Erbs {
    /// Extraterrestrial normal irradiance (Spencer, 1971).
    pub fn extra_radiation(&self, day_of_year: u32) -> f64 {
        let b = 2.0 * PI / 365.0 * (day_of_year as f64 - 1.0);
        let r_over_r0_sq = 1.00011
            + 0.034221 * b.cos()
            + 0.00128 * b.sin()
            + 0.000719 * (2.0 * b).cos()
            + 0.000077 * (2.0 * b).sin();
        self.solar_constant * r_over_r0_sq
    }

    pub fn clearness_index(&self, ghi: f64, zenith_deg: f64, day_of_year: u32) -> f64 {
        let cos_zenith = zenith_deg.to_radians().cos();
        let horizontal_extra = self.extra_radiation(day_of_year) * cos_zenith.max(self.min_cos_zenith);
        (ghi / horizontal_extra).clamp(0.0, 1.0)
    }

    pub fn diffuse_fraction(kt: f64) -> f64 {
        if kt <= 0.22 {
            1.0 - 0.09 * kt
        } else if kt <= 0.8 {
            0.9511 - 0.1604 * kt + 4.388 * kt.powi(2) - 16.638 * kt.powi(3) + 12.336 * kt.powi(4)
        } else {
            0.165
        }
    }
}

impl Decomposition for Erbs {
    fn decompose(&self, ghi: f64, zenith_deg: f64, day_of_year: u32) -> Components {
        let kt = self.clearness_index(ghi, zenith_deg, day_of_year);
        let dhi = Self::diffuse_fraction(kt) * ghi;
        let dni = (ghi - dhi) / zenith_deg.to_radians().cos();

        if zenith_deg > self.max_zenith || ghi < 0.0 || dni < 0.0 {
            return Components { dni: 0.0, dhi: ghi };
        }
        Components { dni, dhi }
    }
}
