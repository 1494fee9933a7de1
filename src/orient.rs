use crate::types::*;
use ndarray::{concatenate, s, Axis};

/// Rotate a panorama so that its first column faces geographic North.
///
/// `heading` is the capture direction in degrees from North. The result is a
/// circular column shift, so no column is ever duplicated or dropped.
pub fn orient_to_north(pano: &Panorama, heading: f64) -> Result<Panorama, SkyViewError> {
    if !heading.is_finite() {
        return Err(SkyViewError::Dataset(format!("heading must be finite, got {}", heading)));
    }

    let width = pano.width();
    let shift = column_shift(width, heading);
    if shift == 0 {
        return Ok(pano.clone());
    }

    let pixels = pano.pixels();
    let split = width - shift;
    let rotated = concatenate(
        Axis(1),
        &[pixels.slice(s![.., split..]), pixels.slice(s![.., ..split])],
    )
    .map_err(|e| SkyViewError::Dataset(format!("failed to reassemble panorama: {}", e)))?;

    Panorama::new(rotated)
}

/// Number of columns moved from the end of the panorama to its front.
pub fn column_shift(width: usize, heading: f64) -> usize {
    if width == 0 {
        return 0;
    }
    let heading = if heading >= 360.0 || heading < 0.0 {
        heading.rem_euclid(360.0)
    } else {
        heading
    };

    if heading <= 180.0 {
        leading_shift(width, heading)
    } else {
        (width - trailing_shift(width, heading)) % width
    }
}

/// Columns taken off the end when the heading is at most 180 degrees.
fn leading_shift(width: usize, heading: f64) -> usize {
    let n = ((heading / 360.0) * width as f64).round_ties_even() as usize;
    n % width
}

/// Columns taken off the front when the heading exceeds 180 degrees.
fn trailing_shift(width: usize, heading: f64) -> usize {
    let n = (((360.0 - heading) / 360.0) * width as f64).round_ties_even() as usize;
    n.min(width)
}
