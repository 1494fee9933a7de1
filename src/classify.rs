//! Sky / tree / building labelling of fisheye images.
//!
//! Two strategies share one entry point, [`ClassificationMethod::classify`]:
//! a fixed-palette nearest-color lookup for images that were segmented
//! upstream, and a brightness/greenness Otsu threshold for raw photos.

use crate::types::*;
use tracing::debug;

/// Greenness threshold used when no usable greenness histogram exists.
/// Greenness never exceeds 170, so no pixel is labelled as tree.
pub const FALLBACK_GREEN_THRESHOLD: f64 = 260.0;

const CIRCLE_SERIES_TERMS: usize = 20_000;
const OTSU_BINS: usize = 256;

/// Reference colors of the upstream segmentation and the class each maps to.
pub const PALETTE: [(Rgb, SkyClass); 10] = [
    ([108, 225, 228], SkyClass::Sky),      // sky
    ([169, 123, 120], SkyClass::Building), // buildings
    ([94, 194, 57], SkyClass::Tree),       // trees
    ([138, 141, 143], SkyClass::Sky),      // sea, misclassified sky
    ([0, 0, 0], SkyClass::Outside),        // background
    ([225, 62, 235], SkyClass::Building),  // buses
    ([48, 102, 191], SkyClass::Building),  // cars
    ([245, 251, 79], SkyClass::Building),  // sidewalks
    ([140, 140, 140], SkyClass::Building), // street
    ([254, 0, 26], SkyClass::Building),    // unlabelled
];

impl ClassificationMethod {
    pub fn classify(&self, grid: &ColorGrid) -> Result<Classification, SkyViewError> {
        match self {
            ClassificationMethod::Palette => {
                let labels = palette_classify(grid);
                let svf = sky_view_factor(&labels);
                Ok(Classification {
                    labels,
                    svf,
                    tvf: None,
                })
            }
            ClassificationMethod::Brightness => brightness_classify(grid),
        }
    }
}

/// Index of the palette entry closest to `px` in RGB space; first wins on ties.
pub fn nearest_palette_index(px: Rgb) -> usize {
    let mut best = 0;
    let mut best_dist = u32::MAX;
    for (idx, (reference, _)) in PALETTE.iter().enumerate() {
        let dist: u32 = px
            .iter()
            .zip(reference.iter())
            .map(|(&a, &b)| {
                let d = a as i32 - b as i32;
                (d * d) as u32
            })
            .sum();
        if dist < best_dist {
            best_dist = dist;
            best = idx;
        }
    }
    best
}

pub fn palette_label(px: Rgb) -> SkyClass {
    PALETTE[nearest_palette_index(px)].1
}

pub fn palette_classify(grid: &ColorGrid) -> LabelGrid {
    grid.mapv(palette_label)
}

/// Blue-weighted brightness of a pixel.
pub fn brightness(px: Rgb) -> f64 {
    (0.5 * px[0] as f64 + px[1] as f64 + 1.5 * px[2] as f64) / 3.0
}

/// Green excess of a pixel over its red and blue channels.
pub fn greenness(px: Rgb) -> f64 {
    (2.0 * px[1] as f64 - px[0] as f64 - px[2] as f64) / 3.0
}

/// Whether `(row, col)` lies in the circle inscribed in a square of side `2 * radius`.
pub fn is_inside_circle(row: usize, col: usize, radius: f64) -> bool {
    let dx = col as f64 - radius;
    let dy = row as f64 - radius;
    dx * dx + dy * dy <= radius * radius
}

/// Pixel count of a discrete circle of `radius`, from the series
/// `1 + 4 * sum(r^2/(4i+1) - r^2/(4i+3))` truncated at 20000 terms.
pub fn inscribed_pixel_count(radius: f64) -> usize {
    let r2 = radius * radius;
    let sum: f64 = (0..CIRCLE_SERIES_TERMS)
        .map(|i| {
            let i = i as f64;
            (r2 / (4.0 * i + 1.0)).abs() - (r2 / (4.0 * i + 3.0)).abs()
        })
        .sum();
    (1.0 + 4.0 * sum).round() as usize
}

/// Share of the visible hemisphere labelled as sky.
pub fn sky_view_factor(labels: &LabelGrid) -> f64 {
    let radius = labels.ncols() as f64 / 2.0;
    let total = inscribed_pixel_count(radius);
    if total == 0 {
        return 0.0;
    }
    let sky = labels
        .indexed_iter()
        .filter(|&((row, col), &label)| label == SkyClass::Sky && is_inside_circle(row, col, radius))
        .count();
    sky as f64 / total as f64
}

/// Otsu threshold over a 256-bin histogram of `values`.
///
/// Returns `None` for an empty slice and the common value when all values are
/// equal.
pub fn otsu_threshold(values: &[f64]) -> Option<f64> {
    let first = *values.first()?;
    let (min, max) = values
        .iter()
        .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if min == max {
        return Some(min);
    }

    let span = max - min;
    let mut hist = [0f64; OTSU_BINS];
    for &v in values {
        let bin = (((v - min) / span) * OTSU_BINS as f64) as usize;
        hist[bin.min(OTSU_BINS - 1)] += 1.0;
    }
    let bin_width = span / OTSU_BINS as f64;
    let centers: Vec<f64> = (0..OTSU_BINS)
        .map(|i| min + bin_width * (i as f64 + 0.5))
        .collect();

    // Class weights and means for "at or below bin i" and "at or above bin i".
    let mut weight_low = [0f64; OTSU_BINS];
    let mut mean_low = [0f64; OTSU_BINS];
    let (mut w, mut m) = (0.0, 0.0);
    for i in 0..OTSU_BINS {
        w += hist[i];
        m += hist[i] * centers[i];
        weight_low[i] = w;
        mean_low[i] = if w > 0.0 { m / w } else { 0.0 };
    }
    let mut weight_high = [0f64; OTSU_BINS];
    let mut mean_high = [0f64; OTSU_BINS];
    let (mut w, mut m) = (0.0, 0.0);
    for i in (0..OTSU_BINS).rev() {
        w += hist[i];
        m += hist[i] * centers[i];
        weight_high[i] = w;
        mean_high[i] = if w > 0.0 { m / w } else { 0.0 };
    }

    let mut best_idx = 0;
    let mut best_var = f64::NEG_INFINITY;
    for i in 0..OTSU_BINS - 1 {
        let diff = mean_low[i] - mean_high[i + 1];
        let variance = weight_low[i] * weight_high[i + 1] * diff * diff;
        if variance > best_var {
            best_var = variance;
            best_idx = i;
        }
    }
    Some(centers[best_idx])
}

/// Brightness threshold separating sky, and greenness threshold separating
/// trees from buildings among the darker pixels.
pub fn find_thresholds(grid: &ColorGrid) -> Result<(f64, f64), SkyViewError> {
    let bright: Vec<f64> = grid
        .iter()
        .map(|&px| brightness(px))
        .filter(|&b| b != 0.0)
        .collect();
    let bright_threshold = otsu_threshold(&bright).ok_or(SkyViewError::EmptyFisheye)?;

    let green: Vec<f64> = grid
        .iter()
        .filter(|&&px| brightness(px) < bright_threshold)
        .map(|&px| greenness(px))
        .filter(|&g| g != 0.0)
        .collect();

    let degenerate = green.first().map_or(true, |&g0| green.iter().all(|&g| g == g0));
    let green_threshold = if degenerate {
        FALLBACK_GREEN_THRESHOLD
    } else {
        otsu_threshold(&green).unwrap_or(FALLBACK_GREEN_THRESHOLD)
    };

    Ok((bright_threshold, green_threshold))
}

pub fn brightness_classify(grid: &ColorGrid) -> Result<Classification, SkyViewError> {
    let (bright_threshold, green_threshold) = find_thresholds(grid)?;
    let radius = grid.ncols() as f64 / 2.0;
    let total = inscribed_pixel_count(radius);

    let mut sky = 0usize;
    let mut tree = 0usize;
    let labels = LabelGrid::from_shape_fn(grid.dim(), |(row, col)| {
        if !is_inside_circle(row, col, radius) {
            return SkyClass::Outside;
        }
        let px = grid[[row, col]];
        if brightness(px) >= bright_threshold {
            sky += 1;
            SkyClass::Sky
        } else if greenness(px) <= green_threshold {
            SkyClass::Building
        } else {
            tree += 1;
            SkyClass::Tree
        }
    });

    let (svf, tvf) = if total == 0 {
        (0.0, 0.0)
    } else {
        (sky as f64 / total as f64, tree as f64 / total as f64)
    };

    debug!(
        bright_threshold,
        green_threshold,
        svf,
        tvf,
        "Classified fisheye by brightness"
    );

    Ok(Classification {
        labels,
        svf,
        tvf: Some(tvf),
    })
}

/// Render labels with their conventional colors.
pub fn render_labels(labels: &LabelGrid) -> ColorGrid {
    labels.mapv(SkyClass::color)
}
