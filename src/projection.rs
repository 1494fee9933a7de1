//! Cylindrical panorama to azimuthal (fisheye) sky projection.
//!
//! Every output pixel at distance `r` from the center and polar angle `theta`
//! samples the panorama column for azimuth `theta` and the row for zenith
//! angle `r / r0 * 90`. Alongside the color grid the projector emits the zenith
//! and azimuth of every pixel so that solar positions can be looked up later.

use crate::types::*;
use ndarray::{s, Array2};
use std::f64::consts::PI;
use tracing::debug;

/// One orientation step applied to a square fisheye grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridTransform {
    /// Top row becomes the bottom row.
    FlipVertical,
    /// Quarter turn counter-clockwise.
    Rotate90,
    Rotate180,
    /// Quarter turn clockwise.
    Rotate270,
}

impl GridTransform {
    pub fn apply<T: Clone>(self, grid: &Array2<T>) -> Array2<T> {
        match self {
            GridTransform::FlipVertical => grid.slice(s![..;-1, ..]).to_owned(),
            GridTransform::Rotate90 => grid.t().slice(s![..;-1, ..]).to_owned(),
            GridTransform::Rotate180 => grid.slice(s![..;-1, ..;-1]).to_owned(),
            GridTransform::Rotate270 => grid.t().slice(s![.., ..;-1]).to_owned(),
        }
    }
}

/// Ordered sequence of orientation steps for one grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction(pub Vec<GridTransform>);

impl Correction {
    /// Mirror left/right so the grid reads as the sky seen from below.
    pub fn sky_view() -> Self {
        Correction(vec![GridTransform::Rotate180, GridTransform::FlipVertical])
    }

    pub fn apply<T: Clone>(&self, grid: Array2<T>) -> Array2<T> {
        self.0.iter().fold(grid, |acc, step| step.apply(&acc))
    }
}

/// Per-grid corrections applied after the projection is filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionCorrections {
    pub color: Correction,
    pub zenith: Correction,
    pub azimuth: Correction,
}

impl ProjectionCorrections {
    /// Same correction for all three grids; keeps them pixel-for-pixel registered.
    pub fn unified() -> Self {
        Self {
            color: Correction::sky_view(),
            zenith: Correction::sky_view(),
            azimuth: Correction::sky_view(),
        }
    }
}

impl Default for ProjectionCorrections {
    fn default() -> Self {
        Self::unified()
    }
}

/// Side length of the fisheye grids for a panorama of `width` columns.
pub fn fisheye_side(width: usize) -> usize {
    (width as f64 / PI).floor() as usize
}

/// Radius of the projection circle for a panorama of `width` columns.
pub fn projection_radius(width: usize) -> usize {
    (width as f64 / (2.0 * PI)).floor() as usize
}

/// Polar angle of `(dx, dy)` measured from the +y axis, in `(0, 2*PI]`.
///
/// Pixels straight below the center (`dy > 0`) read `2*PI`, those straight
/// above read `PI`; east of the center lies in `(0, PI)`.
pub fn polar_angle(dx: f64, dy: f64) -> f64 {
    if dx < 0.0 {
        3.0 * PI / 2.0 - (dy / dx).atan()
    } else if dx > 0.0 {
        PI / 2.0 - (dy / dx).atan()
    } else if dy > 0.0 {
        2.0 * PI
    } else {
        PI
    }
}

#[derive(Debug, Clone, Default)]
pub struct Projector {
    corrections: ProjectionCorrections,
}

impl Projector {
    pub fn new(corrections: ProjectionCorrections) -> Self {
        Self { corrections }
    }

    pub fn corrections(&self) -> &ProjectionCorrections {
        &self.corrections
    }

    pub fn project(&self, pano: &Panorama) -> FisheyeGrids {
        let raw = Self::project_raw(pano);
        FisheyeGrids {
            color: self.corrections.color.apply(raw.color),
            zenith: self.corrections.zenith.apply(raw.zenith),
            azimuth: self.corrections.azimuth.apply(raw.azimuth),
        }
    }

    /// Fill the three grids before any orientation correction.
    pub fn project_raw(pano: &Panorama) -> FisheyeGrids {
        let width = pano.width();
        let height = pano.height();
        let side = fisheye_side(width);
        let r0 = projection_radius(width) as f64;
        let half_height = height as f64 / 2.0;
        let (cx, cy) = (r0, r0);

        let mut color = ColorGrid::from_elem((side, side), BLACK);
        let mut zenith = AngleGrid::from_elem((side, side), f64::NAN);
        let mut azimuth = AngleGrid::from_elem((side, side), f64::NAN);

        let pixels = pano.pixels();
        let mut filled = 0usize;

        for row in 0..side {
            for col in 0..side {
                let dx = col as f64 - cx;
                let dy = row as f64 - cy;
                let r = dx.hypot(dy);
                if r > r0 || r == 0.0 {
                    continue;
                }

                let theta = polar_angle(dx, dy);
                let src_col = ((theta * width as f64 / (2.0 * PI)).floor() as i64 - 1)
                    .rem_euclid(width as i64) as usize;
                let src_row = ((r * half_height / r0).floor() as i64 - 1)
                    .clamp(0, height as i64 - 1) as usize;

                color[[row, col]] = pixels[[src_row, src_col]];
                zenith[[row, col]] = (r / r0) * 90.0;
                azimuth[[row, col]] = theta.to_degrees() % 360.0;
                filled += 1;
            }
        }

        debug!(width, height, side, radius = r0, filled, "Projected panorama to fisheye");

        FisheyeGrids {
            color,
            zenith,
            azimuth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_pano(width: usize) -> Panorama {
        let height = width / 2;
        let pixels = Array2::from_shape_fn((height, width), |(row, col)| {
            [
                (col * 255 / (width - 1)) as u8,
                (row * 255 / (height - 1)) as u8,
                200,
            ]
        });
        Panorama::new(pixels).unwrap()
    }

    fn valid_mask(grid: &AngleGrid) -> Array2<bool> {
        grid.mapv(|v| !v.is_nan())
    }

    #[test]
    fn test_side_and_radius() {
        assert_eq!(fisheye_side(946), 301);
        assert_eq!(projection_radius(946), 150);
        assert_eq!(fisheye_side(1884), 599);
        assert_eq!(projection_radius(1884), 299);
    }

    #[test]
    fn test_polar_angle_quadrants() {
        assert!((polar_angle(1.0, 0.0) - PI / 2.0).abs() < 1e-12);
        assert!((polar_angle(0.0, -1.0) - PI).abs() < 1e-12);
        assert!((polar_angle(-1.0, 0.0) - 3.0 * PI / 2.0).abs() < 1e-12);
        assert!((polar_angle(0.0, 1.0) - 2.0 * PI).abs() < 1e-12);
        let diag = polar_angle(1.0, 1.0);
        assert!(diag > 0.0 && diag < PI / 2.0);
    }

    #[test]
    fn test_transforms_match_quarter_turns() {
        let grid = Array2::from_shape_vec((2, 2), vec![1, 2, 3, 4]).unwrap();
        assert_eq!(
            GridTransform::Rotate90.apply(&grid),
            Array2::from_shape_vec((2, 2), vec![2, 4, 1, 3]).unwrap()
        );
        assert_eq!(
            GridTransform::Rotate270.apply(&grid),
            Array2::from_shape_vec((2, 2), vec![3, 1, 4, 2]).unwrap()
        );
        assert_eq!(
            GridTransform::Rotate180.apply(&grid),
            Array2::from_shape_vec((2, 2), vec![4, 3, 2, 1]).unwrap()
        );
        assert_eq!(
            GridTransform::FlipVertical.apply(&grid),
            Array2::from_shape_vec((2, 2), vec![3, 4, 1, 2]).unwrap()
        );
        let back = Correction(vec![GridTransform::Rotate90, GridTransform::Rotate270]).apply(grid.clone());
        assert_eq!(back, grid);
    }

    #[test]
    fn test_center_is_sentinel_and_rim_is_horizon() {
        let pano = gradient_pano(946);
        let raw = Projector::project_raw(&pano);
        assert_eq!(raw.side(), 301);
        assert!(raw.zenith[[150, 150]].is_nan());
        assert!(raw.azimuth[[150, 150]].is_nan());
        assert_eq!(raw.color[[150, 150]], BLACK);

        assert!((raw.zenith[[150, 300]] - 90.0).abs() < 1e-9);
        assert!((raw.zenith[[0, 150]] - 90.0).abs() < 1e-9);
        assert!((raw.zenith[[150, 151]] - 0.6).abs() < 1e-9);

        // Corners lie outside the circle.
        assert!(raw.zenith[[0, 0]].is_nan());
        assert_eq!(raw.color[[0, 0]], BLACK);
    }

    #[test]
    fn test_angle_ranges() {
        let raw = Projector::project_raw(&gradient_pano(600));
        for (&z, &a) in raw.zenith.iter().zip(raw.azimuth.iter()) {
            assert_eq!(z.is_nan(), a.is_nan());
            if !z.is_nan() {
                assert!(z > 0.0 && z <= 90.0);
                assert!((0.0..360.0).contains(&a));
            }
        }
    }

    #[test]
    fn test_every_circle_pixel_samples_the_panorama() {
        // No pixel of this panorama is black, so every in-circle pixel must be
        // non-black after projection.
        let pano = gradient_pano(600);
        let raw = Projector::project_raw(&pano);
        for ((idx, &z), &px) in raw.zenith.indexed_iter().zip(raw.color.iter()) {
            if z.is_nan() {
                assert_eq!(px, BLACK, "pixel {:?}", idx);
            } else {
                assert_ne!(px, BLACK, "pixel {:?}", idx);
            }
        }
    }

    #[test]
    fn test_azimuth_matches_sampled_column() {
        let width = 720;
        let pano = gradient_pano(width);
        let raw = Projector::project_raw(&pano);
        let r0 = projection_radius(width);
        // East of center: theta = 90 degrees, column = 180 - 1.
        let east = raw.color[[r0, r0 + r0 / 2]];
        assert!((raw.azimuth[[r0, r0 + r0 / 2]] - 90.0).abs() < 1e-9);
        assert_eq!(east[0], (179 * 255 / (width - 1)) as u8);
    }

    #[test]
    fn test_unified_corrections_keep_grids_registered() {
        let pano = gradient_pano(946);
        let raw = Projector::project_raw(&pano);
        let grids = Projector::new(ProjectionCorrections::unified()).project(&pano);

        let color_mask = grids.color.mapv(|px| px != BLACK);
        assert_eq!(valid_mask(&grids.zenith), valid_mask(&grids.azimuth));
        assert_eq!(valid_mask(&grids.zenith), color_mask);

        // Each corrected pixel keeps the raw color/azimuth pairing.
        let side = grids.side();
        for row in 0..side {
            for col in 0..side {
                let raw_col = side - 1 - col;
                assert_eq!(grids.color[[row, col]], raw.color[[row, raw_col]]);
                let (a, b) = (grids.azimuth[[row, col]], raw.azimuth[[row, raw_col]]);
                assert!(a == b || (a.is_nan() && b.is_nan()));
            }
        }
    }

    #[test]
    fn test_default_corrections_share_one_sequence() {
        let corrections = ProjectionCorrections::default();
        assert_eq!(corrections, ProjectionCorrections::unified());
        assert_eq!(corrections.color, Correction::sky_view());
        assert_eq!(corrections.zenith, corrections.color);
        assert_eq!(corrections.azimuth, corrections.color);

        // Sun lookups read the label at the matched pixel, so the azimuth grid
        // must pair with the color grid exactly as the raw projection did.
        let pano = gradient_pano(600);
        let raw = Projector::project_raw(&pano);
        let grids = Projector::default().project(&pano);
        let side = grids.side();
        let east = (side / 2, side / 2 + side / 4);
        let mirrored = (east.0, side - 1 - east.1);
        assert_eq!(grids.azimuth[mirrored], raw.azimuth[east]);
        assert_eq!(grids.color[mirrored], raw.color[east]);
    }
}
