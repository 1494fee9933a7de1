use crate::types::*;
use rayon::prelude::*;

/// Edge-preserving region flattening applied to the fisheye color grid before
/// classification. Implementations must return a grid of identical shape.
pub trait RegionSmoother: Send + Sync {
    fn smooth(&self, grid: &ColorGrid) -> ColorGrid;
}

/// Leaves the grid untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSmoothing;

impl RegionSmoother for NoSmoothing {
    fn smooth(&self, grid: &ColorGrid) -> ColorGrid {
        grid.clone()
    }
}

/// Mean-shift filtering in the joint spatial/color domain.
///
/// Each pixel climbs to the local mode of its neighbourhood: the window is a
/// disc of `spatial_radius` pixels and only neighbours within `range_radius`
/// in RGB space contribute. The pixel takes the color of the mode it reaches.
#[derive(Debug, Clone, Copy)]
pub struct MeanShiftSmoother {
    pub spatial_radius: usize,
    pub range_radius: f64,
    pub max_iterations: usize,
}

impl MeanShiftSmoother {
    const CONVERGENCE: f64 = 0.1;

    pub fn from_config(config: &SmoothingConfig) -> Self {
        Self {
            spatial_radius: config.spatial_radius,
            range_radius: config.range_radius,
            max_iterations: config.max_iterations,
        }
    }

    fn filter_pixel(&self, grid: &ColorGrid, row: usize, col: usize) -> Rgb {
        let start = grid[[row, col]];
        if start == BLACK {
            return start;
        }

        let (n_rows, n_cols) = grid.dim();
        let hs = self.spatial_radius as f64;
        let hs_sq = hs * hs;
        let hr_sq = self.range_radius * self.range_radius;

        let mut y = row as f64;
        let mut x = col as f64;
        let mut color = [start[0] as f64, start[1] as f64, start[2] as f64];

        for _ in 0..self.max_iterations {
            let cy = y.round() as isize;
            let cx = x.round() as isize;
            let r = self.spatial_radius as isize;
            let row_lo = (cy - r).max(0) as usize;
            let row_hi = ((cy + r) as usize).min(n_rows - 1);
            let col_lo = (cx - r).max(0) as usize;
            let col_hi = ((cx + r) as usize).min(n_cols - 1);

            let mut count = 0.0;
            let (mut sy, mut sx) = (0.0, 0.0);
            let mut sc = [0.0f64; 3];

            for nr in row_lo..=row_hi {
                for nc in col_lo..=col_hi {
                    let dy = nr as f64 - y;
                    let dx = nc as f64 - x;
                    if dy * dy + dx * dx > hs_sq {
                        continue;
                    }
                    let px = grid[[nr, nc]];
                    let dist_sq: f64 = (0..3)
                        .map(|k| {
                            let d = px[k] as f64 - color[k];
                            d * d
                        })
                        .sum();
                    if dist_sq > hr_sq {
                        continue;
                    }
                    count += 1.0;
                    sy += nr as f64;
                    sx += nc as f64;
                    for k in 0..3 {
                        sc[k] += px[k] as f64;
                    }
                }
            }

            if count == 0.0 {
                break;
            }

            let ny = sy / count;
            let nx = sx / count;
            let ncolor = [sc[0] / count, sc[1] / count, sc[2] / count];
            let shift_sq = (ny - y).powi(2)
                + (nx - x).powi(2)
                + (0..3).map(|k| (ncolor[k] - color[k]).powi(2)).sum::<f64>();

            y = ny;
            x = nx;
            color = ncolor;

            if shift_sq < Self::CONVERGENCE * Self::CONVERGENCE {
                break;
            }
        }

        [
            color[0].round().clamp(0.0, 255.0) as u8,
            color[1].round().clamp(0.0, 255.0) as u8,
            color[2].round().clamp(0.0, 255.0) as u8,
        ]
    }
}

impl Default for MeanShiftSmoother {
    fn default() -> Self {
        Self::from_config(&SmoothingConfig::default())
    }
}

impl RegionSmoother for MeanShiftSmoother {
    fn smooth(&self, grid: &ColorGrid) -> ColorGrid {
        let (n_rows, n_cols) = grid.dim();
        if n_rows == 0 || n_cols == 0 {
            return grid.clone();
        }

        // Rows are independent, so filter them in parallel
        let rows: Vec<Vec<Rgb>> = (0..n_rows)
            .into_par_iter()
            .map(|row| {
                (0..n_cols)
                    .map(|col| self.filter_pixel(grid, row, col))
                    .collect()
            })
            .collect();

        let mut smoothed = ColorGrid::from_elem((n_rows, n_cols), BLACK);
        for (row, values) in rows.into_iter().enumerate() {
            for (col, px) in values.into_iter().enumerate() {
                smoothed[[row, col]] = px;
            }
        }
        smoothed
    }
}

/// Smoother selected by the configuration; `None` disables smoothing.
pub fn smoother_for(config: Option<&SmoothingConfig>) -> Box<dyn RegionSmoother> {
    match config {
        Some(config) => Box::new(MeanShiftSmoother::from_config(config)),
        None => Box::new(NoSmoothing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_preserves_shape_and_uniform_regions() {
        let grid = Array2::from_shape_fn((20, 30), |(_, col)| {
            if col < 15 {
                [200, 220, 250]
            } else {
                [60, 140, 40]
            }
        });
        let smoothed = MeanShiftSmoother::default().smooth(&grid);
        assert_eq!(smoothed.dim(), grid.dim());
        assert_eq!(smoothed, grid);
    }

    #[test]
    fn test_flattens_small_noise() {
        let grid = Array2::from_shape_fn((15, 15), |(row, col)| {
            let jitter = ((row * 7 + col * 3) % 3) as u8;
            [100 + jitter, 150 + jitter, 80 + jitter]
        });
        let smoothed = MeanShiftSmoother::default().smooth(&grid);
        let center = smoothed[[7, 7]];
        let spread = smoothed
            .iter()
            .map(|px| (px[0] as i32 - center[0] as i32).abs())
            .max()
            .unwrap();
        let original_spread = 2;
        assert!(spread <= original_spread);
        assert!(smoothed.iter().all(|px| px[0] >= 100 && px[0] <= 102));
    }

    #[test]
    fn test_black_pixels_stay_black() {
        let mut grid = ColorGrid::from_elem((9, 9), [10, 10, 10]);
        grid[[4, 4]] = BLACK;
        let smoothed = MeanShiftSmoother::default().smooth(&grid);
        assert_eq!(smoothed[[4, 4]], BLACK);
    }

    #[test]
    fn test_no_smoothing_is_identity() {
        let grid = Array2::from_shape_fn((5, 5), |(r, c)| [r as u8, c as u8, 7]);
        assert_eq!(smoother_for(None).smooth(&grid), grid);
    }
}
