use crate::types::*;
use tracing::debug;

/// Zenith angle at and beyond which the sun counts as below the horizon.
pub const HORIZON_ZENITH: f64 = 90.0;

/// Fisheye pixels that carry a zenith/azimuth pair, in row-major order.
pub struct SunLocator {
    ncols: usize,
    candidates: Vec<(usize, f64, f64)>,
}

impl SunLocator {
    pub fn new(zenith: &AngleGrid, azimuth: &AngleGrid) -> Result<Self, SkyViewError> {
        if zenith.dim() != azimuth.dim() {
            return Err(SkyViewError::Dataset(format!(
                "zenith grid {:?} and azimuth grid {:?} differ in shape",
                zenith.dim(),
                azimuth.dim()
            )));
        }

        let ncols = zenith.ncols();
        let candidates: Vec<(usize, f64, f64)> = zenith
            .iter()
            .zip(azimuth.iter())
            .enumerate()
            .filter(|(_, (z, a))| !z.is_nan() && !a.is_nan())
            .map(|(idx, (&z, &a))| (idx, z, a))
            .collect();

        if candidates.is_empty() {
            return Err(SkyViewError::NoValidPixel);
        }

        Ok(Self { ncols, candidates })
    }

    /// `(row, col)` of the pixel whose angles are closest to the given sun
    /// position; the first pixel in row-major order wins ties.
    pub fn locate(&self, sample: SolarSample) -> (usize, usize) {
        let mut best = self.candidates[0].0;
        let mut best_dist = f64::INFINITY;
        for &(idx, z, a) in &self.candidates {
            let dz = z - sample.zenith;
            let da = a - sample.azimuth;
            let dist = dz * dz + da * da;
            if dist < best_dist {
                best_dist = dist;
                best = idx;
            }
        }
        (best / self.ncols, best % self.ncols)
    }
}

/// Obstruction class of the solar disc for each sample, `None` while the sun
/// is below the horizon.
pub fn obstruction_series(
    labels: &LabelGrid,
    grids: &FisheyeGrids,
    samples: &[SolarSample],
) -> Result<Vec<Option<Obstruction>>, SkyViewError> {
    if labels.dim() != grids.zenith.dim() {
        return Err(SkyViewError::Dataset(format!(
            "label grid {:?} does not match fisheye grids {:?}",
            labels.dim(),
            grids.zenith.dim()
        )));
    }

    let locator = SunLocator::new(&grids.zenith, &grids.azimuth)?;

    let series: Vec<Option<Obstruction>> = samples
        .iter()
        .map(|&sample| {
            if sample.zenith.is_nan() || sample.zenith >= HORIZON_ZENITH {
                return None;
            }
            let (row, col) = locator.locate(sample);
            Some(Obstruction::from_class(labels[[row, col]]))
        })
        .collect();

    debug!(
        samples = samples.len(),
        daylight = series.iter().filter(|o| o.is_some()).count(),
        "Computed obstruction series"
    );

    Ok(series)
}

/// Copy of `image` with the matched pixel of every daylight sample painted red.
pub fn trace_sun_path(
    image: &ColorGrid,
    grids: &FisheyeGrids,
    samples: &[SolarSample],
) -> Result<ColorGrid, SkyViewError> {
    let locator = SunLocator::new(&grids.zenith, &grids.azimuth)?;
    let mut traced = image.clone();
    for &sample in samples {
        if sample.zenith < HORIZON_ZENITH {
            let (row, col) = locator.locate(sample);
            traced[[row, col]] = RED;
        }
    }
    Ok(traced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{ProjectionCorrections, Projector};
    use ndarray::Array2;

    fn clear_sky_grids(width: usize) -> (FisheyeGrids, LabelGrid) {
        let pano = Panorama::new(ColorGrid::from_elem((width / 2, width), WHITE)).unwrap();
        let grids = Projector::new(ProjectionCorrections::unified()).project(&pano);
        let labels = grids.zenith.mapv(|z| if z.is_nan() { SkyClass::Outside } else { SkyClass::Sky });
        (grids, labels)
    }

    #[test]
    fn test_below_horizon_is_undefined() {
        let (grids, labels) = clear_sky_grids(400);
        let samples = [
            SolarSample { zenith: 95.0, azimuth: 180.0 },
            SolarSample { zenith: 90.0, azimuth: 12.0 },
        ];
        let series = obstruction_series(&labels, &grids, &samples).unwrap();
        assert_eq!(series, vec![None, None]);
    }

    #[test]
    fn test_clear_sky_is_unobstructed() {
        let (grids, labels) = clear_sky_grids(400);
        let samples = [
            SolarSample { zenith: 30.0, azimuth: 120.0 },
            SolarSample { zenith: 60.0, azimuth: 250.0 },
        ];
        let series = obstruction_series(&labels, &grids, &samples).unwrap();
        assert_eq!(series, vec![Some(Obstruction::Unobstructed); 2]);
    }

    #[test]
    fn test_locate_finds_matching_angles() {
        let (grids, _) = clear_sky_grids(946);
        let locator = SunLocator::new(&grids.zenith, &grids.azimuth).unwrap();
        let sample = SolarSample { zenith: 45.0, azimuth: 200.0 };
        let (row, col) = locator.locate(sample);
        assert!((grids.zenith[[row, col]] - 45.0).abs() < 1.0);
        assert!((grids.azimuth[[row, col]] - 200.0).abs() < 2.0);
    }

    #[test]
    fn test_ties_resolve_to_first_in_row_major_order() {
        let zenith = Array2::from_shape_vec((2, 2), vec![f64::NAN, 10.0, 10.0, 10.0]).unwrap();
        let azimuth = Array2::from_shape_vec((2, 2), vec![f64::NAN, 5.0, 5.0, 5.0]).unwrap();
        let locator = SunLocator::new(&zenith, &azimuth).unwrap();
        assert_eq!(locator.locate(SolarSample { zenith: 10.0, azimuth: 5.0 }), (0, 1));
    }

    #[test]
    fn test_labels_map_to_obstruction_classes() {
        let zenith = Array2::from_shape_vec((1, 3), vec![10.0, 20.0, 30.0]).unwrap();
        let azimuth = Array2::from_shape_vec((1, 3), vec![0.0, 0.0, 0.0]).unwrap();
        let grids = FisheyeGrids {
            color: ColorGrid::from_elem((1, 3), WHITE),
            zenith,
            azimuth,
        };
        let labels =
            Array2::from_shape_vec((1, 3), vec![SkyClass::Sky, SkyClass::Tree, SkyClass::Building])
                .unwrap();
        let samples = [
            SolarSample { zenith: 11.0, azimuth: 0.0 },
            SolarSample { zenith: 19.0, azimuth: 0.0 },
            SolarSample { zenith: 33.0, azimuth: 0.0 },
        ];
        let series = obstruction_series(&labels, &grids, &samples).unwrap();
        assert_eq!(
            series,
            vec![
                Some(Obstruction::Unobstructed),
                Some(Obstruction::Tree),
                Some(Obstruction::Building)
            ]
        );
    }

    #[test]
    fn test_all_nan_grid_is_a_distinct_error() {
        let nan = AngleGrid::from_elem((4, 4), f64::NAN);
        let grids = FisheyeGrids {
            color: ColorGrid::from_elem((4, 4), BLACK),
            zenith: nan.clone(),
            azimuth: nan,
        };
        let labels = LabelGrid::from_elem((4, 4), SkyClass::Outside);
        let samples = [SolarSample { zenith: 30.0, azimuth: 90.0 }];
        assert!(matches!(
            obstruction_series(&labels, &grids, &samples),
            Err(SkyViewError::NoValidPixel)
        ));
    }

    #[test]
    fn test_trace_marks_daylight_samples_only() {
        let (grids, _) = clear_sky_grids(400);
        let samples = [
            SolarSample { zenith: 20.0, azimuth: 90.0 },
            SolarSample { zenith: 120.0, azimuth: 0.0 },
        ];
        let traced = trace_sun_path(&grids.color, &grids, &samples).unwrap();
        assert_eq!(traced.iter().filter(|&&px| px == RED).count(), 1);
    }
}
