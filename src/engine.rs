use crate::classify::render_labels;
use crate::dataset::DatasetIO;
use crate::decomposition::{Decomposition, Erbs};
use crate::irradiance::irradiance_series;
use crate::obstruction::{obstruction_series, trace_sun_path};
use crate::orient::orient_to_north;
use crate::projection::{ProjectionCorrections, Projector};
use crate::smoothing::{smoother_for, RegionSmoother};
use crate::types::*;
use crate::weather::WeatherTable;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

/// A point whose processing failed; siblings in the batch are unaffected.
#[derive(Debug)]
pub struct PointFailure {
    pub num_id: String,
    pub error: SkyViewError,
}

/// Outcome of a batch, in the order the points were given.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<PointResult>,
    pub failures: Vec<PointFailure>,
}

pub struct IrradianceEngine {
    config: Config,
    projector: Projector,
    method: ClassificationMethod,
    smoother: Box<dyn RegionSmoother>,
    decomposition: Box<dyn Decomposition>,
    day_of_year: u32,
}

impl IrradianceEngine {
    pub fn new(config: Config) -> Result<Self, SkyViewError> {
        let day_of_year = config.day_of_year()?;
        let projector = Projector::new(ProjectionCorrections::unified());
        let smoother = smoother_for(config.smoothing.as_ref());

        Ok(Self {
            method: config.method,
            projector,
            smoother,
            decomposition: Box::new(Erbs::default()),
            day_of_year,
            config,
        })
    }

    pub fn with_method(mut self, method: ClassificationMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_smoother(mut self, smoother: Box<dyn RegionSmoother>) -> Self {
        self.smoother = smoother;
        self
    }

    pub fn with_decomposition(mut self, decomposition: Box<dyn Decomposition>) -> Self {
        self.decomposition = decomposition;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn day_of_year(&self) -> u32 {
        self.day_of_year
    }

    /// Runs orienter, projector, smoother, classifier, obstruction locator and
    /// irradiance synthesis for one capture point.
    pub fn process_point(
        &self,
        point: &CapturePoint,
        pano: &Panorama,
        table: &WeatherTable,
    ) -> Result<PointResult, SkyViewError> {
        let span = info_span!("point", num_id = %point.num_id);
        let _enter = span.enter();

        let oriented = orient_to_north(pano, point.heading)?;
        let grids = self.projector.project(&oriented);
        debug!(side = grids.side(), heading = point.heading, "Projected panorama");

        let smoothed = self.smoother.smooth(&grids.color);
        let classification = self.method.classify(&smoothed)?;

        let samples = table.solar_samples();
        let obstruction = obstruction_series(&classification.labels, &grids, &samples)?;
        let irradiance = irradiance_series(
            self.decomposition.as_ref(),
            &table.ghi,
            &table.zenith,
            &obstruction,
            classification.svf,
            self.day_of_year,
        )?;

        if let Some(dir) = &self.config.paths.debug_dir {
            self.write_debug_images(dir, &point.num_id, &grids, &smoothed, &classification, &samples);
        }

        info!(svf = classification.svf, tvf = ?classification.tvf, "Processed point");

        Ok(PointResult {
            num_id: point.num_id.clone(),
            svf: classification.svf,
            tvf: classification.tvf,
            obstruction,
            irradiance,
        })
    }

    /// Processes every point on a pool of `cpu_cores` workers. Panoramas come
    /// from `load`; a failing point is recorded and the rest carry on.
    pub fn run_batch<F>(
        &self,
        points: &[CapturePoint],
        table: &WeatherTable,
        load: F,
    ) -> Result<BatchReport, SkyViewError>
    where
        F: Fn(&CapturePoint) -> Result<Panorama, SkyViewError> + Sync,
    {
        let cpu_cores = self.config.get_cpu_cores();
        info!(points = points.len(), cpu_cores, "Starting batch");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(cpu_cores)
            .build()
            .map_err(|e| SkyViewError::Config(format!("Failed to build worker pool: {}", e)))?;

        let pb = ProgressBar::new(points.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let started = Instant::now();
        let outcomes: Vec<Result<PointResult, PointFailure>> = pool.install(|| {
            points
                .par_iter()
                .map(|point| {
                    let outcome = load(point)
                        .and_then(|pano| self.process_point(point, &pano, table))
                        .map_err(|error| {
                            warn!(num_id = %point.num_id, %error, "Point failed");
                            PointFailure {
                                num_id: point.num_id.clone(),
                                error,
                            }
                        });
                    pb.inc(1);
                    outcome
                })
                .collect()
        });
        pb.finish_with_message("Batch complete");

        let mut report = BatchReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(result) => report.results.push(result),
                Err(failure) => report.failures.push(failure),
            }
        }

        info!(
            succeeded = report.results.len(),
            failed = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch finished"
        );

        Ok(report)
    }

    /// [`run_batch`](Self::run_batch) with panoramas read from the configured image directory.
    pub fn run_batch_from_disk(
        &self,
        points: &[CapturePoint],
        table: &WeatherTable,
    ) -> Result<BatchReport, SkyViewError> {
        let paths = &self.config.paths;
        self.run_batch(points, table, |point| {
            DatasetIO::read_panorama(&DatasetIO::panorama_path(paths, &point.num_id))
        })
    }

    fn write_debug_images(
        &self,
        dir: &Path,
        num_id: &str,
        grids: &FisheyeGrids,
        smoothed: &ColorGrid,
        classification: &Classification,
        samples: &[SolarSample],
    ) {
        let classified = render_labels(&classification.labels);
        let writes = [
            ("fisheye", DatasetIO::write_color_grid(&dir.join(format!("{}_fisheye.png", num_id)), &grids.color)),
            ("smoothed", DatasetIO::write_color_grid(&dir.join(format!("{}_smoothed.png", num_id)), smoothed)),
            ("classified", DatasetIO::write_labels(&dir.join(format!("{}_classified.png", num_id)), &classification.labels)),
            (
                "sunpath",
                trace_sun_path(&classified, grids, samples).and_then(|traced| {
                    DatasetIO::write_color_grid(&dir.join(format!("{}_sunpath.png", num_id)), &traced)
                }),
            ),
        ];

        for (kind, result) in writes {
            if let Err(error) = result {
                warn!(num_id, kind, %error, "Failed to write debug image");
            }
        }
    }
}
