use chrono::NaiveDate;
use skyview_irradiance::dataset::DatasetIO;
use skyview_irradiance::decomposition::{Decomposition, Erbs};
use skyview_irradiance::irradiance::irradiance_series;
use skyview_irradiance::obstruction::obstruction_series;
use skyview_irradiance::projection::{ProjectionCorrections, Projector};
use skyview_irradiance::smoothing::NoSmoothing;
use skyview_irradiance::*;
use std::fs;
use std::path::Path;

fn white_panorama(width: usize) -> Panorama {
    Panorama::new(ColorGrid::from_elem((width / 2, width), WHITE)).unwrap()
}

#[test]
fn clear_sky_scenario_matches_full_exposure() {
    let grids = Projector::new(ProjectionCorrections::unified()).project(&white_panorama(600));
    let labels = grids
        .zenith
        .mapv(|z| if z.is_nan() { SkyClass::Outside } else { SkyClass::Sky });

    let samples = [
        SolarSample { zenith: 30.0, azimuth: 150.0 },
        SolarSample { zenith: 60.0, azimuth: 240.0 },
        SolarSample { zenith: 95.0, azimuth: 320.0 },
    ];
    let ghi = [800.0, 500.0, f64::NAN];
    let zenith: Vec<f64> = samples.iter().map(|s| s.zenith).collect();

    let obstruction = obstruction_series(&labels, &grids, &samples).unwrap();
    let codes: Vec<f64> = obstruction.iter().map(|&o| Obstruction::series_value(o)).collect();
    assert_eq!(&codes[..2], &[0.0, 0.0]);
    assert!(codes[2].is_nan());

    let erbs = Erbs::default();
    let day_of_year = 22;
    let irradiance = irradiance_series(&erbs, &ghi, &zenith, &obstruction, 1.0, day_of_year).unwrap();

    for i in 0..2 {
        let parts = erbs.decompose(ghi[i], zenith[i], day_of_year);
        let expected = parts.dni * zenith[i].to_radians().cos() + parts.dhi;
        assert!((irradiance[i] - expected).abs() < 1e-9, "sample {}", i);
    }
    assert!(irradiance[2].is_nan());
}

fn write_inputs(root: &Path) -> Config {
    let images = root.join("images");
    fs::create_dir_all(&images).unwrap();
    DatasetIO::write_color_grid(&images.join("101_p1.png"), white_panorama(320).pixels()).unwrap();
    DatasetIO::write_color_grid(&images.join("102_p1.png"), &ColorGrid::from_elem((100, 320), WHITE)).unwrap();

    fs::write(root.join("cars_heading.csv"), "NumId,Heading\n101,30\n102,200\n103,90\n").unwrap();
    fs::write(
        root.join("solpos.csv"),
        ",Day,Month,Zenith (refracted),Azimuth angle\n\
         2019-01-22 11:00:00,22,1,75.0,160.0\n\
         2019-01-22 11:10:00,22,1,74.6,163.0\n\
         2019-01-22 11:20:00,22,1,74.3,166.0\n\
         2019-01-22 23:00:00,22,1,140.0,350.0\n\
         2019-01-23 11:00:00,23,1,74.9,160.0\n",
    )
    .unwrap();
    fs::write(
        root.join("weather.csv"),
        "date_time,GHI\n2020-01-22 11:00:00,100\n2020-01-22 11:20:00,130\n",
    )
    .unwrap();

    serde_json::from_value(serde_json::json!({
        "date": "2020-01-22",
        "timezone": "Europe/Dublin",
        "cpu_cores": 2,
        "smoothing": null,
        "paths": {
            "headings": root.join("cars_heading.csv"),
            "weather": root.join("weather.csv"),
            "solar_positions": root.join("solpos.csv"),
            "image_dir": images,
            "image_suffix": "_p1.png",
            "output": root.join("output_prediction.csv")
        }
    }))
    .unwrap()
}

#[test]
fn batch_from_disk_writes_one_column_per_good_point() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_inputs(dir.path());
    config.validate().unwrap();

    let points = DatasetIO::read_headings(&config.paths.headings).unwrap();
    let weather = DatasetIO::read_weather(&config.paths.weather).unwrap();
    let date = NaiveDate::from_ymd_opt(2020, 1, 22).unwrap();
    let positions =
        DatasetIO::read_solar_positions(config.paths.solar_positions.as_deref().unwrap(), date).unwrap();
    assert_eq!(positions.len(), 4);

    let mut table = WeatherTable::merge(&positions, &weather);
    assert_eq!(table.ghi[1], 115.0);
    assert!(table.ghi[3].is_nan());

    let engine = IrradianceEngine::new(config.clone())
        .unwrap()
        .with_smoother(Box::new(NoSmoothing));
    let report = engine.run_batch_from_disk(&points, &table).unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].num_id, "101");
    let failed: Vec<&str> = report.failures.iter().map(|f| f.num_id.as_str()).collect();
    assert_eq!(failed, vec!["102", "103"]);
    assert!(matches!(
        report.failures[0].error,
        SkyViewError::InvalidPanorama { width: 320, height: 100 }
    ));
    assert!(matches!(report.failures[1].error, SkyViewError::Image(_)));

    let result = &report.results[0];
    assert!(result.irradiance[..3].iter().all(|v| *v > 0.0));
    assert!(result.irradiance[3].is_nan());

    table.append_results(&report.results).unwrap();
    DatasetIO::write_csv(&config.paths.output, &table).unwrap();

    let text = fs::read_to_string(&config.paths.output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].ends_with(",ghi_101"));
    assert!(lines[4].starts_with("2020-01-22 23:00:00,,140,350,"));
    assert!(lines[4].ends_with(','));
}
