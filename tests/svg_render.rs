mod common;

use serde_json::json;

use gpuviz::chart::{ChartBackend, ChartInstance, MetricSpec, SvgChartBackend, Surface};
use gpuviz::chart::{BindError, ChartSpec, SeriesStyle, SourceSpec};
use gpuviz::series::{transform, RawDataset};
use gpuviz::{ComparativeView, Config, CycleOutcome, DefaultFetcher};

fn comparison() -> ChartSpec {
    let a: RawDataset = serde_json::from_value(json!([{"g": 10}, {"g": 40}, {"g": 25}])).unwrap();
    let b: RawDataset = serde_json::from_value(json!([{"g": "5"}, {"g": 15}])).unwrap();
    let first = SourceSpec::new("MyVideoPlayer", SeriesStyle::primary());
    let second = SourceSpec::new("Video.js", SeriesStyle::secondary());
    ChartSpec::compare_default(
        &MetricSpec::gpu_gt_usage(),
        [
            (&first, transform("MyVideoPlayer", &a, "g")),
            (&second, transform("Video.js", &b, "g")),
        ],
    )
}

#[test]
fn renders_title_and_legend_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let surface = Surface::new("gt", dir.path().join("gt.svg"), 800, 400);
    let spec = comparison();

    let backend = SvgChartBackend::new();
    let rendered = backend.render(&surface, &spec).unwrap();
    assert!(!surface.path.exists());
    let mut chart = backend.attach(&surface, rendered).unwrap();
    let frame = chart.frame().unwrap().to_string();
    assert!(frame.starts_with("<svg"));
    assert!(frame.contains(&spec.title));
    assert!(frame.contains(&spec.overlays[0].label));
    assert!(frame.contains(&spec.overlays[1].label));
    assert!(frame.contains("Time (ms)"));

    let on_disk = std::fs::read_to_string(surface.path.as_path()).unwrap();
    assert_eq!(on_disk, frame);

    chart.destroy();
    assert!(chart.frame().is_none());
    assert!(surface.path.exists());
}

#[test]
fn missing_directory_is_an_unavailable_surface() {
    let dir = tempfile::tempdir().unwrap();
    let surface = Surface::new("gt", dir.path().join("nope").join("gt.svg"), 800, 400);
    let backend = SvgChartBackend::new();
    let frame = backend.render(&surface, &comparison()).unwrap();
    let err = backend.attach(&surface, frame).unwrap_err();
    assert!(matches!(err, BindError::SurfaceUnavailable { .. }));
}

#[test]
fn zero_sized_surface_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let surface = Surface::new("gt", dir.path().join("gt.svg"), 0, 400);
    let err = SvgChartBackend::new().render(&surface, &comparison()).unwrap_err();
    assert!(matches!(err, BindError::SurfaceUnavailable { .. }));
    assert!(!surface.path.exists());
}

#[tokio::test]
async fn huge_reading_binds_without_stalling_the_view() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    std::fs::write(
        data.path().join("a.json"),
        r#"[{"GPU_GT_Usage_Percentage": 1.7e308}, {"GPU_GT_Usage_Percentage": -1e308}]"#,
    )
    .unwrap();
    std::fs::write(data.path().join("b.json"), r#"[{"GPU_GT_Usage_Percentage": 1e308}]"#).unwrap();

    let config = Config {
        source_a: "a.json".to_string(),
        source_b: "b.json".to_string(),
        data_dir: data.path().to_path_buf(),
        out_dir: out.path().to_path_buf(),
        ..Config::default()
    };
    let view = ComparativeView::new(
        DefaultFetcher::new(),
        SvgChartBackend::new(),
        config.layout().unwrap(),
    );
    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(30),
        view.activate().finished(),
    )
    .await
    .expect("cycle settles");
    assert_eq!(outcome, CycleOutcome::Bound { charts: 2 });
    assert!(view.status().errors.is_empty());
}

#[tokio::test]
async fn configured_view_writes_both_charts() {
    let data = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    std::fs::write(
        data.path().join("a.json"),
        r#"[{"GPU_GT_Usage_Percentage": 12, "GPU_D3D_Usage_Percentage": 30}]"#,
    )
    .unwrap();
    std::fs::write(
        data.path().join("b.json"),
        r#"[{"GPU_GT_Usage_Percentage": "9.5"}, {"GPU_D3D_Usage_Percentage": 44}]"#,
    )
    .unwrap();

    let config = Config {
        source_a: "a.json".to_string(),
        source_b: "b.json".to_string(),
        data_dir: data.path().to_path_buf(),
        out_dir: out.path().to_path_buf(),
        ..Config::default()
    };
    let layout = config.layout().unwrap();
    let view = ComparativeView::new(DefaultFetcher::new(), SvgChartBackend::new(), layout);

    assert_eq!(
        view.activate().finished().await,
        CycleOutcome::Bound { charts: 2 }
    );

    for surface in &view.layout().surfaces {
        let svg = std::fs::read_to_string(&surface.path).unwrap();
        assert!(svg.contains("MyVideoPlayer"));
        assert!(svg.contains("Video.js"));
    }
    let handles = view.handles();
    let d3d = handles[1].clone().unwrap();
    let title = view.with_charts(|charts| charts.spec(&d3d).map(|s| s.title.clone()));
    assert_eq!(title.as_deref(), Some("GPU D3D Usage vs Time (200ms interval)"));

    view.deactivate();
    assert_eq!(view.status().live_charts, 0);
}
