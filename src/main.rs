use anyhow::{Context, Result};
use serde_json::json;

use gpuviz::chart::SvgChartBackend;
use gpuviz::logging::{log, obj, v_str, Domain, Level};
use gpuviz::{ComparativeView, Config, DefaultFetcher};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let layout = cfg.layout().context("invalid configuration")?;
    std::fs::create_dir_all(&cfg.out_dir)
        .with_context(|| format!("cannot create {}", cfg.out_dir.display()))?;

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("source_a", v_str(&layout.locations[0].to_string())),
            ("source_b", v_str(&layout.locations[1].to_string())),
            ("out_dir", v_str(&cfg.out_dir.display().to_string())),
            ("interval_ms", json!(cfg.interval_ms)),
        ]),
    );

    let view = ComparativeView::new(DefaultFetcher::new(), SvgChartBackend::new(), layout);
    let activation = view.activate();

    let outcome = view.settle(activation, tokio::signal::ctrl_c()).await;

    let status = view.status();
    log(
        Level::Info,
        Domain::System,
        "shutdown",
        obj(&[
            ("outcome", v_str(&format!("{:?}", outcome))),
            ("state", v_str(status.state.as_str())),
            ("errors", json!(status.errors)),
        ]),
    );

    for handle in view.handles().into_iter().flatten() {
        let path = view.with_charts(|charts| charts.instance(&handle).map(|c| c.path().clone()));
        if let Some(path) = path {
            println!("{}", path.display());
        }
    }

    view.deactivate();
    Ok(())
}
