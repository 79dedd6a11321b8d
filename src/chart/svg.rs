use plotters::prelude::*;
use std::error::Error;
use std::path::PathBuf;

use super::{BindError, ChartBackend, ChartInstance, ChartSpec, Rgba, Surface};
use crate::logging::ProfileScope;

/// Renders charts as static SVG files with plotters.
#[derive(Debug, Clone, Default)]
pub struct SvgChartBackend;

impl SvgChartBackend {
    pub fn new() -> Self {
        Self
    }
}

/// A rendered chart. The frame stays on disk after `destroy`.
#[derive(Debug)]
pub struct SvgChart {
    path: PathBuf,
    frame: Option<String>,
}

impl SvgChart {
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// The SVG document while the instance is live.
    pub fn frame(&self) -> Option<&str> {
        self.frame.as_deref()
    }
}

impl ChartInstance for SvgChart {
    fn destroy(&mut self) {
        self.frame = None;
    }
}

impl ChartBackend for SvgChartBackend {
    type Frame = String;
    type Instance = SvgChart;

    fn render(&self, surface: &Surface, spec: &ChartSpec) -> Result<String, BindError> {
        if surface.width == 0 || surface.height == 0 {
            return Err(BindError::SurfaceUnavailable {
                surface: surface.id.clone(),
                reason: format!("zero-sized surface {}x{}", surface.width, surface.height),
            });
        }
        let _profile = ProfileScope::new("chart.render");

        let mut frame = String::new();
        draw_comparison(&mut frame, (surface.width, surface.height), spec).map_err(|e| {
            BindError::Render {
                surface: surface.id.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(frame)
    }

    fn attach(&self, surface: &Surface, frame: String) -> Result<SvgChart, BindError> {
        std::fs::write(&surface.path, &frame).map_err(|e| BindError::SurfaceUnavailable {
            surface: surface.id.clone(),
            reason: format!("{}: {}", surface.path.display(), e),
        })?;
        Ok(SvgChart {
            path: surface.path.clone(),
            frame: Some(frame),
        })
    }
}

fn rgb(c: Rgba) -> RGBColor {
    RGBColor(c.r, c.g, c.b)
}

fn rgba(c: Rgba) -> RGBAColor {
    RGBAColor(c.r, c.g, c.b, c.a)
}

/// Largest magnitude an axis end may take. plotters needs both ends and the
/// span between them to be finite.
const AXIS_LIMIT: f64 = 1e300;

/// Axis bounds that always span a non-empty finite range and include zero.
fn axis_bounds(spec: &ChartSpec) -> (f64, f64, f64) {
    let x_max = (spec.time_extent() as f64).max(1.0);
    let (lo, hi) = spec.value_extent().unwrap_or((0.0, 1.0));
    let y_min = lo.min(0.0).max(-AXIS_LIMIT);
    let top = hi.max(0.0).min(AXIS_LIMIT);
    let mut y_max = top + (top - y_min) * 0.1;
    if y_max <= y_min {
        y_max = y_min + 1.0;
    }
    (x_max, y_min, y_max)
}

fn draw_comparison(
    out: &mut String,
    size: (u32, u32),
    spec: &ChartSpec,
) -> Result<(), Box<dyn Error>> {
    let (x_max, y_min, y_max) = axis_bounds(spec);

    let root = SVGBackend::with_string(out, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&spec.title, ("sans-serif", 24))
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .draw()?;

    for overlay in &spec.overlays {
        let line = rgb(overlay.style.line);
        let fill = rgba(overlay.style.fill);
        let points: Vec<(f64, f64)> = overlay
            .series
            .points()
            .iter()
            .map(|p| (p.time() as f64, p.value().clamp(y_min, y_max)))
            .collect();
        if overlay.style.point_radius > 0 {
            let radius = overlay.style.point_radius as i32;
            chart.draw_series(
                points
                    .iter()
                    .map(|&p| Circle::new(p, radius, line.filled())),
            )?;
        }
        chart
            .draw_series(LineSeries::new(
                points,
                line.stroke_width(overlay.style.line_width),
            ))?
            .label(overlay.label.as_str())
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 6), (x + 24, y + 6)], fill.filled())
            });
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    root.present()?;
    Ok(())
}
