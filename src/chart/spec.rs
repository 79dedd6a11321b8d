use crate::series::{Series, SAMPLE_INTERVAL_MS};

/// sRGB color with alpha in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }
}

/// How one source's line is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStyle {
    pub line: Rgba,
    pub fill: Rgba,
    pub line_width: u32,
    /// Marker radius in pixels; 0 draws the bare line.
    pub point_radius: u32,
}

impl SeriesStyle {
    pub const fn new(line: Rgba, fill: Rgba) -> Self {
        Self {
            line,
            fill,
            line_width: 2,
            point_radius: 0,
        }
    }

    /// Red line, used for the first source.
    pub const fn primary() -> Self {
        Self::new(Rgba::rgb(255, 0, 0), Rgba::rgba(255, 99, 132, 0.2))
    }

    /// Blue line, used for the second source.
    pub const fn secondary() -> Self {
        Self::new(Rgba::rgb(54, 162, 235), Rgba::rgba(54, 162, 235, 0.2))
    }
}

/// A source taking part in the comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    pub label: String,
    pub style: SeriesStyle,
}

impl SourceSpec {
    pub fn new(label: impl Into<String>, style: SeriesStyle) -> Self {
        Self {
            label: label.into(),
            style,
        }
    }
}

/// Display metadata for one metric family.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpec {
    /// Field name in the raw samples.
    pub field: String,
    /// Human name, e.g. "GPU GT Usage".
    pub name: String,
    pub unit: String,
    pub description: String,
}

impl MetricSpec {
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: field.clone(),
            field,
            unit: String::new(),
            description: String::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>, unit: impl Into<String>) -> Self {
        self.name = name.into();
        self.unit = unit.into();
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn gpu_gt_usage() -> Self {
        Self::new("GPU_GT_Usage_Percentage")
            .named("GPU GT Usage", "%")
            .described(
                "GT usage reflects graphics core load. Comparing these lines shows how \
                 efficiently each player uses the GPU's graphics engine during playback.",
            )
    }

    pub fn gpu_d3d_usage() -> Self {
        Self::new("GPU_D3D_Usage_Percentage")
            .named("GPU D3D Usage", "%")
            .described(
                "D3D usage reflects Direct3D workload for rendering/presentation. It helps \
                 compare rendering overhead and frame delivery between the players.",
            )
    }

    /// "GPU GT Usage (%)", or just the name when there is no unit.
    pub fn axis_label(&self) -> String {
        if self.unit.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.unit)
        }
    }

    pub fn title(&self, interval_ms: u64) -> String {
        format!("{} vs Time ({}ms interval)", self.name, interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub label: String,
    pub style: SeriesStyle,
    pub series: Series,
}

/// Everything needed to draw one comparative chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub metric: String,
    pub title: String,
    pub description: String,
    pub x_label: String,
    pub y_label: String,
    pub overlays: [Overlay; 2],
}

impl ChartSpec {
    /// Overlay two sources' series of the same metric.
    pub fn compare(
        metric: &MetricSpec,
        sources: [(&SourceSpec, Series); 2],
        interval_ms: u64,
    ) -> Self {
        let y_label = metric.axis_label();
        let overlays = sources.map(|(source, series)| Overlay {
            label: format!("{} {}", source.label, y_label),
            style: source.style,
            series,
        });
        Self {
            metric: metric.field.clone(),
            title: metric.title(interval_ms),
            description: metric.description.clone(),
            x_label: "Time (ms)".to_string(),
            y_label,
            overlays,
        }
    }

    pub fn compare_default(metric: &MetricSpec, sources: [(&SourceSpec, Series); 2]) -> Self {
        Self::compare(metric, sources, SAMPLE_INTERVAL_MS)
    }

    /// Last sample time across both overlays.
    pub fn time_extent(&self) -> u64 {
        self.overlays
            .iter()
            .filter_map(|o| o.series.last_time())
            .max()
            .unwrap_or(0)
    }

    /// (min, max) value across both overlays, `None` when both are empty.
    pub fn value_extent(&self) -> Option<(f64, f64)> {
        self.overlays
            .iter()
            .filter_map(|o| o.series.value_range())
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
    }

    /// Tooltip for a cursor at `time_ms`.
    ///
    /// The nearest sample of any overlay wins; every overlay with a sample at
    /// that same time contributes its value.
    pub fn inspect(&self, time_ms: f64) -> Option<Tooltip> {
        let nearest = self
            .overlays
            .iter()
            .filter_map(|o| o.series.nearest(time_ms))
            .min_by(|a, b| {
                let da = (a.time() as f64 - time_ms).abs();
                let db = (b.time() as f64 - time_ms).abs();
                da.total_cmp(&db).then(a.time().cmp(&b.time()))
            })?;
        let time = nearest.time();
        let entries = self
            .overlays
            .iter()
            .filter_map(|o| {
                o.series
                    .nearest(time as f64)
                    .filter(|p| p.time() == time)
                    .map(|p| TooltipEntry {
                        label: o.label.clone(),
                        value: p.value(),
                    })
            })
            .collect();
        Some(Tooltip { time, entries })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub time: u64,
    pub entries: Vec<TooltipEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TooltipEntry {
    pub label: String,
    pub value: f64,
}
