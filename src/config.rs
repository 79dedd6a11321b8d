use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use crate::chart::{MetricSpec, SeriesStyle, SourceSpec, Surface};
use crate::series::SAMPLE_INTERVAL_MS;
use crate::source::{Location, SourceError};
use crate::view::ViewLayout;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source_a: String,
    pub source_b: String,
    pub label_a: String,
    pub label_b: String,
    pub base_url: Option<String>,
    pub data_dir: PathBuf,
    pub interval_ms: u64,
    pub out_dir: PathBuf,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid TRACE_BASE_URL {url}: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("SAMPLE_INTERVAL_MS must be positive")]
    ZeroInterval,

    #[error("chart surface must be non-empty, got {width}x{height}")]
    ZeroSurface { width: u32, height: u32 },

    #[error(transparent)]
    Location(#[from] SourceError),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_a: "/researchData/myVideoPlayerPerformance.json".to_string(),
            source_b: "/researchData/videoJsPerformance.json".to_string(),
            label_a: "MyVideoPlayer".to_string(),
            label_b: "Video.js".to_string(),
            base_url: None,
            data_dir: PathBuf::from("public"),
            interval_ms: SAMPLE_INTERVAL_MS,
            out_dir: PathBuf::from("out/charts"),
            width: 1280,
            height: 480,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            source_a: std::env::var("TRACE_SOURCE_A").unwrap_or(d.source_a),
            source_b: std::env::var("TRACE_SOURCE_B").unwrap_or(d.source_b),
            label_a: std::env::var("TRACE_LABEL_A").unwrap_or(d.label_a),
            label_b: std::env::var("TRACE_LABEL_B").unwrap_or(d.label_b),
            base_url: std::env::var("TRACE_BASE_URL").ok().filter(|v| !v.trim().is_empty()),
            data_dir: std::env::var("TRACE_DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            interval_ms: std::env::var("SAMPLE_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.interval_ms),
            out_dir: std::env::var("CHART_OUT_DIR").map(PathBuf::from).unwrap_or(d.out_dir),
            width: std::env::var("CHART_WIDTH").ok().and_then(|v| v.parse().ok()).unwrap_or(d.width),
            height: std::env::var("CHART_HEIGHT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.height),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::ZeroSurface {
                width: self.width,
                height: self.height,
            });
        }
        self.base()?;
        Ok(())
    }

    fn base(&self) -> Result<Option<Url>, ConfigError> {
        self.base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|source| ConfigError::BaseUrl {
                    url: raw.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// The two-source, two-metric comparison this config describes.
    pub fn layout(&self) -> Result<ViewLayout, ConfigError> {
        self.validate()?;
        let base = self.base()?;
        let locate = |raw: &str| Location::resolve(raw, base.as_ref(), &self.data_dir);
        let surface = |id: &str| {
            Surface::new(id, self.out_dir.join(format!("{}.svg", id)), self.width, self.height)
        };
        Ok(ViewLayout {
            sources: [
                SourceSpec::new(self.label_a.clone(), SeriesStyle::primary()),
                SourceSpec::new(self.label_b.clone(), SeriesStyle::secondary()),
            ],
            locations: [locate(&self.source_a)?, locate(&self.source_b)?],
            metrics: [MetricSpec::gpu_gt_usage(), MetricSpec::gpu_d3d_usage()],
            surfaces: [surface("gpu_gt_usage"), surface("gpu_d3d_usage")],
            interval_ms: self.interval_ms,
        })
    }
}
