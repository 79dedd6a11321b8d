//! Comparative GPU-usage charts for two recorded video-playback traces.
//!
//! Two JSON trace files are fetched concurrently, each row becomes a point
//! at `index * 200ms`, and two overlay charts (GT usage and D3D usage) are
//! bound to their surfaces by a [`view::ComparativeView`].

pub mod chart;
pub mod config;
pub mod logging;
pub mod series;
pub mod source;
pub mod view;

pub use chart::{ChartBackend, ChartBinding, ChartHandle, ChartInstance, ChartSpec, Surface};
pub use config::Config;
pub use series::{transform, RawDataset, RawSample, Series, SeriesPoint, SAMPLE_INTERVAL_MS};
pub use source::{DataSource, DefaultFetcher, Fetcher, LoadError, Location};
pub use view::{ComparativeView, CycleOutcome, ViewLayout, ViewState};
