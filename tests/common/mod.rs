#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gpuviz::chart::{
    BindError, ChartBackend, ChartInstance, ChartSpec, MetricSpec, SeriesStyle, SourceSpec, Surface,
};
use gpuviz::source::{Fetcher, Location, SourceError};
use gpuviz::view::ViewLayout;

/// Serves canned bodies, sleeping per call according to a delay queue.
#[derive(Default)]
pub struct ScriptedFetcher {
    bodies: HashMap<String, Result<String, u16>>,
    delays: Mutex<VecDeque<u64>>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(self, location: &str, body: serde_json::Value) -> Self {
        self.raw(location, &body.to_string())
    }

    pub fn raw(mut self, location: &str, body: &str) -> Self {
        self.bodies.insert(location.to_string(), Ok(body.to_string()));
        self
    }

    pub fn status(mut self, location: &str, status: u16) -> Self {
        self.bodies.insert(location.to_string(), Err(status));
        self
    }

    /// Delay in ms for each successive fetch call.
    pub fn delays(self, delays: &[u64]) -> Self {
        *self.delays.lock().unwrap() = delays.iter().copied().collect();
        self
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, location: &Location) -> Result<Vec<u8>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().unwrap().pop_front().unwrap_or(0);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let key = location.to_string();
        match self.bodies.get(&key) {
            Some(Ok(body)) => Ok(body.clone().into_bytes()),
            Some(Err(status)) => Err(SourceError::Status {
                status: *status,
                url: key,
            }),
            None => Err(SourceError::Status {
                status: 404,
                url: key,
            }),
        }
    }
}

#[derive(Default, Clone)]
pub struct BindCounts {
    pub rendered: Arc<AtomicUsize>,
    pub created: Arc<AtomicUsize>,
    pub destroyed: Arc<AtomicUsize>,
}

impl BindCounts {
    pub fn rendered(&self) -> usize {
        self.rendered.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// Records renders/creates/destroys; surfaces listed in `broken` refuse to
/// bind and every render blocks its thread for `render_delay`.
#[derive(Default)]
pub struct SpyBackend {
    pub counts: BindCounts,
    pub broken: HashSet<String>,
    pub render_delay: Duration,
}

impl SpyBackend {
    pub fn new() -> (Self, BindCounts) {
        let backend = Self::default();
        let counts = backend.counts.clone();
        (backend, counts)
    }

    pub fn broken(surface: &str) -> (Self, BindCounts) {
        let (mut backend, counts) = Self::new();
        backend.broken.insert(surface.to_string());
        (backend, counts)
    }

    pub fn slow(render_delay: Duration) -> (Self, BindCounts) {
        let (mut backend, counts) = Self::new();
        backend.render_delay = render_delay;
        (backend, counts)
    }
}

pub struct SpyChart {
    destroyed: Arc<AtomicUsize>,
}

impl ChartInstance for SpyChart {
    fn destroy(&mut self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

impl ChartBackend for SpyBackend {
    type Frame = ();
    type Instance = SpyChart;

    fn render(&self, _surface: &Surface, _spec: &ChartSpec) -> Result<(), BindError> {
        self.counts.rendered.fetch_add(1, Ordering::SeqCst);
        if !self.render_delay.is_zero() {
            std::thread::sleep(self.render_delay);
        }
        Ok(())
    }

    fn attach(&self, surface: &Surface, _frame: ()) -> Result<SpyChart, BindError> {
        if self.broken.contains(&surface.id) {
            return Err(BindError::SurfaceUnavailable {
                surface: surface.id.clone(),
                reason: "not mounted".to_string(),
            });
        }
        self.counts.created.fetch_add(1, Ordering::SeqCst);
        Ok(SpyChart {
            destroyed: self.counts.destroyed.clone(),
        })
    }
}

pub fn layout(metrics: [MetricSpec; 2]) -> ViewLayout {
    ViewLayout {
        sources: [
            SourceSpec::new("A", SeriesStyle::primary()),
            SourceSpec::new("B", SeriesStyle::secondary()),
        ],
        locations: [
            Location::File(PathBuf::from("a.json")),
            Location::File(PathBuf::from("b.json")),
        ],
        metrics,
        surfaces: [
            Surface::new("gt", "gt.svg", 640, 320),
            Surface::new("d3d", "d3d.svg", 640, 320),
        ],
        interval_ms: 200,
    }
}

pub fn metric_layout() -> ViewLayout {
    layout([MetricSpec::new("m"), MetricSpec::new("n")])
}
