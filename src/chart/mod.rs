use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::logging::{log_bind, log_unbind};

pub mod spec;
mod svg;

pub use spec::{ChartSpec, MetricSpec, Overlay, Rgba, SeriesStyle, SourceSpec, Tooltip, TooltipEntry};
pub use svg::{SvgChart, SvgChartBackend};

/// A display mount point a chart renders into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    pub id: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl Surface {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            width,
            height,
        }
    }
}

/// Identifies one bound instance. Handles from earlier binds on the same
/// surface go stale once the surface is rebound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChartHandle {
    surface: String,
    generation: u64,
}

impl ChartHandle {
    pub fn surface(&self) -> &str {
        &self.surface
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("surface {surface} unavailable: {reason}")]
    SurfaceUnavailable { surface: String, reason: String },

    #[error("rendering on {surface} failed: {reason}")]
    Render { surface: String, reason: String },
}

/// The charting capability. `render` has no side effects and may run on any
/// thread; `attach` puts the frame on the surface.
pub trait ChartBackend: Send + Sync {
    type Frame: Send;
    type Instance: ChartInstance;

    /// Draw `spec` for `surface` without touching the surface.
    fn render(&self, surface: &Surface, spec: &ChartSpec) -> Result<Self::Frame, BindError>;

    /// Put a rendered frame on the surface.
    fn attach(&self, surface: &Surface, frame: Self::Frame) -> Result<Self::Instance, BindError>;
}

pub trait ChartInstance: Send {
    /// Release the instance's rendering context.
    fn destroy(&mut self);
}

struct LiveChart<I> {
    generation: u64,
    instance: I,
    spec: ChartSpec,
}

/// Owns the live chart of every surface it has bound.
pub struct ChartBinding<B: ChartBackend> {
    backend: Arc<B>,
    live: HashMap<String, LiveChart<B::Instance>>,
    next_generation: u64,
}

impl<B: ChartBackend> ChartBinding<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            live: HashMap::new(),
            next_generation: 1,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, for rendering frames outside of this registry.
    pub fn shared_backend(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    /// Render and bind `spec` to `surface` in one step.
    pub fn bind(&mut self, surface: &Surface, spec: ChartSpec) -> Result<ChartHandle, BindError> {
        let frame = self.backend.render(surface, &spec)?;
        self.commit(surface, spec, frame)
    }

    /// Bind an already rendered frame, tearing down whatever the surface
    /// showed. On failure the surface is left empty.
    pub fn commit(
        &mut self,
        surface: &Surface,
        spec: ChartSpec,
        frame: B::Frame,
    ) -> Result<ChartHandle, BindError> {
        if let Some(prior) = self.handle_on(&surface.id) {
            self.unbind(&prior);
        }
        let instance = self.backend.attach(surface, frame)?;
        let generation = self.next_generation;
        self.next_generation += 1;
        log_bind(&surface.id, generation, &spec.title, &spec.description);
        self.live.insert(
            surface.id.clone(),
            LiveChart {
                generation,
                instance,
                spec,
            },
        );
        Ok(ChartHandle {
            surface: surface.id.clone(),
            generation,
        })
    }

    /// Destroy the instance behind `handle`. No-op for stale or unbound handles.
    pub fn unbind(&mut self, handle: &ChartHandle) {
        let current = self
            .live
            .get(&handle.surface)
            .is_some_and(|live| live.generation == handle.generation);
        if !current {
            return;
        }
        if let Some(mut live) = self.live.remove(&handle.surface) {
            live.instance.destroy();
            log_unbind(&handle.surface, live.generation);
        }
    }

    pub fn handle_on(&self, surface_id: &str) -> Option<ChartHandle> {
        self.live.get(surface_id).map(|live| ChartHandle {
            surface: surface_id.to_string(),
            generation: live.generation,
        })
    }

    pub fn is_live(&self, handle: &ChartHandle) -> bool {
        self.handle_on(&handle.surface).as_ref() == Some(handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    fn current(&self, handle: &ChartHandle) -> Option<&LiveChart<B::Instance>> {
        self.live
            .get(&handle.surface)
            .filter(|live| live.generation == handle.generation)
    }

    pub fn spec(&self, handle: &ChartHandle) -> Option<&ChartSpec> {
        self.current(handle).map(|live| &live.spec)
    }

    pub fn instance(&self, handle: &ChartHandle) -> Option<&B::Instance> {
        self.current(handle).map(|live| &live.instance)
    }

    /// Hover lookup on a live chart.
    pub fn inspect(&self, handle: &ChartHandle, time_ms: f64) -> Option<Tooltip> {
        self.spec(handle)?.inspect(time_ms)
    }
}

impl<B: ChartBackend> Drop for ChartBinding<B> {
    fn drop(&mut self) {
        for (_, mut live) in self.live.drain() {
            live.instance.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{transform, RawDataset};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default, Clone)]
    struct Counts {
        created: Arc<AtomicUsize>,
        destroyed: Arc<AtomicUsize>,
    }

    struct SpyBackend {
        counts: Counts,
        broken: Option<String>,
    }

    struct SpyInstance {
        destroyed: Arc<AtomicUsize>,
    }

    impl ChartInstance for SpyInstance {
        fn destroy(&mut self) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ChartBackend for SpyBackend {
        type Frame = ();
        type Instance = SpyInstance;

        fn render(&self, _surface: &Surface, _spec: &ChartSpec) -> Result<(), BindError> {
            Ok(())
        }

        fn attach(&self, surface: &Surface, _frame: ()) -> Result<SpyInstance, BindError> {
            if self.broken.as_deref() == Some(surface.id.as_str()) {
                return Err(BindError::SurfaceUnavailable {
                    surface: surface.id.clone(),
                    reason: "detached".to_string(),
                });
            }
            self.counts.created.fetch_add(1, Ordering::SeqCst);
            Ok(SpyInstance {
                destroyed: self.counts.destroyed.clone(),
            })
        }
    }

    fn binding(broken: Option<&str>) -> (ChartBinding<SpyBackend>, Counts) {
        let counts = Counts::default();
        let backend = SpyBackend {
            counts: counts.clone(),
            broken: broken.map(str::to_string),
        };
        (ChartBinding::new(backend), counts)
    }

    fn empty_spec() -> ChartSpec {
        let rows = RawDataset::default();
        let a = SourceSpec::new("A", SeriesStyle::primary());
        let b = SourceSpec::new("B", SeriesStyle::secondary());
        ChartSpec::compare_default(
            &MetricSpec::new("m"),
            [(&a, transform("A", &rows, "m")), (&b, transform("B", &rows, "m"))],
        )
    }

    fn surface(id: &str) -> Surface {
        Surface::new(id, format!("{}.svg", id), 640, 320)
    }

    #[test]
    fn test_rebind_replaces_prior_instance() {
        let (mut charts, counts) = binding(None);
        let first = charts.bind(&surface("gt"), empty_spec()).unwrap();
        let second = charts.bind(&surface("gt"), empty_spec()).unwrap();
        assert_eq!(charts.live_count(), 1);
        assert_eq!(counts.created.load(Ordering::SeqCst), 2);
        assert_eq!(counts.destroyed.load(Ordering::SeqCst), 1);
        assert!(!charts.is_live(&first));
        assert!(charts.is_live(&second));
    }

    #[test]
    fn test_unbind_is_idempotent() {
        let (mut charts, counts) = binding(None);
        let handle = charts.bind(&surface("gt"), empty_spec()).unwrap();
        charts.unbind(&handle);
        charts.unbind(&handle);
        assert_eq!(counts.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(charts.live_count(), 0);
    }

    #[test]
    fn test_stale_handle_leaves_newer_instance() {
        let (mut charts, counts) = binding(None);
        let stale = charts.bind(&surface("gt"), empty_spec()).unwrap();
        let fresh = charts.bind(&surface("gt"), empty_spec()).unwrap();
        charts.unbind(&stale);
        assert!(charts.is_live(&fresh));
        assert_eq!(counts.destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_surfaces_are_independent() {
        let (mut charts, _counts) = binding(Some("d3d"));
        let gt = charts.bind(&surface("gt"), empty_spec());
        let d3d = charts.bind(&surface("d3d"), empty_spec());
        assert!(gt.is_ok());
        assert!(matches!(d3d, Err(BindError::SurfaceUnavailable { .. })));
        assert_eq!(charts.live_count(), 1);
    }

    #[test]
    fn test_drop_destroys_live_instances() {
        let (mut charts, counts) = binding(None);
        charts.bind(&surface("gt"), empty_spec()).unwrap();
        charts.bind(&surface("d3d"), empty_spec()).unwrap();
        drop(charts);
        assert_eq!(counts.destroyed.load(Ordering::SeqCst), 2);
    }
}
