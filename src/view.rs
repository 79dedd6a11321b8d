//! Side-by-side comparison of two traces, one chart per metric family.
//!
//! A view runs one activation cycle at a time:
//! `Idle -> Loading -> Bound | Failed`, with a cancelled cycle dropping back
//! to `Idle`. The cycle task and `deactivate` meet on a single lock, and the
//! task re-checks its token and cycle number under that lock before binding,
//! so nothing from a cancelled cycle ever reaches a surface.

use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chart::{
    BindError, ChartBackend, ChartBinding, ChartHandle, ChartSpec, MetricSpec, SourceSpec, Surface,
    Tooltip,
};
use crate::logging::{log_cycle, log_failure, log_series, Level};
use crate::series::{count_defaulted, transform_with_interval, RawDataset};
use crate::source::{DataSource, Fetcher, LoadError, Location};

/// What to compare and where to draw it. Index 0/1 of `sources` and
/// `locations` pair up; `metrics[i]` is drawn on `surfaces[i]`.
#[derive(Debug, Clone)]
pub struct ViewLayout {
    pub sources: [SourceSpec; 2],
    pub locations: [Location; 2],
    pub metrics: [MetricSpec; 2],
    pub surfaces: [Surface; 2],
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Loading,
    Bound,
    Failed,
}

impl ViewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewState::Idle => "idle",
            ViewState::Loading => "loading",
            ViewState::Bound => "bound",
            ViewState::Failed => "failed",
        }
    }
}

/// How an activation cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Bound { charts: usize },
    Failed,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Bind(#[from] BindError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewStatus {
    pub state: ViewState,
    pub cycle: u64,
    pub live_charts: usize,
    /// Failures reported during the current cycle.
    pub errors: Vec<String>,
}

struct Inner<B: ChartBackend> {
    state: ViewState,
    cycle: u64,
    token: Option<CancellationToken>,
    charts: ChartBinding<B>,
    handles: [Option<ChartHandle>; 2],
    errors: Vec<ViewError>,
}

impl<B: ChartBackend> Inner<B> {
    fn teardown(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        for slot in self.handles.iter_mut() {
            if let Some(handle) = slot.take() {
                self.charts.unbind(&handle);
            }
        }
    }

    /// A cycle may only touch the view while it is the current one.
    fn is_current(&self, cycle: u64, token: &CancellationToken) -> bool {
        self.cycle == cycle && !token.is_cancelled()
    }
}

fn lock<B: ChartBackend>(inner: &Mutex<Inner<B>>) -> MutexGuard<'_, Inner<B>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle on a running activation cycle.
pub struct Activation {
    cycle: u64,
    task: JoinHandle<CycleOutcome>,
}

impl Activation {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Wait for the cycle to settle.
    pub async fn finished(self) -> CycleOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                log_failure(Level::Error, self.cycle, "task", &err.to_string());
                CycleOutcome::Cancelled
            }
        }
    }
}

pub struct ComparativeView<F, B: ChartBackend> {
    source: Arc<DataSource<F>>,
    backend: Arc<B>,
    layout: Arc<ViewLayout>,
    inner: Arc<Mutex<Inner<B>>>,
}

impl<F, B> ComparativeView<F, B>
where
    F: Fetcher + 'static,
    B: ChartBackend + 'static,
    B::Frame: 'static,
{
    pub fn new(fetcher: F, backend: B, layout: ViewLayout) -> Self {
        let charts = ChartBinding::new(backend);
        Self {
            source: Arc::new(DataSource::new(fetcher)),
            backend: charts.shared_backend(),
            layout: Arc::new(layout),
            inner: Arc::new(Mutex::new(Inner {
                state: ViewState::Idle,
                cycle: 0,
                token: None,
                charts,
                handles: [None, None],
                errors: Vec::new(),
            })),
        }
    }

    pub fn layout(&self) -> &ViewLayout {
        &self.layout
    }

    /// Start a new cycle, abandoning any previous one. Must be called from
    /// within a tokio runtime.
    pub fn activate(&self) -> Activation {
        let (cycle, token) = {
            let mut inner = lock(&self.inner);
            inner.teardown();
            inner.cycle += 1;
            let token = CancellationToken::new();
            inner.token = Some(token.clone());
            inner.state = ViewState::Loading;
            inner.errors.clear();
            (inner.cycle, token)
        };
        log_cycle(cycle, ViewState::Loading.as_str(), "activated");

        let task = tokio::spawn(run_cycle(
            cycle,
            token,
            Arc::clone(&self.source),
            Arc::clone(&self.backend),
            Arc::clone(&self.layout),
            Arc::clone(&self.inner),
        ));
        Activation { cycle, task }
    }

    /// Wait for `activation` to settle, deactivating early when `interrupt`
    /// fires. An interrupt source that fails is logged and never fires.
    pub async fn settle<S>(&self, activation: Activation, interrupt: S) -> CycleOutcome
    where
        S: Future<Output = io::Result<()>>,
    {
        let cycle = activation.cycle();
        let interrupted = async {
            match interrupt.await {
                Ok(()) => true,
                Err(err) => {
                    log_failure(Level::Warn, cycle, "interrupt_unavailable", &err.to_string());
                    false
                }
            }
        };
        tokio::select! {
            outcome = activation.finished() => outcome,
            true = interrupted => {
                self.deactivate();
                CycleOutcome::Cancelled
            }
        }
    }

    /// Cancel any outstanding load and unbind both charts.
    pub fn deactivate(&self) {
        deactivate(&self.inner);
    }

    pub fn state(&self) -> ViewState {
        lock(&self.inner).state
    }

    pub fn status(&self) -> ViewStatus {
        let inner = lock(&self.inner);
        ViewStatus {
            state: inner.state,
            cycle: inner.cycle,
            live_charts: inner.charts.live_count(),
            errors: inner.errors.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn handles(&self) -> [Option<ChartHandle>; 2] {
        lock(&self.inner).handles.clone()
    }

    /// Tooltip for chart `chart` (0 or 1) at `time_ms`, if that chart is bound.
    pub fn inspect(&self, chart: usize, time_ms: f64) -> Option<Tooltip> {
        let inner = lock(&self.inner);
        let handle = inner.handles.get(chart)?.as_ref()?;
        inner.charts.inspect(handle, time_ms)
    }

    /// Run `f` against the chart registry, e.g. to reach backend instances.
    pub fn with_charts<R>(&self, f: impl FnOnce(&ChartBinding<B>) -> R) -> R {
        f(&lock(&self.inner).charts)
    }
}

impl<F, B: ChartBackend> Drop for ComparativeView<F, B> {
    fn drop(&mut self) {
        deactivate(&self.inner);
    }
}

fn deactivate<B: ChartBackend>(inner: &Mutex<Inner<B>>) {
    let (cycle, was) = {
        let mut inner = lock(inner);
        let was = inner.state;
        inner.teardown();
        inner.state = ViewState::Idle;
        (inner.cycle, was)
    };
    if was != ViewState::Idle {
        log_cycle(cycle, ViewState::Idle.as_str(), "deactivated");
    }
}

async fn run_cycle<F, B>(
    cycle: u64,
    token: CancellationToken,
    source: Arc<DataSource<F>>,
    backend: Arc<B>,
    layout: Arc<ViewLayout>,
    inner: Arc<Mutex<Inner<B>>>,
) -> CycleOutcome
where
    F: Fetcher,
    B: ChartBackend + 'static,
    B::Frame: 'static,
{
    let loaded = source.load(&layout.locations, &token).await;

    let datasets = match loaded {
        Ok(datasets) if !token.is_cancelled() => datasets,
        Ok(_) | Err(LoadError::Cancelled) => {
            log_failure(Level::Debug, cycle, "cancelled", "result discarded");
            return CycleOutcome::Cancelled;
        }
        Err(err) => {
            let mut guard = lock(&inner);
            if !guard.is_current(cycle, &token) {
                drop(guard);
                log_failure(Level::Debug, cycle, "cancelled", &err.to_string());
                return CycleOutcome::Cancelled;
            }
            guard.state = ViewState::Failed;
            let message = err.to_string();
            guard.errors.push(err.into());
            drop(guard);
            log_failure(Level::Error, cycle, "load_failed", &message);
            log_cycle(cycle, ViewState::Failed.as_str(), "load failed");
            return CycleOutcome::Failed;
        }
    };

    let specs = build_specs(&layout, &datasets);
    drop(datasets);

    // Drawing happens off the executor and outside the view lock; only the
    // currency check and the surface swap run under it.
    let surfaces = layout.surfaces.clone();
    let render = tokio::task::spawn_blocking(move || {
        let [gt, d3d] = specs;
        [(0, gt), (1, d3d)].map(|(i, spec)| {
            backend
                .render(&surfaces[i], &spec)
                .map(|frame| (spec, frame))
        })
    });
    let rendered = tokio::select! {
        biased;
        _ = token.cancelled() => {
            log_failure(Level::Debug, cycle, "cancelled", "render abandoned");
            return CycleOutcome::Cancelled;
        }
        rendered = render => match rendered {
            Ok(rendered) => rendered,
            Err(err) => layout.surfaces.clone().map(|surface| {
                Err(BindError::Render {
                    surface: surface.id,
                    reason: err.to_string(),
                })
            }),
        },
    };

    let mut bind_failures = Vec::new();
    let charts = {
        let mut guard = lock(&inner);
        if !guard.is_current(cycle, &token) {
            drop(guard);
            log_failure(Level::Debug, cycle, "cancelled", "stale result discarded");
            return CycleOutcome::Cancelled;
        }
        let inner = &mut *guard;
        let mut bound = 0;
        for (i, result) in rendered.into_iter().enumerate() {
            let committed = result.and_then(|(spec, frame)| {
                inner.charts.commit(&layout.surfaces[i], spec, frame)
            });
            match committed {
                Ok(handle) => {
                    inner.handles[i] = Some(handle);
                    bound += 1;
                }
                Err(err) => {
                    bind_failures.push(err.to_string());
                    inner.errors.push(err.into());
                }
            }
        }
        inner.state = if bound > 0 {
            ViewState::Bound
        } else {
            ViewState::Failed
        };
        bound
    };

    for failure in &bind_failures {
        log_failure(Level::Error, cycle, "bind_failed", failure);
    }
    if charts > 0 {
        log_cycle(cycle, ViewState::Bound.as_str(), &format!("{} charts bound", charts));
        CycleOutcome::Bound { charts }
    } else {
        log_cycle(cycle, ViewState::Failed.as_str(), "no surface accepted a chart");
        CycleOutcome::Failed
    }
}

/// One comparative spec per metric, each overlaying both sources.
fn build_specs(layout: &ViewLayout, datasets: &[RawDataset; 2]) -> [ChartSpec; 2] {
    [0, 1].map(|m| {
        let metric = &layout.metrics[m];
        let series = |s: usize| {
            let label = &layout.sources[s].label;
            let series =
                transform_with_interval(label, &datasets[s], &metric.field, layout.interval_ms);
            log_series(
                label,
                &metric.field,
                series.len(),
                count_defaulted(&datasets[s], &metric.field),
            );
            series
        };
        ChartSpec::compare(
            metric,
            [
                (&layout.sources[0], series(0)),
                (&layout.sources[1], series(1)),
            ],
            layout.interval_ms,
        )
    })
}
