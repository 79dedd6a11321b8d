//! Structured logging for the trace comparison pipeline.
//!
//! Every record is one JSON line on stderr. When `LOG_DIR` is set the same
//! lines are appended under `<LOG_DIR>/<run_id>/`:
//! 1. `events.jsonl` for info and above
//! 2. `trace.jsonl` for trace/debug

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains (categories for filtering)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Source,    // Fetching and decoding trace files
    Transform, // Sample to series conversion
    Chart,     // Surface binding and rendering
    View,      // Activation cycles
    System,    // Startup, shutdown, config
    Profile,   // Timing scopes
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Source => "source",
            Domain::Transform => "transform",
            Domain::Chart => "chart",
            Domain::View => "view",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static PROFILE_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    files: Option<RunFiles>,
}

#[derive(Debug)]
struct RunFiles {
    events: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let files = std::env::var("LOG_DIR")
            .ok()
            .and_then(|base| open_run_files(PathBuf::from(base).join(&run_id)));
        RunContext { run_id, files }
    })
}

fn open_run_files(run_dir: PathBuf) -> Option<RunFiles> {
    if let Err(err) = create_dir_all(&run_dir) {
        eprintln!("[log] failed to create run dir {}: {}", run_dir.display(), err);
        return None;
    }
    let open = |name: &str| match File::create(run_dir.join(name)) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", name, err);
            None
        }
    };
    Some(RunFiles {
        events: open("events.jsonl")?,
        trace: open("trace.jsonl")?,
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["cycle", "surface", "source", "metric", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }

    emit_record(level, domain.as_str(), event, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    if let Some(files) = &ctx.files {
        match level {
            Level::Trace | Level::Debug => write_line(&files.trace, &line),
            _ => write_line(&files.events, &line),
        }
    }
    eprintln!("{}", line);
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_dataset_loaded(location: &str, bytes: usize, rows: usize, sha256: &str) {
    log(
        Level::Info,
        Domain::Source,
        "dataset_loaded",
        obj(&[
            ("source", v_str(location)),
            ("bytes", json!(bytes)),
            ("rows", json!(rows)),
            ("sha256", v_str(sha256)),
        ]),
    );
}

pub fn log_series(source: &str, metric: &str, points: usize, zeroed: usize) {
    log(
        Level::Debug,
        Domain::Transform,
        "series_built",
        obj(&[
            ("source", v_str(source)),
            ("metric", v_str(metric)),
            ("points", json!(points)),
            ("zeroed", json!(zeroed)),
        ]),
    );
}

pub fn log_bind(surface: &str, generation: u64, title: &str, description: &str) {
    log(
        Level::Info,
        Domain::Chart,
        "bind",
        obj(&[
            ("surface", v_str(surface)),
            ("generation", json!(generation)),
            ("title", v_str(title)),
            ("description", v_str(description)),
        ]),
    );
}

pub fn log_unbind(surface: &str, generation: u64) {
    log(
        Level::Debug,
        Domain::Chart,
        "unbind",
        obj(&[("surface", v_str(surface)), ("generation", json!(generation))]),
    );
}

pub fn log_cycle(cycle: u64, state: &str, reason: &str) {
    log(
        Level::Info,
        Domain::View,
        "cycle",
        obj(&[
            ("cycle", json!(cycle)),
            ("state", v_str(state)),
            ("msg", v_str(reason)),
        ]),
    );
}

pub fn log_failure(level: Level, cycle: u64, kind: &str, error: &str) {
    log(
        level,
        Domain::View,
        "failure",
        obj(&[
            ("cycle", json!(cycle)),
            ("kind", v_str(kind)),
            ("msg", v_str(error)),
        ]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Profiling scope that emits structured timing on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Option<Map<String, Value>>,
    started: Instant,
    enabled: bool,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self::with_context(label, &[])
    }

    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        let enabled = Self::should_sample();
        Self {
            label,
            context: if enabled { Some(obj(fields)) } else { None },
            started: Instant::now(),
            enabled,
        }
    }

    fn should_sample() -> bool {
        std::env::var("PROFILE_SAMPLE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .map(|p| {
                if p >= 1.0 {
                    true
                } else if p <= 0.0 {
                    false
                } else {
                    let seq = PROFILE_SEQ.fetch_add(1, Ordering::SeqCst);
                    let bucket = (seq % 10_000) as f64 / 10_000.0;
                    bucket < p
                }
            })
            .unwrap_or(true)
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = self.context.take().unwrap_or_default();
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}
