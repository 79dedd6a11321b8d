//! Raw trace samples and the sample-to-series transformation.
//!
//! Trace files carry no timestamps: row `i` was collected at `i * interval`.
//! Values are coerced leniently so a partially corrupt file still yields one
//! point per row, which keeps both metrics of a dataset index-aligned.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Sampling interval of the recorded traces, in milliseconds.
pub const SAMPLE_INTERVAL_MS: u64 = 200;

/// One recorded row. Non-object rows carry no fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub struct RawSample {
    fields: Map<String, Value>,
}

impl From<Value> for RawSample {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }
}

impl RawSample {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Numeric reading of `name`, or `None` when absent or not coercible.
    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(coerce_number)
    }
}

/// Rows of one trace file in collection order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawDataset {
    samples: Vec<RawSample>,
}

impl RawDataset {
    pub fn new(samples: Vec<RawSample>) -> Self {
        Self { samples }
    }

    /// Decode a JSON array of rows.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }
}

impl FromIterator<RawSample> for RawDataset {
    fn from_iter<I: IntoIterator<Item = RawSample>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    time: u64,
    value: f64,
}

impl SeriesPoint {
    /// Non-finite values become 0 and `-0.0` becomes `0.0`.
    pub fn new(time: u64, value: f64) -> Self {
        let value = if value.is_finite() && value != 0.0 { value } else { 0.0 };
        Self { time, value }
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn as_pair(&self) -> (u64, f64) {
        (self.time, self.value)
    }
}

/// One metric of one source over time.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    metric: String,
    source: String,
    points: Vec<SeriesPoint>,
}

impl Series {
    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn pairs(&self) -> Vec<(u64, f64)> {
        self.points.iter().map(SeriesPoint::as_pair).collect()
    }

    pub fn last_time(&self) -> Option<u64> {
        self.points.last().map(SeriesPoint::time)
    }

    /// (min, max) over all values, `None` when empty.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |acc, p| {
            let v = p.value();
            Some(match acc {
                None => (v, v),
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
            })
        })
    }

    /// Point whose time is closest to `time_ms`; ties go to the earlier sample.
    pub fn nearest(&self, time_ms: f64) -> Option<SeriesPoint> {
        if self.points.is_empty() || time_ms.is_nan() {
            return None;
        }
        let idx = self.points.partition_point(|p| (p.time as f64) < time_ms);
        let after = self.points.get(idx);
        let before = idx.checked_sub(1).and_then(|i| self.points.get(i));
        match (before, after) {
            (Some(b), Some(a)) => {
                if time_ms - b.time as f64 <= a.time as f64 - time_ms {
                    Some(*b)
                } else {
                    Some(*a)
                }
            }
            (Some(b), None) => Some(*b),
            (None, a) => a.copied(),
        }
    }
}

/// Build the series for `metric` at the default 200 ms interval.
pub fn transform(source: &str, rows: &RawDataset, metric: &str) -> Series {
    transform_with_interval(source, rows, metric, SAMPLE_INTERVAL_MS)
}

pub fn transform_with_interval(
    source: &str,
    rows: &RawDataset,
    metric: &str,
    interval_ms: u64,
) -> Series {
    let points = rows
        .samples()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let time = (i as u64).saturating_mul(interval_ms);
            SeriesPoint::new(time, row.numeric(metric).unwrap_or(0.0))
        })
        .collect();
    Series {
        metric: metric.to_string(),
        source: source.to_string(),
        points,
    }
}

/// Number of rows whose `metric` reading fell back to zero.
pub fn count_defaulted(rows: &RawDataset, metric: &str) -> usize {
    rows.samples()
        .iter()
        .filter(|row| row.numeric(metric).is_none())
        .count()
}

fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric_str(s),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Array(items) => coerce_array(items),
        Value::Null | Value::Object(_) => None,
    }?;
    n.is_finite().then_some(n)
}

/// Arrays read as their joined text: `[]` and `[null]` are 0, `[5]` and
/// `["5"]` are 5, a lone bool or object is not a number and neither is
/// anything longer.
fn coerce_array(items: &[Value]) -> Option<f64> {
    match items {
        [] | [Value::Null] => Some(0.0),
        [Value::Bool(_)] | [Value::Object(_)] => None,
        [only] => coerce_number(only),
        _ => None,
    }
}

fn parse_numeric_str(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return Some(0.0);
    }
    let radix = match s.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &s[2..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return None;
        }
        return Some(match u128::from_str_radix(digits, radix) {
            Ok(v) => v as f64,
            Err(_) => digits
                .chars()
                .filter_map(|c| c.to_digit(radix))
                .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d)),
        });
    }
    // Rust accepts "inf"/"nan" spellings; only plain decimal forms count here.
    if !s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return None;
    }
    s.parse::<f64>().ok()
}
