//! Runtime metrics for the substitution service.
//!
//! Three series are kept per model label, matching what the monitoring
//! collector scrapes:
//!
//! - `pantry_llm_latency_seconds`: summary over whole generation calls,
//!   retries included (p50/p90/p99 over a sliding window, plus sum/count).
//! - `pantry_llm_last_latency_seconds`: gauge holding the duration of the
//!   last successful attempt.
//! - `pantry_llm_errors_total`: incremented once per request that exhausted
//!   its retries.
//!
//! Counters are lock-free `AtomicU64`s; the latency window sits behind a
//! `parking_lot::Mutex` and the per-model table is a `DashMap`.

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Observations kept for quantile estimation.
const WINDOW: usize = 512;

/// Quantiles exported for the latency summary.
pub const QUANTILES: [f64; 3] = [0.5, 0.9, 0.99];

// ---------------------------------------------------------------------------
// Per-model series
// ---------------------------------------------------------------------------

struct LatencyWindow {
    samples: Vec<f64>,
    write_idx: usize,
    count: u64,
    sum: f64,
}

impl LatencyWindow {
    fn new() -> Self {
        Self {
            samples: vec![0.0; WINDOW],
            write_idx: 0,
            count: 0,
            sum: 0.0,
        }
    }

    fn record(&mut self, secs: f64) {
        let idx = self.write_idx;
        self.samples[idx] = secs;
        self.write_idx = (idx + 1) % WINDOW;
        self.count += 1;
        self.sum += secs;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn summary(&self) -> LatencySummary {
        let n = usize::try_from(self.count).map_or(WINDOW, |c| c.min(WINDOW));
        let mut sorted = self.samples[..n].to_vec();
        sorted.sort_by(f64::total_cmp);

        let quantile = |q: f64| -> f64 {
            if n == 0 {
                return 0.0;
            }
            let idx = ((n as f64) * q) as usize;
            sorted[idx.min(n - 1)]
        };

        LatencySummary {
            count: self.count,
            sum_secs: self.sum,
            p50: quantile(QUANTILES[0]),
            p90: quantile(QUANTILES[1]),
            p99: quantile(QUANTILES[2]),
        }
    }
}

struct ModelSeries {
    latency: Mutex<LatencyWindow>,
    last_latency_bits: AtomicU64,
    has_last_latency: AtomicU64,
    errors: AtomicU64,
}

impl ModelSeries {
    fn new() -> Self {
        Self {
            latency: Mutex::new(LatencyWindow::new()),
            last_latency_bits: AtomicU64::new(0),
            has_last_latency: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    fn last_latency_secs(&self) -> Option<f64> {
        (self.has_last_latency.load(Ordering::Acquire) != 0)
            .then(|| f64::from_bits(self.last_latency_bits.load(Ordering::Relaxed)))
    }
}

/// Latency statistics for one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    /// Observations since startup.
    pub count: u64,
    /// Sum of all observations in seconds.
    pub sum_secs: f64,
    /// Median over the window, in seconds.
    pub p50: f64,
    /// 90th percentile over the window, in seconds.
    pub p90: f64,
    /// 99th percentile over the window, in seconds.
    pub p99: f64,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Metrics registry shared by every request.
#[derive(Default)]
pub struct SubstitutionMetrics {
    models: DashMap<String, Arc<ModelSeries>>,
    store_errors: AtomicU64,
}

impl std::fmt::Debug for SubstitutionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubstitutionMetrics")
            .field("models", &self.models.len())
            .field("store_errors", &self.store_errors())
            .finish()
    }
}

impl SubstitutionMetrics {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn series(&self, model: &str) -> Arc<ModelSeries> {
        if let Some(series) = self.models.get(model) {
            return Arc::clone(series.value());
        }
        Arc::clone(
            self.models
                .entry(model.to_string())
                .or_insert_with(|| Arc::new(ModelSeries::new()))
                .value(),
        )
    }

    /// Record the duration of a whole generation call.
    pub fn observe_latency(&self, model: &str, elapsed: Duration) {
        self.series(model).latency.lock().record(elapsed.as_secs_f64());
    }

    /// Set the last-successful-attempt gauge.
    pub fn set_last_latency(&self, model: &str, elapsed: Duration) {
        let series = self.series(model);
        series
            .last_latency_bits
            .store(elapsed.as_secs_f64().to_bits(), Ordering::Relaxed);
        series.has_last_latency.store(1, Ordering::Release);
    }

    /// Count a request that exhausted its retries.
    pub fn record_generation_error(&self, model: &str) {
        self.series(model).errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed catalog query.
    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Generation errors recorded for a model.
    #[must_use]
    pub fn generation_errors(&self, model: &str) -> u64 {
        self.models
            .get(model)
            .map_or(0, |s| s.errors.load(Ordering::Relaxed))
    }

    /// Failed catalog queries since startup.
    #[must_use]
    pub fn store_errors(&self) -> u64 {
        self.store_errors.load(Ordering::Relaxed)
    }

    /// Latency summary for a model, if it was ever observed.
    #[must_use]
    pub fn latency_summary(&self, model: &str) -> Option<LatencySummary> {
        let series = self.models.get(model)?;
        let summary = series.latency.lock().summary();
        (summary.count > 0).then_some(summary)
    }

    /// Last successful attempt duration for a model, in seconds.
    #[must_use]
    pub fn last_latency_secs(&self, model: &str) -> Option<f64> {
        self.models.get(model)?.last_latency_secs()
    }

    /// Render all series as Prometheus text exposition.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let mut rows: Vec<(String, Arc<ModelSeries>)> = self
            .models
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = String::new();
        out.push_str("# HELP pantry_llm_latency_seconds Substitute generation latency including retries\n");
        out.push_str("# TYPE pantry_llm_latency_seconds summary\n");
        for (model, series) in &rows {
            let s = series.latency.lock().summary();
            let label = escape_label(model);
            for (q, v) in QUANTILES.iter().zip([s.p50, s.p90, s.p99]) {
                let _ = writeln!(out, "pantry_llm_latency_seconds{{model=\"{label}\",quantile=\"{q}\"}} {v}");
            }
            let _ = writeln!(out, "pantry_llm_latency_seconds_sum{{model=\"{label}\"}} {}", s.sum_secs);
            let _ = writeln!(out, "pantry_llm_latency_seconds_count{{model=\"{label}\"}} {}", s.count);
        }

        out.push_str("# HELP pantry_llm_last_latency_seconds Duration of the last successful attempt\n");
        out.push_str("# TYPE pantry_llm_last_latency_seconds gauge\n");
        for (model, series) in &rows {
            if let Some(v) = series.last_latency_secs() {
                let _ = writeln!(out, "pantry_llm_last_latency_seconds{{model=\"{}\"}} {v}", escape_label(model));
            }
        }

        out.push_str("# HELP pantry_llm_errors_total Generation requests that exhausted retries\n");
        out.push_str("# TYPE pantry_llm_errors_total counter\n");
        for (model, series) in &rows {
            let _ = writeln!(
                out,
                "pantry_llm_errors_total{{model=\"{}\"}} {}",
                escape_label(model),
                series.errors.load(Ordering::Relaxed)
            );
        }

        out.push_str("# HELP pantry_store_errors_total Failed catalog queries\n");
        out.push_str("# TYPE pantry_store_errors_total counter\n");
        let _ = writeln!(out, "pantry_store_errors_total {}", self.store_errors());
        out
    }
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
