/*!
Observability infrastructure for SpaceVault.

- Structured logging and tracing setup
- Prometheus metrics for backup runs (feature `metrics`)
*/

#[cfg(feature = "metrics")]
use prometheus::{
    Counter, CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;
#[cfg(feature = "metrics")]
use std::time::Instant;
use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::{BackupError, Result};

/// Filter directive applied when `RUST_LOG` is not set
pub const DEFAULT_LOG_DIRECTIVE: &str = "spacevault=info";

/// Global metrics instance
#[cfg(feature = "metrics")]
static METRICS: OnceLock<BackupMetrics> = OnceLock::new();

/// Metrics collection for backup runs
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct BackupMetrics {
    pub runs_total: Counter,
    /// Failed runs, labelled by the step that failed
    pub failures_total: CounterVec,
    pub archive_size_bytes: Histogram,
    /// Step durations, labelled by step
    pub step_latency_seconds: HistogramVec,

    // Prometheus registry for scraping
    registry: Registry,
}

#[cfg(feature = "metrics")]
impl BackupMetrics {
    /// Initialize new metrics instance
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let runs_total = Counter::new("spacevault_runs_total", "Total backup runs started")
            .map_err(|e| metric_error("runs_total", e))?;

        let failures_total = CounterVec::new(
            Opts::new("spacevault_failures_total", "Failed backup runs by step"),
            &["step"],
        )
        .map_err(|e| metric_error("failures_total", e))?;

        // 1 KiB up to 4 GiB
        let size_buckets = prometheus::exponential_buckets(1024.0, 4.0, 12)
            .map_err(|e| metric_error("archive_size_bytes", e))?;
        let archive_size_bytes = Histogram::with_opts(
            HistogramOpts::new(
                "spacevault_archive_size_bytes",
                "Size of uploaded archives in bytes",
            )
            .buckets(size_buckets),
        )
        .map_err(|e| metric_error("archive_size_bytes", e))?;

        let step_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "spacevault_step_latency_seconds",
                "Duration of backup steps in seconds",
            ),
            &["step"],
        )
        .map_err(|e| metric_error("step_latency_seconds", e))?;

        registry
            .register(Box::new(runs_total.clone()))
            .map_err(|e| metric_error("runs_total", e))?;
        registry
            .register(Box::new(failures_total.clone()))
            .map_err(|e| metric_error("failures_total", e))?;
        registry
            .register(Box::new(archive_size_bytes.clone()))
            .map_err(|e| metric_error("archive_size_bytes", e))?;
        registry
            .register(Box::new(step_latency_seconds.clone()))
            .map_err(|e| metric_error("step_latency_seconds", e))?;

        Ok(Self {
            runs_total,
            failures_total,
            archive_size_bytes,
            step_latency_seconds,
            registry,
        })
    }

    /// Get or initialize global metrics instance
    pub fn global() -> &'static BackupMetrics {
        METRICS.get_or_init(|| Self::new().expect("Failed to initialize SpaceVault metrics"))
    }

    pub fn record_run(&self) {
        self.runs_total.inc();
    }

    pub fn record_failure(&self, step: &str) {
        self.failures_total.with_label_values(&[step]).inc();
    }

    pub fn record_archive_size(&self, size_bytes: usize) {
        self.archive_size_bytes.observe(size_bytes as f64);
    }

    pub fn record_step_latency(&self, step: &str, duration: std::time::Duration) {
        self.step_latency_seconds
            .with_label_values(&[step])
            .observe(duration.as_secs_f64());
    }

    /// Gather metrics in Prometheus text format
    pub fn gather_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| BackupError::config(format!("Failed to encode metrics: {e}")))?;

        String::from_utf8(buffer)
            .map_err(|e| BackupError::config(format!("Failed to convert metrics to string: {e}")))
    }
}

#[cfg(feature = "metrics")]
fn metric_error(name: &str, e: prometheus::Error) -> BackupError {
    BackupError::config(format!("Failed to set up metric {name}: {e}"))
}

/// Times one backup step
#[cfg(feature = "metrics")]
pub struct MetricsTimer {
    start: Instant,
    step: &'static str,
}

#[cfg(feature = "metrics")]
impl MetricsTimer {
    pub fn start(step: &'static str) -> Self {
        Self {
            start: Instant::now(),
            step,
        }
    }

    /// Record the elapsed time for the step
    pub fn finish(self) {
        BackupMetrics::global().record_step_latency(self.step, self.start.elapsed());
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Compact,
    /// One JSON object per event, for log aggregation
    Json,
}

/// Build the filter from `RUST_LOG`, falling back to `default_directive`
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Initialize the global observability system
///
/// Installs a tracing subscriber with an env filter and either compact or
/// JSON formatting, and registers the metrics when the `metrics` feature is
/// enabled.
pub fn init_observability(format: LogFormat, default_directive: &str) -> Result<()> {
    #[cfg(feature = "metrics")]
    BackupMetrics::global();

    let filter = env_filter(default_directive);

    let result = match format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(false)
                .with_current_span(true);
            set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
        }
        LogFormat::Compact => {
            let fmt_layer = tracing_subscriber::fmt::layer().compact().with_target(false);
            set_global_default(TracingRegistry::default().with(filter).with(fmt_layer))
        }
    };

    result.map_err(|e| {
        BackupError::config(format!("Failed to set global tracing subscriber: {e}"))
    })?;

    tracing::debug!(?format, "SpaceVault observability initialized");
    Ok(())
}

/// Initialize observability with default settings
pub fn init_default_observability() -> Result<()> {
    init_observability(LogFormat::Compact, DEFAULT_LOG_DIRECTIVE)
}
