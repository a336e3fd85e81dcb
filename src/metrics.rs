//! Prometheus self-metrics for usagestat
//!
//! Tracks how the polling loop itself behaves:
//! - Cycles run and their duration
//! - Component and source operation failures
//! - Values aggregated and publish outcomes
//! - Failures of the background polling task
//!
//! Metrics are exposed via the admin `/metrics` endpoint in Prometheus text
//! format. They describe the service, not the aggregated usage counters,
//! which live in [`CounterRegistry`](crate::counters::CounterRegistry).

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use serde::Serialize;
use std::sync::Arc;

/// Why a component was skipped for a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentFailure {
    /// Resolving the component's metric source failed
    Lookup,
    /// The component's source panicked
    Panic,
    /// The component exceeded the per-component timeout
    Timeout,
}

impl ComponentFailure {
    pub const ALL: [ComponentFailure; 3] = [Self::Lookup, Self::Panic, Self::Timeout];

    /// Convert to Prometheus label string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::Panic => "panic",
            Self::Timeout => "timeout",
        }
    }
}

/// Metric source operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOperation {
    ListNames,
    ReadValue,
    Reset,
}

impl SourceOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListNames => "list_names",
            Self::ReadValue => "read_value",
            Self::Reset => "reset",
        }
    }
}

/// What happened to the publish step of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishOutcome {
    Success,
    Failure,
    /// Nothing changed during the cycle
    Skipped,
}

impl PublishOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
        }
    }
}

/// How the background polling task stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFailure {
    Panic,
    UnexpectedTermination,
}

impl TaskFailure {
    pub const ALL: [TaskFailure; 2] = [Self::Panic, Self::UnexpectedTermination];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Panic => "panic",
            Self::UnexpectedTermination => "unexpected_termination",
        }
    }
}

/// Metrics collector for usagestat
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    cycles_total: IntCounter,
    cycle_duration: Histogram,
    component_failures: IntCounterVec,
    source_failures: IntCounterVec,
    aggregated_total: IntCounter,
    publishes: IntCounterVec,
    background_task_failures: IntCounterVec,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// Registers all metrics with a new Prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cycles_total = IntCounter::with_opts(Opts::new(
            "usagestat_cycles_total",
            "Total number of completed polling cycles",
        ))?;

        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "usagestat_cycle_duration_ms",
                "Polling cycle duration in milliseconds, publish included",
            )
            .buckets(vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 30000.0]),
        )?;

        // Cardinality: 3 reasons
        let component_failures = IntCounterVec::new(
            Opts::new(
                "usagestat_component_failures_total",
                "Components skipped for a cycle, by reason",
            ),
            &["reason"],
        )?;

        // Cardinality: 3 operations
        let source_failures = IntCounterVec::new(
            Opts::new(
                "usagestat_source_operation_failures_total",
                "Failed metric source operations (degraded data, cycle continued), by operation",
            ),
            &["operation"],
        )?;

        let aggregated_total = IntCounter::with_opts(Opts::new(
            "usagestat_aggregated_total",
            "Sum of all positive metric values fed into the counter registry",
        ))?;

        let publishes = IntCounterVec::new(
            Opts::new(
                "usagestat_publishes_total",
                "Snapshot publish attempts by outcome (skipped when nothing changed)",
            ),
            &["outcome"],
        )?;

        // Alert on ANY increment: the polling loop is gone until restart
        let background_task_failures = IntCounterVec::new(
            Opts::new(
                "usagestat_background_task_failures_total",
                "CRITICAL: Background polling task stopped. Usage is no longer collected.",
            ),
            &["failure_type"],
        )?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;
        registry.register(Box::new(component_failures.clone()))?;
        registry.register(Box::new(source_failures.clone()))?;
        registry.register(Box::new(aggregated_total.clone()))?;
        registry.register(Box::new(publishes.clone()))?;
        registry.register(Box::new(background_task_failures.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            cycles_total,
            cycle_duration,
            component_failures,
            source_failures,
            aggregated_total,
            publishes,
            background_task_failures,
        })
    }

    /// Record a completed cycle and its duration
    pub fn record_cycle(&self, duration_ms: f64) {
        self.cycles_total.inc();
        self.cycle_duration.observe(duration_ms);
    }

    pub fn cycles_count(&self) -> u64 {
        self.cycles_total.get()
    }

    pub fn component_failure(&self, reason: ComponentFailure) {
        self.component_failures
            .with_label_values(&[reason.as_str()])
            .inc();
    }

    /// Component failures across all reasons
    pub fn component_failures_count(&self) -> u64 {
        ComponentFailure::ALL
            .iter()
            .map(|reason| {
                self.component_failures
                    .with_label_values(&[reason.as_str()])
                    .get()
            })
            .sum()
    }

    pub fn source_failure(&self, operation: SourceOperation) {
        self.source_failures
            .with_label_values(&[operation.as_str()])
            .inc();
    }

    pub fn source_failures_count(&self, operation: SourceOperation) -> u64 {
        self.source_failures
            .with_label_values(&[operation.as_str()])
            .get()
    }

    pub fn record_aggregated(&self, value: u64) {
        self.aggregated_total.inc_by(value);
    }

    pub fn aggregated_count(&self) -> u64 {
        self.aggregated_total.get()
    }

    pub fn record_publish(&self, outcome: PublishOutcome) {
        self.publishes.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn publishes_count(&self, outcome: PublishOutcome) -> u64 {
        self.publishes.with_label_values(&[outcome.as_str()]).get()
    }

    /// Record that the background polling task stopped
    ///
    /// Operators should alert on ANY increment of this metric.
    pub fn background_task_failure(&self, failure: TaskFailure) {
        self.background_task_failures
            .with_label_values(&[failure.as_str()])
            .inc();
    }

    /// Background task failures across all failure types
    ///
    /// Used by the /health endpoint to report polling status.
    pub fn background_task_failures_count(&self) -> u64 {
        TaskFailure::ALL
            .iter()
            .map(|failure| {
                self.background_task_failures
                    .with_label_values(&[failure.as_str()])
                    .get()
            })
            .sum()
    }

    /// Gather all metrics and encode them in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if metric encoding fails.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();

        tracing::debug!(
            metric_family_count = metric_families.len(),
            "Encoding metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| {
            tracing::error!(
                invalid_byte_index = e.utf8_error().valid_up_to(),
                "Prometheus encoder produced invalid UTF-8"
            );
            prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
        })
    }
}
