//! Periodic usage polling
//!
//! One cycle walks every registered component, reads its usage metrics,
//! feeds the positive values into the [`CounterRegistry`], resets the
//! component's set, and publishes the registry snapshot if anything changed.
//!
//! A cycle never fails. Problems with a single metric degrade that metric,
//! problems with a component skip that component, and a failed publish is
//! logged; the next cycle starts from scratch.
//!
//! Reads and resets are not atomic: an increment landing between the read and
//! the reset of a component is lost, and a source that never resets its
//! values is counted again every cycle.

use crate::counters::CounterRegistry;
use crate::metrics::{ComponentFailure, Metrics, PublishOutcome, SourceOperation, TaskFailure};
use crate::reporter::Publisher;
use crate::source::{ComponentDirectory, ComponentId};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;
use uuid::Uuid;

/// Shortest period accepted by [`Poller::spawn`]
pub const MIN_POLL_PERIOD: Duration = Duration::from_millis(1);

/// Outcome of one polling cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    /// Components listed by the directory
    pub components_seen: usize,
    /// Components whose metrics added a positive value
    pub components_contributing: usize,
    /// Components skipped because of a failure
    pub components_failed: usize,
    /// Sum of every positive value aggregated this cycle
    pub total: u64,
    pub publish: PublishOutcome,
}

impl CycleReport {
    fn new(cycle_id: Uuid) -> Self {
        Self {
            cycle_id,
            components_seen: 0,
            components_contributing: 0,
            components_failed: 0,
            total: 0,
            publish: PublishOutcome::Skipped,
        }
    }
}

/// Usage polling task
///
/// Holds no state between cycles; everything that persists lives in the
/// counter registry. Cycles are serialized, so a manually triggered cycle
/// waits for a scheduled one (and vice versa).
pub struct Poller {
    directory: Arc<dyn ComponentDirectory>,
    counters: Arc<CounterRegistry>,
    publisher: Arc<dyn Publisher>,
    metrics: Metrics,
    component_timeout: Option<Duration>,
    cycle_lock: Mutex<()>,
}

impl Poller {
    pub fn new(
        directory: Arc<dyn ComponentDirectory>,
        counters: Arc<CounterRegistry>,
        publisher: Arc<dyn Publisher>,
        metrics: Metrics,
    ) -> Self {
        Self {
            directory,
            counters,
            publisher,
            metrics,
            component_timeout: None,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Abandon a component that takes longer than `timeout` within a cycle
    pub fn with_component_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.component_timeout = timeout;
        self
    }

    pub fn counters(&self) -> &Arc<CounterRegistry> {
        &self.counters
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Run one full polling cycle
    pub async fn run_cycle(&self) -> CycleReport {
        let _serialized = self.cycle_lock.lock().await;

        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("poll_cycle", %cycle_id);
        self.cycle(cycle_id).instrument(span).await
    }

    async fn cycle(&self, cycle_id: Uuid) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::new(cycle_id);

        let components = self.directory.list_components().await;
        report.components_seen = components.len();

        for id in &components {
            tracing::debug!(component = %id, "Polling component");

            match self.poll_isolated(id).await {
                Ok(0) => {}
                Ok(count) => {
                    report.components_contributing += 1;
                    report.total = report.total.saturating_add(count);
                    tracing::debug!(component = %id, update_count = count, "Component aggregated");
                }
                Err(reason) => {
                    report.components_failed += 1;
                    self.metrics.component_failure(reason);
                }
            }
        }

        report.publish = if report.total > 0 {
            self.publish().await
        } else {
            PublishOutcome::Skipped
        };
        self.metrics.record_publish(report.publish);

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_cycle(elapsed_ms);

        if report.total > 0 {
            tracing::info!(
                components = report.components_seen,
                contributing = report.components_contributing,
                failed = report.components_failed,
                total_update_count = report.total,
                publish = report.publish.as_str(),
                elapsed_ms,
                "Polling cycle finished"
            );
        } else {
            tracing::debug!(
                components = report.components_seen,
                failed = report.components_failed,
                elapsed_ms,
                "Polling cycle finished with no updates"
            );
        }

        report
    }

    /// Poll one component, containing panics and the optional time limit
    async fn poll_isolated(&self, id: &ComponentId) -> Result<u64, ComponentFailure> {
        let work = AssertUnwindSafe(self.poll_component(id)).catch_unwind();

        let outcome = match self.component_timeout {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(
                        component = %id,
                        timeout_ms = limit.as_millis() as u64,
                        "Component polling timed out, skipping for this cycle"
                    );
                    return Err(ComponentFailure::Timeout);
                }
            },
            None => work.await,
        };

        outcome.unwrap_or_else(|panic| {
            tracing::warn!(
                component = %id,
                panic = %panic_message(panic.as_ref()),
                "Component metric source panicked, skipping for this cycle"
            );
            Err(ComponentFailure::Panic)
        })
    }

    /// Aggregate one component's usage set; returns the sum aggregated
    async fn poll_component(&self, id: &ComponentId) -> Result<u64, ComponentFailure> {
        let source = match self.directory.lookup(id).await {
            Ok(Some(source)) => source,
            Ok(None) => {
                tracing::debug!(component = %id, "Component has no usage metrics");
                return Ok(0);
            }
            Err(e) => {
                tracing::warn!(
                    component = %id,
                    error = %e,
                    "Metric source lookup failed, skipping component for this cycle"
                );
                return Err(ComponentFailure::Lookup);
            }
        };

        let names = source.list_names().await.unwrap_or_else(|e| {
            tracing::warn!(component = %id, error = %e, "Can't get usage parameter names");
            self.metrics.source_failure(SourceOperation::ListNames);
            Vec::new()
        });

        let mut total = 0u64;
        for name in &names {
            let value = match source.read_value(name).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(
                        component = %id,
                        metric = %name,
                        error = %e,
                        "Can't get usage parameter value"
                    );
                    self.metrics.source_failure(SourceOperation::ReadValue);
                    continue;
                }
            };

            if value == 0 {
                continue;
            }

            tracing::debug!(component = %id, metric = %name, value, "Usage parameter read");
            self.counters.update(name, value);
            self.metrics.record_aggregated(value);
            total = total.saturating_add(value);
        }

        if total > 0 {
            // Already aggregated values stay in the registry even if this fails
            match source.reset().await {
                Ok(()) => tracing::debug!(component = %id, "Usage parameters reset"),
                Err(e) => {
                    tracing::warn!(component = %id, error = %e, "Reset of usage parameters failed");
                    self.metrics.source_failure(SourceOperation::Reset);
                }
            }
        }

        Ok(total)
    }

    async fn publish(&self) -> PublishOutcome {
        let snapshot = self.counters.snapshot();
        let result = AssertUnwindSafe(self.publisher.publish(&snapshot))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(())) => PublishOutcome::Success,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Publishing statistics snapshot failed");
                PublishOutcome::Failure
            }
            Err(panic) => {
                tracing::warn!(
                    panic = %panic_message(panic.as_ref()),
                    "Statistics publisher panicked"
                );
                PublishOutcome::Failure
            }
        }
    }

    /// Start polling every `period`, with the first cycle right away
    ///
    /// Ticks that fall due while a cycle is still running are skipped, never
    /// queued. A monitor task records an unexpected end of the loop in the
    /// self-metrics so `/health` can report it.
    ///
    /// A `period` below [`MIN_POLL_PERIOD`] (including zero) is raised to it.
    pub fn spawn(self: Arc<Self>, period: Duration) -> PollerHandle {
        if period < MIN_POLL_PERIOD {
            tracing::warn!(
                requested_ms = period.as_millis() as u64,
                min_ms = MIN_POLL_PERIOD.as_millis() as u64,
                "Polling period too short, using minimum"
            );
        }
        let period = period.max(MIN_POLL_PERIOD);

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let stopping = Arc::new(AtomicBool::new(false));
        let metrics = self.metrics.clone();

        let poll_loop = tokio::spawn(async move {
            tracing::info!(interval_ms = period.as_millis() as u64, "Starting usage polling");

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                self.run_cycle().await;
            }

            tracing::info!("Usage polling stopped");
        });

        let stopping_flag = stopping.clone();
        let monitor = tokio::spawn(async move {
            match poll_loop.await {
                Ok(()) if stopping_flag.load(Ordering::Acquire) => {}
                Ok(()) => {
                    tracing::error!(
                        "Background polling task terminated unexpectedly. \
                        Usage is no longer collected until restart."
                    );
                    metrics.background_task_failure(TaskFailure::UnexpectedTermination);
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        "Background polling task panicked. \
                        Usage is no longer collected until restart."
                    );
                    metrics.background_task_failure(TaskFailure::Panic);
                }
            }
        });

        PollerHandle {
            shutdown: shutdown_tx,
            stopping,
            monitor,
        }
    }
}

/// Handle to a running polling loop
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    stopping: Arc<AtomicBool>,
    monitor: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop the timer and wait for an in-flight cycle to finish
    pub async fn shutdown(self) {
        self.stopping.store(true, Ordering::Release);
        // Err only if the loop already ended, which the monitor reports
        let _ = self.shutdown.send(true);

        if let Err(e) = self.monitor.await {
            tracing::error!(error = %e, "Polling monitor task failed");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
