//! Scripted components and publishers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use usagestat::counters::Snapshot;
use usagestat::error::{AppError, AppResult, SourceError};
use usagestat::source::{ComponentDirectory, ComponentId, MetricSource};

/// Metric source whose behaviour is fixed up front
#[derive(Default)]
pub struct ScriptedSource {
    values: Mutex<BTreeMap<String, Option<u64>>>,
    fail_list: bool,
    fail_reset: bool,
    panic_on_list: bool,
    delay: Option<Duration>,
    resets: AtomicUsize,
}

impl ScriptedSource {
    /// `(name, Some(value))` reads succeed, `(name, None)` reads fail
    pub fn new(values: &[(&str, Option<u64>)]) -> Self {
        Self {
            values: Mutex::new(
                values
                    .iter()
                    .map(|(name, value)| (name.to_string(), *value))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_reset(mut self) -> Self {
        self.fail_reset = true;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_list = true;
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set(&self, name: &str, value: u64) {
        self.values
            .lock()
            .unwrap()
            .insert(name.to_string(), Some(value));
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    async fn list_names(&self) -> Result<Vec<String>, SourceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_on_list {
            panic!("scripted source exploded");
        }
        if self.fail_list {
            return Err(SourceError::Unavailable("scripted list failure".to_string()));
        }
        Ok(self.values.lock().unwrap().keys().cloned().collect())
    }

    async fn read_value(&self, name: &str) -> Result<u64, SourceError> {
        match self.values.lock().unwrap().get(name) {
            Some(Some(value)) => Ok(*value),
            Some(None) => Err(SourceError::Unavailable(format!("scripted read failure for {}", name))),
            None => Err(SourceError::UnknownMetric(name.to_string())),
        }
    }

    async fn reset(&self) -> Result<(), SourceError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reset {
            return Err(SourceError::Unavailable("scripted reset failure".to_string()));
        }
        for value in self.values.lock().unwrap().values_mut() {
            if let Some(v) = value {
                *v = 0;
            }
        }
        Ok(())
    }
}

/// How a scripted component resolves
pub enum Entry {
    Source(Arc<ScriptedSource>),
    NoMetrics,
    LookupFails,
}

/// Directory with a fixed list of components
#[derive(Default)]
pub struct ScriptedDirectory {
    entries: Vec<(ComponentId, Entry)>,
}

impl ScriptedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, entry: Entry) -> Self {
        self.entries.push((ComponentId::from(id), entry));
        self
    }
}

#[async_trait]
impl ComponentDirectory for ScriptedDirectory {
    async fn list_components(&self) -> Vec<ComponentId> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    async fn lookup(
        &self,
        id: &ComponentId,
    ) -> Result<Option<Arc<dyn MetricSource>>, SourceError> {
        match self.entries.iter().find(|(entry_id, _)| entry_id == id) {
            Some((_, Entry::Source(source))) => Ok(Some(source.clone())),
            Some((_, Entry::NoMetrics)) | None => Ok(None),
            Some((_, Entry::LookupFails)) => {
                Err(SourceError::Unavailable(format!("lookup failed for {}", id)))
            }
        }
    }
}

/// Publisher that records every snapshot it receives
#[derive(Default)]
pub struct RecordingPublisher {
    snapshots: Mutex<Vec<Snapshot>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Snapshot> {
        self.snapshots.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl usagestat::reporter::Publisher for RecordingPublisher {
    async fn publish(&self, snapshot: &Snapshot) -> AppResult<()> {
        self.snapshots.lock().unwrap().push(snapshot.clone());
        if self.fail {
            return Err(AppError::PublishFailed {
                server: "scripted".to_string(),
                reason: "scripted publish failure".to_string(),
            });
        }
        Ok(())
    }
}
