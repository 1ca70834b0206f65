//! Test doubles shared by the executor and queue tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tether_core::{ActionId, QueueStatus, SyncResult};
use tokio::sync::Notify;

use crate::error::{QueueResult, SyncError};
use crate::notifier::{QueueEvent, QueueEventListener};
use crate::transport::{ActionRequest, Transport};

type FailureFn = Arc<dyn Fn() -> SyncError + Send + Sync>;

#[derive(Default)]
struct Script {
    failures: HashMap<ActionId, FailureFn>,
    gates: HashMap<ActionId, Arc<Notify>>,
    calls: Vec<ActionRequest>,
}

/// Transport that succeeds unless told otherwise for a given id.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    in_flight: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call for `id` fails with `make()`.
    pub fn fail_always(&self, id: &ActionId, make: impl Fn() -> SyncError + Send + Sync + 'static) {
        self.script
            .lock()
            .unwrap()
            .failures
            .insert(id.clone(), Arc::new(make));
    }

    /// Later calls for `id` succeed again.
    pub fn succeed(&self, id: &ActionId) {
        self.script.lock().unwrap().failures.remove(id);
    }

    /// Next call for `id` blocks until the returned gate is notified.
    pub fn hold(&self, id: &ActionId) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.script
            .lock()
            .unwrap()
            .gates
            .insert(id.clone(), gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<ActionRequest> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn called_ids(&self) -> Vec<ActionId> {
        self.calls().into_iter().map(|call| call.id).collect()
    }

    pub fn calls_for(&self, id: &ActionId) -> usize {
        self.calls().iter().filter(|call| &call.id == id).count()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Yields until at least `n` calls have started.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls().len() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

impl Transport for ScriptedTransport {
    async fn execute(&self, request: &ActionRequest) -> QueueResult<()> {
        let (gate, failure) = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(request.clone());
            (
                script.gates.remove(&request.id),
                script.failures.get(&request.id).cloned(),
            )
        };

        if let Some(gate) = gate {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        match failure {
            Some(make) => Err(make()),
            None => Ok(()),
        }
    }
}

/// Listener that keeps every event it sees.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<QueueEvent>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<QueueEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<QueueStatus> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                QueueEvent::QueueUpdated(status) => Some(status),
                QueueEvent::SyncCompleted(_) => None,
            })
            .collect()
    }

    pub fn sync_results(&self) -> Vec<SyncResult> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                QueueEvent::SyncCompleted(result) => Some(result),
                QueueEvent::QueueUpdated(_) => None,
            })
            .collect()
    }
}

impl QueueEventListener for RecordingListener {
    fn on_event(&self, event: &QueueEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
