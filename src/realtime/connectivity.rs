use std::sync::{mpsc, Arc, Mutex};

use crate::{
    domain::{
        events::ConnectivityStatus,
        status::{now_unix_ms, ConnectivityHealth, ConnectivitySnapshot, StatusError},
    },
    infra::secrets::sanitize_error_code,
};

/// Observable state of the push connection.
#[derive(Clone, Debug, Default)]
pub struct ConnectivityTracker {
    inner: Arc<Mutex<ConnectivityTrackerState>>,
}

#[derive(Debug, Default)]
struct ConnectivityTrackerState {
    snapshot: ConnectivitySnapshot,
    subscribers: Vec<mpsc::Sender<ConnectivitySnapshot>>,
}

impl ConnectivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn subscribe(&self) -> mpsc::Receiver<ConnectivitySnapshot> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut state) = self.inner.lock() {
            let _ = tx.send(state.snapshot.clone());
            state.subscribers.push(tx);
        }
        rx
    }

    pub fn snapshot(&self) -> ConnectivitySnapshot {
        self.inner
            .lock()
            .map(|state| state.snapshot.clone())
            .unwrap_or_default()
    }

    pub fn on_status(&self, status: ConnectivityStatus) {
        self.mutate(|snapshot| {
            snapshot.status = Some(status);
            snapshot.health = ConnectivityHealth::from(status);
            if status == ConnectivityStatus::Connected {
                snapshot.connections += 1;
                snapshot.last_error = None;
            }
        });
    }

    pub fn on_error(&self, code: &str) {
        let code = sanitize_error_code(code);
        self.mutate(|snapshot| {
            snapshot.last_error = Some(StatusError {
                code,
                at_unix_ms: now_unix_ms(),
            });
        });
    }

    fn mutate<F>(&self, mutator: F)
    where
        F: FnOnce(&mut ConnectivitySnapshot),
    {
        if let Ok(mut state) = self.inner.lock() {
            mutator(&mut state.snapshot);
            state.snapshot.updated_at_unix_ms = now_unix_ms();
            let payload = state.snapshot.clone();
            state
                .subscribers
                .retain(|sub| sub.send(payload.clone()).is_ok());
        }
    }
}
