//! Live session tracking

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::SystemTime;

use tokio::sync::{Mutex, Notify};

/// Registry entry for one live connection
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// Remote peer address
    pub peer: SocketAddr,
    /// When the connection was accepted
    pub connected_at: SystemTime,
}

/// Tracks live sessions by identifier.
///
/// Sessions register on accept and deregister when their connection task
/// exits, whatever the outcome. The shutdown coordinator awaits
/// [`SessionRegistry::wait_drained`] to know when the last session is gone.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<u64, SessionEntry>>,
    drained: Notify,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted session
    pub async fn register(&self, id: u64, entry: SessionEntry) {
        self.sessions.lock().await.insert(id, entry);
    }

    /// Remove a session; wakes drain waiters when the last one leaves
    pub async fn deregister(&self, id: u64) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&id);
        if sessions.is_empty() {
            self.drained.notify_waiters();
        }
    }

    /// Look up a live session's entry
    pub async fn get(&self, id: u64) -> Option<SessionEntry> {
        self.sessions.lock().await.get(&id).cloned()
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether no sessions are live
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Wait until every registered session has deregistered.
    ///
    /// Returns immediately if the registry is already empty.
    pub async fn wait_drained(&self) {
        loop {
            // Arm the notification before checking, so a deregister between
            // the check and the await is not lost.
            let drained = self.drained.notified();
            if self.sessions.lock().await.is_empty() {
                return;
            }
            drained.await;
        }
    }
}
