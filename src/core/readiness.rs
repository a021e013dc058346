//! Automation-server session readiness.
//!
//! The gateway loop reports here whether node handles are currently bound.
//! Anyone can subscribe and wait for a session instead of polling the node slot.

use std::fmt;

use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessState {
    /// Nodes are resolved within the session with this id.
    Ready(u64),
    /// No usable session, with the reason.
    NotReadyYet(String),
    /// Nothing attempted yet.
    Unknown,
}

impl ReadinessState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessState::Ready(_))
    }

    pub fn session_id(&self) -> Option<u64> {
        match self {
            ReadinessState::Ready(id) => Some(*id),
            _ => None,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            ReadinessState::NotReadyYet(reason) => reason,
            _ => "",
        }
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessState::Ready(id) => write!(f, "Ready (session {})", id),
            ReadinessState::NotReadyYet(reason) => write!(f, "NotReadyYet: {}", reason),
            ReadinessState::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Readiness {
    state_tx: watch::Sender<ReadinessState>,
    state_rx: watch::Receiver<ReadinessState>,
}

impl Readiness {
    pub fn new() -> Self {
        let (state_tx, state_rx) = watch::channel(ReadinessState::Unknown);
        Self { state_tx, state_rx }
    }

    pub fn subscribe(&self) -> watch::Receiver<ReadinessState> {
        self.state_rx.clone()
    }

    pub fn current_state(&self) -> ReadinessState {
        self.state_rx.borrow().clone()
    }

    pub fn set_state(&self, state: ReadinessState) {
        let old_state = self.state_tx.send_replace(state.clone());
        if old_state != state {
            debug!("Session readiness changed: {} -> {}", old_state, state);
        }
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}
