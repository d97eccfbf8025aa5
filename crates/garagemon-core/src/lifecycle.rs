//! Process-wide lifecycle state: the current [`Phase`] and the shared
//! [`Shutdown`] signal every background task listens on.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

/// Broadcast "stop" notification. Once triggered it stays triggered.
#[derive(Clone, Debug)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal has been triggered (immediately if it already was).
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Starting,
    Live,
    Draining,
    Stopped,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Starting => "starting",
            Phase::Live => "live",
            Phase::Draining => "draining",
            Phase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Owned by the coordinator; the only place the phase is mutated.
#[derive(Debug)]
pub struct Lifecycle {
    phase: Arc<watch::Sender<Phase>>,
    shutdown: Shutdown,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Phase::Starting);
        Self {
            phase: Arc::new(tx),
            shutdown: Shutdown::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Move forward to `next`. Returns false, leaving the phase untouched,
    /// if `next` is not strictly later than the current phase.
    pub fn advance(&self, next: Phase) -> bool {
        let moved = self.phase.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        });
        if moved {
            tracing::debug!(phase = %next, "lifecycle phase changed");
        }
        moved
    }

    /// Read-only view for tasks and observers outside the coordinator.
    pub fn watch(&self) -> LifecycleWatch {
        LifecycleWatch {
            phase: self.phase.subscribe(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleWatch {
    phase: watch::Receiver<Phase>,
    shutdown: Shutdown,
}

impl LifecycleWatch {
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Wait until the phase has reached at least `target`; returns the phase observed.
    pub async fn reached(&mut self, target: Phase) -> Phase {
        let observed = self.phase.wait_for(|p| *p >= target).await.map(|p| *p);
        match observed {
            Ok(p) => p,
            // Coordinator gone: whatever was last published is final.
            Err(_) => *self.phase.borrow(),
        }
    }
}
