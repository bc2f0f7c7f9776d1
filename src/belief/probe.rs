use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult, RuntimeError};

use super::event::BeliefEvent;

/// Probe subscription settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Per-probe buffer; events beyond it are dropped and counted.
    pub capacity: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// Fan-out of belief events to external probes.
///
/// Publishing never blocks the reasoning cycle: full probes lose the event and
/// the loss is counted. Disconnected probes are pruned on the next publish.
#[derive(Debug, Default)]
pub(crate) struct ProbeHub {
    senders: Vec<Sender<BeliefEvent>>,
    dropped: Arc<AtomicU64>,
}

impl ProbeHub {
    pub(crate) fn subscribe(&mut self, config: &ProbeConfig) -> BeliefProbe {
        let (tx, rx) = bounded(config.capacity.max(1));
        self.senders.push(tx);
        BeliefProbe {
            rx,
            dropped: Arc::clone(&self.dropped),
        }
    }

    pub(crate) fn publish(&mut self, event: &BeliefEvent) {
        if self.senders.is_empty() {
            return;
        }
        let dropped = &self.dropped;
        self.senders.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Receiving end of a belief-event subscription.
///
/// Dropping the probe unsubscribes it.
#[derive(Debug)]
pub struct BeliefProbe {
    rx: Receiver<BeliefEvent>,
    dropped: Arc<AtomicU64>,
}

impl BeliefProbe {
    /// Receive the next event (blocking).
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Disconnected` once the belief base is gone and
    /// the buffer is empty.
    pub fn recv(&self) -> EngineResult<BeliefEvent> {
        self.rx.recv().map_err(|_| disconnected())
    }

    /// Receive the next event with a timeout.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Timeout` or `RuntimeError::Disconnected`.
    pub fn recv_timeout(&self, timeout: Duration) -> EngineResult<BeliefEvent> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => EngineError::Runtime(RuntimeError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            RecvTimeoutError::Disconnected => disconnected(),
        })
    }

    /// Everything buffered right now, without blocking.
    #[must_use]
    pub fn drain(&self) -> Vec<BeliefEvent> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => out.push(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return out,
            }
        }
    }

    /// Events lost across all probes of the same belief base.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

fn disconnected() -> EngineError {
    EngineError::Runtime(RuntimeError::Disconnected {
        pool: "belief_probe".to_string(),
    })
}
