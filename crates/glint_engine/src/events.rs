//! Diagnostic update notifications.
//!
//! Consumers (an editor's error list, a squiggle provider) subscribe to
//! a channel of [`DiagnosticsEvent`]s. Every event carries the full new
//! set for its key; updates are never deltas, so a consumer that misses
//! an event only lags, it never corrupts.
//!
//! Events fire only when published results actually differ from what was
//! previously stored. Cache hits and no-op recomputations are silent.

use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};

use glint_core::AnalysisKey;
use glint_diagnostic::DiagnosticData;

use crate::state::StateType;

/// Identity of one updated diagnostic set: which analyzer, which cache
/// granularity, which document or project.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct DiagnosticsKey {
    /// Analyzer name.
    pub analyzer: Arc<str>,
    /// Which of the three caches changed.
    pub state_type: StateType,
    /// Document or project the set belongs to.
    pub key: AnalysisKey,
}

/// One notification to diagnostic consumers.
#[derive(Clone, Debug)]
pub enum DiagnosticsEvent {
    /// The set for this key changed; `items` is the complete new set.
    Updated {
        key: DiagnosticsKey,
        items: Arc<[DiagnosticData]>,
    },
    /// The set for this key is now empty or the key no longer exists.
    Removed { key: DiagnosticsKey },
    /// Several updates delivered as one atomic unit, used when an entity
    /// disappears and every cache touching it must clear together.
    Batch(Vec<DiagnosticsEvent>),
}

impl DiagnosticsEvent {
    /// Flatten into leaf events, expanding batches.
    pub fn flatten(self) -> Vec<DiagnosticsEvent> {
        match self {
            DiagnosticsEvent::Batch(events) => {
                events.into_iter().flat_map(DiagnosticsEvent::flatten).collect()
            }
            leaf => vec![leaf],
        }
    }
}

/// Fan-out hub for diagnostic events.
///
/// Subscribers each get their own unbounded channel; a slow subscriber
/// buffers rather than blocking analysis.
#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: parking_lot::RwLock<Vec<Sender<DiagnosticsEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> Receiver<DiagnosticsEvent> {
        let (sender, receiver) = unbounded();
        self.subscribers.write().push(sender);
        receiver
    }

    /// Deliver an event to every live subscriber, dropping the dead ones.
    pub fn publish(&self, event: DiagnosticsEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }
}
