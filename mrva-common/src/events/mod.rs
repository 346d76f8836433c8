//! Event types for the MRVA outbound message stream
//!
//! Provides the outbound event definitions and the EventBus that carries them
//! to the presentation surface.

// Sub-modules (supporting types)
mod model_types;
mod run_types;

pub use model_types::{ExternalApiUsage, Mode, ModeledMethod, ModeledMethodKind, Provenance};
pub use run_types::{
    QueryRef, Repository, RepositoryMetadata, RepositoryOutcome, ResultRef, RunFailureReason,
    RunSnapshot, RunState, SkipReason, SkippedRepositories, SkippedRepositoryGroup,
};

use crate::protocol::PROTOCOL_VERSION;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// Outbound session events
///
/// Every variant carries full state for its view. Consumers replace what they
/// hold rather than patching it, so a missed message is repaired by the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    /// Run summary plus the four skip groups
    RunSnapshot(RunSnapshot),

    /// Every modeled method and the signatures changed since the last save
    ModeledMethods {
        methods: BTreeMap<String, ModeledMethod>,
        modified_signatures: BTreeSet<String>,
    },

    /// Signatures currently being generated, per package
    InProgressMethods {
        packages: BTreeMap<String, BTreeSet<String>>,
    },

    /// Editor mode and visibility toggle
    ViewState {
        mode: Mode,
        hide_modeled_methods: bool,
    },

    /// External API usages enumerated for this session
    UsagesLoaded { usages: Vec<ExternalApiUsage> },

    /// Background generation for a package failed
    GenerationFailed { package: String, message: String },
}

impl SessionEvent {
    /// Event type name, matching the serialized `t` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::RunSnapshot(_) => "runSnapshot",
            SessionEvent::ModeledMethods { .. } => "modeledMethods",
            SessionEvent::InProgressMethods { .. } => "inProgressMethods",
            SessionEvent::ViewState { .. } => "viewState",
            SessionEvent::UsagesLoaded { .. } => "usagesLoaded",
            SessionEvent::GenerationFailed { .. } => "generationFailed",
        }
    }
}

/// Versioned, sequenced envelope around an outbound event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub version: u32,
    /// Strictly increasing per bus; gaps reveal lagged receivers
    pub seq: u64,
    pub event: SessionEvent,
}

/// Outbound distribution bus for session events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use mrva_common::events::{EventBus, Mode, SessionEvent};
///
/// let event_bus = EventBus::new(16);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit(SessionEvent::ViewState {
///     mode: Mode::Framework,
///     hide_modeled_methods: false,
/// }).ok();
///
/// let message = rx.try_recv().unwrap();
/// assert_eq!(message.seq, 1);
/// assert_eq!(message.event.event_type(), "viewState");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OutboundMessage>,
    capacity: usize,
    /// Held across the send so delivery order matches `seq` order
    next_seq: Arc<Mutex<u64>>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0 (tokio::broadcast requirement). Config
    /// validation rejects a zero capacity before it reaches here.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            capacity,
            next_seq: Arc::new(Mutex::new(1)),
        }
    }

    /// Subscribe to all future messages
    ///
    /// Messages emitted before subscription are not received; send a
    /// refresh to obtain current state.
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundMessage> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SessionEvent,
    ) -> Result<usize, broadcast::error::SendError<OutboundMessage>> {
        let mut next_seq = self.next_seq.lock().unwrap_or_else(PoisonError::into_inner);
        let message = OutboundMessage {
            version: PROTOCOL_VERSION,
            seq: *next_seq,
            event,
        };
        *next_seq += 1;
        self.tx.send(message)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SessionEvent) {
        let _ = self.emit(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
