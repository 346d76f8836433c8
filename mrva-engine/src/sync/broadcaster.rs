//! Full-state broadcaster
//!
//! Turns internal state into outbound `SessionEvent`s on the EventBus. Every
//! publish carries complete state for its view, never a diff, so a consumer
//! that missed messages is repaired by the next one it receives.
//!
//! The latest run snapshot is retained so a `refresh` can replay it.

use crate::modeling::in_progress::InProgressMethods;
use crate::modeling::reconciler::ModelStateReconciler;
use crate::run::state_machine::VariantAnalysisRun;
use mrva_common::events::{
    EventBus, ExternalApiUsage, Mode, OutboundMessage, RunSnapshot, SessionEvent,
};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::debug;

/// Publishes full-state session events
#[derive(Clone)]
pub struct StateBroadcaster {
    bus: EventBus,
    /// Maximum repositories listed per skip group
    display_limit: Option<usize>,
    last_run: Arc<watch::Sender<Option<RunSnapshot>>>,
}

impl StateBroadcaster {
    pub fn new(bus: EventBus, display_limit: Option<usize>) -> Self {
        let (last_run, _) = watch::channel(None);
        Self {
            bus,
            display_limit,
            last_run: Arc::new(last_run),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Push the run's current snapshot
    pub fn publish_run(&self, run: &VariantAnalysisRun) -> bool {
        let snapshot = run.snapshot(self.display_limit);
        self.last_run.send_replace(Some(snapshot.clone()));
        self.send(SessionEvent::RunSnapshot(snapshot))
    }

    /// Replay the most recent run snapshot, if any run was published
    pub fn republish_run(&self) -> bool {
        let snapshot = self.last_run.borrow().clone();
        match snapshot {
            Some(snapshot) => self.send(SessionEvent::RunSnapshot(snapshot)),
            None => false,
        }
    }

    pub fn last_run_snapshot(&self) -> Option<RunSnapshot> {
        self.last_run.borrow().clone()
    }

    /// Push every modeled method and the modified set
    pub fn publish_modeled(&self, reconciler: &ModelStateReconciler) -> bool {
        self.send(SessionEvent::ModeledMethods {
            methods: reconciler.methods().clone(),
            modified_signatures: reconciler.modified_signatures().clone(),
        })
    }

    /// Push the per-package in-progress sets
    pub fn publish_in_progress(&self, in_progress: &InProgressMethods) -> bool {
        self.send(SessionEvent::InProgressMethods {
            packages: in_progress.packages().clone(),
        })
    }

    pub fn publish_view_state(&self, mode: Mode, hide_modeled_methods: bool) -> bool {
        self.send(SessionEvent::ViewState {
            mode,
            hide_modeled_methods,
        })
    }

    pub fn publish_usages(&self, usages: Vec<ExternalApiUsage>) -> bool {
        self.send(SessionEvent::UsagesLoaded { usages })
    }

    pub fn publish_generation_failed(&self, package: &str, message: String) -> bool {
        self.send(SessionEvent::GenerationFailed {
            package: package.to_string(),
            message,
        })
    }

    /// Subscribe a new consumer to the outbound stream
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundMessage> {
        self.bus.subscribe()
    }

    fn send(&self, event: SessionEvent) -> bool {
        let event_type = event.event_type();
        match self.bus.emit(event) {
            Ok(receiver_count) => {
                debug!(event_type, receiver_count, "Outbound event broadcast");
                true
            }
            Err(_) => {
                // No receivers - this is fine, the next refresh replays state
                debug!(event_type, "No receivers for outbound event");
                false
            }
        }
    }
}
