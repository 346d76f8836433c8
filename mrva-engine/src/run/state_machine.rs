//! Variant analysis run state machine
//!
//! Requested → InProgress → {Succeeded, Failed, Canceled}
//!
//! InProgress accepts any number of outcome events without changing state.
//! Succeeded and Failed are entered only on an explicit conclusion from the
//! job source. Canceled is entered on user request from Requested or
//! InProgress; outcomes keep being recorded afterwards because repositories
//! may have finished before the cancellation was observed.

use crate::error::RunError;
use crate::run::classifier::SkipClassifier;
use crate::run::registry::{RecordResult, RepositoryResultRegistry};
use crate::types::{JobConclusion, RepositoryEvent};
use chrono::{DateTime, Utc};
use mrva_common::events::{QueryRef, Repository, RunFailureReason, RunSnapshot, RunState};
use std::collections::HashSet;
use uuid::Uuid;

/// State transition record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub old_state: RunState,
    pub new_state: RunState,
    pub transitioned_at: DateTime<Utc>,
}

/// One submitted run and everything observed about it
#[derive(Debug, Clone)]
pub struct VariantAnalysisRun {
    run_id: Uuid,
    query: QueryRef,
    state: RunState,
    /// Targeted repositories in submission order
    repositories: Vec<Repository>,
    targeted: HashSet<String>,
    registry: RepositoryResultRegistry,
    classifier: SkipClassifier,
    failure_reason: Option<RunFailureReason>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl VariantAnalysisRun {
    /// Create a run in the Requested state
    ///
    /// Repeated repository names are collapsed, keeping the first occurrence.
    pub fn new(run_id: Uuid, query: QueryRef, repositories: Vec<Repository>) -> Self {
        let mut targeted = HashSet::with_capacity(repositories.len());
        let repositories: Vec<Repository> = repositories
            .into_iter()
            .filter(|r| targeted.insert(r.full_name.clone()))
            .collect();

        Self {
            run_id,
            query,
            state: RunState::Requested,
            repositories,
            targeted,
            registry: RepositoryResultRegistry::new(),
            classifier: SkipClassifier::new(),
            failure_reason: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn query(&self) -> &QueryRef {
        &self.query
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    pub fn registry(&self) -> &RepositoryResultRegistry {
        &self.registry
    }

    /// Requested → InProgress
    pub fn start(&mut self) -> Result<StateTransition, RunError> {
        match self.state {
            RunState::Requested => Ok(self.transition_to(RunState::InProgress)),
            from => Err(RunError::InvalidTransition {
                from,
                to: RunState::InProgress,
            }),
        }
    }

    /// Apply the job source's explicit terminal signal
    pub fn conclude(&mut self, conclusion: JobConclusion) -> Result<StateTransition, RunError> {
        let to = match conclusion {
            JobConclusion::Succeeded => RunState::Succeeded,
            JobConclusion::Failed(_) => RunState::Failed,
        };
        if self.state != RunState::InProgress {
            return Err(RunError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        if let JobConclusion::Failed(reason) = conclusion {
            self.failure_reason = Some(reason);
        }
        Ok(self.transition_to(to))
    }

    /// User-requested cancellation
    pub fn cancel(&mut self) -> Result<StateTransition, RunError> {
        match self.state {
            RunState::Requested | RunState::InProgress => Ok(self.transition_to(RunState::Canceled)),
            from => Err(RunError::InvalidTransition {
                from,
                to: RunState::Canceled,
            }),
        }
    }

    /// Record one repository outcome
    ///
    /// Accepted in Requested, InProgress and Canceled. Succeeded and Failed
    /// runs are retired and refuse further outcomes.
    pub fn apply_outcome(&mut self, event: RepositoryEvent) -> Result<RecordResult, RunError> {
        if matches!(self.state, RunState::Succeeded | RunState::Failed) {
            return Err(RunError::Retired { state: self.state });
        }
        if !self.targeted.contains(&event.repository.full_name) {
            return Err(RunError::UnknownRepository(event.repository.full_name));
        }

        let result = self
            .registry
            .record(event.repository.clone(), event.outcome.clone())?;
        if result == RecordResult::Recorded {
            self.classifier.record(&event.repository, &event.outcome);
        }
        Ok(result)
    }

    /// Full snapshot, listing at most `display_limit` repositories per skip group
    pub fn snapshot(&self, display_limit: Option<usize>) -> RunSnapshot {
        RunSnapshot {
            run_id: self.run_id,
            query: self.query.clone(),
            state: self.state,
            total_count: self.repositories.len(),
            succeeded_count: self.registry.succeeded_count(),
            failed_count: self.registry.failed_count(),
            canceled_count: self.registry.canceled_count(),
            pending_count: self.repositories.len().saturating_sub(self.registry.len()),
            total_result_count: self.registry.total_result_count(),
            skipped: self.classifier.snapshot(display_limit),
            failure_reason: self.failure_reason,
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }

    fn transition_to(&mut self, new_state: RunState) -> StateTransition {
        let transition = StateTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            self.completed_at = Some(transition.transitioned_at);
        }

        tracing::info!(
            run_id = %self.run_id,
            from = %transition.old_state,
            to = %new_state,
            "Run state transition"
        );
        transition
    }
}
