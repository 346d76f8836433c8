//! Per-repository outcome registry
//!
//! Outcomes are append-only. Re-recording the same outcome is a no-op; a
//! different outcome for an already-recorded repository is refused.

use crate::error::RunError;
use mrva_common::events::{Repository, RepositoryOutcome};
use std::collections::HashMap;

/// Result of recording one outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordResult {
    /// First outcome for this repository
    Recorded,
    /// Identical outcome was already recorded
    Duplicate,
}

#[derive(Debug, Clone)]
struct Entry {
    repository: Repository,
    outcome: RepositoryOutcome,
}

/// Terminal outcome of every repository that has reported so far
#[derive(Debug, Clone, Default)]
pub struct RepositoryResultRegistry {
    entries: HashMap<String, Entry>,
    /// Repository names in arrival order
    order: Vec<String>,
    succeeded: usize,
    failed: usize,
    canceled: usize,
    total_result_count: u64,
}

impl RepositoryResultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one repository
    pub fn record(
        &mut self,
        repository: Repository,
        outcome: RepositoryOutcome,
    ) -> Result<RecordResult, RunError> {
        if let Some(existing) = self.entries.get(&repository.full_name) {
            if existing.outcome == outcome {
                return Ok(RecordResult::Duplicate);
            }
            return Err(RunError::OutcomeConflict {
                repository: repository.full_name,
                recorded: existing.outcome.clone(),
                incoming: outcome,
            });
        }

        match &outcome {
            RepositoryOutcome::Succeeded { result } => {
                self.succeeded += 1;
                self.total_result_count += result.result_count;
            }
            RepositoryOutcome::Failed { .. } => self.failed += 1,
            RepositoryOutcome::Canceled => self.canceled += 1,
            RepositoryOutcome::AccessMismatch
            | RepositoryOutcome::NoAnalysisDatabase
            | RepositoryOutcome::NotFound
            | RepositoryOutcome::OverLimit => {}
        }

        self.order.push(repository.full_name.clone());
        self.entries.insert(
            repository.full_name.clone(),
            Entry {
                repository,
                outcome,
            },
        );
        Ok(RecordResult::Recorded)
    }

    pub fn outcome(&self, full_name: &str) -> Option<&RepositoryOutcome> {
        self.entries.get(full_name).map(|e| &e.outcome)
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.entries.contains_key(full_name)
    }

    /// Recorded outcomes in arrival order
    pub fn iter(&self) -> impl Iterator<Item = (&Repository, &RepositoryOutcome)> {
        self.order.iter().filter_map(move |name| {
            self.entries
                .get(name)
                .map(|entry| (&entry.repository, &entry.outcome))
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded
    }

    pub fn failed_count(&self) -> usize {
        self.failed
    }

    pub fn canceled_count(&self) -> usize {
        self.canceled
    }

    pub fn total_result_count(&self) -> u64 {
        self.total_result_count
    }
}
