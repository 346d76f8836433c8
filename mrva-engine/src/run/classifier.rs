//! Skip classification
//!
//! Groups non-succeeded repositories into the four skip groups. A repository
//! lands in the group named by its own outcome tag and in no other.

use mrva_common::events::{Repository, RepositoryOutcome, SkipReason, SkippedRepositories};

/// Running tally of the four skip groups
///
/// Callers feed each repository at most once (the registry guarantees this);
/// every `record` is an O(1) append.
#[derive(Debug, Clone, Default)]
pub struct SkipClassifier {
    groups: SkippedRepositories,
}

impl SkipClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a complete outcome set from scratch
    pub fn classify<'a, I>(outcomes: I) -> SkippedRepositories
    where
        I: IntoIterator<Item = (&'a Repository, &'a RepositoryOutcome)>,
    {
        let mut classifier = Self::new();
        for (repository, outcome) in outcomes {
            classifier.record(repository, outcome);
        }
        classifier.groups
    }

    /// Add one newly recorded outcome, returning the group it joined
    pub fn record(
        &mut self,
        repository: &Repository,
        outcome: &RepositoryOutcome,
    ) -> Option<SkipReason> {
        let reason = outcome.skip_reason()?;
        self.groups.group_mut(reason).push(repository.clone());
        Some(reason)
    }

    pub fn groups(&self) -> &SkippedRepositories {
        &self.groups
    }

    /// Groups for display, listing at most `limit` repositories per group
    pub fn snapshot(&self, limit: Option<usize>) -> SkippedRepositories {
        match limit {
            Some(limit) => self.groups.truncated(limit),
            None => self.groups.clone(),
        }
    }
}
