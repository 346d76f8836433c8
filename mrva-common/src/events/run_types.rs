//! Variant analysis run type definitions
//!
//! Supporting types for run snapshots pushed to the presentation surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Optional repository details fetched from the hosting service
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryMetadata {
    pub stargazers_count: Option<u64>,
    pub private: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A repository targeted by a run, identified by `owner/name`
///
/// Repositories whose metadata was never fetched (e.g. bulk "not found"
/// responses) are minimal stubs with `metadata == None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RepositoryMetadata>,
}

impl Repository {
    /// Identity-only repository
    pub fn stub(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            metadata: None,
        }
    }

    pub fn is_stub(&self) -> bool {
        self.metadata.is_none()
    }
}

/// Reference to results stored out-of-band for a succeeded repository
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRef {
    pub artifact_url: Option<String>,
    pub result_count: u64,
    pub artifact_size_bytes: u64,
}

/// Terminal outcome of one repository within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RepositoryOutcome {
    /// Analysis produced results
    Succeeded { result: ResultRef },
    /// Repository visibility does not match the controller repository
    AccessMismatch,
    /// No analysis database exists for the repository
    NoAnalysisDatabase,
    /// Repository could not be found
    NotFound,
    /// Repository exceeded the per-run repository limit
    OverLimit,
    /// Analysis was canceled before producing results
    Canceled,
    /// Analysis failed, or the upstream reported a status we do not recognise
    Failed { reason: String },
}

impl RepositoryOutcome {
    /// Map an upstream status string to an outcome
    ///
    /// Unrecognised statuses become `Failed` rather than an error.
    pub fn from_status(status: &str, result: Option<ResultRef>, message: Option<String>) -> Self {
        match status {
            "succeeded" => Self::Succeeded {
                result: result.unwrap_or_default(),
            },
            "accessMismatch" | "access_mismatch" => Self::AccessMismatch,
            "noAnalysisDatabase" | "no_analysis_database" | "noCodeqlDb" => {
                Self::NoAnalysisDatabase
            }
            "notFound" | "not_found" => Self::NotFound,
            "overLimit" | "over_limit" => Self::OverLimit,
            "canceled" | "cancelled" => Self::Canceled,
            "failed" | "timedOut" => Self::Failed {
                reason: message.unwrap_or_else(|| status.to_string()),
            },
            other => Self::Failed {
                reason: format!("unrecognized repository status '{}'", other),
            },
        }
    }

    /// Skip group this outcome belongs to, if any
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::AccessMismatch => Some(SkipReason::AccessMismatch),
            Self::NoAnalysisDatabase => Some(SkipReason::NoAnalysisDatabase),
            Self::NotFound => Some(SkipReason::NotFound),
            Self::OverLimit => Some(SkipReason::OverLimit),
            Self::Succeeded { .. } | Self::Canceled | Self::Failed { .. } => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::AccessMismatch => "accessMismatch",
            Self::NoAnalysisDatabase => "noAnalysisDatabase",
            Self::NotFound => "notFound",
            Self::OverLimit => "overLimit",
            Self::Canceled => "canceled",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Reason a repository was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    AccessMismatch,
    NoAnalysisDatabase,
    NotFound,
    OverLimit,
}

impl SkipReason {
    pub const ALL: [SkipReason; 4] = [
        SkipReason::AccessMismatch,
        SkipReason::NoAnalysisDatabase,
        SkipReason::NotFound,
        SkipReason::OverLimit,
    ];
}

/// Named, countable bucket of skipped repositories
///
/// `repository_count` is authoritative. `repositories` may be shorter when the
/// list was truncated for display.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRepositoryGroup {
    pub repository_count: usize,
    pub repositories: Vec<Repository>,
}

impl SkippedRepositoryGroup {
    pub fn push(&mut self, repository: Repository) {
        self.repository_count += 1;
        self.repositories.push(repository);
    }

    /// Copy of this group listing at most `limit` repositories
    pub fn truncated(&self, limit: usize) -> Self {
        Self {
            repository_count: self.repository_count,
            repositories: self.repositories.iter().take(limit).cloned().collect(),
        }
    }

    /// Whether the list holds every counted repository
    pub fn is_complete(&self) -> bool {
        self.repository_count == self.repositories.len()
    }
}

/// The four skip groups of a run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRepositories {
    pub access_mismatch_repos: SkippedRepositoryGroup,
    pub no_analysis_database_repos: SkippedRepositoryGroup,
    pub not_found_repos: SkippedRepositoryGroup,
    pub over_limit_repos: SkippedRepositoryGroup,
}

impl SkippedRepositories {
    pub fn group(&self, reason: SkipReason) -> &SkippedRepositoryGroup {
        match reason {
            SkipReason::AccessMismatch => &self.access_mismatch_repos,
            SkipReason::NoAnalysisDatabase => &self.no_analysis_database_repos,
            SkipReason::NotFound => &self.not_found_repos,
            SkipReason::OverLimit => &self.over_limit_repos,
        }
    }

    pub fn group_mut(&mut self, reason: SkipReason) -> &mut SkippedRepositoryGroup {
        match reason {
            SkipReason::AccessMismatch => &mut self.access_mismatch_repos,
            SkipReason::NoAnalysisDatabase => &mut self.no_analysis_database_repos,
            SkipReason::NotFound => &mut self.not_found_repos,
            SkipReason::OverLimit => &mut self.over_limit_repos,
        }
    }

    /// Total number of skipped repositories across all groups
    pub fn total_count(&self) -> usize {
        SkipReason::ALL
            .iter()
            .map(|reason| self.group(*reason).repository_count)
            .sum()
    }

    pub fn truncated(&self, limit: usize) -> Self {
        Self {
            access_mismatch_repos: self.access_mismatch_repos.truncated(limit),
            no_analysis_database_repos: self.no_analysis_database_repos.truncated(limit),
            not_found_repos: self.not_found_repos.truncated(limit),
            over_limit_repos: self.over_limit_repos.truncated(limit),
        }
    }
}

/// Run lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    Requested,
    InProgress,
    Succeeded,
    Failed,
    Canceled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed | RunState::Canceled)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Requested => "Requested",
            RunState::InProgress => "InProgress",
            RunState::Succeeded => "Succeeded",
            RunState::Failed => "Failed",
            RunState::Canceled => "Canceled",
        };
        f.write_str(name)
    }
}

/// Why the controlling job failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunFailureReason {
    NoRepositoriesQueried,
    WorkflowFailed,
    InternalError,
}

/// Query a run executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRef {
    pub query_name: String,
    pub language: String,
}

/// Full run state pushed downstream after every accepted change
///
/// Consumers replace their copy wholesale; snapshots are never deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub query: QueryRef,
    pub state: RunState,
    pub total_count: usize,
    pub succeeded_count: usize,
    pub failed_count: usize,
    pub canceled_count: usize,
    pub pending_count: usize,
    pub total_result_count: u64,
    #[serde(flatten)]
    pub skipped: SkippedRepositories,
    pub failure_reason: Option<RunFailureReason>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_becomes_failed_variant() {
        let outcome = RepositoryOutcome::from_status("quarantined", None, None);
        match outcome {
            RepositoryOutcome::Failed { reason } => assert!(reason.contains("quarantined")),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_skip_reason_only_for_skip_outcomes() {
        assert_eq!(
            RepositoryOutcome::NotFound.skip_reason(),
            Some(SkipReason::NotFound)
        );
        assert_eq!(RepositoryOutcome::Canceled.skip_reason(), None);
        assert_eq!(
            RepositoryOutcome::Succeeded {
                result: ResultRef::default()
            }
            .skip_reason(),
            None
        );
    }

    #[test]
    fn test_truncated_group_keeps_count() {
        let mut group = SkippedRepositoryGroup::default();
        for i in 0..5 {
            group.push(Repository::stub(format!("octo/repo-{}", i)));
        }

        let shown = group.truncated(2);
        assert_eq!(shown.repository_count, 5);
        assert_eq!(shown.repositories.len(), 2);
        assert!(!shown.is_complete());
        assert!(group.is_complete());
    }

    #[test]
    fn test_skipped_groups_serialize_with_repository_count() {
        let mut skipped = SkippedRepositories::default();
        skipped
            .group_mut(SkipReason::AccessMismatch)
            .push(Repository::stub("octo/private"));

        let json = serde_json::to_value(&skipped).expect("serialize");
        assert_eq!(json["accessMismatchRepos"]["repositoryCount"], 1);
        assert_eq!(
            json["accessMismatchRepos"]["repositories"][0]["fullName"],
            "octo/private"
        );
        assert_eq!(json["notFoundRepos"]["repositoryCount"], 0);
    }

    #[test]
    fn test_repository_metadata_is_optional_on_the_wire() {
        let json = serde_json::to_value(Repository::stub("github/codeql")).unwrap();
        assert!(json.get("metadata").is_none());

        let fetched: Repository = serde_json::from_value(serde_json::json!({
            "fullName": "github/codeql",
            "metadata": { "stargazersCount": 7, "private": false }
        }))
        .unwrap();
        assert!(!fetched.is_stub());
        assert_eq!(fetched.metadata.unwrap().stargazers_count, Some(7));
    }
}
