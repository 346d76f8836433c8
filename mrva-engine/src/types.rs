//! Collaborator traits and boundary types
//!
//! The engine never talks to the job service, the generation backend, model
//! storage, or the workbench directly. Each is an async trait implemented by
//! the embedding application (and by fakes in tests).

use async_trait::async_trait;
use mrva_common::events::{
    ExternalApiUsage, ModeledMethod, QueryRef, Repository, RepositoryOutcome, RunFailureReason,
};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ============================================================================
// Variant Analysis Job Source
// ============================================================================

/// Request to run one query against a set of repositories
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub query: QueryRef,
    /// Repositories to target, as `owner/name`
    pub repositories: Vec<String>,
}

/// One repository outcome as delivered by the job source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryEvent {
    pub repository: Repository,
    pub outcome: RepositoryOutcome,
}

impl RepositoryEvent {
    pub fn new(repository: Repository, outcome: RepositoryOutcome) -> Self {
        Self {
            repository,
            outcome,
        }
    }
}

/// Job source reply to a submission
#[derive(Debug, Clone)]
pub struct SubmittedRun {
    pub run_id: Uuid,
    /// Every targeted repository, in submission order
    pub repositories: Vec<Repository>,
    /// Repositories skipped at submission time
    pub skipped: Vec<RepositoryEvent>,
}

/// Explicit terminal signal for the controlling job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobConclusion {
    Succeeded,
    Failed(RunFailureReason),
}

/// Result of one status poll
#[derive(Debug, Clone, Default)]
pub struct RunUpdate {
    pub outcomes: Vec<RepositoryEvent>,
    pub conclusion: Option<JobConclusion>,
}

/// Remote service executing variant analysis runs
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn submit(&self, request: &RunRequest) -> anyhow::Result<SubmittedRun>;

    /// Outcomes observed since the previous poll, plus the conclusion once known
    async fn poll(&self, run_id: Uuid) -> anyhow::Result<RunUpdate>;

    async fn cancel(&self, run_id: Uuid) -> anyhow::Result<()>;
}

// ============================================================================
// Model Generation
// ============================================================================

/// Generated models keyed by signature
pub type GeneratedBatch = BTreeMap<String, ModeledMethod>;

/// Background model generation backend
#[async_trait]
pub trait ModelGenerator: Send + Sync {
    /// Generate models for `usages` of `package`, streaming batches into `batches`
    ///
    /// Implementations should return promptly once `cancel` fires. Batches sent
    /// after cancellation are still merged.
    async fn generate(
        &self,
        package: &str,
        usages: Vec<ExternalApiUsage>,
        batches: mpsc::Sender<GeneratedBatch>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()>;
}

// ============================================================================
// Persistence and Workbench
// ============================================================================

/// Durable model storage
#[async_trait]
pub trait ModelPersistence: Send + Sync {
    /// Store every given model or none of them
    async fn save(
        &self,
        usages: &[ExternalApiUsage],
        methods: &[ModeledMethod],
    ) -> anyhow::Result<()>;
}

/// Host workbench actions requested from the editor
#[async_trait]
pub trait Workbench: Send + Sync {
    async fn open_database(&self) -> anyhow::Result<()>;

    async fn open_extension_pack(&self) -> anyhow::Result<()>;
}
