//! Test Helper Utilities
//!
//! Scripted fakes for the engine's collaborator traits, plus helpers for
//! reading the outbound event stream.

#![allow(dead_code)]

use async_trait::async_trait;
use mrva_common::events::{
    ExternalApiUsage, ModeledMethod, ModeledMethodKind, OutboundMessage, Provenance, QueryRef,
    Repository, RepositoryOutcome, ResultRef, SessionEvent,
};
use mrva_engine::types::{
    GeneratedBatch, JobSource, ModelGenerator, ModelPersistence, RepositoryEvent, RunRequest,
    RunUpdate, SubmittedRun, Workbench,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ============================================================================
// Logging
// ============================================================================

/// Route engine logs through the test harness's captured output
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("mrva_engine=debug"))
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Builders
// ============================================================================

pub fn query() -> QueryRef {
    QueryRef {
        query_name: "SqlInjection.ql".to_string(),
        language: "java".to_string(),
    }
}

pub fn succeeded(result_count: u64) -> RepositoryOutcome {
    RepositoryOutcome::Succeeded {
        result: ResultRef {
            artifact_url: Some(format!("https://artifacts.test/{}", result_count)),
            result_count,
            artifact_size_bytes: 1024,
        },
    }
}

pub fn event(name: &str, outcome: RepositoryOutcome) -> RepositoryEvent {
    RepositoryEvent::new(Repository::stub(name), outcome)
}

pub fn usage(signature: &str, package: &str) -> ExternalApiUsage {
    ExternalApiUsage {
        signature: signature.to_string(),
        package_name: package.to_string(),
        library: format!("{}.jar", package),
        supported: false,
        usage_count: 1,
    }
}

pub fn generated(signature: &str, kind: ModeledMethodKind) -> ModeledMethod {
    ModeledMethod::new(signature, kind, "Argument[0]", "ReturnValue", Provenance::AiGenerated)
}

pub fn manual(signature: &str, kind: ModeledMethodKind) -> ModeledMethod {
    ModeledMethod::new(signature, kind, "Argument[0]", "ReturnValue", Provenance::Manual)
}

pub fn batch(models: Vec<ModeledMethod>) -> GeneratedBatch {
    models.into_iter().map(|m| (m.signature.clone(), m)).collect()
}

// ============================================================================
// Event stream
// ============================================================================

/// Receive until `pick` returns Some, failing after a few seconds
pub async fn next_matching<T>(
    rx: &mut broadcast::Receiver<OutboundMessage>,
    mut pick: impl FnMut(&SessionEvent) -> Option<T>,
) -> T {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    if let Some(found) = pick(&message.event) {
                        return found;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for event")
}

/// Everything currently buffered on the receiver
pub fn drain(rx: &mut broadcast::Receiver<OutboundMessage>) -> Vec<OutboundMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

// ============================================================================
// Job source
// ============================================================================

/// Job source replaying scripted poll results
pub struct FakeJobSource {
    run_id: Uuid,
    skipped: Vec<RepositoryEvent>,
    polls: Mutex<VecDeque<anyhow::Result<RunUpdate>>>,
    pub poll_count: AtomicUsize,
    pub cancel_count: AtomicUsize,
}

impl FakeJobSource {
    pub fn new(skipped: Vec<RepositoryEvent>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            skipped,
            polls: Mutex::new(VecDeque::new()),
            poll_count: AtomicUsize::new(0),
            cancel_count: AtomicUsize::new(0),
        }
    }

    pub fn push_poll(&self, update: RunUpdate) {
        self.polls.lock().unwrap().push_back(Ok(update));
    }

    pub fn push_poll_error(&self, message: &str) {
        self.polls
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!(message.to_string())));
    }
}

#[async_trait]
impl JobSource for FakeJobSource {
    async fn submit(&self, request: &RunRequest) -> anyhow::Result<SubmittedRun> {
        let skipped_names: Vec<&str> = self
            .skipped
            .iter()
            .map(|e| e.repository.full_name.as_str())
            .collect();
        let repositories = request
            .repositories
            .iter()
            .filter(|name| !skipped_names.contains(&name.as_str()))
            .map(|name| Repository::stub(name.clone()))
            .collect();

        Ok(SubmittedRun {
            run_id: self.run_id,
            repositories,
            skipped: self.skipped.clone(),
        })
    }

    async fn poll(&self, _run_id: Uuid) -> anyhow::Result<RunUpdate> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RunUpdate::default()))
    }

    async fn cancel(&self, _run_id: Uuid) -> anyhow::Result<()> {
        self.cancel_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Model generator
// ============================================================================

/// What the fake generator does for one package
#[derive(Default, Clone)]
pub struct GeneratorScript {
    /// Sent as soon as generation is released
    pub batches: Vec<GeneratedBatch>,
    /// Sent only after cancellation is observed
    pub after_cancel: Vec<GeneratedBatch>,
    /// Block until canceled before returning
    pub wait_for_cancel: bool,
    /// Pause between seeing cancellation and sending `after_cancel`
    pub delay_after_cancel: Option<Duration>,
    /// Returned as an error after all batches
    pub fail_with: Option<String>,
}

pub struct FakeGenerator {
    scripts: Mutex<HashMap<String, GeneratorScript>>,
    /// Generation waits for one permit before sending anything
    pub release: Arc<Notify>,
    gated: AtomicBool,
    pub requested: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            release: Arc::new(Notify::new()),
            gated: AtomicBool::new(false),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Hold every generation until `release.notify_one()`
    pub fn gated() -> Self {
        let generator = Self::new();
        generator.gated.store(true, Ordering::SeqCst);
        generator
    }

    pub fn script(&self, package: &str, script: GeneratorScript) {
        self.scripts
            .lock()
            .unwrap()
            .insert(package.to_string(), script);
    }

    pub fn requested_signatures(&self, package: &str) -> Option<Vec<String>> {
        self.requested
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| p == package)
            .map(|(_, sigs)| sigs.clone())
    }
}

#[async_trait]
impl ModelGenerator for FakeGenerator {
    async fn generate(
        &self,
        package: &str,
        usages: Vec<ExternalApiUsage>,
        batches: mpsc::Sender<GeneratedBatch>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        self.requested.lock().unwrap().push((
            package.to_string(),
            usages.into_iter().map(|u| u.signature).collect(),
        ));
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(package)
            .cloned()
            .unwrap_or_default();

        if self.gated.load(Ordering::SeqCst) {
            tokio::select! {
                _ = self.release.notified() => {}
                _ = cancel.cancelled() => {}
            }
        }

        for batch in script.batches {
            batches.send(batch).await?;
        }
        if script.wait_for_cancel {
            cancel.cancelled().await;
            if let Some(delay) = script.delay_after_cancel {
                tokio::time::sleep(delay).await;
            }
            for batch in script.after_cancel {
                batches.send(batch).await?;
            }
        }
        match script.fail_with {
            Some(message) => Err(anyhow::anyhow!(message)),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Persistence and workbench
// ============================================================================

#[derive(Default)]
pub struct FakePersistence {
    pub fail: AtomicBool,
    /// When set, save waits for one permit before completing
    pub hold: Option<Arc<Notify>>,
    /// Notified once a save has started
    pub started: Arc<Notify>,
    pub saved: Mutex<Vec<(Vec<ExternalApiUsage>, Vec<ModeledMethod>)>>,
}

impl FakePersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let persistence = Self::default();
        persistence.fail.store(true, Ordering::SeqCst);
        persistence
    }

    pub fn held(hold: Arc<Notify>) -> Self {
        Self {
            hold: Some(hold),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ModelPersistence for FakePersistence {
    async fn save(&self, usages: &[ExternalApiUsage], methods: &[ModeledMethod]) -> anyhow::Result<()> {
        self.started.notify_one();
        if let Some(hold) = &self.hold {
            hold.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.saved
            .lock()
            .unwrap()
            .push((usages.to_vec(), methods.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeWorkbench {
    pub databases_opened: AtomicUsize,
    pub packs_opened: AtomicUsize,
}

#[async_trait]
impl Workbench for FakeWorkbench {
    async fn open_database(&self) -> anyhow::Result<()> {
        self.databases_opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn open_extension_pack(&self) -> anyhow::Result<()> {
        self.packs_opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
