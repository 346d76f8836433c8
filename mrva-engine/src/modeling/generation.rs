//! Per-package background generation
//!
//! Each `generate(package)` runs the `ModelGenerator` collaborator on its own
//! tokio task. The generator streams batches over an mpsc channel and every
//! batch is merged through the reconciler as it arrives.
//!
//! `stop(package)` frees the package's signatures in the tracker at once and
//! cancels the task's token. It does not wait for the generator to notice:
//! batches the generator still delivers are merged, because the tracker gates
//! the UI, not data acceptance. Only signatures the task was started for are
//! merged; anything else the generator returns is dropped. Stopped tasks keep
//! their join handle so `shutdown` can wait for their last batches.
//!
//! Lock order is `tasks` then editor state.

use crate::error::EngineResult;
use crate::modeling::session::SharedEditorState;
use crate::sync::broadcaster::StateBroadcaster;
use crate::types::{GeneratedBatch, ModelGenerator};
use mrva_common::events::ExternalApiUsage;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Batches buffered between a generator and the merge loop
const BATCH_CHANNEL_CAPACITY: usize = 16;

struct GenerationTask {
    id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Starts, stops and tracks generation tasks for one editor session
#[derive(Clone)]
pub struct GenerationCoordinator {
    state: SharedEditorState,
    broadcaster: StateBroadcaster,
    generator: Arc<dyn ModelGenerator>,
    tasks: Arc<Mutex<HashMap<String, GenerationTask>>>,
    /// Canceled tasks that may still be merging late batches
    stopped: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl GenerationCoordinator {
    pub(crate) fn new(
        state: SharedEditorState,
        broadcaster: StateBroadcaster,
        generator: Arc<dyn ModelGenerator>,
    ) -> Self {
        Self {
            state,
            broadcaster,
            generator,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            stopped: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Start generation for `package`
    ///
    /// Returns `Ok(false)` when a task for the package is already running or
    /// there is nothing left to generate. Fails with a conflict, changing
    /// nothing, if a candidate signature is in progress for another package.
    pub async fn start(&self, package: &str) -> EngineResult<bool> {
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(package) {
            debug!(package, "Generation already running");
            return Ok(false);
        }

        let usages = {
            let mut state = self.state.lock().await;
            let usages = state.generation_candidates(package);
            if usages.is_empty() {
                info!(package, "No signatures left to generate");
                return Ok(false);
            }

            let signatures: Vec<String> = usages.iter().map(|u| u.signature.clone()).collect();
            if let Err(e) = state.tracker.start(package, &signatures) {
                warn!(package, error = %e, "Generation refused");
                return Err(e.into());
            }
            self.broadcaster.publish_in_progress(state.tracker.current());
            usages
        };

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        info!(package, task_id = %id, signature_count = usages.len(), "Model generation started");

        let handle = tokio::spawn(self.clone().run(package.to_string(), id, usages, cancel.clone()));
        tasks.insert(package.to_string(), GenerationTask { id, cancel, handle });
        Ok(true)
    }

    /// Stop generation for `package`
    ///
    /// Returns whether anything was running or in progress for it.
    pub async fn stop(&self, package: &str) -> bool {
        let task = self.tasks.lock().await.remove(package);
        let had_task = task.is_some();
        if let Some(task) = task {
            task.cancel.cancel();
            info!(package, task_id = %task.id, "Model generation stopped");

            let mut stopped = self.stopped.lock().await;
            stopped.retain(|handle| !handle.is_finished());
            stopped.push(task.handle);
        }

        let mut state = self.state.lock().await;
        let freed = state.tracker.stop(package);
        self.broadcaster.publish_in_progress(state.tracker.current());
        freed || had_task
    }

    pub async fn is_running(&self, package: &str) -> bool {
        self.tasks.lock().await.contains_key(package)
    }

    /// Cancel every task and wait for each to finish
    ///
    /// Tasks stopped earlier are waited for too, so no batch is merged after
    /// this returns.
    pub async fn shutdown(&self) {
        loop {
            let running: Vec<(String, GenerationTask)> = self.tasks.lock().await.drain().collect();
            let stopped: Vec<JoinHandle<()>> = self.stopped.lock().await.drain(..).collect();
            if running.is_empty() && stopped.is_empty() {
                break;
            }

            for (package, task) in running {
                task.cancel.cancel();
                if let Err(e) = task.handle.await {
                    warn!(package = %package, error = %e, "Generation task ended abnormally");
                }
            }
            for handle in stopped {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Stopped generation task ended abnormally");
                }
            }
        }

        let mut state = self.state.lock().await;
        let packages: Vec<String> = state.tracker.current().packages().keys().cloned().collect();
        for package in packages {
            state.tracker.stop(&package);
        }
        self.broadcaster.publish_in_progress(state.tracker.current());
    }

    async fn run(
        self,
        package: String,
        id: Uuid,
        usages: Vec<ExternalApiUsage>,
        cancel: CancellationToken,
    ) {
        let (tx, mut rx) = mpsc::channel::<GeneratedBatch>(BATCH_CHANNEL_CAPACITY);
        let candidates: BTreeSet<String> = usages.iter().map(|u| u.signature.clone()).collect();

        let generate = self.generator.generate(&package, usages, tx, cancel.clone());
        let merge = async {
            let mut batches = 0usize;
            while let Some(mut batch) = rx.recv().await {
                let received = batch.len();
                batch.retain(|signature, _| candidates.contains(signature));
                if batch.len() < received {
                    debug!(
                        package = %package,
                        task_id = %id,
                        dropped = received - batch.len(),
                        "Ignoring generated models outside this task"
                    );
                }
                if batch.is_empty() {
                    continue;
                }

                let mut state = self.state.lock().await;
                state.reconciler.apply_generated(&package, batch);
                self.broadcaster.publish_modeled(&state.reconciler);
                batches += 1;
            }
            batches
        };
        let (result, batches) = tokio::join!(generate, merge);

        match result {
            Ok(()) => {
                info!(package = %package, task_id = %id, batches, "Model generation finished");
            }
            Err(_) if cancel.is_cancelled() => {
                debug!(package = %package, task_id = %id, "Generator returned after cancellation");
            }
            Err(e) => {
                warn!(package = %package, task_id = %id, error = %e, "Model generation failed");
                self.broadcaster.publish_generation_failed(&package, e.to_string());
            }
        }

        self.finish(&package, id).await;
    }

    /// Release the package if `id` is still its current task
    async fn finish(&self, package: &str, id: Uuid) {
        let mut tasks = self.tasks.lock().await;
        let current = tasks.get(package).map(|t| t.id == id).unwrap_or(false);
        if !current {
            return;
        }
        tasks.remove(package);

        let mut state = self.state.lock().await;
        if state.tracker.stop(package) {
            self.broadcaster.publish_in_progress(state.tracker.current());
        }
    }
}
