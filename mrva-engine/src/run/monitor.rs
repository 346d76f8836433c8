//! Run submission and status monitoring
//!
//! Submits a run to the job source, then polls it on a timer until the job
//! source reports a conclusion, the user cancels, or the attempt budget runs
//! out. Every accepted outcome and every transition pushes a fresh snapshot.
//!
//! Monitoring runs in its own task (see [`RunMonitor::spawn`]) so polling never
//! blocks the dispatch of unrelated inbound messages.

use crate::error::{EngineError, EngineResult, RunError};
use crate::run::registry::RecordResult;
use crate::run::state_machine::{StateTransition, VariantAnalysisRun};
use crate::sync::broadcaster::StateBroadcaster;
use crate::types::{JobSource, RunRequest, RunUpdate};
use mrva_common::config::MonitorConfig;
use mrva_common::events::RunState;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How monitoring of a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Job source reported a conclusion
    Concluded(RunState),
    /// User canceled the run
    Canceled,
    /// Attempt budget exhausted; run state left unchanged
    GaveUp { attempts: u32 },
}

/// What applying one update did
#[derive(Debug, Default)]
pub struct UpdateSummary {
    pub recorded: usize,
    pub duplicates: usize,
    pub rejected: Vec<RunError>,
    pub transition: Option<StateTransition>,
}

/// Submits runs and drives them to completion
pub struct RunMonitor {
    source: Arc<dyn JobSource>,
    broadcaster: StateBroadcaster,
    config: MonitorConfig,
}

impl RunMonitor {
    pub fn new(source: Arc<dyn JobSource>, broadcaster: StateBroadcaster, config: MonitorConfig) -> Self {
        Self {
            source,
            broadcaster,
            config,
        }
    }

    /// Submit a run and record the repositories skipped at submission time
    ///
    /// Returns the run in the InProgress state.
    pub async fn submit(&self, request: RunRequest) -> EngineResult<VariantAnalysisRun> {
        let submitted = self.source.submit(&request).await?;

        info!(
            run_id = %submitted.run_id,
            query = %request.query.query_name,
            repositories = submitted.repositories.len(),
            skipped = submitted.skipped.len(),
            "Variant analysis submitted"
        );

        let mut repositories = submitted.repositories;
        repositories.extend(submitted.skipped.iter().map(|e| e.repository.clone()));

        let mut run = VariantAnalysisRun::new(submitted.run_id, request.query, repositories);
        self.broadcaster.publish_run(&run);

        self.apply_update(
            &mut run,
            RunUpdate {
                outcomes: submitted.skipped,
                conclusion: None,
            },
        );

        run.start()?;
        self.broadcaster.publish_run(&run);
        Ok(run)
    }

    /// Apply one batch of outcomes and an optional conclusion
    ///
    /// Rejected outcomes leave the run unchanged and are returned in the summary.
    pub fn apply_update(&self, run: &mut VariantAnalysisRun, update: RunUpdate) -> UpdateSummary {
        let mut summary = UpdateSummary::default();

        for event in update.outcomes {
            let repository = event.repository.full_name.clone();
            let tag = event.outcome.tag();
            match run.apply_outcome(event) {
                Ok(RecordResult::Recorded) => {
                    debug!(run_id = %run.run_id(), repository = %repository, outcome = tag, "Outcome recorded");
                    summary.recorded += 1;
                    self.broadcaster.publish_run(run);
                }
                Ok(RecordResult::Duplicate) => {
                    summary.duplicates += 1;
                }
                Err(e) => {
                    warn!(run_id = %run.run_id(), repository = %repository, error = %e, "Outcome rejected");
                    summary.rejected.push(e);
                }
            }
        }

        if let Some(conclusion) = update.conclusion {
            if run.state() == RunState::Canceled {
                debug!(run_id = %run.run_id(), ?conclusion, "Ignoring conclusion for canceled run");
            } else {
                match run.conclude(conclusion) {
                    Ok(transition) => {
                        self.broadcaster.publish_run(run);
                        summary.transition = Some(transition);
                    }
                    Err(e) => {
                        warn!(run_id = %run.run_id(), error = %e, "Conclusion rejected");
                        summary.rejected.push(e);
                    }
                }
            }
        }

        summary
    }

    /// Poll until the run concludes, is canceled, or the attempt budget runs out
    pub async fn monitor(
        &self,
        run: &mut VariantAnalysisRun,
        cancel: &CancellationToken,
    ) -> EngineResult<MonitorOutcome> {
        if run.is_terminal() {
            return Ok(MonitorOutcome::Concluded(run.state()));
        }

        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempts: u32 = 0;
        let run_id = run.run_id();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancel_run(run).await,
                _ = interval.tick() => {}
            }

            if attempts >= self.config.max_poll_attempts {
                warn!(%run_id, attempts, "Giving up monitoring run");
                return Ok(MonitorOutcome::GaveUp { attempts });
            }
            attempts += 1;

            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancel_run(run).await,
                polled = self.source.poll(run_id) => polled,
            };

            match polled {
                Ok(update) => {
                    self.apply_update(run, update);
                    if run.is_terminal() {
                        return Ok(MonitorOutcome::Concluded(run.state()));
                    }
                }
                Err(e) => {
                    warn!(%run_id, attempt = attempts, error = %e, "Status poll failed, retrying");
                }
            }
        }
    }

    /// Spawn monitoring of `run` on its own task
    pub fn spawn(self: Arc<Self>, mut run: VariantAnalysisRun) -> RunHandle {
        let cancel = CancellationToken::new();
        let run_id = run.run_id();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let outcome = self.monitor(&mut run, &token).await?;
            Ok::<_, EngineError>((run, outcome))
        });

        RunHandle {
            run_id,
            cancel,
            task,
        }
    }

    async fn cancel_run(&self, run: &mut VariantAnalysisRun) -> EngineResult<MonitorOutcome> {
        let run_id = run.run_id();
        info!(%run_id, "Run cancellation requested");

        if let Err(e) = self.source.cancel(run_id).await {
            warn!(%run_id, error = %e, "Job source did not acknowledge cancellation");
        }

        match run.cancel() {
            Ok(_) => {
                self.broadcaster.publish_run(run);
            }
            Err(e) => {
                warn!(%run_id, error = %e, "Run could not be canceled");
                return Ok(MonitorOutcome::Concluded(run.state()));
            }
        }

        // Repositories may have finished before the cancellation was observed
        match self.source.poll(run_id).await {
            Ok(update) => {
                self.apply_update(run, update);
            }
            Err(e) => {
                warn!(%run_id, error = %e, "Final poll after cancellation failed");
            }
        }

        Ok(MonitorOutcome::Canceled)
    }
}

/// Handle to a run monitored on its own task
pub struct RunHandle {
    run_id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<EngineResult<(VariantAnalysisRun, MonitorOutcome)>>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Request cancellation; the monitor task performs the transition
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for monitoring to finish
    pub async fn join(self) -> EngineResult<(VariantAnalysisRun, MonitorOutcome)> {
        self.task.await.map_err(|e| {
            EngineError::Common(mrva_common::Error::Internal(format!(
                "run monitor task failed: {}",
                e
            )))
        })?
    }
}
