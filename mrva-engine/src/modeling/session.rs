//! Model editor session
//!
//! One editing session over a fixed set of external API usages. All mutable
//! editor state sits behind a single `tokio::sync::Mutex`; every publish
//! happens while that lock is held so outbound sequence numbers follow the
//! order in which state changed.

use crate::error::{EngineError, EngineResult};
use crate::modeling::generation::GenerationCoordinator;
use crate::modeling::in_progress::InProgressTracker;
use crate::modeling::reconciler::ModelStateReconciler;
use crate::sync::broadcaster::StateBroadcaster;
use crate::types::{ModelGenerator, ModelPersistence};
use mrva_common::events::{ExternalApiUsage, Mode, ModeledMethod};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Editor state shared between the session and its generation tasks
#[derive(Debug, Default)]
pub struct ModelEditorState {
    usages: BTreeMap<String, ExternalApiUsage>,
    pub(crate) reconciler: ModelStateReconciler,
    pub(crate) tracker: InProgressTracker,
    mode: Mode,
    hide_modeled_methods: bool,
}

pub(crate) type SharedEditorState = Arc<Mutex<ModelEditorState>>;

impl ModelEditorState {
    pub fn usages(&self) -> impl Iterator<Item = &ExternalApiUsage> {
        self.usages.values()
    }

    pub fn reconciler(&self) -> &ModelStateReconciler {
        &self.reconciler
    }

    pub fn tracker(&self) -> &InProgressTracker {
        &self.tracker
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn hide_modeled_methods(&self) -> bool {
        self.hide_modeled_methods
    }

    /// Usages of `package` that generation may still write
    pub(crate) fn generation_candidates(&self, package: &str) -> Vec<ExternalApiUsage> {
        self.usages
            .values()
            .filter(|u| u.package_name == package)
            .filter(|u| self.reconciler.accepts_generated(&u.signature))
            .cloned()
            .collect()
    }
}

/// Model editor session
pub struct ModelEditor {
    state: SharedEditorState,
    broadcaster: StateBroadcaster,
    persistence: Arc<dyn ModelPersistence>,
    generation: GenerationCoordinator,
}

impl ModelEditor {
    pub fn new(
        broadcaster: StateBroadcaster,
        persistence: Arc<dyn ModelPersistence>,
        generator: Arc<dyn ModelGenerator>,
    ) -> Self {
        let state: SharedEditorState = Arc::new(Mutex::new(ModelEditorState::default()));
        let generation = GenerationCoordinator::new(state.clone(), broadcaster.clone(), generator);
        Self {
            state,
            broadcaster,
            persistence,
            generation,
        }
    }

    /// Seed the session with its usages and the models already on disk
    pub async fn load(&self, usages: Vec<ExternalApiUsage>, methods: Vec<ModeledMethod>) {
        let mut state = self.state.lock().await;
        for usage in usages {
            state.usages.entry(usage.signature.clone()).or_insert(usage);
        }
        state.reconciler.load_initial(methods);

        info!(
            usages = state.usages.len(),
            methods = state.reconciler.methods().len(),
            "Model editor loaded"
        );
        self.publish_locked(&state);
    }

    /// Record user edits that differ from the current models
    ///
    /// Returns the number of signatures changed.
    pub async fn set_modeled_methods(&self, methods: BTreeMap<String, ModeledMethod>) -> usize {
        let mut state = self.state.lock().await;
        let changed = apply_edits(&mut state.reconciler, methods);
        if changed > 0 {
            debug!(signature_count = changed, "User edits applied");
            self.broadcaster.publish_modeled(&state.reconciler);
        }
        changed
    }

    /// Persist `signatures`, taking models from `methods` where given
    ///
    /// The lock is released while the persistence collaborator runs. Only
    /// signatures whose model is unchanged when the save completes are
    /// cleared from the modified set; edits made meanwhile stay dirty.
    /// Returns the signatures marked saved.
    pub async fn save(
        &self,
        signatures: Vec<String>,
        methods: BTreeMap<String, ModeledMethod>,
    ) -> EngineResult<Vec<String>> {
        let signatures: BTreeSet<String> = signatures.into_iter().collect();
        let (usages, models) = {
            let mut state = self.state.lock().await;
            let edits: BTreeMap<String, ModeledMethod> = methods
                .into_iter()
                .filter(|(signature, _)| signatures.contains(signature))
                .collect();
            if apply_edits(&mut state.reconciler, edits) > 0 {
                self.broadcaster.publish_modeled(&state.reconciler);
            }

            let mut usages = Vec::with_capacity(signatures.len());
            let mut models = Vec::with_capacity(signatures.len());
            for signature in &signatures {
                let Some(model) = state.reconciler.get(signature) else {
                    debug!(signature = %signature, "No model to save, skipping");
                    continue;
                };
                let Some(usage) = state.usages.get(signature) else {
                    warn!(signature = %signature, "Model has no matching usage, not saving it");
                    continue;
                };
                usages.push(usage.clone());
                models.push(model.clone());
            }
            (usages, models)
        };

        if let Err(e) = self.persistence.save(&usages, &models).await {
            warn!(signature_count = models.len(), error = %e, "Saving modeled methods failed");
            return Err(EngineError::PersistenceFailure(e.to_string()));
        }

        let mut state = self.state.lock().await;
        let saved: Vec<String> = models
            .into_iter()
            .filter(|model| state.reconciler.get(&model.signature) == Some(model))
            .map(|model| model.signature)
            .collect();
        state.reconciler.mark_saved(&saved);

        info!(signature_count = saved.len(), "Modeled methods saved");
        self.broadcaster.publish_modeled(&state.reconciler);
        Ok(saved)
    }

    /// Start background generation for `package`
    pub async fn generate(&self, package: &str) -> EngineResult<bool> {
        self.generation.start(package).await
    }

    /// Stop background generation for `package`
    pub async fn stop_generate(&self, package: &str) -> bool {
        self.generation.stop(package).await
    }

    pub async fn switch_mode(&self, mode: Mode) {
        let mut state = self.state.lock().await;
        if state.mode != mode {
            info!(?mode, "Model editor mode switched");
        }
        state.mode = mode;
        self.broadcaster.publish_view_state(state.mode, state.hide_modeled_methods);
    }

    /// Flip the hide-modeled flag, returning the new value
    pub async fn toggle_hide_modeled(&self) -> bool {
        let mut state = self.state.lock().await;
        state.hide_modeled_methods = !state.hide_modeled_methods;
        self.broadcaster.publish_view_state(state.mode, state.hide_modeled_methods);
        state.hide_modeled_methods
    }

    /// Re-send every editor view
    pub async fn publish_all(&self) {
        let state = self.state.lock().await;
        self.publish_locked(&state);
    }

    /// Read access to the editor state
    pub async fn with_state<R>(&self, f: impl FnOnce(&ModelEditorState) -> R) -> R {
        let state = self.state.lock().await;
        f(&state)
    }

    pub fn generation(&self) -> &GenerationCoordinator {
        &self.generation
    }

    /// Cancel every generation task and wait for them to finish
    pub async fn shutdown(&self) {
        self.generation.shutdown().await;
    }

    fn publish_locked(&self, state: &ModelEditorState) {
        self.broadcaster
            .publish_usages(state.usages.values().cloned().collect());
        self.broadcaster.publish_modeled(&state.reconciler);
        self.broadcaster.publish_in_progress(state.tracker.current());
        self.broadcaster
            .publish_view_state(state.mode, state.hide_modeled_methods);
    }
}

/// Apply each edit that differs from the current model
fn apply_edits(reconciler: &mut ModelStateReconciler, methods: BTreeMap<String, ModeledMethod>) -> usize {
    let mut changed = 0;
    for (signature, mut model) in methods {
        model.signature = signature.clone();
        if reconciler.get(&signature) == Some(&model) {
            continue;
        }
        reconciler.apply_user_edit(&signature, model);
        changed += 1;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrva_common::events::{ModeledMethodKind, Provenance};

    #[test]
    fn test_apply_edits_skips_unchanged_models() {
        let mut reconciler = ModelStateReconciler::new();
        let saved = ModeledMethod::new("s1", ModeledMethodKind::Sink, "Argument[0]", "", Provenance::Manual);
        reconciler.load_initial(vec![saved.clone()]);

        let mut edits = BTreeMap::new();
        edits.insert("s1".to_string(), saved);
        edits.insert("s2".to_string(), ModeledMethod::none("s2"));

        assert_eq!(apply_edits(&mut reconciler, edits), 1);
        assert!(!reconciler.is_modified("s1"));
        assert!(reconciler.is_modified("s2"));
    }

    #[test]
    fn test_generation_candidates_exclude_protected_models() {
        let mut state = ModelEditorState::default();
        for (signature, package) in [("a", "pkg"), ("b", "pkg"), ("c", "other")] {
            state.usages.insert(
                signature.to_string(),
                ExternalApiUsage {
                    signature: signature.to_string(),
                    package_name: package.to_string(),
                    library: "lib".to_string(),
                    supported: false,
                    usage_count: 1,
                },
            );
        }
        state.reconciler.apply_user_edit(
            "a",
            ModeledMethod::new("a", ModeledMethodKind::Source, "", "ReturnValue", Provenance::Manual),
        );

        let candidates: Vec<String> = state
            .generation_candidates("pkg")
            .into_iter()
            .map(|u| u.signature)
            .collect();
        assert_eq!(candidates, vec!["b".to_string()]);
    }
}
