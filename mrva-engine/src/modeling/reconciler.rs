//! Model state reconciliation
//!
//! Owns the modeled-method map and the modified-signature set. These are
//! written only through `load_initial`, `apply_generated`, `apply_user_edit`
//! and `mark_saved`.
//!
//! Merge rule for generated results: an incoming model replaces the current
//! entry when the entry is absent, is of kind `none`, or still equals the last
//! model generation produced for that signature. A non-`none` model the user
//! set is never replaced by generation.

use crate::types::GeneratedBatch;
use mrva_common::events::ModeledMethod;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Outcome of merging one generated batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Signatures whose model was replaced
    pub applied: Vec<String>,
    /// Signatures kept because the user modeled them
    pub preserved: Vec<String>,
}

/// Modeled methods plus dirty tracking for one editing session
#[derive(Debug, Clone, Default)]
pub struct ModelStateReconciler {
    methods: BTreeMap<String, ModeledMethod>,
    /// Last model generation wrote per signature, cleared by user edits
    last_generated: HashMap<String, ModeledMethod>,
    modified: BTreeSet<String>,
}

impl ModelStateReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed models; entries already present win on collision
    pub fn load_initial<I>(&mut self, methods: I)
    where
        I: IntoIterator<Item = ModeledMethod>,
    {
        for method in methods {
            self.methods
                .entry(method.signature.clone())
                .or_insert(method);
        }
    }

    /// Merge generated models for `package`
    pub fn apply_generated(&mut self, package: &str, batch: GeneratedBatch) -> MergeReport {
        let mut report = MergeReport::default();

        for (signature, mut incoming) in batch {
            incoming.signature = signature.clone();

            if !self.accepts_generated(&signature) {
                report.preserved.push(signature);
                continue;
            }

            self.last_generated.insert(signature.clone(), incoming.clone());
            self.methods.insert(signature.clone(), incoming);
            self.modified.insert(signature.clone());
            report.applied.push(signature);
        }

        debug!(
            package,
            applied = report.applied.len(),
            preserved = report.preserved.len(),
            "Generated models merged"
        );
        report
    }

    /// Overwrite the model for `signature` with a user edit
    pub fn apply_user_edit(&mut self, signature: &str, mut model: ModeledMethod) {
        model.signature = signature.to_string();
        self.last_generated.remove(signature);
        self.methods.insert(signature.to_string(), model);
        self.modified.insert(signature.to_string());
    }

    /// Clear `signatures` from the modified set after a confirmed save
    pub fn mark_saved<'a, I>(&mut self, signatures: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for signature in signatures {
            self.modified.remove(signature);
        }
    }

    /// Whether generation may replace the current model for `signature`
    pub fn accepts_generated(&self, signature: &str) -> bool {
        match self.methods.get(signature) {
            None => true,
            Some(existing) if existing.is_none() => true,
            Some(existing) => self.last_generated.get(signature) == Some(existing),
        }
    }

    pub fn get(&self, signature: &str) -> Option<&ModeledMethod> {
        self.methods.get(signature)
    }

    pub fn methods(&self) -> &BTreeMap<String, ModeledMethod> {
        &self.methods
    }

    pub fn modified_signatures(&self) -> &BTreeSet<String> {
        &self.modified
    }

    pub fn is_modified(&self, signature: &str) -> bool {
        self.modified.contains(signature)
    }
}
