//! Modeled-method editing
//!
//! - `in_progress` - per-package generation exclusivity
//! - `reconciler` - merge policy for generated results vs. user edits
//! - `generation` - background generation tasks
//! - `session` - the editor session tying them together

pub mod generation;
pub mod in_progress;
pub mod reconciler;
pub mod session;

pub use generation::GenerationCoordinator;
pub use in_progress::{InProgressMethods, InProgressTracker};
pub use reconciler::{MergeReport, ModelStateReconciler};
pub use session::{ModelEditor, ModelEditorState};
