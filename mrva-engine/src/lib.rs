//! mrva-engine: orchestration and reconciliation engine
//!
//! Drives multi-repository variant analysis runs and keeps a modeled-API
//! editing session consistent while background generation and user edits
//! write to it concurrently.
//!
//! Everything hangs off an explicitly constructed [`SessionContext`]; there
//! is no global state.

pub mod context;
pub mod error;
pub mod modeling;
pub mod run;
pub mod sync;
pub mod types;

pub use context::SessionContext;
pub use error::{ConflictError, EngineError, EngineResult, RunError};
