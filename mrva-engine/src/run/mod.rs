//! Variant analysis runs
//!
//! - `registry` - one terminal outcome per repository
//! - `classifier` - disjoint skip groups with authoritative counts
//! - `state_machine` - run lifecycle and snapshots
//! - `monitor` - submission and timer-driven status polling

pub mod classifier;
pub mod monitor;
pub mod registry;
pub mod state_machine;

pub use classifier::SkipClassifier;
pub use monitor::{MonitorOutcome, RunHandle, RunMonitor, UpdateSummary};
pub use registry::{RecordResult, RepositoryResultRegistry};
pub use state_machine::{StateTransition, VariantAnalysisRun};
