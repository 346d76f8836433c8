//! Error types for mrva-engine
//!
//! Conflicts and persistence failures are recoverable and leave state
//! untouched. Protocol violations fail only the offending message.
//! A canceled run is a normal terminal state, not an error.

use mrva_common::events::{RepositoryOutcome, RunState};
use mrva_common::protocol::ProtocolError;
use thiserror::Error;

/// A signature is already being generated under another package
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("signature '{signature}' is already being generated for package '{owning_package}' (requested by '{requested_package}')")]
pub struct ConflictError {
    pub signature: String,
    pub requested_package: String,
    pub owning_package: String,
}

/// Run state machine violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// Lifecycle transition not allowed from the current state
    #[error("invalid run transition from {from} to {to}")]
    InvalidTransition { from: RunState, to: RunState },

    /// A different outcome is already recorded for this repository
    #[error("repository '{repository}' already has outcome '{}', refusing '{}'", .recorded.tag(), .incoming.tag())]
    OutcomeConflict {
        repository: String,
        recorded: RepositoryOutcome,
        incoming: RepositoryOutcome,
    },

    /// Outcome for a repository the run never targeted
    #[error("repository '{0}' is not targeted by this run")]
    UnknownRepository(String),

    /// Run finished and is read-only
    #[error("run is retired in state {state}")]
    Retired { state: RunState },
}

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Generation conflict (recoverable, no state change)
    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// Inbound message kind is not part of the protocol
    #[error("Unknown message kind: {0}")]
    UnknownMessageKind(String),

    /// Inbound envelope speaks another protocol version
    #[error("Unsupported protocol version {found} (expected {expected})")]
    UnsupportedProtocolVersion { expected: u32, found: u32 },

    /// Inbound message could not be decoded
    #[error("Malformed message: {0}")]
    MalformedMessage(#[source] ProtocolError),

    /// Save did not complete; modified signatures are kept
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// Run state machine violation
    #[error("Run error: {0}")]
    Run(#[from] RunError),

    /// mrva-common error
    #[error("Common error: {0}")]
    Common(#[from] mrva_common::Error),

    /// External collaborator failure
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl From<ProtocolError> for EngineError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownKind(kind) => EngineError::UnknownMessageKind(kind),
            ProtocolError::UnsupportedVersion { expected, found } => {
                EngineError::UnsupportedProtocolVersion { expected, found }
            }
            other => EngineError::MalformedMessage(other),
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
