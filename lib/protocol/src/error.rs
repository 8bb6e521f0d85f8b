//! The runtime's single error taxonomy.
//!
//! Every variant carries a stable integer wire code via [`RuntimeError::code`]
//! — the single source of truth for that code. Codes are never renumbered
//! once assigned; a retired variant's number is retired with it rather than
//! reused.

use crate::capability::Capability;
use crate::types::ContextId;
use crate::types::Diagnostic;
use crate::types::VisualizationId;
use crate::suggestions::SuggestionEntryId;
use thiserror::Error;

/// The runtime's error type.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RuntimeError {
    /// A request arrived before the session completed initialization.
    #[error("session is not initialized")]
    SessionNotInitialized,

    /// Initialization was requested twice for the same session.
    #[error("session is already initialized")]
    SessionAlreadyInitialized,

    /// The session does not hold the capability a request required.
    #[error("access denied: missing capability {capability:?}")]
    AccessDenied {
        /// The capability that would have authorized the request.
        capability: Capability,
    },

    /// A request to release a capability the session never acquired.
    #[error("capability {capability:?} was not acquired")]
    CapabilityNotAcquired {
        /// The capability named by the request.
        capability: Capability,
    },

    /// No execution context exists with the given id.
    #[error("context {0} not found")]
    ContextNotFound(ContextId),

    /// A stack operation referenced a frame that does not exist.
    #[error("stack item not found")]
    StackItemNotFound,

    /// An operation requiring a non-empty stack was attempted on an empty
    /// one.
    #[error("execution stack is empty")]
    EmptyStack,

    /// A pushed frame was structurally invalid (e.g. a `LocalCall` pushed
    /// onto an empty stack).
    #[error("invalid stack item: {reason}")]
    InvalidStackItem {
        /// Why the item was rejected.
        reason: String,
    },

    /// Evaluation of a context failed outright (not a dataflow error, which
    /// is reported as a value, but a hard evaluator failure).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// No visualization exists with the given id.
    #[error("visualization {0} not found")]
    VisualizationNotFound(VisualizationId),

    /// A visualization's preprocessing expression failed.
    #[error("visualization expression failed: {}", diagnostic.message)]
    VisualizationExpressionError {
        /// The diagnostic describing the failure.
        diagnostic: Diagnostic,
    },

    /// The suggestions index could not apply an update.
    #[error("suggestions database error: {0}")]
    SuggestionsDatabaseError(String),

    /// A module name referenced by a request could not be resolved.
    #[error("module name not resolved: {0}")]
    ModuleNameNotResolved(String),

    /// No suggestion entry exists with the given id.
    #[error("suggestion {0} not found")]
    SuggestionNotFound(SuggestionEntryId),

    /// The context this request targeted has since been destroyed.
    #[error("context was destroyed")]
    ContextDestroyed,
}

impl RuntimeError {
    /// The stable wire code for this error kind.
    pub fn code(&self) -> u32 {
        match self {
            RuntimeError::SessionNotInitialized => 1000,
            RuntimeError::SessionAlreadyInitialized => 1001,
            RuntimeError::AccessDenied { .. } => 1002,
            RuntimeError::CapabilityNotAcquired { .. } => 1003,
            RuntimeError::ContextNotFound(_) => 2000,
            RuntimeError::StackItemNotFound => 2001,
            RuntimeError::EmptyStack => 2002,
            RuntimeError::InvalidStackItem { .. } => 2003,
            RuntimeError::ExecutionFailed(_) => 2004,
            RuntimeError::VisualizationNotFound(_) => 3000,
            RuntimeError::VisualizationExpressionError { .. } => 3001,
            RuntimeError::SuggestionsDatabaseError(_) => 4000,
            RuntimeError::ModuleNameNotResolved(_) => 4001,
            RuntimeError::SuggestionNotFound(_) => 4002,
            RuntimeError::ContextDestroyed => 2005,
        }
    }
}

/// The result type used throughout the runtime's public APIs.
pub type FallibleResult<T> = Result<T, RuntimeError>;
