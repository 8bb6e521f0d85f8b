//! Wire-level vocabulary shared by every runtime component: identifiers,
//! stack frames, expression results, visualization and suggestions types,
//! the `Evaluator` boundary, capability grants, and the error taxonomy.
//!
//! This crate has no opinions about concurrency, caching, or routing — it
//! only names the data those things pass around. The `runtime` crate builds
//! the actual execution engine on top of it.

pub mod capability;
pub mod error;
pub mod evaluator;
pub mod suggestions;
pub mod types;

/// Re-exports commonly needed by both producers and consumers of this
/// crate's types.
pub mod prelude {
    pub use crate::capability::Capability;
    pub use crate::capability::CapabilityGrant;
    pub use crate::error::FallibleResult;
    pub use crate::error::RuntimeError;
    pub use crate::evaluator::CancellationToken;
    pub use crate::evaluator::EvaluationEvent;
    pub use crate::evaluator::EvaluationJob;
    pub use crate::evaluator::Evaluator;
    pub use crate::evaluator::ExecutionFailure;
    pub use crate::evaluator::ExecutionFailureKind;
    pub use crate::evaluator::JobEpoch;
    pub use crate::evaluator::VisualizationJob;
    pub use crate::suggestions::ArgUpdate;
    pub use crate::suggestions::Argument;
    pub use crate::suggestions::ExportEdge;
    pub use crate::suggestions::ExportedSymbol;
    pub use crate::suggestions::FieldUpdate;
    pub use crate::suggestions::FieldUpdates;
    pub use crate::suggestions::ModuleUpdateAction;
    pub use crate::suggestions::RenamedFields;
    pub use crate::suggestions::StructuralKey;
    pub use crate::suggestions::SuggestionEntry;
    pub use crate::suggestions::SuggestionEntryId;
    pub use crate::suggestions::SuggestionUpdate;
    pub use crate::suggestions::SuggestionsDatabaseUpdate;
    pub use crate::types::ContextId;
    pub use crate::types::Diagnostic;
    pub use crate::types::DiagnosticKind;
    pub use crate::types::ExecutionEnvironment;
    pub use crate::types::ExpressionId;
    pub use crate::types::ExternalId;
    pub use crate::types::ExpressionPayload;
    pub use crate::types::ExpressionResult;
    pub use crate::types::MethodCallInfo;
    pub use crate::types::MethodPointer;
    pub use crate::types::Position;
    pub use crate::types::Scope;
    pub use crate::types::SessionId;
    pub use crate::types::StackFrame;
    pub use crate::types::ValuePreview;
    pub use crate::types::VisualizationExpression;
    pub use crate::types::VisualizationId;
    pub use crate::types::VisualizationSpec;
}
