//! Outbound notification vocabulary, modeled on a per-concern notification
//! publisher (`ComputedValueInfoRegistry` publishing `ComputedValueExpressions`
//! batches), generalized here to every outbound event kind a session can
//! subscribe to.

use protocol::prelude::*;

/// One expression whose cached result changed or was reaffirmed by a cache
/// hit, as reported to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpressionUpdate {
    /// The expression this update is about.
    pub expression_id: ExpressionId,
    /// Its current result.
    pub result: ExpressionResult,
}

/// A message the runtime emits to subscribed sessions.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// One or more expressions in `context_id` changed.
    ExpressionUpdates { context_id: ContextId, updates: Vec<ExpressionUpdate> },
    /// `context_id` reached a fixed point.
    ExecutionComplete { context_id: ContextId },
    /// `context_id`'s evaluation terminated without reaching a fixed point.
    ExecutionFailed { context_id: ContextId, failure: ExecutionFailure },
    /// Non-fatal diagnostics produced while evaluating `context_id`.
    ExecutionStatus { context_id: ContextId, diagnostics: Vec<Diagnostic> },
    /// A visualization produced a fresh binary payload.
    VisualizationUpdate { context_id: ContextId, visualization_id: VisualizationId, expression_id: ExpressionId, data: Vec<u8> },
    /// A visualization's preprocessing expression failed to evaluate. The
    /// visualization remains attached; the next cache event retries.
    VisualizationEvaluationFailed {
        context_id: ContextId,
        visualization_id: VisualizationId,
        expression_id: ExpressionId,
        message: String,
        diagnostic: Option<Diagnostic>,
    },
    /// The suggestions index advanced to a new version.
    SuggestionsDatabaseUpdate { updates: Vec<SuggestionUpdate>, current_version: u64 },
}

impl Notification {
    /// Whether this notification must never be dropped or coalesced by
    /// backpressure handling: terminal and diagnostic events.
    pub fn is_terminal_or_diagnostic(&self) -> bool {
        matches!(
            self,
            Notification::ExecutionComplete { .. }
                | Notification::ExecutionFailed { .. }
                | Notification::ExecutionStatus { .. }
        )
    }

    /// The context this notification concerns, if any (suggestions-database
    /// updates are process-wide, not per-context).
    pub fn context_id(&self) -> Option<ContextId> {
        match self {
            Notification::ExpressionUpdates { context_id, .. }
            | Notification::ExecutionComplete { context_id }
            | Notification::ExecutionFailed { context_id, .. }
            | Notification::ExecutionStatus { context_id, .. }
            | Notification::VisualizationUpdate { context_id, .. }
            | Notification::VisualizationEvaluationFailed { context_id, .. } => Some(*context_id),
            Notification::SuggestionsDatabaseUpdate { .. } => None,
        }
    }
}
