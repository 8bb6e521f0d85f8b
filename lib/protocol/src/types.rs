//! Core data-model types shared by every component: the identifiers, the
//! stack-frame and expression-result shapes, and the visualization and
//! diagnostic payloads.
//!
//! These are intentionally transport-agnostic: nothing here assumes JSON, a
//! particular RPC framing, or a particular wire encoding. `serde` derives
//! are provided because *some* front-end will want to serialize these, not
//! because this crate picks one.

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ===================
// === Identifiers ===
// ===================

/// Identifier of an expression within a module's AST.
///
/// Stable across edits that do not touch the identified subtree.
pub type ExpressionId = Uuid;

/// Identifier of an execution context.
pub type ContextId = Uuid;

/// Identifier of a visualization attached to some expression.
pub type VisualizationId = Uuid;

/// Identifier of a connected client session, scoping capability grants and
/// notification subscriptions.
pub type SessionId = Uuid;

/// A stable identifier assigned by the compiler to a suggestion entry,
/// distinct from the index's own [`crate::suggestions::SuggestionEntryId`]:
/// the external id survives a reparse that reallocates local ids, so the
/// compiler can report updates against entries it described earlier.
pub type ExternalId = Uuid;

// =====================
// === MethodPointer ===
// =====================

/// A structural reference to a method definition: the module it lives in,
/// the type it is defined on, and its name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodPointer {
    /// The qualified name of the module defining this method.
    pub module: String,
    /// The type the method is defined on (e.g. `Number`, or a module name
    /// for a static/module-level method).
    pub defined_on_type: String,
    /// The method's own name.
    pub name: String,
}

/// The resolved target of a call site, plus which of its arguments have not
/// yet been supplied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCallInfo {
    /// The method this call site resolved to.
    pub method: MethodPointer,
    /// Indices (into the call's argument list) of arguments not yet applied.
    pub missing_arguments: Vec<usize>,
}

// ===================
// === StackFrame =====
// ===================

/// One item in an execution context's call stack.
///
/// The bottom-most frame of a non-empty stack is always an `ExplicitCall`;
/// every frame above it is a `LocalCall` descending into an expression of
/// the frame below.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StackFrame {
    /// A call into a top-level method definition, naming the method and the
    /// source-text expressions supplying `this` and the positional
    /// arguments.
    #[serde(rename_all = "camelCase")]
    ExplicitCall {
        method_ptr: MethodPointer,
        this_arg: Option<String>,
        positional_args: Vec<String>,
    },
    /// A descent into one of the calling frame's already-evaluated
    /// expressions.
    #[serde(rename_all = "camelCase")]
    LocalCall { expression_id: ExpressionId },
}

impl StackFrame {
    /// `true` for the `ExplicitCall` variant.
    pub fn is_explicit_call(&self) -> bool {
        matches!(self, StackFrame::ExplicitCall { .. })
    }

    /// The expression this frame descends into, if it is a `LocalCall`.
    pub fn local_call_expression(&self) -> Option<ExpressionId> {
        match self {
            StackFrame::LocalCall { expression_id } => Some(*expression_id),
            StackFrame::ExplicitCall { .. } => None,
        }
    }
}

// ==========================
// === Execution Environment ===
// ==========================

/// Distinguishes design-time (side-effect-suppressed) from live evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionEnvironment {
    /// Side effects (e.g. writes) are suppressed; used while editing.
    Design,
    /// Full evaluation semantics.
    Live,
}

impl Default for ExecutionEnvironment {
    fn default() -> Self {
        ExecutionEnvironment::Design
    }
}

// ==========================
// === Value / payload =====
// ==========================

/// An opaque preview of a computed value.
///
/// The cache never interprets this; it is whatever short textual or binary
/// preview the Evaluator chose to attach to the result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuePreview(pub String);

impl ValuePreview {
    /// Wrap a preview string.
    pub fn new(preview: impl Into<String>) -> Self {
        Self(preview.into())
    }
}

/// A single profiling sample attached to an evaluation result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilingEvent {
    /// A human-readable label for the measured span (e.g. "parse", "eval").
    pub label: String,
    /// Wall-clock duration of the span, in nanoseconds.
    pub duration_ns: u64,
}

/// A non-fatal dataflow error produced while computing an expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataflowError {
    /// Human-readable description.
    pub message: String,
    /// The call stack active when the error was produced.
    pub trace: Vec<StackFrame>,
}

/// An evaluator panic: evaluation could not continue past this point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Panic {
    /// Human-readable description.
    pub message: String,
    /// The call stack active when the panic occurred.
    pub trace: Vec<StackFrame>,
}

/// The outcome of computing one expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExpressionPayload {
    /// A value was produced.
    Value(ValuePreview),
    /// A recoverable dataflow error occurred.
    DataflowError(DataflowError),
    /// Evaluation panicked.
    Panic(Panic),
    /// Evaluation has not completed for this expression yet.
    Pending,
}

/// Everything the cache remembers about the last time an expression was
/// computed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionResult {
    /// The typename of the computed value, e.g. "Number" or "Text".
    pub type_name: Option<String>,
    /// If this expression is a (possibly partially-applied) method call,
    /// the resolved call-site information.
    pub method_call: Option<MethodCallInfo>,
    /// Profiling samples attached to this computation.
    pub profile: Vec<ProfilingEvent>,
    /// Whether this particular result came from the cache rather than a
    /// fresh evaluation. Always `false` for freshly written entries; set to
    /// `true` only on the notification path for cache hits.
    pub from_cache: bool,
    /// The computed value, error, panic, or pending marker.
    pub payload: ExpressionPayload,
}

impl ExpressionResult {
    /// Whether `self` and `other` share the same observable type.
    ///
    /// Used to implement "quiet re-execution": a fresh computation whose
    /// type and method-call metadata are unchanged from the cached entry is
    /// not worth notifying about.
    pub fn same_observable_type(&self, other: &ExpressionResult) -> bool {
        self.type_name == other.type_name && self.method_call == other.method_call
    }
}

// ==========================
// === Visualization ========
// ==========================

/// The preprocessing expression driving a visualization: either inline
/// source text or a pointer to a predefined method.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VisualizationExpression {
    /// Inline source text, e.g. `a -> a.to_text`.
    Inline(String),
    /// A predefined method to invoke as the preprocessor.
    Method(MethodPointer),
}

/// The full description of a visualization's setup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationSpec {
    /// The expression being visualized.
    pub expression_id: ExpressionId,
    /// The module in whose lexical context `expression` should be
    /// evaluated.
    pub module: String,
    /// The preprocessing expression.
    pub expression: VisualizationExpression,
    /// Extra positional arguments passed to the preprocessing expression.
    pub positional_args: Vec<String>,
}

// ==========================
// === Diagnostics ==========
// ==========================

/// Severity of a [`Diagnostic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A warning: execution continues.
    Warning,
    /// An error: execution of the affected expression did not produce a
    /// value.
    Error,
}

/// A point-in-time problem reported by the Evaluator: either the
/// compilation step or evaluation itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Whether this is a warning or an error.
    pub kind: DiagnosticKind,
    /// Human-readable description.
    pub message: String,
    /// An optional descriptive path (module name, file label); the runtime
    /// never interprets this as a filesystem path.
    pub path: Option<String>,
    /// The source range the diagnostic applies to, if known.
    pub range: Option<Scope>,
    /// The specific expression the diagnostic applies to, if known.
    pub expression_id: Option<ExpressionId>,
    /// The call stack active when the diagnostic was produced.
    pub stack: Vec<StackFrame>,
}

// ==========================
// === Position / Scope ====
// ==========================

/// A line/column position in a module's source text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Zero-based line number.
    pub line: usize,
    /// Zero-based column (character) offset within the line.
    pub column: usize,
}

/// A half-open-by-convention lexical scope, used both to mark where a
/// `Function`/`Local` suggestion is visible and as a diagnostic's source
/// range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// The scope's first position.
    pub start: Position,
    /// The scope's last position.
    pub end: Position,
}

impl Scope {
    /// Whether `position` falls within `[start, end]`, inclusive.
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize, column: usize) -> Position {
        Position { line, column }
    }

    #[test]
    fn scope_contains_is_inclusive() {
        let scope = Scope { start: pos(1, 0), end: pos(3, 4) };
        assert!(scope.contains(pos(1, 0)));
        assert!(scope.contains(pos(2, 100)));
        assert!(scope.contains(pos(3, 4)));
        assert!(!scope.contains(pos(0, 9)));
        assert!(!scope.contains(pos(3, 5)));
    }

    #[test]
    fn same_observable_type_ignores_payload() {
        let a = ExpressionResult {
            type_name: Some("Number".into()),
            method_call: None,
            profile: vec![],
            from_cache: false,
            payload: ExpressionPayload::Value(ValuePreview::new("6")),
        };
        let b = ExpressionResult { payload: ExpressionPayload::Value(ValuePreview::new("7")), ..a.clone() };
        assert!(a.same_observable_type(&b));
        let c = ExpressionResult { type_name: Some("Text".into()), ..b };
        assert!(!a.same_observable_type(&c));
    }
}
