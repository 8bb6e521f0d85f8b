//! The `Evaluator` contract: the boundary between this crate's runtime
//! model and whatever actually runs code.
//!
//! Per the runtime's scope, nothing in this workspace implements an
//! evaluator — only the trait and the job/event vocabulary it communicates
//! through. A production build plugs in a real interpreter; tests plug in a
//! scriptable fake (see `runtime`'s test-support module).

use crate::types::Diagnostic;
use crate::types::ExecutionEnvironment;
use crate::types::ExpressionId;
use crate::types::ExpressionResult;
use crate::types::StackFrame;
use crate::types::VisualizationSpec;
use crossbeam_channel::Sender;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// A monotonically increasing tag identifying one "generation" of work
/// submitted to an Evaluator.
///
/// When a running job is cancelled and superseded, events it emits after
/// cancellation still arrive on the channel (the worker thread cannot be
/// killed mid-instruction); the actor compares an event's epoch against the
/// current one and discards anything stale. See the runtime specification's
/// cancellation-and-supersession design notes.
pub type JobEpoch = u64;

/// A cooperative cancellation flag shared between the thread that requested
/// a job and the worker thread running it.
///
/// This is a plain value, not a thread-local: callers can hold on to it,
/// inspect it, and race it against other signals without reaching into
/// implicit context.
#[derive(Clone, Debug)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A request to (re-)evaluate a call stack to a fixed point.
#[derive(Clone, Debug)]
pub struct EvaluationJob {
    /// The generation this job belongs to.
    pub epoch: JobEpoch,
    /// The call stack to evaluate, bottom frame first.
    pub stack: Vec<StackFrame>,
    /// Whether side effects should be suppressed during this run.
    pub execution_environment: ExecutionEnvironment,
}

/// A request to compute a visualization's preprocessed payload.
#[derive(Clone, Debug)]
pub struct VisualizationJob {
    /// The generation this job belongs to.
    pub epoch: JobEpoch,
    /// The call stack providing the lexical context to evaluate within.
    pub stack: Vec<StackFrame>,
    /// The visualization to compute.
    pub spec: VisualizationSpec,
}

/// Why an execution run did not produce a usable result.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecutionFailureKind {
    /// The job was cancelled before it could complete.
    Interrupted,
    /// The evaluator reported an unrecoverable problem.
    Error,
}

/// A terminal failure of an evaluation run.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionFailure {
    /// Human-readable summary.
    pub message: String,
    /// The kind of failure.
    pub kind: ExecutionFailureKind,
    /// The structured diagnostic behind this failure, if one was produced.
    pub diagnostic: Option<Diagnostic>,
}

/// One message emitted by an Evaluator while running an [`EvaluationJob`].
#[derive(Clone, Debug)]
pub enum EvaluationEvent {
    /// A value became available (or changed) for the named expression.
    ExpressionUpdated { epoch: JobEpoch, expression_id: ExpressionId, result: ExpressionResult },
    /// The evaluator found a valid cached value for this expression and
    /// chose not to recompute it. Distinct from [`EvaluationEvent::ExpressionUpdated`]
    /// because a cache hit's notification-worthiness is decided per
    /// subscriber, not per context (see `ValueCache::cache_hit_result` and
    /// `SubscriptionTracker` in the `runtime` crate).
    ExpressionCacheHit { epoch: JobEpoch, expression_id: ExpressionId },
    /// A non-fatal diagnostic (warning, recoverable compile error) was
    /// produced.
    DiagnosticReported { epoch: JobEpoch, diagnostic: Diagnostic },
    /// The job reached a fixed point and produced no further updates.
    Completed { epoch: JobEpoch },
    /// The job terminated without reaching a fixed point.
    Failed { epoch: JobEpoch, failure: ExecutionFailure },
}

/// The boundary to whatever actually executes code.
///
/// Implementations run synchronously on a dedicated worker thread and push
/// events to `events` as they become available; they must check
/// `cancellation` between units of work they can feasibly abort at.
pub trait Evaluator: Send + Sync {
    /// Run `job` to completion (or cancellation), streaming results to
    /// `events`.
    fn run(&self, job: EvaluationJob, events: Sender<EvaluationEvent>, cancellation: CancellationToken);

    /// Compute a visualization payload, blocking until it is ready.
    ///
    /// Unlike [`Evaluator::run`], this returns a single result rather than
    /// streaming, matching the one-shot nature of a visualization
    /// preprocessing computation.
    fn run_visualization(
        &self,
        job: VisualizationJob,
        cancellation: CancellationToken,
    ) -> Result<Vec<u8>, ExecutionFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_token_starts_uncancelled_and_is_idempotent() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancellation_token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
