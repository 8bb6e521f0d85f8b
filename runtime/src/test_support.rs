//! A scriptable fake [`Evaluator`] and small fixtures for exercising the
//! runtime's command surface deterministically, without a real
//! parser/interpreter or network socket.
//!
//! Modeled on a `TestWithLocalPoolExecutor`-style fixture (`set_up`-style
//! fixture construction, `when_stalled`-style explicit synchronization
//! points) adapted from an in-process future executor to this workspace's
//! thread-per-context, blocking-`Evaluator` model: instead of polling a
//! `LocalPool` to a fixed point, tests here wait on a
//! `Subscriber<Notification>` for a recognizable terminal event.

use crate::notification::Notification;
use common::prelude::*;
use crossbeam_channel::Sender;
use protocol::prelude::*;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A structural key identifying "where in the call tree" a job or
/// visualization request was made, so a script can be registered against a
/// particular stack shape rather than a literal `Vec<StackFrame>` (whose
/// `ExpressionId`s are usually generated fresh per test).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FrameKey {
    /// An `ExplicitCall` into the named method.
    Explicit(String),
    /// A `LocalCall` into the given expression.
    Local(ExpressionId),
}

/// The full stack shape a script is registered against.
pub type StackKey = Vec<FrameKey>;

fn stack_key(stack: &[StackFrame]) -> StackKey {
    stack
        .iter()
        .map(|frame| match frame {
            StackFrame::ExplicitCall { method_ptr, .. } => FrameKey::Explicit(method_ptr.name.clone()),
            StackFrame::LocalCall { expression_id } => FrameKey::Local(*expression_id),
        })
        .collect()
}

/// One step of a scripted evaluation run.
#[derive(Clone, Debug)]
pub enum Step {
    /// Emit a fresh value for `expression_id`.
    Value { expression_id: ExpressionId, type_name: &'static str, preview: &'static str },
    /// Emit a method-call result for `expression_id`.
    MethodCall { expression_id: ExpressionId, type_name: &'static str, preview: &'static str, method: MethodPointer },
    /// Emit a cache hit for `expression_id` (the evaluator chose not to
    /// recompute it).
    CacheHit { expression_id: ExpressionId },
    /// Emit a non-fatal diagnostic.
    Diagnostic(Diagnostic),
    /// Spin, checking the cancellation token every millisecond, until it is
    /// set, then terminate the job as `Interrupted`. Used to simulate an
    /// infinite loop that only `interrupt()` can stop.
    SpinUntilCancelled,
}

/// A complete scripted response to one evaluation job: an ordered sequence
/// of [`Step`]s, terminated implicitly by `Completed` unless a step already
/// ends the run (`SpinUntilCancelled`).
pub type Script = Vec<Step>;

/// A scriptable, deterministic stand-in for a real interpreter.
///
/// Scripts are registered per [`StackKey`] and consumed in FIFO order: the
/// first `run()` call whose job matches a given stack shape gets the first
/// registered script for it, the second call gets the second, and so on.
/// Visualization scripts are registered per `(StackKey, module, expression
/// text)` and consumed the same way.
#[derive(Default)]
pub struct ScriptedEvaluator {
    scripts: Mutex<HashMap<StackKey, VecDeque<Script>>>,
    visualization_scripts: Mutex<HashMap<(StackKey, String), VecDeque<Result<Vec<u8>, ExecutionFailure>>>>,
}

impl ScriptedEvaluator {
    /// An evaluator with no scripts registered yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `script` as the next response to a job whose stack matches
    /// `stack`.
    pub fn push_script(&self, stack: StackKey, script: Script) {
        self.scripts.lock().unwrap().entry(stack).or_default().push_back(script);
    }

    /// Register `outcome` as the next response to a visualization job whose
    /// stack matches `stack` and whose preprocessing expression is
    /// `expression`.
    pub fn push_visualization_script(&self, stack: StackKey, expression: impl Into<String>, outcome: Result<Vec<u8>, ExecutionFailure>) {
        self.visualization_scripts.lock().unwrap().entry((stack, expression.into())).or_default().push_back(outcome);
    }

    fn value_result(type_name: &str, preview: &str, method_call: Option<MethodCallInfo>) -> ExpressionResult {
        ExpressionResult {
            type_name: Some(type_name.to_string()),
            method_call,
            profile: vec![],
            from_cache: false,
            payload: ExpressionPayload::Value(ValuePreview::new(preview)),
        }
    }
}

impl Evaluator for ScriptedEvaluator {
    fn run(&self, job: EvaluationJob, events: Sender<EvaluationEvent>, cancellation: CancellationToken) {
        let epoch = job.epoch;
        let key = stack_key(&job.stack);
        let script = self.scripts.lock().unwrap().get_mut(&key).and_then(VecDeque::pop_front).unwrap_or_default();
        for step in script {
            if cancellation.is_cancelled() {
                let _ = events.send(EvaluationEvent::Failed {
                    epoch,
                    failure: ExecutionFailure { message: "interrupted".into(), kind: ExecutionFailureKind::Interrupted, diagnostic: None },
                });
                return;
            }
            match step {
                Step::Value { expression_id, type_name, preview } => {
                    let result = Self::value_result(type_name, preview, None);
                    let _ = events.send(EvaluationEvent::ExpressionUpdated { epoch, expression_id, result });
                }
                Step::MethodCall { expression_id, type_name, preview, method } => {
                    let call = MethodCallInfo { method, missing_arguments: vec![] };
                    let result = Self::value_result(type_name, preview, Some(call));
                    let _ = events.send(EvaluationEvent::ExpressionUpdated { epoch, expression_id, result });
                }
                Step::CacheHit { expression_id } => {
                    let _ = events.send(EvaluationEvent::ExpressionCacheHit { epoch, expression_id });
                }
                Step::Diagnostic(diagnostic) => {
                    let _ = events.send(EvaluationEvent::DiagnosticReported { epoch, diagnostic });
                }
                Step::SpinUntilCancelled => {
                    while !cancellation.is_cancelled() {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    let _ = events.send(EvaluationEvent::Failed {
                        epoch,
                        failure: ExecutionFailure { message: "interrupted".into(), kind: ExecutionFailureKind::Interrupted, diagnostic: None },
                    });
                    return;
                }
            }
        }
        let _ = events.send(EvaluationEvent::Completed { epoch });
    }

    fn run_visualization(&self, job: VisualizationJob, _cancellation: CancellationToken) -> Result<Vec<u8>, ExecutionFailure> {
        let key = stack_key(&job.stack);
        let expression = match &job.spec.expression {
            VisualizationExpression::Inline(text) => text.clone(),
            VisualizationExpression::Method(pointer) => format!("{}.{}", pointer.defined_on_type, pointer.name),
        };
        self.visualization_scripts
            .lock()
            .unwrap()
            .get_mut(&(key, expression))
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(Vec::new()))
    }
}

/// Block the calling thread until `subscriber` yields a notification for
/// which `predicate` returns `true`, returning it. Panics after `attempts`
/// polls of `timeout` each with no match, so a broken test fails fast
/// instead of hanging.
pub fn wait_for(
    subscriber: &mut flo_stream::Subscriber<Notification>,
    mut predicate: impl FnMut(&Notification) -> bool,
) -> Notification {
    let mut attempts = 0;
    loop {
        if let Some(notification) = futures::executor::block_on(futures::stream::StreamExt::next(subscriber)) {
            if predicate(&notification) {
                return notification;
            }
        }
        attempts += 1;
        if attempts > 10_000 {
            panic!("wait_for: no matching notification arrived");
        }
    }
}
