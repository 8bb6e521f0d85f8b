//! `ContextActor`: the single-threaded owner of one execution context's
//! stack, value cache, and visualization registry.
//!
//! Modeled on the "one cooperative loop owns this state exclusively" shape
//! of a single-threaded `LocalPool` executor driving non-`Send` state,
//! generalized from an in-process future executor to a dedicated OS thread
//! per context, since the evaluator here is a blocking call rather than an
//! `async fn` that could simply be polled. Commands and evaluation events
//! are multiplexed with `crossbeam_channel::select!`, and a job's
//! cancellation token plus a monotonic [`JobEpoch`] let the actor discard
//! events from a superseded evaluation run.

use crate::notification::ExpressionUpdate;
use crate::notification::Notification;
use crate::stack::ExecutionStack;
use crate::value_cache::ValueCache;
use crate::visualization::VisualizationRegistry;
use common::prelude::*;
use crossbeam_channel::bounded;
use crossbeam_channel::select;
use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use protocol::prelude::*;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

/// Which expressions a `recompute` should treat as stale.
#[derive(Clone, Debug)]
pub enum Invalidated {
    /// Clear the entire cache.
    All,
    /// Clear only the named expressions.
    Ids(Vec<ExpressionId>),
}

/// A point-in-time copy of everything a `ContextActor` owns, produced for
/// `ContextRegistry::fork`.
#[derive(Clone, Debug)]
pub struct ContextSnapshot {
    pub stack: ExecutionStack,
    pub cache: ValueCache,
    pub visualizations: VisualizationRegistry,
    pub environment: ExecutionEnvironment,
}

type Reply<T> = Sender<FallibleResult<T>>;

enum Command {
    Push { frame: StackFrame, reply: Reply<()> },
    Pop { reply: Reply<StackFrame> },
    Recompute { invalidated: Option<Invalidated>, reply: Reply<()> },
    Interrupt { reply: Reply<()> },
    SetExecutionEnvironment { environment: ExecutionEnvironment, reply: Reply<()> },
    AttachVisualization { id: VisualizationId, expression_id: ExpressionId, spec: VisualizationSpec, reply: Reply<()> },
    ModifyVisualization { id: VisualizationId, spec: VisualizationSpec, reply: Reply<()> },
    DetachVisualization { id: VisualizationId, reply: Reply<()> },
    ExecuteExpression { id: VisualizationId, expression_id: ExpressionId, expression: String, reply: Reply<()> },
    Snapshot { reply: Sender<ContextSnapshot> },
    RootModule { reply: Sender<Option<String>> },
    Shutdown { reply: Reply<()> },
}

/// Internal events the actor's main loop reacts to besides commands: either
/// a streamed evaluation event, or the one-shot result of a visualization
/// preprocessing job.
enum Internal {
    Evaluation(EvaluationEvent),
    VisualizationResult { epoch: JobEpoch, visualization_id: VisualizationId, expression_id: ExpressionId, outcome: Result<Vec<u8>, ExecutionFailure> },
}

/// A lightweight, `Clone`-able handle to a running `ContextActor`.
///
/// Sending a command after the actor has shut down yields
/// [`RuntimeError::ContextDestroyed`].
#[derive(Clone)]
pub struct ContextActorHandle {
    commands: Sender<Command>,
    notifications: common::notification::Publisher<Notification>,
}

impl CloneRef for ContextActorHandle {
    fn clone_ref(&self) -> Self {
        self.clone()
    }
}

impl ContextActorHandle {
    fn send<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> FallibleResult<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.commands.send(build(reply_tx)).map_err(|_| RuntimeError::ContextDestroyed)?;
        reply_rx.recv().map_err(|_| RuntimeError::ContextDestroyed)?
    }

    /// Push a stack frame, validating and enqueuing re-evaluation.
    pub fn push(&self, frame: StackFrame) -> FallibleResult<()> {
        self.send(|reply| Command::Push { frame, reply })
    }

    /// Pop the top stack frame.
    pub fn pop(&self) -> FallibleResult<StackFrame> {
        self.send(|reply| Command::Pop { reply })
    }

    /// Invalidate cache entries and enqueue re-evaluation.
    pub fn recompute(&self, invalidated: Option<Invalidated>) -> FallibleResult<()> {
        self.send(|reply| Command::Recompute { invalidated, reply })
    }

    /// Cancel the in-flight evaluation job, if any.
    pub fn interrupt(&self) -> FallibleResult<()> {
        self.send(|reply| Command::Interrupt { reply })
    }

    /// Switch execution environment; behaves as interrupt + clear + recompute.
    pub fn set_execution_environment(&self, environment: ExecutionEnvironment) -> FallibleResult<()> {
        self.send(|reply| Command::SetExecutionEnvironment { environment, reply })
    }

    /// Attach a visualization.
    pub fn attach_visualization(&self, id: VisualizationId, expression_id: ExpressionId, spec: VisualizationSpec) -> FallibleResult<()> {
        self.send(|reply| Command::AttachVisualization { id, expression_id, spec, reply })
    }

    /// Replace a visualization's spec.
    pub fn modify_visualization(&self, id: VisualizationId, spec: VisualizationSpec) -> FallibleResult<()> {
        self.send(|reply| Command::ModifyVisualization { id, spec, reply })
    }

    /// Detach a visualization.
    pub fn detach_visualization(&self, id: VisualizationId) -> FallibleResult<()> {
        self.send(|reply| Command::DetachVisualization { id, reply })
    }

    /// Run a oneshot expression against the lexical context of `expression_id`.
    pub fn execute_expression(&self, id: VisualizationId, expression_id: ExpressionId, expression: String) -> FallibleResult<()> {
        self.send(|reply| Command::ExecuteExpression { id, expression_id, expression, reply })
    }

    /// Take a point-in-time copy of this actor's state, for forking.
    pub fn snapshot(&self) -> FallibleResult<ContextSnapshot> {
        let (reply_tx, reply_rx) = bounded(1);
        self.commands.send(Command::Snapshot { reply: reply_tx }).map_err(|_| RuntimeError::ContextDestroyed)?;
        reply_rx.recv().map_err(|_| RuntimeError::ContextDestroyed)
    }

    /// Subscribe to this context's notifications.
    pub fn subscribe(&mut self) -> flo_stream::Subscriber<Notification> {
        self.notifications.subscribe()
    }

    /// The module named by the stack's `ExplicitCall`, if any, used by
    /// [`crate::edit_stream::EditStream`] to decide which contexts a module
    /// edit must invalidate.
    pub fn root_module(&self) -> FallibleResult<Option<String>> {
        let (reply_tx, reply_rx) = bounded(1);
        self.commands.send(Command::RootModule { reply: reply_tx }).map_err(|_| RuntimeError::ContextDestroyed)?;
        reply_rx.recv().map_err(|_| RuntimeError::ContextDestroyed)
    }

    /// Shut the actor down: cancel any in-flight job and drain queued
    /// commands with [`RuntimeError::ContextDestroyed`]. Idempotent.
    pub fn destroy(&self) {
        let _ = self.send::<()>(|reply| Command::Shutdown { reply });
    }
}

/// Spawn a new `ContextActor` on a dedicated thread and return a handle to
/// it.
pub fn spawn(
    context_id: ContextId,
    evaluator: Arc<dyn Evaluator>,
    initial: Option<ContextSnapshot>,
    logger: Logger,
) -> (ContextActorHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = unbounded::<Command>();
    let notifications = common::notification::Publisher::<Notification>::new();
    let notifications_for_actor = notifications.clone_ref();
    let handle = ContextActorHandle { commands: command_tx, notifications };

    let join = thread::spawn(move || {
        let mut actor = ContextActor::new(context_id, evaluator, notifications_for_actor, initial, logger);
        actor.run(command_rx);
    });
    (handle, join)
}

struct ContextActor {
    context_id: ContextId,
    evaluator: Arc<dyn Evaluator>,
    notifications: common::notification::Publisher<Notification>,
    stack: ExecutionStack,
    cache: ValueCache,
    visualizations: VisualizationRegistry,
    environment: ExecutionEnvironment,
    current_epoch: JobEpoch,
    next_epoch: JobEpoch,
    current_cancellation: Option<CancellationToken>,
    internal_tx: Sender<Internal>,
    internal_rx: Receiver<Internal>,
    logger: Logger,
}

impl ContextActor {
    fn new(
        context_id: ContextId,
        evaluator: Arc<dyn Evaluator>,
        notifications: common::notification::Publisher<Notification>,
        initial: Option<ContextSnapshot>,
        logger: Logger,
    ) -> Self {
        let (internal_tx, internal_rx) = unbounded();
        let (stack, cache, visualizations, environment) = match initial {
            Some(snapshot) => (snapshot.stack, snapshot.cache, snapshot.visualizations, snapshot.environment),
            None => (ExecutionStack::new(), ValueCache::new(), VisualizationRegistry::new(), ExecutionEnvironment::default()),
        };
        Self {
            context_id,
            evaluator,
            notifications,
            stack,
            cache,
            visualizations,
            environment,
            current_epoch: 0,
            next_epoch: 1,
            current_cancellation: None,
            internal_tx,
            internal_rx,
            logger,
        }
    }

    fn emit(&mut self, notification: Notification) {
        futures::executor::block_on(self.notifications.publish(notification));
    }

    fn cancel_current_job(&mut self) {
        if let Some(token) = self.current_cancellation.take() {
            debug!(self.logger, "cancelling job epoch {}", self.current_epoch);
            token.cancel();
        }
    }

    fn submit_job(&mut self) {
        self.cancel_current_job();
        if self.stack.is_empty() {
            return;
        }
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        self.current_epoch = epoch;
        let token = CancellationToken::new();
        self.current_cancellation = Some(token.clone());
        let job = EvaluationJob { epoch, stack: self.stack.frames().to_vec(), execution_environment: self.environment };
        let evaluator = Arc::clone(&self.evaluator);
        let internal_tx = self.internal_tx.clone();
        let (events_tx, events_rx) = unbounded();

        // The forwarder relays events to the actor's inbox as they arrive,
        // rather than only after the job thread finishes: `run` blocks for
        // the whole job, so without a separate thread draining `events_rx`
        // concurrently the actor would only learn about results after the
        // fact.
        thread::spawn(move || {
            for event in events_rx.iter() {
                if internal_tx.send(Internal::Evaluation(event)).is_err() {
                    break;
                }
            }
        });
        thread::spawn(move || {
            evaluator.run(job, events_tx, token);
        });
    }

    fn submit_visualization_job(&self, visualization_id: VisualizationId, expression_id: ExpressionId, spec: VisualizationSpec) {
        let epoch = self.current_epoch;
        let evaluator = Arc::clone(&self.evaluator);
        let internal_tx = self.internal_tx.clone();
        let stack = self.stack.frames().to_vec();
        let token = self.current_cancellation.clone().unwrap_or_default();
        thread::spawn(move || {
            let job = VisualizationJob { epoch, stack, spec };
            let outcome = evaluator.run_visualization(job, token);
            let _ = internal_tx.send(Internal::VisualizationResult { epoch, visualization_id, expression_id, outcome });
        });
    }

    fn run(&mut self, command_rx: Receiver<Command>) {
        loop {
            select! {
                recv(command_rx) -> msg => match msg {
                    Ok(command) => {
                        if !self.handle_command(command) {
                            return;
                        }
                    }
                    Err(_) => return,
                },
                recv(self.internal_rx) -> msg => match msg {
                    Ok(Internal::Evaluation(event)) => self.handle_evaluation_event(event),
                    Ok(Internal::VisualizationResult { epoch, visualization_id, expression_id, outcome }) => {
                        self.handle_visualization_result(epoch, visualization_id, expression_id, outcome)
                    }
                    Err(_) => {}
                },
            }
        }
    }

    /// Returns `false` if the actor should stop running.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Push { frame, reply } => {
                let top_cached = |stack: &ExecutionStack, cache: &ValueCache| match stack.top() {
                    None => false,
                    Some(_) => match &frame {
                        StackFrame::LocalCall { expression_id } => cache.contains(expression_id),
                        StackFrame::ExplicitCall { .. } => true,
                    },
                };
                let resolvable = top_cached(&self.stack, &self.cache);
                let result = self.stack.push(frame, resolvable);
                match &result {
                    Ok(()) => {
                        debug!(self.logger, "pushed frame, stack depth now {}", self.stack.frames().len());
                        self.submit_job();
                    }
                    Err(error) => debug!(self.logger, "push rejected: {error}"),
                }
                let _ = reply.send(result);
            }
            Command::Pop { reply } => {
                let result = self.stack.pop();
                if result.is_ok() {
                    debug!(self.logger, "popped frame, stack depth now {}", self.stack.frames().len());
                    self.submit_job();
                }
                let _ = reply.send(result);
            }
            Command::Recompute { invalidated, reply } => {
                if self.stack.is_empty() {
                    let _ = reply.send(Err(RuntimeError::EmptyStack));
                } else {
                    match invalidated {
                        None | Some(Invalidated::All) => {
                            let removed = self.cache.clear();
                            debug!(self.logger, "recompute: cleared {} cache entries", removed.len());
                        }
                        Some(Invalidated::Ids(ids)) => {
                            let removed = self.cache.invalidate_many(&ids);
                            debug!(self.logger, "recompute: invalidated {} of {} requested entries", removed.len(), ids.len());
                        }
                    }
                    self.submit_job();
                    let _ = reply.send(Ok(()));
                }
            }
            Command::Interrupt { reply } => {
                info!(self.logger, "interrupt requested");
                self.cancel_current_job();
                let _ = reply.send(Ok(()));
            }
            Command::SetExecutionEnvironment { environment, reply } => {
                if environment == self.environment {
                    debug!(self.logger, "execution environment already {environment:?}, no-op");
                } else {
                    info!(self.logger, "switching execution environment to {environment:?}");
                    self.environment = environment;
                    self.cancel_current_job();
                    self.cache.clear();
                    self.submit_job();
                }
                let _ = reply.send(Ok(()));
            }
            Command::AttachVisualization { id, expression_id, spec, reply } => {
                debug!(self.logger, "attaching visualization {id} to expression {expression_id}");
                self.visualizations.attach(id, expression_id, spec.clone());
                if self.cache.contains(&expression_id) {
                    self.submit_visualization_job(id, expression_id, spec);
                }
                let _ = reply.send(Ok(()));
            }
            Command::ModifyVisualization { id, spec, reply } => {
                let result = self.visualizations.modify(id, spec.clone());
                if result.is_ok() {
                    debug!(self.logger, "modified visualization {id}");
                    if let Some(expression_id) = self.visualizations.get(id).map(|s| s.expression_id) {
                        if self.cache.contains(&expression_id) {
                            self.submit_visualization_job(id, expression_id, spec);
                        }
                    }
                }
                let _ = reply.send(result);
            }
            Command::DetachVisualization { id, reply } => {
                let result = self.visualizations.detach(id).map(|_| ());
                if result.is_ok() {
                    debug!(self.logger, "detached visualization {id}");
                }
                let _ = reply.send(result);
            }
            Command::ExecuteExpression { id, expression_id, expression, reply } => {
                let spec = VisualizationSpec {
                    expression_id,
                    module: String::new(),
                    expression: VisualizationExpression::Inline(expression),
                    positional_args: vec![],
                };
                self.submit_visualization_job(id, expression_id, spec);
                let _ = reply.send(Ok(()));
            }
            Command::Snapshot { reply } => {
                let snapshot = ContextSnapshot {
                    stack: self.stack.fork(),
                    cache: self.cache.clone(),
                    visualizations: self.visualizations.fork(),
                    environment: self.environment,
                };
                let _ = reply.send(snapshot);
            }
            Command::RootModule { reply } => {
                let _ = reply.send(self.stack.root_module().map(str::to_string));
            }
            Command::Shutdown { reply } => {
                self.cancel_current_job();
                let _ = reply.send(Ok(()));
                return false;
            }
        }
        true
    }

    fn handle_evaluation_event(&mut self, event: EvaluationEvent) {
        match event {
            EvaluationEvent::ExpressionUpdated { epoch, expression_id, result } => {
                if epoch != self.current_epoch {
                    return;
                }
                if let Some(crate::value_cache::CacheEvent::Updated { result, .. }) = self.cache.write(expression_id, result) {
                    self.emit(Notification::ExpressionUpdates {
                        context_id: self.context_id,
                        updates: vec![ExpressionUpdate { expression_id, result }],
                    });
                }
                self.reevaluate_visualizations(expression_id);
            }
            EvaluationEvent::ExpressionCacheHit { epoch, expression_id } => {
                if epoch != self.current_epoch {
                    return;
                }
                // Unlike a fresh write, whether this is worth telling a
                // given subscriber about depends on what *that subscriber*
                // has already seen (`SubscriptionTracker`), not on context-
                // wide cache state. The actor always broadcasts; the
                // Dispatcher's per-session forwarding decides whether to
                // actually relay it.
                if let Some(result) = self.cache.cache_hit_result(&expression_id) {
                    self.emit(Notification::ExpressionUpdates {
                        context_id: self.context_id,
                        updates: vec![ExpressionUpdate { expression_id, result }],
                    });
                }
                self.reevaluate_visualizations(expression_id);
            }
            EvaluationEvent::DiagnosticReported { epoch, diagnostic } => {
                if epoch != self.current_epoch {
                    return;
                }
                self.emit(Notification::ExecutionStatus { context_id: self.context_id, diagnostics: vec![diagnostic] });
            }
            EvaluationEvent::Completed { epoch } => {
                if epoch != self.current_epoch {
                    return;
                }
                self.emit(Notification::ExecutionComplete { context_id: self.context_id });
            }
            EvaluationEvent::Failed { epoch, failure } => {
                if epoch != self.current_epoch {
                    return;
                }
                self.emit(Notification::ExecutionFailed { context_id: self.context_id, failure });
            }
        }
    }

    fn reevaluate_visualizations(&mut self, expression_id: ExpressionId) {
        let attached: Vec<VisualizationId> = self.visualizations.attached_to(&expression_id).collect();
        for visualization_id in attached {
            if let Some(spec) = self.visualizations.get(visualization_id).cloned() {
                self.submit_visualization_job(visualization_id, expression_id, spec);
            }
        }
    }

    fn handle_visualization_result(
        &mut self,
        _epoch: JobEpoch,
        visualization_id: VisualizationId,
        expression_id: ExpressionId,
        outcome: Result<Vec<u8>, ExecutionFailure>,
    ) {
        match outcome {
            Ok(data) => self.emit(Notification::VisualizationUpdate { context_id: self.context_id, visualization_id, expression_id, data }),
            Err(failure) => self.emit(Notification::VisualizationEvaluationFailed {
                context_id: self.context_id,
                visualization_id,
                expression_id,
                message: failure.message,
                diagnostic: failure.diagnostic,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::wait_for;
    use crate::test_support::FrameKey;
    use crate::test_support::ScriptedEvaluator;
    use crate::test_support::Step;

    fn main_method_ptr() -> MethodPointer {
        MethodPointer { module: "Main".into(), defined_on_type: "Main".into(), name: "main".into() }
    }

    fn explicit_main() -> StackFrame {
        StackFrame::ExplicitCall { method_ptr: main_method_ptr(), this_arg: None, positional_args: vec![] }
    }

    #[test]
    fn push_pop_restores_state_and_re_reports_method_call_on_pop() {
        let evaluator = Arc::new(ScriptedEvaluator::new());
        let x = ExpressionId::new_v4();
        let y = ExpressionId::new_v4();
        let z = ExpressionId::new_v4();

        let root_key = vec![FrameKey::Explicit("main".into())];
        evaluator.push_script(
            root_key.clone(),
            vec![
                Step::Value { expression_id: x, type_name: "Number", preview: "6" },
                Step::Value { expression_id: y, type_name: "Number", preview: "45" },
                Step::Value { expression_id: z, type_name: "Number", preview: "50" },
            ],
        );
        let inner_key = vec![FrameKey::Explicit("main".into()), FrameKey::Local(y)];
        let inner_y = ExpressionId::new_v4();
        let inner_z = ExpressionId::new_v4();
        evaluator.push_script(
            inner_key,
            vec![
                Step::Value { expression_id: inner_y, type_name: "Number", preview: "9" },
                Step::Value { expression_id: inner_z, type_name: "Number", preview: "45" },
            ],
        );
        let foo_method = MethodPointer { module: "Main".into(), defined_on_type: "Number".into(), name: "foo".into() };
        evaluator.push_script(root_key, vec![Step::MethodCall { expression_id: y, type_name: "Number", preview: "45", method: foo_method }]);

        let (mut handle, _join) = spawn(ContextId::new_v4(), evaluator, None, Logger::new("test"));
        let mut subscriber = handle.subscribe();

        handle.push(explicit_main()).unwrap();
        let first = wait_for(&mut subscriber, |n| matches!(n, Notification::ExecutionComplete { .. }));
        assert!(matches!(first, Notification::ExecutionComplete { .. }));

        handle.push(StackFrame::LocalCall { expression_id: y }).unwrap();
        wait_for(&mut subscriber, |n| matches!(n, Notification::ExecutionComplete { .. }));

        let popped = handle.pop().unwrap();
        assert_eq!(popped, StackFrame::LocalCall { expression_id: y });
        let reported = wait_for(&mut subscriber, |n| {
            matches!(n, Notification::ExpressionUpdates { updates, .. } if updates.iter().any(|u| u.expression_id == y))
        });
        if let Notification::ExpressionUpdates { updates, .. } = reported {
            let update = updates.into_iter().find(|u| u.expression_id == y).unwrap();
            assert!(update.result.method_call.is_some());
        }

        let popped = handle.pop().unwrap();
        assert_eq!(popped, explicit_main());
        assert!(matches!(handle.pop(), Err(RuntimeError::EmptyStack)));
    }

    #[test]
    fn quiet_reexecution_suppresses_unchanged_type_notification() {
        let evaluator = Arc::new(ScriptedEvaluator::new());
        let result_id = ExpressionId::new_v4();
        let key = vec![FrameKey::Explicit("main".into())];
        evaluator.push_script(key.clone(), vec![Step::Value { expression_id: result_id, type_name: "Number", preview: "1337" }]);
        evaluator.push_script(key, vec![Step::Value { expression_id: result_id, type_name: "Number", preview: "1338" }]);

        let (mut handle, _join) = spawn(ContextId::new_v4(), evaluator, None, Logger::new("test"));
        let mut subscriber = handle.subscribe();
        handle.push(explicit_main()).unwrap();
        wait_for(&mut subscriber, |n| matches!(n, Notification::ExecutionComplete { .. }));

        handle.recompute(None).unwrap();
        let completion = wait_for(&mut subscriber, |n| {
            matches!(n, Notification::ExecutionComplete { .. } | Notification::ExpressionUpdates { .. })
        });
        // The re-run produced the same observable type, so the first thing
        // to arrive must be completion, not a (suppressed) update.
        assert!(matches!(completion, Notification::ExecutionComplete { .. }));
    }

    #[test]
    fn type_change_is_reported() {
        let evaluator = Arc::new(ScriptedEvaluator::new());
        let result_id = ExpressionId::new_v4();
        let key = vec![FrameKey::Explicit("main".into())];
        evaluator.push_script(key.clone(), vec![Step::Value { expression_id: result_id, type_name: "Number", preview: "1337" }]);
        evaluator.push_script(key, vec![Step::Value { expression_id: result_id, type_name: "Text", preview: "Hi" }]);

        let (mut handle, _join) = spawn(ContextId::new_v4(), evaluator, None, Logger::new("test"));
        let mut subscriber = handle.subscribe();
        handle.push(explicit_main()).unwrap();
        wait_for(&mut subscriber, |n| matches!(n, Notification::ExecutionComplete { .. }));

        handle.recompute(None).unwrap();
        let update = wait_for(&mut subscriber, |n| matches!(n, Notification::ExpressionUpdates { .. }));
        if let Notification::ExpressionUpdates { updates, .. } = update {
            assert_eq!(updates[0].result.type_name.as_deref(), Some("Text"));
        }
        wait_for(&mut subscriber, |n| matches!(n, Notification::ExecutionComplete { .. }));
    }

    #[test]
    fn interrupt_cancels_in_flight_evaluation_and_allows_later_recompute() {
        let evaluator = Arc::new(ScriptedEvaluator::new());
        let key = vec![FrameKey::Explicit("main".into())];
        evaluator.push_script(key.clone(), vec![Step::SpinUntilCancelled]);
        let finished_id = ExpressionId::new_v4();
        evaluator.push_script(key, vec![Step::Value { expression_id: finished_id, type_name: "Number", preview: "1" }]);

        let (mut handle, _join) = spawn(ContextId::new_v4(), evaluator, None, Logger::new("test"));
        let mut subscriber = handle.subscribe();
        handle.push(explicit_main()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        handle.interrupt().unwrap();
        let failure = wait_for(&mut subscriber, |n| matches!(n, Notification::ExecutionFailed { .. }));
        assert!(matches!(failure, Notification::ExecutionFailed { failure, .. } if failure.kind == ExecutionFailureKind::Interrupted));

        handle.recompute(None).unwrap();
        wait_for(&mut subscriber, |n| matches!(n, Notification::ExecutionComplete { .. }));
    }

    #[test]
    fn setting_the_same_execution_environment_is_a_noop() {
        let evaluator = Arc::new(ScriptedEvaluator::new());
        let result_id = ExpressionId::new_v4();
        let key = vec![FrameKey::Explicit("main".into())];
        evaluator.push_script(key, vec![Step::Value { expression_id: result_id, type_name: "Number", preview: "1" }]);

        let (mut handle, _join) = spawn(ContextId::new_v4(), evaluator, None, Logger::new("test"));
        let mut subscriber = handle.subscribe();
        handle.push(explicit_main()).unwrap();
        wait_for(&mut subscriber, |n| matches!(n, Notification::ExecutionComplete { .. }));

        let before = handle.snapshot().unwrap();
        assert!(before.cache.contains(&result_id));

        handle.set_execution_environment(before.environment).unwrap();

        // No cache-clearing recompute was triggered, so the cached value
        // from before the no-op call is still there.
        let after = handle.snapshot().unwrap();
        assert!(after.cache.contains(&result_id));
    }

    #[test]
    fn changing_execution_environment_clears_the_cache() {
        let evaluator = Arc::new(ScriptedEvaluator::new());
        let result_id = ExpressionId::new_v4();
        let key = vec![FrameKey::Explicit("main".into())];
        evaluator.push_script(key.clone(), vec![Step::Value { expression_id: result_id, type_name: "Number", preview: "1" }]);
        evaluator.push_script(key, vec![Step::Value { expression_id: result_id, type_name: "Number", preview: "2" }]);

        let (mut handle, _join) = spawn(ContextId::new_v4(), evaluator, None, Logger::new("test"));
        let mut subscriber = handle.subscribe();
        handle.push(explicit_main()).unwrap();
        wait_for(&mut subscriber, |n| matches!(n, Notification::ExecutionComplete { .. }));

        let before = handle.snapshot().unwrap();
        let other = match before.environment {
            ExecutionEnvironment::Design => ExecutionEnvironment::Live,
            ExecutionEnvironment::Live => ExecutionEnvironment::Design,
        };
        handle.set_execution_environment(other).unwrap();
        wait_for(&mut subscriber, |n| matches!(n, Notification::ExecutionComplete { .. }));
        let after = handle.snapshot().unwrap();
        assert_eq!(after.environment, other);
    }
}
