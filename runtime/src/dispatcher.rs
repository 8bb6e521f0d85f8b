//! `Dispatcher`: the single entry point for inbound commands, owning
//! per-session capability grants and per-session notification forwarding.
//!
//! Modeled on a `controller::Project`/`Handle` pair that holds the
//! process-wide project model and exposes capability-gated operations to
//! each connected view. This module generalizes that single-client shape to
//! a multi-session model: capability grants are tracked per
//! `(SessionId, ContextId)`, and notification forwarding applies the
//! per-subscription cache-hit dedup (`SubscriptionTracker`) the
//! `ContextActor` itself deliberately does not.

use crate::edit_stream::EditStream;
use crate::edit_stream::SourceEdit;
use crate::notification::ExpressionUpdate;
use crate::notification::Notification;
use crate::registry::ContextRegistry;
use crate::suggestions_index::SearchFilter;
use crate::suggestions_index::SuggestionsIndex;
use crate::value_cache::SubscriptionTracker;
use common::prelude::*;
use crossbeam_channel::Sender;
use crossbeam_channel::TrySendError;
use parking_lot::Mutex as PlMutex;
use protocol::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

/// Per-session bookkeeping: which capabilities it holds over which
/// contexts, whether it subscribed to suggestions-database updates, and the
/// cache-hit dedup state for each context it has subscribed to.
#[derive(Default)]
struct SessionState {
    grants: HashMap<ContextId, CapabilityGrant>,
    receives_suggestions_updates: bool,
    trackers: HashMap<ContextId, SubscriptionTracker>,
}

impl SessionState {
    fn grant(&self, context: ContextId) -> CapabilityGrant {
        self.grants.get(&context).cloned().unwrap_or_else(CapabilityGrant::none)
    }
}

/// The result of creating or forking a context: its id plus the grant the
/// requesting session now holds over it.
#[derive(Clone, Debug)]
pub struct ContextHandle {
    pub id: ContextId,
    pub grant: CapabilityGrant,
}

type Sessions = Arc<PlMutex<HashMap<SessionId, SessionState>>>;

/// Routes every inbound command to the owning component, enforcing
/// capability checks, and forwards outbound notifications per session.
pub struct Dispatcher {
    logger: Logger,
    registry: Arc<ContextRegistry>,
    suggestions: Arc<Mutex<SuggestionsIndex>>,
    edit_stream: Arc<EditStream>,
    sessions: Sessions,
    suggestions_updates: common::notification::Publisher<(Vec<SuggestionUpdate>, u64)>,
}

impl Dispatcher {
    /// Build a fresh dispatcher. `evaluator` is shared by every context the
    /// registry spawns.
    pub fn new(logger: Logger, evaluator: Arc<dyn Evaluator>) -> Self {
        let registry = Arc::new(ContextRegistry::new(Logger::sub(&logger, "contexts"), evaluator));
        let edit_stream = Arc::new(EditStream::new(Logger::sub(&logger, "edits"), registry.clone_ref()));
        Self {
            logger,
            registry,
            suggestions: Arc::new(Mutex::new(SuggestionsIndex::new())),
            edit_stream,
            sessions: Arc::new(PlMutex::new(HashMap::new())),
            suggestions_updates: common::notification::Publisher::new(),
        }
    }

    /// Register a brand-new session. Fails if `session` is already known.
    pub fn init_session(&self, session: SessionId) -> FallibleResult<()> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&session) {
            return Err(RuntimeError::SessionAlreadyInitialized);
        }
        info!(self.logger, "session {session} initialized");
        sessions.insert(session, SessionState::default());
        Ok(())
    }

    /// Tear down a session: it loses every capability grant it held.
    /// Contexts it created are left running (ownership isn't exclusive).
    pub fn destroy_session(&self, session: SessionId) {
        if self.sessions.lock().remove(&session).is_some() {
            info!(self.logger, "session {session} destroyed");
        }
    }

    /// Destroy every live context. Used by [`crate::Runtime::shutdown`].
    pub fn shutdown(&self) {
        self.registry.destroy_all();
        self.sessions.lock().clear();
    }

    fn require_capability(&self, session: SessionId, context: ContextId, capability: Capability) -> FallibleResult<()> {
        let sessions = self.sessions.lock();
        let state = sessions.get(&session).ok_or(RuntimeError::SessionNotInitialized)?;
        if state.grant(context).has(capability) {
            Ok(())
        } else {
            Err(RuntimeError::AccessDenied { capability })
        }
    }

    // === Context lifecycle ===

    /// `create(id?)`: spawns (or returns the existing) context and grants
    /// the calling session full capabilities over it.
    pub fn create_context(&self, session: SessionId, suggested_id: Option<ContextId>) -> FallibleResult<ContextHandle> {
        if !self.sessions.lock().contains_key(&session) {
            return Err(RuntimeError::SessionNotInitialized);
        }
        let id = self.registry.create(suggested_id);
        let grant = CapabilityGrant::full();
        self.sessions.lock().get_mut(&session).ok_or(RuntimeError::SessionNotInitialized)?.grants.insert(id, grant.clone());
        Ok(ContextHandle { id, grant })
    }

    /// `fork(id)`: requires `CanModify` on the source context; grants full
    /// capabilities over the new context to the calling session.
    pub fn fork_context(&self, session: SessionId, id: ContextId) -> FallibleResult<ContextHandle> {
        self.require_capability(session, id, Capability::CanModify)?;
        let new_id = self.registry.fork(id)?;
        let grant = CapabilityGrant::full();
        self.sessions.lock().get_mut(&session).ok_or(RuntimeError::SessionNotInitialized)?.grants.insert(new_id, grant.clone());
        Ok(ContextHandle { id: new_id, grant })
    }

    /// `destroy(id)`: requires `CanModify`.
    pub fn destroy_context(&self, session: SessionId, id: ContextId) -> FallibleResult<()> {
        self.require_capability(session, id, Capability::CanModify)?;
        self.registry.destroy(id);
        for state in self.sessions.lock().values_mut() {
            state.grants.remove(&id);
            state.trackers.remove(&id);
        }
        Ok(())
    }

    // === Capability management ===

    /// Grant `capability` over `context` to `session`. Any initialized
    /// session may acquire any capability over any existing context; who is
    /// *allowed* to ask is a policy decision for the external authorization
    /// layer, out of this crate's scope.
    pub fn acquire_capability(&self, session: SessionId, context: ContextId, capability: Capability) -> FallibleResult<()> {
        self.registry.get(context)?;
        let mut sessions = self.sessions.lock();
        let state = sessions.get_mut(&session).ok_or(RuntimeError::SessionNotInitialized)?;
        state.grants.entry(context).or_insert_with(CapabilityGrant::none).grant(capability);
        Ok(())
    }

    /// Revoke `capability` over `context` from `session`. Fails with
    /// `CapabilityNotAcquired` if the session did not hold it.
    pub fn release_capability(&self, session: SessionId, context: ContextId, capability: Capability) -> FallibleResult<()> {
        let mut sessions = self.sessions.lock();
        let state = sessions.get_mut(&session).ok_or(RuntimeError::SessionNotInitialized)?;
        if !state.grant(context).has(capability) {
            return Err(RuntimeError::CapabilityNotAcquired { capability });
        }
        state.grants.get_mut(&context).unwrap().revoke(capability);
        Ok(())
    }

    // === Stack commands ===

    pub fn push(&self, session: SessionId, context: ContextId, frame: StackFrame) -> FallibleResult<()> {
        self.require_capability(session, context, Capability::CanModify)?;
        self.registry.get(context)?.push(frame)
    }

    pub fn pop(&self, session: SessionId, context: ContextId) -> FallibleResult<StackFrame> {
        self.require_capability(session, context, Capability::CanModify)?;
        self.registry.get(context)?.pop()
    }

    pub fn recompute(&self, session: SessionId, context: ContextId, invalidated: Option<crate::actor::Invalidated>) -> FallibleResult<()> {
        self.require_capability(session, context, Capability::CanModify)?;
        self.registry.get(context)?.recompute(invalidated)
    }

    pub fn interrupt(&self, session: SessionId, context: ContextId) -> FallibleResult<()> {
        self.require_capability(session, context, Capability::CanModify)?;
        self.registry.get(context)?.interrupt()
    }

    pub fn set_execution_environment(&self, session: SessionId, context: ContextId, environment: ExecutionEnvironment) -> FallibleResult<()> {
        self.require_capability(session, context, Capability::CanModify)?;
        self.registry.get(context)?.set_execution_environment(environment)
    }

    // === Visualization commands ===

    pub fn attach_visualization(
        &self,
        session: SessionId,
        context: ContextId,
        id: VisualizationId,
        expression_id: ExpressionId,
        spec: VisualizationSpec,
    ) -> FallibleResult<()> {
        self.require_capability(session, context, Capability::CanModify)?;
        self.registry.get(context)?.attach_visualization(id, expression_id, spec)
    }

    pub fn modify_visualization(&self, session: SessionId, context: ContextId, id: VisualizationId, spec: VisualizationSpec) -> FallibleResult<()> {
        self.require_capability(session, context, Capability::CanModify)?;
        self.registry.get(context)?.modify_visualization(id, spec)
    }

    pub fn detach_visualization(&self, session: SessionId, context: ContextId, id: VisualizationId) -> FallibleResult<()> {
        self.require_capability(session, context, Capability::CanModify)?;
        self.registry.get(context)?.detach_visualization(id)
    }

    pub fn execute_expression(
        &self,
        session: SessionId,
        context: ContextId,
        id: VisualizationId,
        expression_id: ExpressionId,
        expression: String,
    ) -> FallibleResult<()> {
        self.require_capability(session, context, Capability::CanModify)?;
        self.registry.get(context)?.execute_expression(id, expression_id, expression)
    }

    // === Suggestions ===

    pub fn search_suggestions(&self, filter: &SearchFilter) -> (Vec<SuggestionEntryId>, u64) {
        let index = self.suggestions.lock().unwrap();
        (index.search(filter), index.current_version())
    }

    pub fn get_all_methods(&self, triples: &[(String, String, String)]) -> Vec<Option<SuggestionEntryId>> {
        self.suggestions.lock().unwrap().get_all_methods(triples)
    }

    pub fn get_suggestions_version(&self) -> u64 {
        self.suggestions.lock().unwrap().current_version()
    }

    /// `invalidate()`: discards the suggestions index outright. Used before
    /// repopulating it from a fresh compilation; the index is ephemeral per
    /// session, so there is no durable state to reconcile against.
    pub fn invalidate_suggestions(&self) {
        info!(self.logger, "suggestions index invalidated");
        *self.suggestions.lock().unwrap() = SuggestionsIndex::new();
    }

    /// Apply a module update batch to the suggestions index and broadcast
    /// the resulting delta to every session subscribed to
    /// `receivesSuggestionsDatabaseUpdates`.
    pub fn apply_suggestions_update(
        &self,
        module: &str,
        action: Option<&protocol::suggestions::ModuleUpdateAction>,
        updates: Vec<SuggestionUpdate>,
    ) -> FallibleResult<u64> {
        let version = self.suggestions.lock().unwrap().apply_module_update(module, action, &updates)?;
        futures::executor::block_on(self.suggestions_updates.clone_ref().publish((updates, version)));
        Ok(version)
    }

    /// Subscribe `session` to suggestions-database updates, forwarding them
    /// to `sink` for as long as the dispatcher (and its publisher) live.
    pub fn subscribe_suggestions_updates(&self, session: SessionId, sink: Sender<(Vec<SuggestionUpdate>, u64)>) -> FallibleResult<()> {
        let mut sessions = self.sessions.lock();
        let state = sessions.get_mut(&session).ok_or(RuntimeError::SessionNotInitialized)?;
        state.receives_suggestions_updates = true;
        drop(sessions);
        let mut subscriber = self.suggestions_updates.clone_ref().subscribe();
        thread::spawn(move || {
            while let Some(update) = futures::executor::block_on(futures::stream::StreamExt::next(&mut subscriber)) {
                if sink.send(update).is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    /// Forward a single [`SourceEdit`] to the [`EditStream`].
    pub fn apply_edit(&self, edit: SourceEdit) {
        self.edit_stream.apply(edit);
    }

    // === Subscriptions ===

    /// Subscribe `session` to `context`'s notifications. Requires
    /// `ReceivesUpdates`. Spawns a forwarding loop that applies cache-hit
    /// deduplication, then coalesces backlogged `ExpressionUpdates` by
    /// expression id when `sink` falls behind: only the most recent update
    /// per expression is kept, and
    /// terminal/diagnostic notifications are always flushed and delivered,
    /// never dropped or merged away. The loop exits on its own once the
    /// context is destroyed (its publisher closes the subscriber stream).
    pub fn subscribe(&self, session: SessionId, context: ContextId, sink: Sender<Notification>) -> FallibleResult<()> {
        self.require_capability(session, context, Capability::ReceivesUpdates)?;
        let mut handle = self.registry.get(context)?;
        self.sessions.lock().get_mut(&session).unwrap().trackers.entry(context).or_default();
        let mut subscriber = handle.subscribe();
        let logger = Logger::sub(&self.logger, format!("forward.{session}.{context}"));
        let sessions = self.sessions.clone();
        thread::spawn(move || {
            let mut pending: HashMap<ExpressionId, ExpressionUpdate> = HashMap::new();
            while let Some(notification) = futures::executor::block_on(futures::stream::StreamExt::next(&mut subscriber)) {
                let forwardable = match notification {
                    Notification::ExpressionUpdates { context_id, updates } => {
                        let mut sessions = sessions.lock();
                        let Some(state) = sessions.get_mut(&session) else { break };
                        let Some(tracker) = state.trackers.get_mut(&context_id) else { break };
                        let kept: Vec<_> = updates
                            .into_iter()
                            .filter(|update| !update.result.from_cache || tracker.observe_cache_hit(update.expression_id, &update.result))
                            .collect();
                        if kept.is_empty() {
                            continue;
                        }
                        Notification::ExpressionUpdates { context_id, updates: kept }
                    }
                    other => other,
                };
                if forwardable.is_terminal_or_diagnostic() {
                    if !blocking_flush(&mut pending, context, &sink) {
                        break;
                    }
                    if sink.send(forwardable).is_err() {
                        break;
                    }
                } else if let Notification::ExpressionUpdates { updates, .. } = forwardable {
                    for update in updates {
                        pending.insert(update.expression_id, update);
                    }
                    if !try_flush(&mut pending, context, &sink) {
                        break;
                    }
                } else {
                    if !blocking_flush(&mut pending, context, &sink) {
                        break;
                    }
                    if sink.send(forwardable).is_err() {
                        break;
                    }
                }
            }
            debug!(logger, "forwarding loop ended");
        });
        Ok(())
    }
}

/// Send every buffered expression update as a single batch, blocking until
/// the sink accepts it. Used ahead of a terminal/diagnostic notification,
/// which must never be reordered behind a coalesced backlog.
fn blocking_flush(pending: &mut HashMap<ExpressionId, ExpressionUpdate>, context: ContextId, sink: &Sender<Notification>) -> bool {
    if pending.is_empty() {
        return true;
    }
    let updates: Vec<_> = pending.drain().map(|(_, update)| update).collect();
    sink.send(Notification::ExpressionUpdates { context_id: context, updates }).is_ok()
}

/// Attempt to send the buffered expression updates without blocking. If the
/// sink is full, the updates stay buffered (later updates to the same
/// expression id simply overwrite them) rather than being dropped.
fn try_flush(pending: &mut HashMap<ExpressionId, ExpressionUpdate>, context: ContextId, sink: &Sender<Notification>) -> bool {
    if pending.is_empty() {
        return true;
    }
    let updates: Vec<_> = pending.values().cloned().collect();
    match sink.try_send(Notification::ExpressionUpdates { context_id: context, updates }) {
        Ok(()) => {
            pending.clear();
            true
        }
        Err(TrySendError::Full(_)) => true,
        Err(TrySendError::Disconnected(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedEvaluator;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Logger::new("test"), Arc::new(ScriptedEvaluator::new()))
    }

    #[test]
    fn commands_before_session_init_are_rejected() {
        let dispatcher = dispatcher();
        let result = dispatcher.create_context(SessionId::new_v4(), None);
        assert!(matches!(result, Err(RuntimeError::SessionNotInitialized)));
    }

    #[test]
    fn double_init_is_rejected() {
        let dispatcher = dispatcher();
        let session = SessionId::new_v4();
        dispatcher.init_session(session).unwrap();
        assert!(matches!(dispatcher.init_session(session), Err(RuntimeError::SessionAlreadyInitialized)));
    }

    #[test]
    fn creator_session_gets_full_grant_other_sessions_get_none() {
        let dispatcher = dispatcher();
        let owner = SessionId::new_v4();
        let stranger = SessionId::new_v4();
        dispatcher.init_session(owner).unwrap();
        dispatcher.init_session(stranger).unwrap();
        let handle = dispatcher.create_context(owner, None).unwrap();
        assert!(handle.grant.has(Capability::CanModify));

        let method_ptr = MethodPointer { module: "Main".into(), defined_on_type: "Main".into(), name: "main".into() };
        let frame = StackFrame::ExplicitCall { method_ptr, this_arg: None, positional_args: vec![] };
        assert!(dispatcher.push(owner, handle.id, frame.clone()).is_ok());
        assert!(matches!(
            dispatcher.push(stranger, handle.id, frame),
            Err(RuntimeError::AccessDenied { capability: Capability::CanModify })
        ));
    }

    #[test]
    fn acquiring_capability_grants_access_to_a_previously_foreign_context() {
        let dispatcher = dispatcher();
        let owner = SessionId::new_v4();
        let other = SessionId::new_v4();
        dispatcher.init_session(owner).unwrap();
        dispatcher.init_session(other).unwrap();
        let handle = dispatcher.create_context(owner, None).unwrap();
        dispatcher.acquire_capability(other, handle.id, Capability::CanModify).unwrap();

        let method_ptr = MethodPointer { module: "Main".into(), defined_on_type: "Main".into(), name: "main".into() };
        let frame = StackFrame::ExplicitCall { method_ptr, this_arg: None, positional_args: vec![] };
        assert!(dispatcher.push(other, handle.id, frame).is_ok());
    }

    #[test]
    fn releasing_an_unheld_capability_fails() {
        let dispatcher = dispatcher();
        let session = SessionId::new_v4();
        dispatcher.init_session(session).unwrap();
        let handle = dispatcher.create_context(session, None).unwrap();
        dispatcher.release_capability(session, handle.id, Capability::CanModify).unwrap();
        assert!(matches!(
            dispatcher.release_capability(session, handle.id, Capability::CanModify),
            Err(RuntimeError::CapabilityNotAcquired { .. })
        ));
    }

    #[test]
    fn invalidate_suggestions_resets_version() {
        let dispatcher = dispatcher();
        dispatcher
            .apply_suggestions_update(
                "Main",
                None,
                vec![SuggestionUpdate::Add {
                    id: 0,
                    entry: SuggestionEntry::Method {
                        module: "Main".into(),
                        name: "draw".into(),
                        defined_on_type: "Main.Widget".into(),
                        is_static: false,
                        arguments: vec![],
                        return_type: "Any".into(),
                        documentation: None,
                        reexport: None,
                        external_id: None,
                    },
                }],
            )
            .unwrap();
        assert_eq!(dispatcher.get_suggestions_version(), 1);
        dispatcher.invalidate_suggestions();
        assert_eq!(dispatcher.get_suggestions_version(), 0);
    }

    fn expression_update(id: ExpressionId, preview: &str) -> ExpressionUpdate {
        ExpressionUpdate {
            expression_id: id,
            result: ExpressionResult {
                type_name: Some("Number".into()),
                method_call: None,
                profile: vec![],
                from_cache: false,
                payload: ExpressionPayload::Value(ValuePreview::new(preview)),
            },
        }
    }

    #[test]
    fn try_flush_coalesces_repeated_updates_to_the_same_expression() {
        let context = ContextId::new_v4();
        let (sink, source) = crossbeam_channel::bounded(8);
        let mut pending = HashMap::new();
        let id = ExpressionId::new_v4();
        pending.insert(id, expression_update(id, "1"));
        pending.insert(id, expression_update(id, "2"));
        assert!(try_flush(&mut pending, context, &sink));
        assert!(pending.is_empty());
        let Notification::ExpressionUpdates { updates, .. } = source.try_recv().unwrap() else { panic!("wrong notification kind") };
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].result.payload, ExpressionPayload::Value(ValuePreview::new("2")));
    }

    #[test]
    fn try_flush_leaves_pending_buffered_when_sink_is_full() {
        let context = ContextId::new_v4();
        let (sink, _source) = crossbeam_channel::bounded(0);
        let mut pending = HashMap::new();
        let id = ExpressionId::new_v4();
        pending.insert(id, expression_update(id, "1"));
        assert!(try_flush(&mut pending, context, &sink));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn blocking_flush_drains_pending_and_sends_once() {
        let context = ContextId::new_v4();
        let (sink, source) = crossbeam_channel::unbounded();
        let mut pending = HashMap::new();
        let a = ExpressionId::new_v4();
        let b = ExpressionId::new_v4();
        pending.insert(a, expression_update(a, "1"));
        pending.insert(b, expression_update(b, "2"));
        assert!(blocking_flush(&mut pending, context, &sink));
        assert!(pending.is_empty());
        let Notification::ExpressionUpdates { updates, .. } = source.try_recv().unwrap() else { panic!("wrong notification kind") };
        assert_eq!(updates.len(), 2);
    }
}
