//! `ContextRegistry`: the process-wide map from `ContextId` to a running
//! `ContextActor`, plus create/fork/destroy lifecycle management.
//!
//! Modeled on a `model::project::Project` holding a
//! `Rc<RefCell<HashMap<Uuid, ExecutionContext>>>`-shaped registry of
//! synchronized execution contexts, generalized here from a
//! single-threaded `Rc`-owned map to a coarse-locked, actor-per-context
//! shape: create/fork/destroy take a short-lived `parking_lot::Mutex` lock;
//! everything else is routed straight to a `ContextActorHandle`'s
//! lock-free mpsc queue.

use crate::actor;
use crate::actor::ContextActorHandle;
use crate::actor::ContextSnapshot;
use common::prelude::*;
use parking_lot::Mutex;
use protocol::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;

struct Entry {
    handle: ContextActorHandle,
    join: JoinHandle<()>,
}

/// Process-wide registry of live execution contexts.
pub struct ContextRegistry {
    logger: Logger,
    evaluator: Arc<dyn Evaluator>,
    contexts: Mutex<HashMap<ContextId, Entry>>,
}

impl ContextRegistry {
    /// Create an empty registry. Every context it spawns shares `evaluator`.
    pub fn new(logger: Logger, evaluator: Arc<dyn Evaluator>) -> Self {
        Self { logger, evaluator, contexts: Mutex::new(HashMap::new()) }
    }

    /// Create a context. If `suggested_id` is already registered, returns it
    /// unchanged with no side effects (idempotent create); otherwise spawns
    /// a fresh `ContextActor` under a newly allocated or the suggested id.
    pub fn create(&self, suggested_id: Option<ContextId>) -> ContextId {
        let mut contexts = self.contexts.lock();
        if let Some(id) = suggested_id {
            if contexts.contains_key(&id) {
                return id;
            }
        }
        let id = suggested_id.unwrap_or_else(ContextId::new_v4);
        info!(self.logger, "creating context {id}");
        let context_logger = Logger::sub(&self.logger, id);
        let (handle, join) = actor::spawn(id, self.evaluator.clone_ref(), None, context_logger);
        contexts.insert(id, Entry { handle, join });
        id
    }

    /// Deep-copy an existing context's state into a brand-new, independent
    /// context. Fails with [`RuntimeError::ContextNotFound`] if `id` is
    /// unknown.
    pub fn fork(&self, id: ContextId) -> FallibleResult<ContextId> {
        let source_handle = {
            let contexts = self.contexts.lock();
            contexts.get(&id).map(|entry| entry.handle.clone_ref()).ok_or(RuntimeError::ContextNotFound(id))?
        };
        let snapshot: ContextSnapshot = source_handle.snapshot()?;
        let new_id = ContextId::new_v4();
        info!(self.logger, "forking context {id} into {new_id}");
        let context_logger = Logger::sub(&self.logger, new_id);
        let (handle, join) = actor::spawn(new_id, self.evaluator.clone_ref(), Some(snapshot), context_logger);
        self.contexts.lock().insert(new_id, Entry { handle, join });
        Ok(new_id)
    }

    /// Destroy a context: cancels its in-flight job, drains queued commands
    /// with [`RuntimeError::ContextDestroyed`], and releases its resources.
    /// Idempotent: destroying an unknown or already-destroyed id is not an
    /// error.
    pub fn destroy(&self, id: ContextId) {
        let entry = self.contexts.lock().remove(&id);
        if let Some(entry) = entry {
            info!(self.logger, "destroying context {id}");
            entry.handle.destroy();
            // The actor thread observes the command channel closing (every
            // handle clone dropped) and the explicit Shutdown and exits on
            // its own; joining here would deadlock if called from within
            // the actor's own thread, which never happens since destroy is
            // only ever invoked from the Dispatcher/EditStream threads.
            let _ = entry.join.join();
        }
    }

    /// A handle to `id`'s actor, if it is currently registered.
    pub fn get(&self, id: ContextId) -> FallibleResult<ContextActorHandle> {
        self.contexts.lock().get(&id).map(|entry| entry.handle.clone_ref()).ok_or(RuntimeError::ContextNotFound(id))
    }

    /// Every currently registered context id.
    pub fn ids(&self) -> Vec<ContextId> {
        self.contexts.lock().keys().copied().collect()
    }

    /// Destroy every registered context. Used during runtime shutdown.
    pub fn destroy_all(&self) {
        let ids = self.ids();
        for id in ids {
            self.destroy(id);
        }
    }
}
