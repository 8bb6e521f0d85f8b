//! The interactive execution runtime: the actor-per-context scheduler, the
//! per-context value cache and visualization engine, the incremental
//! suggestions index, and the dispatcher tying them to sessions.
//!
//! Modeled on an `ide` crate layout (`controller/`, `model/`, `executor/`),
//! generalized from a single-client, in-process IDE backend to a process
//! embeddable behind a multi-session language-server transport: the
//! `Dispatcher` here plays the role `controller::Project` plays for one
//! view, but tracks capability grants per session rather than assuming
//! exclusive ownership.

pub mod actor;
pub mod dispatcher;
pub mod edit_stream;
pub mod notification;
pub mod registry;
pub mod stack;
pub mod suggestions_index;
pub mod value_cache;
pub mod visualization;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

use common::prelude::*;
use protocol::prelude::*;
use std::sync::Arc;

/// The single top-level owner of every process-wide resource the runtime
/// needs: the context registry, the suggestions index, and the edit stream
/// that reconciles the two. Global mutable state must be owned by one
/// value with an explicit lifecycle; this is that value.
pub struct Runtime {
    logger: Logger,
    dispatcher: Arc<dispatcher::Dispatcher>,
}

impl Runtime {
    /// Build a runtime backed by `evaluator`. Nothing runs until a session
    /// is initialized and contexts are created against it.
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        let logger = Logger::new("runtime");
        let dispatcher = Arc::new(dispatcher::Dispatcher::new(logger.clone(), evaluator));
        Self { logger, dispatcher }
    }

    /// The dispatcher through which every command and subscription flows.
    pub fn dispatcher(&self) -> &Arc<dispatcher::Dispatcher> {
        &self.dispatcher
    }

    /// Shut the runtime down: every context is destroyed. Background
    /// threads (per-context actors, per-subscription forwarders) observe
    /// their channels closing and exit on their own.
    pub fn shutdown(self) {
        info!(self.logger, "runtime shutting down");
        self.dispatcher.shutdown();
    }
}
