//! `EditStream`: reconciles source edits with every live execution context's
//! value cache.
//!
//! Modeled on `ExecutionContext::handle_notification`, which reacts to a
//! `ComputedValueExpressions` / module-invalidated notification by clearing
//! the relevant `ComputedValueInfoRegistry` entries. This module generalizes
//! that single-context reaction into a two-tier, multi-context rule: a
//! context whose stack descends from the edited module clears every cached
//! id belonging to that module; every other context only clears the ids the
//! parser reports as textually replaced.

use crate::actor::Invalidated;
use crate::registry::ContextRegistry;
use common::prelude::*;
use protocol::prelude::*;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

/// A single source-code edit to reconcile against running contexts.
#[derive(Clone, Debug)]
pub struct SourceEdit {
    /// The module the edit was applied to.
    pub module: String,
    /// The expression ids whose parsed node was textually replaced, as
    /// reported by the parser. Used for contexts that don't descend from
    /// `module`.
    pub replaced_ids: Vec<ExpressionId>,
}

/// Tracks, per module, which expression ids belong to it, and applies
/// incoming edits to every context in a shared [`ContextRegistry`].
///
/// Edits must be handed to [`EditStream::apply`] in strict receipt order;
/// this type does not itself serialize concurrent callers; the Dispatcher is
/// expected to be the sole caller, invoking `apply` from its single thread,
/// so edits are applied strictly in receipt order.
pub struct EditStream {
    logger: Logger,
    registry: Arc<ContextRegistry>,
    module_expression_ids: Mutex<HashMap<String, HashSet<ExpressionId>>>,
}

impl EditStream {
    /// Build an `EditStream` that invalidates contexts in `registry`.
    pub fn new(logger: Logger, registry: Arc<ContextRegistry>) -> Self {
        Self { logger, registry, module_expression_ids: Mutex::new(HashMap::new()) }
    }

    /// Record the full set of expression ids currently belonging to
    /// `module`, as reported by a fresh compilation. Replaces any
    /// previously recorded set for the same module outright (compilation
    /// output is always a complete picture, not a delta).
    pub fn set_module_expression_ids(&self, module: impl Into<String>, ids: impl IntoIterator<Item = ExpressionId>) {
        let module = module.into();
        let ids: HashSet<ExpressionId> = ids.into_iter().collect();
        debug!(self.logger, "module {module} now has {} known expression ids", ids.len());
        self.module_expression_ids.lock().unwrap().insert(module, ids);
    }

    /// Drop all bookkeeping for `module`, e.g. on module unload.
    pub fn forget_module(&self, module: &str) {
        self.module_expression_ids.lock().unwrap().remove(module);
    }

    /// Apply one edit: invalidate the affected cache entries in every live
    /// context and enqueue a re-evaluation job for each context actually
    /// touched.
    pub fn apply(&self, edit: SourceEdit) {
        info!(self.logger, "applying edit to module {}", edit.module);
        let ids_in_module: Vec<ExpressionId> = self
            .module_expression_ids
            .lock()
            .unwrap()
            .get(&edit.module)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();

        for context_id in self.registry.ids() {
            let Ok(handle) = self.registry.get(context_id) else { continue };
            let root_module = match handle.root_module() {
                Ok(module) => module,
                Err(_) => continue,
            };
            let invalidated = if root_module.as_deref() == Some(edit.module.as_str()) {
                Invalidated::Ids(ids_in_module.clone())
            } else {
                Invalidated::Ids(edit.replaced_ids.clone())
            };
            match handle.recompute(Some(invalidated)) {
                Ok(()) | Err(RuntimeError::EmptyStack) => {}
                Err(error) => warning!(self.logger, "recompute after edit failed for context {context_id}: {error}"),
            }
        }
    }
}
