//! The per-context visualization registry: attach/modify/detach, plus the
//! inverted index that lets a cache event find every visualization
//! interested in the expression that just changed.
//!
//! Modeled on `Visualization`/`AttachedVisualization`, generalized from a
//! single flat `Vec` of attachments (a `plain::ExecutionContext` keeping
//! `Vec<AttachedVisualization>` and linearly scanning it) into the forward +
//! inverted map pair needed for O(1) re-evaluation fan-out.

use common::prelude::*;
use protocol::prelude::*;
use std::collections::HashMap;
use std::collections::HashSet;

/// The per-context visualization registry.
#[derive(Debug, Default)]
pub struct VisualizationRegistry {
    forward: HashMap<VisualizationId, (ExpressionId, VisualizationSpec)>,
    inverted: HashMap<ExpressionId, HashSet<VisualizationId>>,
}

impl VisualizationRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The spec currently registered for `id`, if any.
    pub fn get(&self, id: VisualizationId) -> Option<&VisualizationSpec> {
        self.forward.get(&id).map(|(_, spec)| spec)
    }

    /// Every visualization id currently registered.
    pub fn ids(&self) -> impl Iterator<Item = VisualizationId> + '_ {
        self.forward.keys().copied()
    }

    /// The visualizations currently attached to `expression_id`.
    pub fn attached_to(&self, expression_id: &ExpressionId) -> impl Iterator<Item = VisualizationId> + '_ {
        self.inverted.get(expression_id).into_iter().flatten().copied()
    }

    /// Register a new visualization. Overwrites silently if `id` was already
    /// registered, matching `attach`'s idempotent-insert semantics; the
    /// caller (`ContextActor`) is the one that decides whether a duplicate
    /// attach should instead be rejected.
    pub fn attach(&mut self, id: VisualizationId, expression_id: ExpressionId, spec: VisualizationSpec) {
        self.forward.insert(id, (expression_id, spec));
        self.inverted.entry(expression_id).or_default().insert(id);
    }

    /// Replace the spec of an already-registered visualization.
    ///
    /// On [`RuntimeError::VisualizationNotFound`], the registry is
    /// unchanged: a failed modify leaves the prior spec in effect
    /// automatically, since there is nothing to roll back, the write
    /// simply never happens.
    pub fn modify(&mut self, id: VisualizationId, spec: VisualizationSpec) -> FallibleResult<()> {
        let (expression_id, existing) = self.forward.get_mut(&id).ok_or(RuntimeError::VisualizationNotFound(id))?;
        *existing = spec;
        let _ = expression_id;
        Ok(())
    }

    /// Remove a visualization. Fails with
    /// [`RuntimeError::VisualizationNotFound`] if `id` is not registered.
    pub fn detach(&mut self, id: VisualizationId) -> FallibleResult<(ExpressionId, VisualizationSpec)> {
        let (expression_id, spec) = self.forward.remove(&id).ok_or(RuntimeError::VisualizationNotFound(id))?;
        if let Some(set) = self.inverted.get_mut(&expression_id) {
            set.remove(&id);
            if set.is_empty() {
                self.inverted.remove(&expression_id);
            }
        }
        Ok((expression_id, spec))
    }

    /// A deep copy of this registry, used by `ContextRegistry::fork`.
    pub fn fork(&self) -> Self {
        Self { forward: self.forward.clone(), inverted: self.inverted.clone() }
    }

    /// Check the forward/inverted bijection invariant. Used by tests; a
    /// violation here is a programming error in this module, never a
    /// reachable runtime state.
    #[cfg(test)]
    fn check_bijection(&self) {
        let mut from_inverted: HashSet<VisualizationId> = HashSet::new();
        for ids in self.inverted.values() {
            for id in ids {
                assert!(self.forward.contains_key(id));
                from_inverted.insert(*id);
            }
        }
        let from_forward: HashSet<VisualizationId> = self.forward.keys().copied().collect();
        assert_eq!(from_inverted, from_forward);
    }
}

impl Clone for VisualizationRegistry {
    fn clone(&self) -> Self {
        self.fork()
    }
}
