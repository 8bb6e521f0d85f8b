//! Capability gating: the grants a session must hold before the Dispatcher
//! will route certain requests to it.
//!
//! Modeled after a `CapabilityRegistration`/`RegisterOptions` pair,
//! generalized from "one registration per method" to an explicit,
//! inspectable set of named capabilities per session.

use serde::Deserialize;
use serde::Serialize;

/// A capability a session may hold over an execution context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Permits requests that mutate the context (push/pop frames, recompute,
    /// attach/detach visualizations, set execution environment).
    CanModify,
    /// The session receives `ExpressionUpdated`/diagnostic notifications for
    /// this context.
    ReceivesUpdates,
    /// The session receives suggestions-database update notifications.
    ReceivesSuggestionsDatabaseUpdates,
}

/// The set of capabilities a single session currently holds over a single
/// execution context.
///
/// Distinct from a plain `bool`-per-request check: a grant is an explicit,
/// inspectable value so the Dispatcher can report *which* capability is
/// missing rather than a bare "access denied".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapabilityGrant {
    held: std::collections::BTreeSet<Capability>,
}

impl CapabilityGrant {
    /// A grant holding nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// A grant holding every capability, used for the session that created
    /// a context.
    pub fn full() -> Self {
        let mut grant = Self::none();
        grant.grant(Capability::CanModify);
        grant.grant(Capability::ReceivesUpdates);
        grant.grant(Capability::ReceivesSuggestionsDatabaseUpdates);
        grant
    }

    /// Add `capability` to this grant.
    pub fn grant(&mut self, capability: Capability) {
        self.held.insert(capability);
    }

    /// Remove `capability` from this grant.
    pub fn revoke(&mut self, capability: Capability) {
        self.held.remove(&capability);
    }

    /// Whether `capability` is currently held.
    pub fn has(&self, capability: Capability) -> bool {
        self.held.contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_grant_has_every_capability() {
        let grant = CapabilityGrant::full();
        assert!(grant.has(Capability::CanModify));
        assert!(grant.has(Capability::ReceivesUpdates));
        assert!(grant.has(Capability::ReceivesSuggestionsDatabaseUpdates));
    }

    #[test]
    fn revoke_removes_only_named_capability() {
        let mut grant = CapabilityGrant::full();
        grant.revoke(Capability::CanModify);
        assert!(!grant.has(Capability::CanModify));
        assert!(grant.has(Capability::ReceivesUpdates));
    }

    #[test]
    fn none_grant_has_nothing() {
        let grant = CapabilityGrant::none();
        assert!(!grant.has(Capability::CanModify));
    }
}
