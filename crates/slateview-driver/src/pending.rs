//! Pending-action registry.
//!
//! Correlates outbound event tokens with the engine action handles they were
//! emitted for. An entry is removed exactly once: either by a matching
//! inbound response (or extension resolution), or by the engine terminating
//! the action itself.

use std::collections::HashMap;

use slateview_engine::ActionHandle;

/// One registered in-flight action.
#[derive(Debug, Clone, Copy)]
pub struct PendingAction {
    pub token: u64,
    pub action: ActionHandle,
    /// Whether the view host was told about this action (and therefore must
    /// be told when the engine terminates it).
    pub host_visible: bool,
}

/// Token-indexed map of in-flight actions.
#[derive(Debug, Default)]
pub struct PendingActionRegistry {
    entries: HashMap<u64, PendingAction>,
}

impl PendingActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new entry. Tokens come off the sequence counter, so a
    /// collision means a bookkeeping bug; the stale entry is replaced and
    /// logged by the caller via the return value.
    pub fn register(&mut self, token: u64, action: ActionHandle, host_visible: bool) -> Option<PendingAction> {
        self.entries.insert(
            token,
            PendingAction {
                token,
                action,
                host_visible,
            },
        )
    }

    /// Remove by outbound token (response / extension resolution path).
    pub fn remove_by_token(&mut self, token: u64) -> Option<PendingAction> {
        self.entries.remove(&token)
    }

    /// Remove by engine action handle (engine termination path).
    pub fn remove_by_action(&mut self, action: ActionHandle) -> Option<PendingAction> {
        let token = self
            .entries
            .values()
            .find(|p| p.action == action)
            .map(|p| p.token)?;
        self.entries.remove(&token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
