//! Claim bookkeeping for listing rows.

use std::collections::HashMap;

use crate::dom::{DocumentTree, NodeId};

/// Processing state of a claimed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    /// Resolution spawned, not yet completed.
    InFlight,
    /// Annotated, or resolution failed.
    Settled,
}

/// Rows whose processing has started, keyed by node identity.
///
/// Holds plain [`NodeId`]s, so a claim never keeps a node alive; claims of
/// nodes that left the tree are dropped by [`ClaimSet::prune`].
#[derive(Debug, Default)]
pub struct ClaimSet {
    claims: HashMap<NodeId, ClaimState>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `node`. Returns false if it was already claimed.
    pub fn claim(&mut self, node: NodeId, state: ClaimState) -> bool {
        if self.claims.contains_key(&node) {
            return false;
        }
        self.claims.insert(node, state);
        true
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.claims.contains_key(&node)
    }

    pub fn state(&self, node: NodeId) -> Option<ClaimState> {
        self.claims.get(&node).copied()
    }

    pub fn settle(&mut self, node: NodeId) {
        if let Some(state) = self.claims.get_mut(&node) {
            *state = ClaimState::Settled;
        }
    }

    pub fn release(&mut self, node: NodeId) -> bool {
        self.claims.remove(&node).is_some()
    }

    /// Release every settled claim; in-flight claims stay.
    pub fn release_settled(&mut self) -> usize {
        let before = self.claims.len();
        self.claims.retain(|_, state| *state == ClaimState::InFlight);
        before - self.claims.len()
    }

    /// Drop claims of nodes no longer attached to `tree`.
    pub fn prune(&mut self, tree: &DocumentTree) -> usize {
        let before = self.claims.len();
        self.claims.retain(|node, _| tree.is_attached(*node));
        before - self.claims.len()
    }

    pub fn in_flight(&self) -> usize {
        self.claims
            .values()
            .filter(|s| **s == ClaimState::InFlight)
            .count()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
