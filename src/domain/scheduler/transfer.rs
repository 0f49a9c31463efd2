use serde::Serialize;

use crate::domain::utils::id::{ConnectionId, NodeId, RuleId, SitePairId, TransferId};

/// Lifecycle of a transfer. Edges only move forward:
/// `Preparing -> [Waiting ->] Queued -> Submitted -> Done -> Delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    Preparing,
    /// Held back by the throttler.
    Waiting,
    Queued,
    Submitted,
    Done,
    /// Pruned from its rule at the start of the next heartbeat.
    Delete,
}

impl TransferState {
    pub fn can_transition_to(self, next: TransferState) -> bool {
        use TransferState::*;
        matches!(
            (self, next),
            (Preparing, Waiting) | (Preparing, Queued) | (Waiting, Queued) | (Queued, Submitted) | (Submitted, Done) | (Done, Delete)
        )
    }
}

#[derive(Debug, Clone)]
pub struct Transfer {
    pub id: TransferId,
    pub rule_id: RuleId,
    pub src: NodeId,
    pub dst: NodeId,
    pub site_pair_id: SitePairId,
    pub priority: u32,
    pub byte_count: f64,
    state: TransferState,
}

impl Transfer {
    pub fn new(rule_id: RuleId, src: NodeId, dst: NodeId, priority: u32, byte_count: f64) -> Self {
        let site_pair_id = SitePairId::from_sites(&src, &dst);
        Self { id: TransferId::generate(), rule_id, src, dst, site_pair_id, priority, byte_count, state: TransferState::Preparing }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// The network connection that carries this transfer's rule between its sites.
    pub fn connection_id(&self) -> ConnectionId {
        ConnectionId::derive(&self.rule_id, &self.src, &self.dst)
    }

    /// Moves to `next` if that edge exists. Returns whether the state changed.
    pub(crate) fn advance(&mut self, next: TransferState) -> bool {
        if !self.state.can_transition_to(next) {
            log::error!("Refusing transfer {} transition {:?} -> {:?}.", self.id, self.state, next);
            return false;
        }
        self.state = next;
        true
    }

    /// Overwrites the state with one computed on a copy of this transfer.
    pub(crate) fn sync_state(&mut self, state: TransferState) {
        self.state = state;
    }
}
