use std::collections::HashMap;

use crate::api::config_dto::RuleDto;
use crate::domain::scheduler::transfer::{Transfer, TransferState};
use crate::domain::utils::id::{NodeId, RuleId};
use crate::error::{Error, Result};

/// A group of transfers between two sites that become active together after `delay`.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: RuleId,

    /// Virtual seconds after scheduler start before the rule is staged.
    pub delay: f64,

    /// Maximum number of transfers in flight at once: `min(srcLimit, dstLimit)`.
    pub limit: Option<usize>,

    transfers: Vec<Transfer>,
}

impl Rule {
    /// Splits `size_bytes` evenly across `n_transfers` new transfers.
    pub fn new(id: RuleId, delay: f64, src: NodeId, dst: NodeId, priority: u32, size_bytes: f64, n_transfers: usize, limit: Option<usize>) -> Self {
        let byte_count = if n_transfers == 0 { 0.0 } else { size_bytes / n_transfers as f64 };
        let transfers = (0..n_transfers).map(|_| Transfer::new(id.clone(), src.clone(), dst.clone(), priority, byte_count)).collect();

        Self { id, delay, limit, transfers }
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub(crate) fn transfers_mut(&mut self) -> &mut [Transfer] {
        &mut self.transfers
    }

    pub fn count_in(&self, state: TransferState) -> usize {
        self.transfers.iter().filter(|t| t.state() == state).count()
    }

    /// Transfers queued or submitted; these count against the limit.
    pub fn in_flight(&self) -> usize {
        self.count_in(TransferState::Queued) + self.count_in(TransferState::Submitted)
    }

    /// Removes every transfer in `Delete`. Returns how many were removed.
    pub fn clean(&mut self) -> usize {
        let before = self.transfers.len();
        self.transfers.retain(|t| t.state() != TransferState::Delete);
        before - self.transfers.len()
    }

    pub fn is_drained(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Copies the states of `other`, a working copy of this rule, onto matching transfers.
    pub(crate) fn sync_states(&mut self, other: &Rule) {
        let states: HashMap<_, _> = other.transfers.iter().map(|t| (&t.id, t.state())).collect();
        for transfer in &mut self.transfers {
            if let Some(state) = states.get(&transfer.id) {
                transfer.sync_state(*state);
            }
        }
    }
}

impl TryFrom<&RuleDto> for Rule {
    type Error = Error;

    fn try_from(dto: &RuleDto) -> Result<Self> {
        if dto.n_transfers == 0 {
            return Err(Error::ConfigError(format!("rule {}->{} must have at least one transfer", dto.src_site, dto.dst_site)));
        }
        if !dto.size_bytes.is_finite() || dto.size_bytes < 0.0 {
            return Err(Error::ConfigError(format!("rule {}->{} has invalid size {}", dto.src_site, dto.dst_site, dto.size_bytes)));
        }
        if !dto.delay.is_finite() || dto.delay < 0.0 {
            return Err(Error::ConfigError(format!("rule {}->{} has invalid delay {}", dto.src_site, dto.dst_site, dto.delay)));
        }
        if dto.src_limit == Some(0) || dto.dst_limit == Some(0) {
            return Err(Error::ConfigError(format!("rule {}->{} limits must be at least 1", dto.src_site, dto.dst_site)));
        }

        let limit = match (dto.src_limit, dto.dst_limit) {
            (Some(src), Some(dst)) => Some(src.min(dst)),
            (limit, None) | (None, limit) => limit,
        };

        Ok(Rule::new(
            RuleId::generate(),
            dto.delay,
            NodeId::new(dto.src_site.as_str()),
            NodeId::new(dto.dst_site.as_str()),
            dto.priority,
            dto.size_bytes,
            dto.n_transfers,
            limit,
        ))
    }
}
