use crate::domain::utils::id::{LinkId, NodeId};
use crate::error::{Error, Result};

/// Slack allowed on every ledger comparison to absorb floating-point drift.
pub const LEDGER_TOLERANCE: f64 = 1e-9;

/// The two disjoint bandwidth pools of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pool {
    /// Guaranteed reservations, sized `total * (1 - best_effort_fraction)`.
    Priority,
    /// Shared max-min fair pool, sized `total * best_effort_fraction`.
    BestEffort,
}

/// An undirected physical link with its bandwidth ledger.
///
/// Invariant: `0 <= free(pool) <= ceiling(pool)` for both pools, up to [`LEDGER_TOLERANCE`].
#[derive(Debug, Clone)]
pub struct Link {
    pub id: LinkId,

    /// Both endpoints, in the order the adjacency record listed them.
    pub nodes: (NodeId, NodeId),

    /// Capacity in Mbps.
    pub total_bandwidth: f64,

    pub best_effort_fraction: f64,

    /// Informational only; routing uses the geographic length.
    pub igp_metric: f64,

    priority_free: f64,
    best_effort_free: f64,

    /// Great-circle distance between the endpoints in km.
    distance: f64,

    /// Temporarily excluded from routing; its length reads as infinite while set.
    is_spur: bool,

    best_effort_holders: usize,
}

impl Link {
    pub fn new(id: LinkId, nodes: (NodeId, NodeId), total_bandwidth: f64, best_effort_fraction: f64, igp_metric: f64, distance: f64) -> Self {
        let mut link = Self {
            id,
            nodes,
            total_bandwidth,
            best_effort_fraction,
            igp_metric,
            priority_free: 0.0,
            best_effort_free: 0.0,
            distance,
            is_spur: false,
            best_effort_holders: 0,
        };
        link.priority_free = link.ceiling(Pool::Priority);
        link.best_effort_free = link.ceiling(Pool::BestEffort);
        link
    }

    pub fn ceiling(&self, pool: Pool) -> f64 {
        match pool {
            Pool::Priority => self.total_bandwidth * (1.0 - self.best_effort_fraction),
            Pool::BestEffort => self.total_bandwidth * self.best_effort_fraction,
        }
    }

    pub fn free(&self, pool: Pool) -> f64 {
        match pool {
            Pool::Priority => self.priority_free,
            Pool::BestEffort => self.best_effort_free,
        }
    }

    pub fn in_use(&self, pool: Pool) -> f64 {
        (self.ceiling(pool) - self.free(pool)).max(0.0)
    }

    pub fn priority_free(&self) -> f64 {
        self.priority_free
    }

    pub fn best_effort_free(&self) -> f64 {
        self.best_effort_free
    }

    /// Routing weight: the geographic distance, or infinity while the link is excluded.
    pub fn length(&self) -> f64 {
        if self.is_spur { f64::INFINITY } else { self.distance }
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn is_spur(&self) -> bool {
        self.is_spur
    }

    pub(crate) fn set_spur(&mut self, is_spur: bool) {
        self.is_spur = is_spur;
    }

    pub fn best_effort_holders(&self) -> usize {
        self.best_effort_holders
    }

    pub(crate) fn set_best_effort_holders(&mut self, holders: usize) {
        self.best_effort_holders = holders;
    }

    pub fn connects(&self, node: &NodeId) -> bool {
        &self.nodes.0 == node || &self.nodes.1 == node
    }

    pub fn other_end(&self, node: &NodeId) -> Option<&NodeId> {
        if &self.nodes.0 == node {
            Some(&self.nodes.1)
        } else if &self.nodes.1 == node {
            Some(&self.nodes.0)
        } else {
            None
        }
    }

    /// Checks that `amount` fits into the free bandwidth of `pool` without changing anything.
    pub fn can_reserve(&self, amount: f64, pool: Pool) -> Result<()> {
        let available = self.free(pool);
        if !amount.is_finite() || amount < 0.0 || amount > available + LEDGER_TOLERANCE {
            return Err(self.capacity_exceeded(amount, available));
        }
        Ok(())
    }

    /// Checks that returning `amount` would not push `pool` above its ceiling.
    pub fn can_release(&self, amount: f64, pool: Pool) -> Result<()> {
        let in_use = self.in_use(pool);
        if !amount.is_finite() || amount < 0.0 || amount > in_use + LEDGER_TOLERANCE {
            return Err(self.capacity_exceeded(amount, in_use));
        }
        Ok(())
    }

    pub fn reserve(&mut self, amount: f64, pool: Pool) -> Result<()> {
        self.can_reserve(amount, pool)?;
        let remaining = (self.free(pool) - amount).max(0.0);
        self.set_free(pool, remaining);
        Ok(())
    }

    pub fn release(&mut self, amount: f64, pool: Pool) -> Result<()> {
        self.can_release(amount, pool)?;
        let remaining = (self.free(pool) + amount).min(self.ceiling(pool));
        self.set_free(pool, remaining);
        Ok(())
    }

    fn set_free(&mut self, pool: Pool, value: f64) {
        match pool {
            Pool::Priority => self.priority_free = value,
            Pool::BestEffort => self.best_effort_free = value,
        }
    }

    fn capacity_exceeded(&self, requested: f64, available: f64) -> Error {
        Error::CapacityExceeded { link: self.id.to_string(), requested, available }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(total: f64, fraction: f64) -> Link {
        Link::new(LinkId::new("L"), (NodeId::new("A"), NodeId::new("B")), total, fraction, 1.0, 100.0)
    }

    #[test]
    fn test_pools_split_capacity() {
        let link = link(1000.0, 0.2);
        assert!((link.priority_free() - 800.0).abs() < 1e-9);
        assert!((link.best_effort_free() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_reserve_over_capacity_leaves_link_unchanged() {
        let mut link = link(1000.0, 0.0);
        link.reserve(600.0, Pool::Priority).unwrap();

        let result = link.reserve(500.0, Pool::Priority);
        assert!(matches!(result, Err(Error::CapacityExceeded { .. })));
        assert!((link.priority_free() - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_release_clamps_to_ceiling() {
        let mut link = link(1000.0, 0.0);
        link.reserve(1000.0, Pool::Priority).unwrap();
        link.release(1000.0 + 1e-12, Pool::Priority).unwrap();
        assert_eq!(link.priority_free(), 1000.0);

        assert!(link.release(1.0, Pool::Priority).is_err());
    }

    #[test]
    fn test_reserve_within_tolerance_clamps_to_zero() {
        let mut link = link(1000.0, 0.0);
        link.reserve(1000.0 + 1e-12, Pool::Priority).unwrap();
        assert_eq!(link.priority_free(), 0.0);
    }

    #[test]
    fn test_spur_link_has_infinite_length() {
        let mut link = link(1000.0, 0.0);
        link.set_spur(true);
        assert!(link.length().is_infinite());
        link.set_spur(false);
        assert_eq!(link.length(), 100.0);
    }

    #[test]
    fn test_other_end() {
        let link = link(1000.0, 0.0);
        assert_eq!(link.other_end(&NodeId::new("A")), Some(&NodeId::new("B")));
        assert_eq!(link.other_end(&NodeId::new("C")), None);
    }
}
