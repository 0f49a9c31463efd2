use std::collections::HashMap;

use crate::domain::network::link::{LEDGER_TOLERANCE, Pool};
use crate::domain::network::topology::{LinkKey, Topology};
use crate::error::Result;

/// Outcome of one max-min fair distribution over the best-effort pools.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    /// Rate granted to each holder, in the order the holders were given.
    pub rates: Vec<f64>,
    pub passes: usize,
    /// `false` if the pass limit was reached with holders still unresolved.
    pub converged: bool,
}

/// Water-filling distribution of every link's best-effort pool among `holders`,
/// each given as the links of its route.
///
/// All best-effort pools are reset first, so the result depends only on the
/// current holder set. On return every link's holder count equals the number of
/// holders routed over it, and its best-effort pool is charged with their rates.
pub fn distribute(topology: &mut Topology, holders: &[Vec<LinkKey>], max_passes: usize) -> Result<Distribution> {
    // 1. Return everything previously handed out and recount who uses which link.
    let in_use: Vec<(LinkKey, f64)> = topology.links_with_keys().map(|(key, link)| (key, link.in_use(Pool::BestEffort))).collect();
    for (key, amount) in in_use {
        let link = topology.link_by_key_mut(key);
        if amount > 0.0 {
            link.release(amount, Pool::BestEffort)?;
        }
        link.set_best_effort_holders(0);
    }

    let mut counts: HashMap<LinkKey, usize> = HashMap::new();
    for links in holders {
        for key in links {
            *counts.entry(*key).or_default() += 1;
        }
    }
    for (key, count) in &counts {
        topology.link_by_key_mut(*key).set_best_effort_holders(*count);
    }

    // 2. Fill the pools pass by pass. Holders whose fair share drops to zero are
    //    resolved and stop counting against their links.
    let mut rates = vec![0.0; holders.len()];
    let mut remaining = counts.clone();
    let mut active: Vec<usize> = (0..holders.len()).filter(|h| !holders[*h].is_empty()).collect();
    let mut passes = 0;

    while !active.is_empty() && passes < max_passes {
        passes += 1;

        let shares: Vec<(usize, f64)> = active
            .iter()
            .map(|&holder| {
                let share = holders[holder]
                    .iter()
                    .map(|key| topology.link_by_key(*key).best_effort_free() / remaining[key] as f64)
                    .fold(f64::INFINITY, f64::min);
                (holder, share)
            })
            .collect();

        let mut still_active = Vec::with_capacity(shares.len());
        let mut grants = Vec::with_capacity(shares.len());
        for (holder, share) in shares {
            if share <= LEDGER_TOLERANCE {
                for key in &holders[holder] {
                    if let Some(count) = remaining.get_mut(key) {
                        *count = count.saturating_sub(1);
                    }
                }
            } else {
                grants.push((holder, share));
                still_active.push(holder);
            }
        }

        for (holder, share) in grants {
            for key in &holders[holder] {
                let link = topology.link_by_key_mut(*key);
                let grant = share.min(link.best_effort_free());
                link.reserve(grant, Pool::BestEffort)?;
            }
            rates[holder] += share;
        }

        active = still_active;
    }

    Ok(Distribution { rates, passes, converged: active.is_empty() })
}
