use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::str::FromStr;

use crate::domain::network::route::Route;
use crate::domain::network::topology::{LinkKey, Topology};
use crate::domain::utils::geo::haversine;
use crate::domain::utils::id::NodeId;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingAlgorithm {
    #[default]
    Dijkstra,
    /// Dijkstra guided by the great-circle distance to the destination.
    AStar,
}

impl FromStr for RoutingAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dijkstra" => Ok(RoutingAlgorithm::Dijkstra),
            "a_star" | "astar" | "a*" => Ok(RoutingAlgorithm::AStar),
            other => Err(Error::ConfigError(format!("unknown routing algorithm '{}'", other))),
        }
    }
}

/// Frontier entry of the search. Ordered so that `BinaryHeap` pops the smallest
/// priority first, and among equal priorities the entry pushed first.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    priority: f64,
    seq: u64,
    node: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority.total_cmp(&self.priority).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl Topology {
    /// Shortest route by geographic length, or `None` if `end` is unreachable.
    pub fn shortest_path(&self, start: &NodeId, end: &NodeId, algorithm: RoutingAlgorithm) -> Result<Option<Route>> {
        match algorithm {
            RoutingAlgorithm::Dijkstra => self.dijkstra(start, end),
            RoutingAlgorithm::AStar => self.a_star(start, end),
        }
    }

    pub fn dijkstra(&self, start: &NodeId, end: &NodeId) -> Result<Option<Route>> {
        self.search(start, end, |_| 0.0)
    }

    pub fn a_star(&self, start: &NodeId, end: &NodeId) -> Result<Option<Route>> {
        let target = self.node(end)?.coordinates();
        self.search(start, end, |index| haversine(self.node_at(index).coordinates(), target))
    }

    /// Among the parallel links of one hop, the non-excluded link with the most free
    /// priority bandwidth; the first inserted wins ties.
    fn best_hop(&self, parallel: &[LinkKey]) -> Option<(LinkKey, f64)> {
        let mut best: Option<(LinkKey, f64, f64)> = None;
        for key in parallel {
            let link = self.link_by_key(*key);
            if link.is_spur() {
                continue;
            }
            let free = link.priority_free();
            if best.is_none_or(|(_, _, best_free)| free > best_free) {
                best = Some((*key, link.length(), free));
            }
        }
        best.map(|(key, length, _)| (key, length))
    }

    fn search(&self, start: &NodeId, end: &NodeId, heuristic: impl Fn(usize) -> f64) -> Result<Option<Route>> {
        let source = self.node_index_of(start)?;
        let target = self.node_index_of(end)?;

        let n = self.node_count();
        let mut distance = vec![f64::INFINITY; n];
        let mut previous: Vec<Option<(usize, LinkKey)>> = vec![None; n];
        let mut settled = vec![false; n];
        let mut frontier = BinaryHeap::new();
        let mut seq = 0u64;

        distance[source] = 0.0;
        frontier.push(Frontier { priority: heuristic(source), seq, node: source });

        while let Some(Frontier { node, .. }) = frontier.pop() {
            if settled[node] {
                continue;
            }
            settled[node] = true;
            if node == target {
                break;
            }

            for (neighbor, parallel) in self.adjacency_of(node) {
                if settled[*neighbor] {
                    continue;
                }
                let Some((key, length)) = self.best_hop(parallel) else {
                    continue;
                };

                let candidate = distance[node] + length;
                if candidate < distance[*neighbor] {
                    distance[*neighbor] = candidate;
                    previous[*neighbor] = Some((node, key));
                    seq += 1;
                    frontier.push(Frontier { priority: candidate + heuristic(*neighbor), seq, node: *neighbor });
                }
            }
        }

        if !distance[target].is_finite() {
            return Ok(None);
        }

        let mut links = Vec::new();
        let mut current = target;
        while let Some((parent, key)) = previous[current] {
            links.push(self.link_by_key(key).id.clone());
            current = parent;
        }
        links.reverse();

        Ok(Some(Route::new(start.clone(), end.clone(), links)))
    }

    /// Up to `k` distinct routes between `start` and `end`, shortest first.
    ///
    /// Alternatives are found by excluding every contiguous window of the base route's
    /// links, shortest windows first, and searching again. Exclusions are always undone.
    pub fn find_routes(&mut self, start: &NodeId, end: &NodeId, k: usize, algorithm: RoutingAlgorithm) -> Result<Vec<Route>> {
        let Some(base) = self.shortest_path(start, end, algorithm)? else {
            return Ok(Vec::new());
        };
        let base_keys = self.link_keys(&base.links)?;

        let mut seen = HashSet::from([base.id()]);
        let mut routes = vec![base];

        'windows: for window in 1..=base_keys.len() {
            for offset in 0..=(base_keys.len() - window) {
                if routes.len() >= k {
                    break 'windows;
                }

                let excluded = &base_keys[offset..offset + window];
                self.set_spur(excluded, true);
                let candidate = self.shortest_path(start, end, algorithm);
                self.set_spur(excluded, false);

                if let Some(route) = candidate? {
                    if seen.insert(route.id()) {
                        routes.push(route);
                    }
                }
            }
        }

        let mut ranked = Vec::with_capacity(routes.len());
        for route in routes {
            ranked.push((self.route_length(&route)?, route));
        }
        ranked.sort_by(|(a, _), (b, _)| a.total_cmp(b));

        Ok(ranked.into_iter().map(|(_, route)| route).collect())
    }
}
