use slotmap::{SlotMap, new_key_type};
use std::collections::HashMap;

use crate::api::topology_dto::{AdjacencyDto, CoordinatesDto};
use crate::domain::network::link::{Link, Pool};
use crate::domain::network::node::Node;
use crate::domain::network::route::Route;
use crate::domain::utils::geo::haversine;
use crate::domain::utils::id::{LinkId, NodeId};
use crate::error::{Error, Result};

new_key_type! {
    /// Stable handle of a link inside the topology's slot map.
    pub struct LinkKey;
}

/// Undirected multigraph of sites and links, holding the bandwidth ledger of every link.
///
/// Nodes keep their insertion order so that route search is deterministic for a given input.
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Vec<Node>,
    node_index: HashMap<NodeId, usize>,

    links: SlotMap<LinkKey, Link>,
    link_index: HashMap<LinkId, LinkKey>,

    /// Per node index: every neighbor index with the parallel links towards it, in insertion order.
    adjacency: Vec<Vec<(usize, Vec<LinkKey>)>>,

    best_effort_fraction: f64,
}

impl Topology {
    pub fn new(best_effort_fraction: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&best_effort_fraction) {
            return Err(Error::ConfigError(format!("bestEffortFraction must lie in [0, 1], got {}", best_effort_fraction)));
        }

        Ok(Self {
            nodes: Vec::new(),
            node_index: HashMap::new(),
            links: SlotMap::with_key(),
            link_index: HashMap::new(),
            adjacency: Vec::new(),
            best_effort_fraction,
        })
    }

    pub fn best_effort_fraction(&self) -> f64 {
        self.best_effort_fraction
    }

    /// Adds a site; adding an existing site is a no-op returning its index.
    pub fn add_node(&mut self, id: NodeId, latitude: f64, longitude: f64) -> usize {
        if let Some(index) = self.node_index.get(&id) {
            return *index;
        }

        let index = self.nodes.len();
        self.node_index.insert(id.clone(), index);
        self.nodes.push(Node::new(id, latitude, longitude));
        self.adjacency.push(Vec::new());
        index
    }

    /// Adds a link between two existing sites. Its length is the haversine distance of the endpoints.
    pub fn add_link(&mut self, id: LinkId, a: &NodeId, z: &NodeId, total_bandwidth: f64, igp_metric: f64) -> Result<LinkKey> {
        if self.link_index.contains_key(&id) {
            return Err(Error::ConfigError(format!("duplicate link id '{}'", id)));
        }
        if !total_bandwidth.is_finite() || total_bandwidth <= 0.0 {
            return Err(Error::ConfigError(format!("link '{}' must have a positive capacity, got {}", id, total_bandwidth)));
        }

        let a_index = self.node_index_of(a)?;
        let z_index = self.node_index_of(z)?;
        let distance = haversine(self.nodes[a_index].coordinates(), self.nodes[z_index].coordinates());

        let link = Link::new(id.clone(), (a.clone(), z.clone()), total_bandwidth, self.best_effort_fraction, igp_metric, distance);
        let key = self.links.insert(link);
        self.link_index.insert(id, key);

        self.nodes[a_index].add_neighbor(z.clone());
        self.nodes[z_index].add_neighbor(a.clone());
        self.connect(a_index, z_index, key);
        if a_index != z_index {
            self.connect(z_index, a_index, key);
        }

        Ok(key)
    }

    fn connect(&mut self, from: usize, to: usize, key: LinkKey) {
        let entries = &mut self.adjacency[from];
        match entries.iter_mut().find(|(neighbor, _)| *neighbor == to) {
            Some((_, parallel)) => parallel.push(key),
            None => entries.push((to, vec![key])),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Result<&Node> {
        Ok(&self.nodes[self.node_index_of(id)?])
    }

    pub fn link(&self, id: &LinkId) -> Result<&Link> {
        Ok(&self.links[self.link_key(id)?])
    }

    pub fn link_key(&self, id: &LinkId) -> Result<LinkKey> {
        self.link_index.get(id).copied().ok_or_else(|| Error::not_found("link", id))
    }

    pub(crate) fn node_index_of(&self, id: &NodeId) -> Result<usize> {
        self.node_index.get(id).copied().ok_or_else(|| Error::not_found("node", id))
    }

    pub(crate) fn node_at(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub(crate) fn adjacency_of(&self, index: usize) -> &[(usize, Vec<LinkKey>)] {
        &self.adjacency[index]
    }

    pub(crate) fn links_with_keys(&self) -> impl Iterator<Item = (LinkKey, &Link)> {
        self.links.iter()
    }

    pub(crate) fn link_by_key(&self, key: LinkKey) -> &Link {
        &self.links[key]
    }

    pub(crate) fn link_by_key_mut(&mut self, key: LinkKey) -> &mut Link {
        &mut self.links[key]
    }

    pub(crate) fn set_spur(&mut self, keys: &[LinkKey], is_spur: bool) {
        for key in keys {
            self.links[*key].set_spur(is_spur);
        }
    }

    pub fn reserve(&mut self, link: &LinkId, amount: f64, pool: Pool) -> Result<()> {
        let key = self.link_key(link)?;
        self.links[key].reserve(amount, pool)
    }

    pub fn release(&mut self, link: &LinkId, amount: f64, pool: Pool) -> Result<()> {
        let key = self.link_key(link)?;
        self.links[key].release(amount, pool)
    }

    /// Reserves `amount` on every link of `links`, or on none of them.
    pub fn reserve_route(&mut self, links: &[LinkId], amount: f64, pool: Pool) -> Result<()> {
        let keys = self.link_keys(links)?;
        for key in &keys {
            self.links[*key].can_reserve(amount, pool)?;
        }
        for key in &keys {
            self.links[*key].reserve(amount, pool)?;
        }
        Ok(())
    }

    /// Releases `amount` on every link of `links`, or on none of them.
    pub fn release_route(&mut self, links: &[LinkId], amount: f64, pool: Pool) -> Result<()> {
        let keys = self.link_keys(links)?;
        for key in &keys {
            self.links[*key].can_release(amount, pool)?;
        }
        for key in &keys {
            self.links[*key].release(amount, pool)?;
        }
        Ok(())
    }

    pub(crate) fn link_keys(&self, links: &[LinkId]) -> Result<Vec<LinkKey>> {
        links.iter().map(|id| self.link_key(id)).collect()
    }

    /// Sum of the geographic lengths of all links of `route`.
    pub fn route_length(&self, route: &Route) -> Result<f64> {
        let mut length = 0.0;
        for link in &route.links {
            length += self.link(link)?.distance();
        }
        Ok(length)
    }

    /// Bottleneck free priority bandwidth along `route`. A route without links carries nothing.
    pub fn route_capacity(&self, route: &Route) -> Result<f64> {
        let Some((first, rest)) = route.links.split_first() else {
            return Ok(0.0);
        };
        let mut capacity = self.link(first)?.priority_free();
        for link in rest {
            capacity = capacity.min(self.link(link)?.priority_free());
        }
        Ok(capacity)
    }
}

impl TryFrom<(Vec<AdjacencyDto>, CoordinatesDto, f64)> for Topology {
    type Error = Error;

    fn try_from((adjacencies, coordinates, best_effort_fraction): (Vec<AdjacencyDto>, CoordinatesDto, f64)) -> Result<Self> {
        let mut topology = Topology::new(best_effort_fraction)?;

        for adjacency in adjacencies {
            // 1. Make sure both endpoints exist, in the order they first appear.
            for site in [&adjacency.a, &adjacency.z] {
                let [latitude, longitude] = coordinates
                    .get(site)
                    .copied()
                    .ok_or_else(|| Error::ConfigError(format!("no coordinates for site '{}' of link '{}'", site, adjacency.id)))?;
                topology.add_node(NodeId::new(site.as_str()), latitude, longitude);
            }

            // 2. Insert the link itself.
            topology.add_link(
                LinkId::new(adjacency.id),
                &NodeId::new(adjacency.a),
                &NodeId::new(adjacency.z),
                adjacency.mbps,
                adjacency.igp_metric,
            )?;
        }

        log::info!("Topology loaded: {} sites, {} links.", topology.node_count(), topology.link_count());
        Ok(topology)
    }
}
