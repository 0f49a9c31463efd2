use crate::domain::utils::id::NodeId;

/// A site of the network with its geographic position.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub latitude: f64,
    pub longitude: f64,

    /// Adjacent sites in the order their first link was listed. Never contains duplicates.
    neighbors: Vec<NodeId>,
}

impl Node {
    pub fn new(id: NodeId, latitude: f64, longitude: f64) -> Self {
        Self { id, latitude, longitude, neighbors: Vec::new() }
    }

    pub fn coordinates(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    pub fn neighbors(&self) -> &[NodeId] {
        &self.neighbors
    }

    pub fn is_neighbor(&self, other: &NodeId) -> bool {
        self.neighbors.contains(other)
    }

    /// Returns `false` if `other` was already a neighbor.
    pub fn add_neighbor(&mut self, other: NodeId) -> bool {
        if self.is_neighbor(&other) {
            return false;
        }
        self.neighbors.push(other);
        true
    }
}
