use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::hash::{Hash, Hasher};

use crate::domain::utils::id::{LinkId, NodeId, RouteId};
use crate::error::{Error, Result};

const LINK_SEPARATOR: &str = "&";

/// An ordered sequence of links from `start` to `end`.
///
/// Two routes are equal when they use the same set of links, regardless of order.
#[derive(Debug, Clone)]
pub struct Route {
    pub start: NodeId,
    pub end: NodeId,
    pub links: Vec<LinkId>,
}

impl Route {
    pub fn new(start: NodeId, end: NodeId, links: Vec<LinkId>) -> Self {
        Self { start, end, links }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn contains(&self, link: &LinkId) -> bool {
        self.links.contains(link)
    }

    fn sorted_link_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.links.iter().map(|l| l.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Standard base64 of the lexicographically sorted link names joined by `&`.
    pub fn id(&self) -> RouteId {
        RouteId::new(STANDARD.encode(self.sorted_link_names().join(LINK_SEPARATOR)))
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        self.sorted_link_names() == other.sorted_link_names()
    }
}

impl Eq for Route {}

impl Hash for Route {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sorted_link_names().hash(state);
    }
}

impl RouteId {
    /// Decodes the sorted link names a route id was built from.
    pub fn link_names(&self) -> Result<Vec<LinkId>> {
        let bytes = STANDARD.decode(self.as_str()).map_err(|_| Error::not_found("route", self))?;
        let joined = String::from_utf8(bytes).map_err(|_| Error::not_found("route", self))?;
        if joined.is_empty() {
            return Ok(Vec::new());
        }

        Ok(joined.split(LINK_SEPARATOR).map(LinkId::new).collect())
    }
}
