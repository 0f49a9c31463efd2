use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// String identifier tagged with the kind of thing it names, so a `LinkId`
/// cannot be passed where a `NodeId` is expected.
pub struct Id<T> {
    pub id: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(id: impl Into<String>) -> Self {
        Id { id: id.into(), _marker: PhantomData }
    }

    /// Fresh random identifier (32 lowercase hex characters).
    pub fn generate() -> Self {
        Id::new(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

// Manual impls: the derives would put bounds on the marker type.
impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Id::new(self.id.clone())
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full_name = std::any::type_name::<T>();
        let clean_name = full_name.split("::").last().unwrap_or(full_name);
        let display_name = clean_name.replace("Tag", "Id");

        write!(f, "{}: {:?}", display_name, self.id)
    }
}

impl<T> From<Id<T>> for String {
    fn from(id_wrapper: Id<T>) -> Self {
        id_wrapper.id
    }
}

impl<T> From<&str> for Id<T> {
    fn from(id: &str) -> Self {
        Id::new(id)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Id::new)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NodeTag;
#[derive(Debug, Clone, Copy)]
pub struct LinkTag;
#[derive(Debug, Clone, Copy)]
pub struct RouteTag;
#[derive(Debug, Clone, Copy)]
pub struct ConnectionTag;
#[derive(Debug, Clone, Copy)]
pub struct RuleTag;
#[derive(Debug, Clone, Copy)]
pub struct TransferTag;
#[derive(Debug, Clone, Copy)]
pub struct SitePairTag;

/// Site name, unique within a topology.
pub type NodeId = Id<NodeTag>;
pub type LinkId = Id<LinkTag>;
pub type RouteId = Id<RouteTag>;
pub type ConnectionId = Id<ConnectionTag>;
pub type RuleId = Id<RuleTag>;
pub type TransferId = Id<TransferTag>;
/// `"{src}&{dst}"`.
pub type SitePairId = Id<SitePairTag>;

impl ConnectionId {
    /// Connection ids are derived, not allocated: `"{rule}_{src}_{dst}"`.
    pub fn derive(rule_id: &RuleId, src: &NodeId, dst: &NodeId) -> Self {
        ConnectionId::new(format!("{}_{}_{}", rule_id, src, dst))
    }
}

impl SitePairId {
    pub fn from_sites(src: &NodeId, dst: &NodeId) -> Self {
        SitePairId::new(format!("{}&{}", src, dst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_ids() {
        let rule = RuleId::new("r1");
        let src = NodeId::new("A");
        let dst = NodeId::new("C");

        assert_eq!(ConnectionId::derive(&rule, &src, &dst).as_str(), "r1_A_C");
        assert_eq!(SitePairId::from_sites(&src, &dst).as_str(), "A&C");
    }

    #[test]
    fn test_generated_ids_are_hex_and_unique() {
        let a = RuleId::generate();
        let b = RuleId::generate();

        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_debug_shows_kind() {
        let link = LinkId::new("A--B");
        assert_eq!(format!("{:?}", link), "LinkId: \"A--B\"");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let node = NodeId::new("cern");
        assert_eq!(serde_json::to_string(&node).unwrap(), "\"cern\"");

        let parsed: NodeId = serde_json::from_str("\"fnal\"").unwrap();
        assert_eq!(parsed, NodeId::new("fnal"));
    }
}
