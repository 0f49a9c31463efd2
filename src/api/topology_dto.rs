use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One record of the adjacency file: an undirected link between sites `a` and `z`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjacencyDto {
    pub id: String,
    pub a: String,
    pub z: String,
    pub mbps: f64,
    pub igp_metric: f64,
}

/// `{ siteName: [latitude, longitude] }`.
pub type CoordinatesDto = BTreeMap<String, [f64; 2]>;
