use serde::Serialize;

use crate::domain::utils::id::{ConnectionId, RouteId};

/// Answer to `GetRoute`: the route handle and its bottleneck priority bandwidth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteInfoDto {
    pub route_id: RouteId,
    pub capacity: f64,
}

/// Answer to `CheckConnection`.
///
/// `remaining_time` is `None` while the connection is not active.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatusDto {
    pub is_finished: bool,
    pub remaining_time: Option<f64>,
}

/// One line of the connection history: a single promise of one connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRowDto {
    pub connection_id: ConnectionId,
    pub total_bytes: f64,
    pub connection_state: String,
    pub promise_index: usize,
    pub route_id: RouteId,
    pub kind: String,
    pub bandwidth: f64,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub bytes_delivered: f64,
}
