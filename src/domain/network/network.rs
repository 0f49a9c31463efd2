use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::api::config_dto::NetworkConfigDto;
use crate::api::network_dto::{ConnectionStatusDto, HistoryRowDto, RouteInfoDto};
use crate::domain::clock::{SharedClock, timed};
use crate::domain::network::best_effort::distribute;
use crate::domain::network::link::Pool;
use crate::domain::network::route::Route;
use crate::domain::network::router::RoutingAlgorithm;
use crate::domain::network::topology::Topology;
use crate::domain::reservation::connection::Connection;
use crate::domain::reservation::promise::PromiseKind;
use crate::domain::utils::id::{ConnectionId, LinkId, NodeId, RouteId, RuleId};
use crate::domain::utils::statistics::{ANALYTICS_TARGET, NetworkStatistics, StatisticsSnapshot};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub max_distribution_passes: usize,
    pub routing_algorithm: RoutingAlgorithm,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { max_distribution_passes: 100, routing_algorithm: RoutingAlgorithm::Dijkstra }
    }
}

impl TryFrom<&NetworkConfigDto> for NetworkConfig {
    type Error = Error;

    fn try_from(dto: &NetworkConfigDto) -> Result<Self> {
        if dto.max_distribution_passes == 0 {
            return Err(Error::ConfigError("maxDistributionPasses must be at least 1".to_string()));
        }

        Ok(Self { max_distribution_passes: dto.max_distribution_passes, routing_algorithm: dto.routing_algorithm.parse()? })
    }
}

/// Free bandwidth of one link at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkSnapshot {
    pub total_bandwidth: f64,
    pub priority_free: f64,
    pub best_effort_free: f64,
    pub best_effort_holders: usize,
}

#[derive(Debug)]
struct NetworkState {
    topology: Topology,
    connections: BTreeMap<ConnectionId, Connection>,
    route_cache: HashMap<RouteId, Route>,
    /// Active best-effort promises (connection, promise index) as of the last
    /// distribution, in distribution order.
    holders: Vec<(ConnectionId, usize)>,
}

/// Thread-safe broker over one topology: answers route queries and runs the
/// lifecycle of connections, keeping the bandwidth ledger consistent.
///
/// All operations serialize on one lock. Each operation first finishes every
/// connection whose end time has passed, and afterwards redistributes the
/// best-effort pools if the set of best-effort holders changed.
#[derive(Debug)]
pub struct Network {
    state: Mutex<NetworkState>,
    clock: SharedClock,
    config: NetworkConfig,
    statistics: NetworkStatistics,
}

impl Network {
    pub fn new(topology: Topology, config: NetworkConfig, clock: SharedClock) -> Self {
        let state = NetworkState { topology, connections: BTreeMap::new(), route_cache: HashMap::new(), holders: Vec::new() };

        Self { state: Mutex::new(state), clock, config, statistics: NetworkStatistics::new() }
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `op` under the lock with settlement before and redistribution after.
    fn transact<R>(&self, op: impl FnOnce(&mut NetworkState, f64) -> Result<R>) -> Result<R> {
        let mut state = self.lock();
        let now = self.clock.now();

        self.settle(&mut state, now)?;
        let result = op(&mut *state, now);
        self.rebalance(&mut state, now)?;

        result
    }

    fn settle(&self, state: &mut NetworkState, now: f64) -> Result<()> {
        let NetworkState { topology, connections, .. } = state;
        for connection in connections.values_mut() {
            if connection.check(now, topology)? {
                self.statistics.record_connection_finished();
                tracing::info!(target: ANALYTICS_TARGET, connection = %connection.id, time = ?connection.end_time(), "connection finished");
            }
        }
        Ok(())
    }

    fn rebalance(&self, state: &mut NetworkState, now: f64) -> Result<()> {
        let holders: Vec<(ConnectionId, usize)> = state
            .connections
            .iter()
            .filter(|(_, connection)| connection.active_best_effort().is_some())
            .map(|(id, connection)| (id.clone(), connection.promises().len() - 1))
            .collect();
        if holders == state.holders {
            return Ok(());
        }

        let mut routes = Vec::with_capacity(holders.len());
        for (id, _) in &holders {
            let links = match state.connections.get(id).and_then(|c| c.active_best_effort()) {
                Some(promise) => state.topology.link_keys(&promise.route().links)?,
                None => Vec::new(),
            };
            routes.push(links);
        }

        let max_passes = self.config.max_distribution_passes;
        let distribution = timed(self.clock.as_ref(), "best-effort distribution", || distribute(&mut state.topology, &routes, max_passes))?;

        for ((id, _), rate) in holders.iter().zip(&distribution.rates) {
            if let Some(promise) = state.connections.get_mut(id).and_then(|c| c.active_best_effort_mut()) {
                promise.rebase(now, *rate);
            }
        }

        self.statistics.record_distribution(distribution.passes, !distribution.converged);
        if distribution.converged {
            tracing::debug!(target: ANALYTICS_TARGET, holders = holders.len(), passes = distribution.passes, "best-effort distribution converged");
        } else {
            tracing::warn!(
                target: ANALYTICS_TARGET,
                holders = holders.len(),
                passes = distribution.passes,
                "best-effort distribution stopped at the pass limit"
            );
        }

        state.holders = holders;
        Ok(())
    }

    /// Shortest route between two sites with the configured algorithm; cached by id.
    pub fn shortest_path(&self, start: &NodeId, end: &NodeId) -> Result<Option<Route>> {
        let algorithm = self.config.routing_algorithm;
        self.transact(|state, _| {
            let route = state.topology.shortest_path(start, end, algorithm)?;
            if let Some(route) = &route {
                state.route_cache.insert(route.id(), route.clone());
            }
            Ok(route)
        })
    }

    /// Up to `k` distinct routes, shortest first; all of them are cached.
    pub fn find_routes(&self, start: &NodeId, end: &NodeId, k: usize) -> Result<Vec<Route>> {
        let algorithm = self.config.routing_algorithm;
        self.transact(|state, _| {
            let routes = state.topology.find_routes(start, end, k, algorithm)?;
            for route in &routes {
                state.route_cache.insert(route.id(), route.clone());
            }
            Ok(routes)
        })
    }

    /// `GetRoute`: the shortest route and its bottleneck free priority bandwidth,
    /// or `None` if the sites are not connected.
    pub fn get_route(&self, src: &NodeId, dst: &NodeId) -> Result<Option<RouteInfoDto>> {
        let algorithm = self.config.routing_algorithm;
        self.transact(|state, _| {
            let Some(route) = state.topology.shortest_path(src, dst, algorithm)? else {
                return Ok(None);
            };
            let capacity = state.topology.route_capacity(&route)?;
            let route_id = route.id();
            state.route_cache.insert(route_id.clone(), route);

            Ok(Some(RouteInfoDto { route_id, capacity }))
        })
    }

    /// Looks a route up by id, decoding it against the topology if it was never cached.
    pub fn route(&self, route_id: &RouteId) -> Result<Route> {
        let state = self.lock();
        resolve_route(&state, route_id)
    }

    /// `CreateConnection`: a new connection named after the rule and both sites.
    /// An existing connection with the same id is closed and replaced.
    pub fn create_connection(&self, rule_id: &RuleId, src: &NodeId, dst: &NodeId, total_bytes: f64) -> Result<ConnectionId> {
        if !total_bytes.is_finite() || total_bytes < 0.0 {
            return Err(Error::BoundaryError(format!("connection size must be a non-negative number, got {}", total_bytes)));
        }

        self.transact(|state, now| {
            state.topology.node(src)?;
            state.topology.node(dst)?;

            let id = ConnectionId::derive(rule_id, src, dst);
            if let Some(mut previous) = state.connections.remove(&id) {
                log::warn!("Connection {} already exists; replacing it.", id);
                previous.close(now, &mut state.topology)?;
            }

            state.connections.insert(id.clone(), Connection::new(id.clone(), src.clone(), dst.clone(), total_bytes));
            self.statistics.record_connection_created();
            tracing::info!(target: ANALYTICS_TARGET, connection = %id, total_bytes, "connection created");
            Ok(id)
        })
    }

    /// `UpdateConnection`: moves the connection onto `route_id`, which must join the
    /// connection's two sites. A missing or zero bandwidth requests a best-effort promise.
    pub fn update_connection(&self, id: &ConnectionId, route_id: &RouteId, bandwidth: Option<f64>) -> Result<()> {
        self.transact(|state, now| {
            let route = resolve_route(state, route_id)?;
            let NetworkState { topology, connections, .. } = state;
            let connection = connections.get_mut(id).ok_or_else(|| Error::not_found("connection", id))?;

            let joins_sites = (route.start == connection.src && route.end == connection.dst)
                || (route.start == connection.dst && route.end == connection.src);
            if !joins_sites {
                return Err(Error::ConfigError(format!(
                    "route {} runs from {} to {}, but connection {} joins {} and {}",
                    route_id, route.start, route.end, id, connection.src, connection.dst
                )));
            }

            connection.update(route, bandwidth, now, topology)
        })
    }

    /// `StartConnection`. A connection without promises is given a best-effort
    /// promise on the shortest route between its sites first. Starting an active or
    /// finished connection is a no-op; a connection closed before it finished is
    /// `NotActive`, and one whose sites are not connected is a missing route.
    pub fn start_connection(&self, id: &ConnectionId) -> Result<()> {
        let algorithm = self.config.routing_algorithm;
        self.transact(|state, now| {
            let NetworkState { topology, connections, route_cache, .. } = state;
            let connection = connections.get_mut(id).ok_or_else(|| Error::not_found("connection", id))?;

            if connection.is_closed() && !connection.is_finished() {
                return Err(Error::NotActive(id.to_string()));
            }

            if connection.promises().is_empty() && !connection.is_finished() {
                let Some(route) = topology.shortest_path(&connection.src, &connection.dst, algorithm)? else {
                    return Err(Error::not_found("route", format!("{} -> {}", connection.src, connection.dst)));
                };
                route_cache.insert(route.id(), route.clone());
                connection.update(route, None, now, topology)?;
            }

            if connection.start(now, topology)? {
                tracing::info!(target: ANALYTICS_TARGET, connection = %id, time = now, "connection started");
            } else {
                log::debug!("Connection {} not started: it is {}.", id, connection.state());
            }
            Ok(())
        })
    }

    /// `CheckConnection`: whether the connection finished, and how long it still
    /// needs while it is active.
    pub fn check_connection(&self, id: &ConnectionId) -> Result<ConnectionStatusDto> {
        self.transact(|state, now| {
            let connection = state.connections.get(id).ok_or_else(|| Error::not_found("connection", id))?;
            let remaining_time = match connection.compute_remaining_time(now) {
                Ok(remaining) => Some(remaining),
                Err(Error::NotActive(_)) => None,
                Err(e) => return Err(e),
            };

            Ok(ConnectionStatusDto { is_finished: connection.is_finished(), remaining_time })
        })
    }

    /// `CloseConnection`: ends the active promise and marks the connection closed.
    /// Closing twice is a no-op; the connection stays queryable.
    pub fn close_connection(&self, id: &ConnectionId) -> Result<()> {
        self.transact(|state, now| {
            let NetworkState { topology, connections, .. } = state;
            let connection = connections.get_mut(id).ok_or_else(|| Error::not_found("connection", id))?;

            if connection.close(now, topology)? {
                self.statistics.record_connection_closed();
                tracing::info!(target: ANALYTICS_TARGET, connection = %id, time = now, "connection closed");
            }
            Ok(())
        })
    }

    /// Snapshot of one connection.
    pub fn connection(&self, id: &ConnectionId) -> Result<Connection> {
        self.transact(|state, _| state.connections.get(id).cloned().ok_or_else(|| Error::not_found("connection", id)))
    }

    pub fn link_snapshot(&self, id: &LinkId) -> Result<LinkSnapshot> {
        self.transact(|state, _| {
            let link = state.topology.link(id)?;
            Ok(LinkSnapshot {
                total_bandwidth: link.total_bandwidth,
                priority_free: link.free(Pool::Priority),
                best_effort_free: link.free(Pool::BestEffort),
                best_effort_holders: link.best_effort_holders(),
            })
        })
    }

    /// Read access to the topology under the lock.
    pub fn with_topology<R>(&self, f: impl FnOnce(&Topology) -> R) -> R {
        let state = self.lock();
        f(&state.topology)
    }

    /// One row per promise of every connection, ordered by connection id.
    pub fn history(&self) -> Result<Vec<HistoryRowDto>> {
        self.transact(|state, now| {
            let mut rows = Vec::new();
            for connection in state.connections.values() {
                for (index, promise) in connection.promises().iter().enumerate() {
                    let kind = match promise.kind() {
                        PromiseKind::Guaranteed { .. } => "guaranteed",
                        PromiseKind::BestEffort { .. } => "best_effort",
                    };
                    rows.push(HistoryRowDto {
                        connection_id: connection.id.clone(),
                        total_bytes: connection.total_bytes,
                        connection_state: connection.state().to_string(),
                        promise_index: index,
                        route_id: promise.route().id(),
                        kind: kind.to_string(),
                        bandwidth: promise.bandwidth(),
                        start_time: promise.start_time(),
                        end_time: promise.end_time(),
                        bytes_delivered: promise.bytes_delivered(now),
                    });
                }
            }
            Ok(rows)
        })
    }

    /// Writes [`Network::history`] as a `;` separated CSV file with a header row.
    pub fn write_history_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let rows = self.history()?;
        let mut writer = csv::WriterBuilder::new().delimiter(b';').from_path(path.as_ref())?;
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        log::info!("Wrote {} history rows to {}.", rows.len(), path.as_ref().display());
        Ok(())
    }

    /// Ends every active connection at the current time. Connections stay queryable.
    pub fn close(&self) -> Result<()> {
        self.transact(|state, now| {
            let NetworkState { topology, connections, .. } = state;
            let mut closed = 0;
            for connection in connections.values_mut() {
                if connection.is_active() && connection.close(now, topology)? {
                    self.statistics.record_connection_closed();
                    closed += 1;
                }
            }
            log::info!("Network closed; {} active connections were torn down.", closed);
            Ok(())
        })
    }
}

fn resolve_route(state: &NetworkState, route_id: &RouteId) -> Result<Route> {
    if let Some(route) = state.route_cache.get(route_id) {
        return Ok(route.clone());
    }

    let links = route_id.link_names()?;
    for link in &links {
        state.topology.link(link).map_err(|_| Error::not_found("route", route_id))?;
    }
    let (start, end) = order_route(&state.topology, &links).ok_or_else(|| Error::not_found("route", route_id))?;
    Ok(Route::new(start.clone(), end.clone(), links))
}

/// Endpoints of a set of links that forms a simple path, if they do.
fn order_route<'a>(topology: &'a Topology, links: &[LinkId]) -> Option<(&'a NodeId, &'a NodeId)> {
    let mut unvisited = Vec::with_capacity(links.len());
    let mut degree: BTreeMap<&NodeId, usize> = BTreeMap::new();
    for link in links {
        let link = topology.link(link).ok()?;
        *degree.entry(&link.nodes.0).or_default() += 1;
        *degree.entry(&link.nodes.1).or_default() += 1;
        unvisited.push(link);
    }
    let mut ends = degree.into_iter().filter(|(_, d)| *d == 1).map(|(node, _)| node);
    let (start, end) = match (ends.next(), ends.next(), ends.next()) {
        (Some(start), Some(end), None) => (start, end),
        _ => return None,
    };

    // The walk from `start` has to use up every link, or some of them lie off the path.
    let mut at = start;
    while !unvisited.is_empty() {
        let next = unvisited.iter().position(|link| link.other_end(at).is_some())?;
        at = unvisited.swap_remove(next).other_end(at)?;
    }

    (at == end).then_some((start, end))
}
