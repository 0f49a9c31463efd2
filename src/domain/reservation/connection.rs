use serde::Serialize;

use crate::domain::network::route::Route;
use crate::domain::network::topology::Topology;
use crate::domain::reservation::promise::Promise;
use crate::domain::utils::id::{ConnectionId, NodeId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Created, possibly with promises, but never started.
    Created,
    Active,
    /// All bytes were delivered.
    Finished,
    /// Torn down before delivering all bytes.
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Created => "created",
            ConnectionState::Active => "active",
            ConnectionState::Finished => "finished",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// A transfer of `total_bytes` between two sites, carried by a sequence of promises.
/// Only the last promise may be active.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub src: NodeId,
    pub dst: NodeId,
    pub total_bytes: f64,
    promises: Vec<Promise>,
    is_active: bool,
    is_finished: bool,
    is_closed: bool,
    start_time: Option<f64>,
    end_time: Option<f64>,
}

impl Connection {
    pub fn new(id: ConnectionId, src: NodeId, dst: NodeId, total_bytes: f64) -> Self {
        Self {
            id,
            src,
            dst,
            total_bytes,
            promises: Vec::new(),
            is_active: false,
            is_finished: false,
            is_closed: false,
            start_time: None,
            end_time: None,
        }
    }

    pub fn promises(&self) -> &[Promise] {
        &self.promises
    }

    pub fn last_promise(&self) -> Option<&Promise> {
        self.promises.last()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_finished(&self) -> bool {
        self.is_finished
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_finished {
            ConnectionState::Finished
        } else if self.is_active {
            ConnectionState::Active
        } else if self.is_closed {
            ConnectionState::Closed
        } else {
            ConnectionState::Created
        }
    }

    pub fn duration(&self, now: f64) -> f64 {
        match self.start_time {
            Some(start) => (self.end_time.unwrap_or(now) - start).max(0.0),
            None => 0.0,
        }
    }

    pub fn bytes_delivered(&self, now: f64) -> f64 {
        self.promises.iter().map(|p| p.bytes_delivered(now)).sum()
    }

    /// The active promise if it is best-effort.
    pub fn active_best_effort(&self) -> Option<&Promise> {
        self.active_promise().filter(|p| p.is_best_effort())
    }

    pub(crate) fn active_best_effort_mut(&mut self) -> Option<&mut Promise> {
        if !self.is_active {
            return None;
        }
        self.promises.last_mut().filter(|p| p.is_best_effort() && p.is_active())
    }

    fn active_promise(&self) -> Option<&Promise> {
        if !self.is_active {
            return None;
        }
        self.promises.last().filter(|p| p.is_active())
    }

    /// Bytes delivered by all earlier promises plus what the last one settled before
    /// its current segment.
    fn delivered_before_segment(&self) -> f64 {
        let Some((last, earlier)) = self.promises.split_last() else {
            return 0.0;
        };
        let finished: f64 = earlier.iter().map(|p| p.bytes_delivered(p.end_time().unwrap_or(0.0))).sum();

        finished + last.settled_bytes()
    }

    /// Virtual time at which the remaining bytes will have been delivered at the
    /// current rate; infinite while the rate is zero.
    pub fn compute_end_time(&self) -> Result<f64> {
        let promise = self.active_promise().ok_or_else(|| Error::NotActive(self.id.to_string()))?;
        let segment_start = promise.segment_start().ok_or_else(|| Error::NotActive(self.id.to_string()))?;

        let rate = promise.bandwidth();
        if rate <= 0.0 {
            return Ok(f64::INFINITY);
        }

        let remaining = (self.total_bytes - self.delivered_before_segment()).max(0.0);
        Ok(segment_start + remaining / rate)
    }

    pub fn compute_remaining_time(&self, now: f64) -> Result<f64> {
        Ok((self.compute_end_time()? - now).max(0.0))
    }

    /// Finishes the connection if its end time has passed. The last promise ends
    /// at the computed end time, not at `now`. Returns `true` if it just finished.
    pub fn check(&mut self, now: f64, topology: &mut Topology) -> Result<bool> {
        if !self.is_active {
            return Ok(false);
        }

        let end_time = self.compute_end_time()?;
        if end_time > now {
            return Ok(false);
        }

        if let Some(promise) = self.promises.last_mut() {
            promise.end(end_time, topology)?;
        }
        self.end_time = Some(end_time);
        self.is_active = false;
        self.is_finished = true;
        log::debug!("Connection {} finished at virtual time {:.3}.", self.id, end_time);

        Ok(true)
    }

    /// Appends a promise on `route`. If the connection is active, the previous promise
    /// ends at `now` and the new one starts immediately; if the new one cannot start,
    /// the previous promise is re-established and the connection is left unchanged.
    pub fn update(&mut self, route: Route, bandwidth: Option<f64>, now: f64, topology: &mut Topology) -> Result<()> {
        self.check(now, topology)?;

        let mut promise = Promise::from_bandwidth(route, bandwidth)?;
        if self.is_active {
            if let Some(previous) = self.promises.last_mut() {
                previous.end(now, topology)?;
                if let Err(e) = promise.start(now, topology) {
                    previous.reopen(topology)?;
                    return Err(e);
                }
            }
        }

        self.promises.push(promise);
        Ok(())
    }

    /// Starts the last promise. A connection without promises, or one that is
    /// already running or over, is left untouched and `false` is returned.
    pub fn start(&mut self, now: f64, topology: &mut Topology) -> Result<bool> {
        if self.is_active || self.is_finished || self.is_closed {
            return Ok(false);
        }
        let Some(promise) = self.promises.last_mut() else {
            return Ok(false);
        };

        promise.start(now, topology)?;
        self.start_time = Some(now);
        self.is_active = true;
        Ok(true)
    }

    /// Tears the connection down, ending its active promise at `now`.
    /// Returns `false` if it was already closed.
    pub fn close(&mut self, now: f64, topology: &mut Topology) -> Result<bool> {
        if self.is_closed {
            return Ok(false);
        }
        self.check(now, topology)?;

        if self.is_active {
            if let Some(promise) = self.promises.last_mut() {
                promise.end(now, topology)?;
            }
            self.end_time = Some(now);
            self.is_active = false;
        }
        self.is_closed = true;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::utils::id::LinkId;

    fn topology() -> Topology {
        let mut topology = Topology::new(0.0).unwrap();
        topology.add_node(NodeId::new("A"), 0.0, 0.0);
        topology.add_node(NodeId::new("B"), 0.0, 1.0);
        topology.add_link(LinkId::new("AB"), &NodeId::new("A"), &NodeId::new("B"), 100.0, 1.0).unwrap();
        topology
    }

    fn route() -> Route {
        Route::new(NodeId::new("A"), NodeId::new("B"), vec![LinkId::new("AB")])
    }

    #[test]
    fn test_guaranteed_connection_finishes_at_computed_time() {
        let mut topology = topology();
        let mut connection = Connection::new(ConnectionId::new("c"), NodeId::new("A"), NodeId::new("B"), 500.0);
        connection.update(route(), Some(50.0), 0.0, &mut topology).unwrap();
        assert!(connection.start(2.0, &mut topology).unwrap());

        assert_eq!(connection.compute_end_time().unwrap(), 12.0);
        assert!(!connection.check(11.0, &mut topology).unwrap());
        assert!(connection.check(30.0, &mut topology).unwrap());

        assert_eq!(connection.state(), ConnectionState::Finished);
        assert_eq!(connection.end_time(), Some(12.0));
        assert_eq!(connection.bytes_delivered(30.0), 500.0);
        assert_eq!(topology.link(&LinkId::new("AB")).unwrap().priority_free(), 100.0);
    }

    #[test]
    fn test_update_failure_restores_previous_promise() {
        let mut topology = topology();
        let mut connection = Connection::new(ConnectionId::new("c"), NodeId::new("A"), NodeId::new("B"), 1000.0);
        connection.update(route(), Some(40.0), 0.0, &mut topology).unwrap();
        connection.start(0.0, &mut topology).unwrap();

        let result = connection.update(route(), Some(150.0), 1.0, &mut topology);
        assert!(matches!(result, Err(Error::CapacityExceeded { .. })));
        assert_eq!(connection.promises().len(), 1);
        assert!(connection.last_promise().unwrap().is_active());
        assert_eq!(topology.link(&LinkId::new("AB")).unwrap().priority_free(), 60.0);
    }

    #[test]
    fn test_update_while_active_switches_bandwidth() {
        let mut topology = topology();
        let mut connection = Connection::new(ConnectionId::new("c"), NodeId::new("A"), NodeId::new("B"), 1000.0);
        connection.update(route(), Some(40.0), 0.0, &mut topology).unwrap();
        connection.start(0.0, &mut topology).unwrap();

        connection.update(route(), Some(80.0), 5.0, &mut topology).unwrap();
        assert_eq!(topology.link(&LinkId::new("AB")).unwrap().priority_free(), 20.0);
        assert_eq!(connection.bytes_delivered(5.0), 200.0);
        assert_eq!(connection.compute_end_time().unwrap(), 15.0);
    }

    #[test]
    fn test_start_without_promises_is_noop() {
        let mut topology = topology();
        let mut connection = Connection::new(ConnectionId::new("c"), NodeId::new("A"), NodeId::new("B"), 10.0);
        assert!(!connection.start(0.0, &mut topology).unwrap());
        assert_eq!(connection.state(), ConnectionState::Created);
        assert!(matches!(connection.compute_remaining_time(0.0), Err(Error::NotActive(_))));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut topology = topology();
        let mut connection = Connection::new(ConnectionId::new("c"), NodeId::new("A"), NodeId::new("B"), 1000.0);
        connection.update(route(), Some(40.0), 0.0, &mut topology).unwrap();
        connection.start(0.0, &mut topology).unwrap();

        assert!(connection.close(1.0, &mut topology).unwrap());
        assert!(!connection.close(2.0, &mut topology).unwrap());
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(topology.link(&LinkId::new("AB")).unwrap().priority_free(), 100.0);
    }
}
