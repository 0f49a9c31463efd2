#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use vsnet_broker::api::network_dto::{ConnectionStatusDto, RouteInfoDto};
use vsnet_broker::api::report_dto::{FinishedReportDto, PreparedReportDto, SubmissionAckDto, SubmittedReportDto};
use vsnet_broker::api::topology_dto::{AdjacencyDto, CoordinatesDto};
use vsnet_broker::domain::clock::ManualClock;
use vsnet_broker::domain::network::{Network, NetworkConfig, Topology};
use vsnet_broker::domain::scheduler::{AllocationBoundary, NetworkBoundary};
use vsnet_broker::domain::utils::id::{ConnectionId, NodeId, RouteId, RuleId};
use vsnet_broker::error::{Error, Result};

pub fn adjacency(id: &str, a: &str, z: &str, mbps: f64) -> AdjacencyDto {
    AdjacencyDto { id: id.to_string(), a: a.to_string(), z: z.to_string(), mbps, igp_metric: 1.0 }
}

pub fn coordinates(sites: &[(&str, f64, f64)]) -> CoordinatesDto {
    sites.iter().map(|(name, lat, lon)| (name.to_string(), [*lat, *lon])).collect()
}

/// Three sites on the equator, A - B - C, both links of `mbps`.
pub fn line_topology(mbps: f64, best_effort_fraction: f64) -> Topology {
    Topology::try_from((
        vec![adjacency("AB", "A", "B", mbps), adjacency("BC", "B", "C", mbps)],
        coordinates(&[("A", 0.0, 0.0), ("B", 0.0, 1.0), ("C", 0.0, 2.0)]),
        best_effort_fraction,
    ))
    .expect("line topology")
}

pub fn network_over(topology: Topology) -> (Arc<Network>, ManualClock) {
    let clock = ManualClock::new(0.0);
    let network = Network::new(topology, NetworkConfig::default(), Arc::new(clock.clone()));
    (Arc::new(network), clock)
}

pub fn node(name: &str) -> NodeId {
    NodeId::new(name)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Prepared(PreparedReportDto),
    Submitted(SubmittedReportDto),
    Finished(FinishedReportDto),
}

/// Allocation boundary that records every report and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingAllocator {
    pub reports: Mutex<Vec<Report>>,
    pub fail: AtomicBool,
}

impl RecordingAllocator {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    fn record(&self, report: Report) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::BoundaryError("allocator unreachable".to_string()));
        }
        self.reports.lock().unwrap().push(report);
        Ok(())
    }
}

impl AllocationBoundary for RecordingAllocator {
    fn report_prepared(&self, report: &PreparedReportDto) -> Result<()> {
        self.record(Report::Prepared(report.clone()))
    }

    fn report_submitted(&self, report: &SubmittedReportDto) -> Result<SubmissionAckDto> {
        self.record(Report::Submitted(report.clone()))?;

        let mut ack = SubmissionAckDto::default();
        for (rule_id, pairs) in report {
            for site_pair_id in pairs.keys() {
                ack.mappings.entry(rule_id.clone()).or_default().insert(site_pair_id.clone(), format!("sense-{}", site_pair_id));
            }
        }
        Ok(ack)
    }

    fn report_finished(&self, report: &FinishedReportDto) -> Result<()> {
        self.record(Report::Finished(report.clone()))
    }
}

/// Network boundary that forwards to a real network unless told to fail.
pub struct FlakyNetwork {
    pub inner: Arc<Network>,
    pub fail: AtomicBool,
}

impl FlakyNetwork {
    pub fn new(inner: Arc<Network>) -> Self {
        Self { inner, fail: AtomicBool::new(false) }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::BoundaryError("network unreachable".to_string()));
        }
        Ok(())
    }
}

impl NetworkBoundary for FlakyNetwork {
    fn create_connection(&self, rule_id: &RuleId, src: &NodeId, dst: &NodeId, total_bytes: f64) -> Result<ConnectionId> {
        self.guard()?;
        self.inner.create_connection(rule_id, src, dst, total_bytes)
    }

    fn get_route(&self, src: &NodeId, dst: &NodeId) -> Result<Option<RouteInfoDto>> {
        self.guard()?;
        self.inner.get_route(src, dst)
    }

    fn update_connection(&self, id: &ConnectionId, route_id: &RouteId, bandwidth: Option<f64>) -> Result<()> {
        self.guard()?;
        self.inner.update_connection(id, route_id, bandwidth)
    }

    fn start_connection(&self, id: &ConnectionId) -> Result<()> {
        self.guard()?;
        self.inner.start_connection(id)
    }

    fn check_connection(&self, id: &ConnectionId) -> Result<ConnectionStatusDto> {
        self.guard()?;
        self.inner.check_connection(id)
    }

    fn close_connection(&self, id: &ConnectionId) -> Result<()> {
        self.guard()?;
        self.inner.close_connection(id)
    }
}
