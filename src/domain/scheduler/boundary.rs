use crate::api::network_dto::{ConnectionStatusDto, RouteInfoDto};
use crate::api::report_dto::{FinishedReportDto, PreparedReportDto, SubmissionAckDto, SubmittedReportDto};
use crate::domain::network::network::Network;
use crate::domain::utils::id::{ConnectionId, NodeId, RouteId, RuleId};
use crate::domain::utils::statistics::ANALYTICS_TARGET;
use crate::error::Result;

/// Connection operations the scheduler needs from the bandwidth broker.
pub trait NetworkBoundary: Send + Sync {
    fn create_connection(&self, rule_id: &RuleId, src: &NodeId, dst: &NodeId, total_bytes: f64) -> Result<ConnectionId>;
    fn get_route(&self, src: &NodeId, dst: &NodeId) -> Result<Option<RouteInfoDto>>;
    fn update_connection(&self, id: &ConnectionId, route_id: &RouteId, bandwidth: Option<f64>) -> Result<()>;
    fn start_connection(&self, id: &ConnectionId) -> Result<()>;
    fn check_connection(&self, id: &ConnectionId) -> Result<ConnectionStatusDto>;
    fn close_connection(&self, id: &ConnectionId) -> Result<()>;
}

impl NetworkBoundary for Network {
    fn create_connection(&self, rule_id: &RuleId, src: &NodeId, dst: &NodeId, total_bytes: f64) -> Result<ConnectionId> {
        Network::create_connection(self, rule_id, src, dst, total_bytes)
    }

    fn get_route(&self, src: &NodeId, dst: &NodeId) -> Result<Option<RouteInfoDto>> {
        Network::get_route(self, src, dst)
    }

    fn update_connection(&self, id: &ConnectionId, route_id: &RouteId, bandwidth: Option<f64>) -> Result<()> {
        Network::update_connection(self, id, route_id, bandwidth)
    }

    fn start_connection(&self, id: &ConnectionId) -> Result<()> {
        Network::start_connection(self, id)
    }

    fn check_connection(&self, id: &ConnectionId) -> Result<ConnectionStatusDto> {
        Network::check_connection(self, id)
    }

    fn close_connection(&self, id: &ConnectionId) -> Result<()> {
        Network::close_connection(self, id)
    }
}

/// External accounting system notified at each stage of a transfer's life.
pub trait AllocationBoundary: Send + Sync {
    fn report_prepared(&self, report: &PreparedReportDto) -> Result<()>;

    /// The returned acknowledgment is stored by the scheduler, never interpreted.
    fn report_submitted(&self, report: &SubmittedReportDto) -> Result<SubmissionAckDto>;

    /// `report` holds exactly one rule.
    fn report_finished(&self, report: &FinishedReportDto) -> Result<()>;
}

/// Allocation boundary that writes every report as a JSON analytics event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingAllocator;

impl LoggingAllocator {
    fn emit(stage: &str, payload: serde_json::Result<String>) -> Result<()> {
        let payload = payload?;
        tracing::info!(target: ANALYTICS_TARGET, stage, report = %payload, "allocation report");
        Ok(())
    }
}

impl AllocationBoundary for LoggingAllocator {
    fn report_prepared(&self, report: &PreparedReportDto) -> Result<()> {
        Self::emit("PREPARER", serde_json::to_string(report))
    }

    fn report_submitted(&self, report: &SubmittedReportDto) -> Result<SubmissionAckDto> {
        Self::emit("SUBMITTER", serde_json::to_string(report))?;
        Ok(SubmissionAckDto::default())
    }

    fn report_finished(&self, report: &FinishedReportDto) -> Result<()> {
        Self::emit("FINISHER", serde_json::to_string(report))
    }
}
