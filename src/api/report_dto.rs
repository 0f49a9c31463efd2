use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::utils::id::{RuleId, SitePairId, TransferId};

/// Per (rule, site pair) aggregate produced by the preparer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedAggregateDto {
    pub transfer_ids: Vec<TransferId>,
    pub priority: u32,
    pub n_transfers_total: usize,
    pub n_bytes_total: f64,
}

/// Per (rule, site pair) aggregate produced by the submitter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmittedAggregateDto {
    pub priority: u32,
    pub n_transfers_submitted: usize,
}

/// Per site pair aggregate produced by the finisher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinishedAggregateDto {
    pub n_transfers_finished: usize,
    pub n_bytes_transferred: f64,
}

pub type PreparedReportDto = BTreeMap<RuleId, BTreeMap<SitePairId, PreparedAggregateDto>>;
pub type SubmittedReportDto = BTreeMap<RuleId, BTreeMap<SitePairId, SubmittedAggregateDto>>;
/// The finisher reports one rule at a time.
pub type FinishedReportDto = BTreeMap<RuleId, BTreeMap<SitePairId, FinishedAggregateDto>>;

/// Acknowledgment of a submission report: an opaque handle per (rule, site pair)
/// that the scheduler stores but does not interpret.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubmissionAckDto {
    pub mappings: BTreeMap<RuleId, BTreeMap<SitePairId, String>>,
}
