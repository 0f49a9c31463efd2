use std::collections::BTreeMap;

use crate::api::report_dto::{
    FinishedAggregateDto, FinishedReportDto, PreparedAggregateDto, PreparedReportDto, SubmittedAggregateDto, SubmittedReportDto,
};
use crate::domain::scheduler::transfer::Transfer;

/// One aggregate per (rule, site pair) over the given transfers.
pub fn prepared_report<'a>(transfers: impl IntoIterator<Item = &'a Transfer>) -> PreparedReportDto {
    let mut report = PreparedReportDto::new();
    for transfer in transfers {
        let aggregate = report
            .entry(transfer.rule_id.clone())
            .or_default()
            .entry(transfer.site_pair_id.clone())
            .or_insert_with(|| PreparedAggregateDto { transfer_ids: Vec::new(), priority: transfer.priority, n_transfers_total: 0, n_bytes_total: 0.0 });

        aggregate.transfer_ids.push(transfer.id.clone());
        aggregate.n_transfers_total += 1;
        aggregate.n_bytes_total += transfer.byte_count;
    }
    report
}

pub fn submitted_report<'a>(transfers: impl IntoIterator<Item = &'a Transfer>) -> SubmittedReportDto {
    let mut report = SubmittedReportDto::new();
    for transfer in transfers {
        report
            .entry(transfer.rule_id.clone())
            .or_default()
            .entry(transfer.site_pair_id.clone())
            .or_insert_with(|| SubmittedAggregateDto { priority: transfer.priority, n_transfers_submitted: 0 })
            .n_transfers_submitted += 1;
    }
    report
}

/// Finished aggregates split into one report per rule.
pub fn finished_reports<'a>(transfers: impl IntoIterator<Item = &'a Transfer>) -> Vec<FinishedReportDto> {
    let mut by_rule = FinishedReportDto::new();
    for transfer in transfers {
        let aggregate = by_rule
            .entry(transfer.rule_id.clone())
            .or_default()
            .entry(transfer.site_pair_id.clone())
            .or_insert(FinishedAggregateDto { n_transfers_finished: 0, n_bytes_transferred: 0.0 });

        aggregate.n_transfers_finished += 1;
        aggregate.n_bytes_transferred += transfer.byte_count;
    }

    by_rule.into_iter().map(|(rule_id, groups)| BTreeMap::from([(rule_id, groups)])).collect()
}
