use std::collections::{BTreeMap, BTreeSet};

use crate::api::report_dto::{PreparedAggregateDto, SubmissionAckDto};
use crate::domain::scheduler::boundary::{AllocationBoundary, NetworkBoundary};
use crate::domain::scheduler::report::{finished_reports, prepared_report, submitted_report};
use crate::domain::scheduler::rule::Rule;
use crate::domain::scheduler::transfer::{Transfer, TransferState};
use crate::domain::utils::id::{ConnectionId, RuleId};
use crate::error::Result;

/// Position of a transfer in the working copy: (rule index, transfer index).
type Slot = (usize, usize);

fn select(rules: &[Rule], state: TransferState) -> Vec<Slot> {
    let mut slots = Vec::new();
    for (r, rule) in rules.iter().enumerate() {
        for (t, transfer) in rule.transfers().iter().enumerate() {
            if transfer.state() == state {
                slots.push((r, t));
            }
        }
    }
    slots
}

fn transfer_at(rules: &[Rule], (r, t): Slot) -> &Transfer {
    &rules[r].transfers()[t]
}

fn advance(rules: &mut [Rule], slots: &[Slot], next: TransferState) -> usize {
    slots.iter().filter(|(r, t)| rules[*r].transfers_mut()[*t].advance(next)).count()
}

fn group_by<K: Ord>(rules: &[Rule], slots: &[Slot], key: impl Fn(&Transfer) -> K) -> BTreeMap<K, Vec<Slot>> {
    let mut groups: BTreeMap<K, Vec<Slot>> = BTreeMap::new();
    for slot in slots {
        groups.entry(key(transfer_at(rules, *slot))).or_default().push(*slot);
    }
    groups
}

/// Reports every `Preparing` transfer, then creates one connection per
/// (rule, site pair). Priority 0 groups get a best-effort promise on the current
/// shortest route. A group advances only if its network calls succeeded.
///
/// Without a network every reported transfer advances.
pub fn preparer(network: Option<&dyn NetworkBoundary>, allocator: &dyn AllocationBoundary, rules: &mut [Rule], use_throttler: bool) -> usize {
    let slots = select(rules, TransferState::Preparing);
    log::debug!("Running preparer on {} transfers", slots.len());
    if slots.is_empty() {
        return 0;
    }

    let report = prepared_report(slots.iter().map(|slot| transfer_at(rules, *slot)));
    if let Err(e) = allocator.report_prepared(&report) {
        log::warn!("Preparer report failed, retrying next heartbeat: {}", e);
        return 0;
    }

    let next = if use_throttler { TransferState::Waiting } else { TransferState::Queued };
    let Some(network) = network else {
        return advance(rules, &slots, next);
    };
    let groups = group_by(rules, &slots, |t| (t.rule_id.clone(), t.site_pair_id.clone()));

    let mut advanced = 0;
    for ((rule_id, site_pair_id), members) in groups {
        let Some(aggregate) = report.get(&rule_id).and_then(|pairs| pairs.get(&site_pair_id)) else {
            continue;
        };
        match prepare_group(network, transfer_at(rules, members[0]), aggregate) {
            Ok(()) => advanced += advance(rules, &members, next),
            Err(e) => log::warn!("Could not prepare connection for rule {} ({}): {}", rule_id, site_pair_id, e),
        }
    }
    advanced
}

fn prepare_group(network: &dyn NetworkBoundary, sample: &Transfer, aggregate: &PreparedAggregateDto) -> Result<()> {
    let connection_id = network.create_connection(&sample.rule_id, &sample.src, &sample.dst, aggregate.n_bytes_total)?;
    if aggregate.priority != 0 {
        return Ok(());
    }

    match network.get_route(&sample.src, &sample.dst)? {
        Some(route) => network.update_connection(&connection_id, &route.route_id, None),
        None => {
            log::warn!("No route from {} to {}; connection {} stays without a promise.", sample.src, sample.dst, connection_id);
            Ok(())
        }
    }
}

/// Admits `Waiting` transfers into `Queued` while their rule has fewer than
/// `limit` transfers in flight. Rules without a limit admit everything.
pub fn throttler(rules: &mut [Rule]) -> usize {
    let mut admitted = 0;
    for rule in rules.iter_mut() {
        let waiting = rule.count_in(TransferState::Waiting);
        let capacity = match rule.limit {
            Some(limit) => limit.saturating_sub(rule.in_flight()).min(waiting),
            None => waiting,
        };

        let mut remaining = capacity;
        for transfer in rule.transfers_mut() {
            if remaining == 0 {
                break;
            }
            if transfer.state() == TransferState::Waiting && transfer.advance(TransferState::Queued) {
                remaining -= 1;
                admitted += 1;
            }
        }
    }
    log::debug!("Throttler admitted {} transfers", admitted);
    admitted
}

/// Reports `Queued` transfers, then starts each of their connections.
/// Returns the number submitted and the acknowledgment of the report.
pub fn submitter(network: Option<&dyn NetworkBoundary>, allocator: &dyn AllocationBoundary, rules: &mut [Rule]) -> (usize, Option<SubmissionAckDto>) {
    let slots = select(rules, TransferState::Queued);
    log::debug!("Running submitter on {} transfers", slots.len());
    if slots.is_empty() {
        return (0, None);
    }

    let report = submitted_report(slots.iter().map(|slot| transfer_at(rules, *slot)));
    let ack = match allocator.report_submitted(&report) {
        Ok(ack) => ack,
        Err(e) => {
            log::warn!("Submitter report failed, retrying next heartbeat: {}", e);
            return (0, None);
        }
    };

    let Some(network) = network else {
        return (advance(rules, &slots, TransferState::Submitted), Some(ack));
    };

    let mut submitted = 0;
    for (connection_id, members) in group_by(rules, &slots, Transfer::connection_id) {
        match network.start_connection(&connection_id) {
            Ok(()) => submitted += advance(rules, &members, TransferState::Submitted),
            Err(e) => log::warn!("Could not start connection {}: {}", connection_id, e),
        }
    }
    (submitted, Some(ack))
}

/// Marks `Submitted` transfers `Done` once their connection reports finished,
/// or right away without a network.
pub fn poller(network: Option<&dyn NetworkBoundary>, rules: &mut [Rule]) -> usize {
    let slots = select(rules, TransferState::Submitted);
    log::debug!("Running poller on {} transfers", slots.len());
    let Some(network) = network else {
        return advance(rules, &slots, TransferState::Done);
    };

    let mut done = 0;
    for (connection_id, members) in group_by(rules, &slots, Transfer::connection_id) {
        match network.check_connection(&connection_id) {
            Ok(status) if status.is_finished => done += advance(rules, &members, TransferState::Done),
            Ok(status) => log::debug!("{} not yet finished; {:?} left", connection_id, status.remaining_time),
            Err(e) => log::warn!("Could not check connection {}: {}", connection_id, e),
        }
    }
    done
}

/// Closes the connections of `Done` transfers and reports them per rule; a rule's
/// transfers move to `Delete` once its report went through.
pub fn finisher(network: Option<&dyn NetworkBoundary>, allocator: &dyn AllocationBoundary, rules: &mut [Rule]) -> usize {
    let slots = select(rules, TransferState::Done);
    log::debug!("Running finisher on {} transfers", slots.len());

    let by_rule: BTreeMap<RuleId, Vec<Slot>> = group_by(rules, &slots, |t| t.rule_id.clone());
    let reports = finished_reports(slots.iter().map(|slot| transfer_at(rules, *slot)));

    let mut deleted = 0;
    for report in reports {
        let Some((rule_id, _)) = report.iter().next() else {
            continue;
        };
        let Some(members) = by_rule.get(rule_id) else {
            continue;
        };

        if let Some(network) = network {
            let connections: BTreeSet<ConnectionId> = members.iter().map(|slot| transfer_at(rules, *slot).connection_id()).collect();
            let closed = connections.iter().try_for_each(|connection_id| network.close_connection(connection_id));
            if let Err(e) = closed {
                log::warn!("Could not close connections of rule {}: {}", rule_id, e);
                continue;
            }
        }

        match allocator.report_finished(&report) {
            Ok(()) => deleted += advance(rules, members, TransferState::Delete),
            Err(e) => log::warn!("Finisher report for rule {} failed, retrying next heartbeat: {}", rule_id, e),
        }
    }
    deleted
}
