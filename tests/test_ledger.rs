mod common;

use std::sync::Arc;

use common::{line_topology, network_over, node};
use vsnet_broker::domain::clock::ManualClock;
use vsnet_broker::domain::network::{Network, NetworkConfig, Pool};
use vsnet_broker::domain::utils::id::{ConnectionId, LinkId, RuleId};
use vsnet_broker::error::Error;

#[test]
fn test_guaranteed_promise_reduces_route_capacity() {
    let (network, _clock) = network_over(line_topology(100.0, 0.0));
    let rule = RuleId::new("rule-1");

    let connection = network.create_connection(&rule, &node("A"), &node("C"), 4000.0).unwrap();
    let route = network.get_route(&node("A"), &node("C")).unwrap().unwrap();
    assert!((route.capacity - 100.0).abs() < 1e-9);

    network.update_connection(&connection, &route.route_id, Some(40.0)).unwrap();
    network.start_connection(&connection).unwrap();

    let after = network.get_route(&node("A"), &node("C")).unwrap().unwrap();
    assert_eq!(after.route_id, route.route_id);
    assert!((after.capacity - 60.0).abs() < 1e-9);
    for link in ["AB", "BC"] {
        assert!((network.link_snapshot(&LinkId::new(link)).unwrap().priority_free - 60.0).abs() < 1e-9);
    }

    network.close_connection(&connection).unwrap();
    let released = network.get_route(&node("A"), &node("C")).unwrap().unwrap();
    assert!((released.capacity - 100.0).abs() < 1e-9);
}

#[test]
fn test_reserve_then_release_restores_free_bandwidth() {
    let mut topology = line_topology(100.0, 0.25);
    let link = LinkId::new("AB");

    for _ in 0..10 {
        topology.reserve(&link, 33.3, Pool::Priority).unwrap();
        topology.release(&link, 33.3, Pool::Priority).unwrap();
    }

    let link = topology.link(&link).unwrap();
    assert!((link.priority_free() - 75.0).abs() < 1e-9);
    assert!((link.best_effort_free() - 25.0).abs() < 1e-9);
}

#[test]
fn test_failed_route_reservation_changes_no_link() {
    let mut topology = line_topology(100.0, 0.0);
    topology.reserve(&LinkId::new("BC"), 70.0, Pool::Priority).unwrap();

    let result = topology.reserve_route(&[LinkId::new("AB"), LinkId::new("BC")], 40.0, Pool::Priority);

    match result {
        Err(Error::CapacityExceeded { link, requested, available }) => {
            assert_eq!(link, "BC");
            assert_eq!(requested, 40.0);
            assert!((available - 30.0).abs() < 1e-9);
        }
        other => panic!("expected CapacityExceeded, got {:?}", other),
    }
    assert!((topology.link(&LinkId::new("AB")).unwrap().priority_free() - 100.0).abs() < 1e-9);
    assert!((topology.link(&LinkId::new("BC")).unwrap().priority_free() - 30.0).abs() < 1e-9);
}

#[test]
fn test_guaranteed_start_over_capacity_is_rejected() {
    let (network, _clock) = network_over(line_topology(100.0, 0.0));
    let rule = RuleId::new("rule-1");
    let connection = network.create_connection(&rule, &node("A"), &node("B"), 1000.0).unwrap();
    let route = network.get_route(&node("A"), &node("B")).unwrap().unwrap();

    network.update_connection(&connection, &route.route_id, Some(150.0)).unwrap();
    let result = network.start_connection(&connection);

    assert!(matches!(result, Err(Error::CapacityExceeded { .. })));
    assert!(!network.connection(&connection).unwrap().is_active());
    assert!((network.link_snapshot(&LinkId::new("AB")).unwrap().priority_free - 100.0).abs() < 1e-9);
}

#[test]
fn test_best_effort_holders_share_a_link_evenly() {
    let (network, _clock) = network_over(line_topology(100.0, 1.0));
    let rule = RuleId::new("rule-1");
    let long = network.create_connection(&rule, &node("A"), &node("C"), 1.0e6).unwrap();
    let short = network.create_connection(&rule, &node("A"), &node("B"), 1.0e6).unwrap();

    network.start_connection(&long).unwrap();
    let alone = network.connection(&long).unwrap().last_promise().unwrap().bandwidth();
    assert!((alone - 100.0).abs() < 1e-6);

    network.start_connection(&short).unwrap();
    let long_rate = network.connection(&long).unwrap().last_promise().unwrap().bandwidth();
    let short_rate = network.connection(&short).unwrap().last_promise().unwrap().bandwidth();
    assert!((long_rate - 50.0).abs() < 1e-6);
    assert!((short_rate - 50.0).abs() < 1e-6);

    let ab = network.link_snapshot(&LinkId::new("AB")).unwrap();
    assert_eq!(ab.best_effort_holders, 2);
    assert!(ab.best_effort_free < 1e-6);
    let bc = network.link_snapshot(&LinkId::new("BC")).unwrap();
    assert_eq!(bc.best_effort_holders, 1);
    assert!((bc.best_effort_free - 50.0).abs() < 1e-6);
}

#[test]
fn test_closing_a_best_effort_holder_frees_its_share() {
    let (network, _clock) = network_over(line_topology(100.0, 1.0));
    let rule = RuleId::new("rule-1");
    let first = network.create_connection(&rule, &node("A"), &node("B"), 1.0e6).unwrap();
    let second = network.create_connection(&rule, &node("B"), &node("A"), 1.0e6).unwrap();
    network.start_connection(&first).unwrap();
    network.start_connection(&second).unwrap();

    network.close_connection(&first).unwrap();

    let rate = network.connection(&second).unwrap().last_promise().unwrap().bandwidth();
    assert!((rate - 100.0).abs() < 1e-6);
    assert_eq!(network.link_snapshot(&LinkId::new("AB")).unwrap().best_effort_holders, 1);
}

#[test]
fn test_guaranteed_and_best_effort_pools_are_disjoint() {
    let (network, _clock) = network_over(line_topology(100.0, 0.5));
    let rule = RuleId::new("rule-1");
    let guaranteed = network.create_connection(&rule, &node("A"), &node("B"), 1.0e6).unwrap();
    let best_effort = network.create_connection(&rule, &node("B"), &node("A"), 1.0e6).unwrap();

    let route = network.get_route(&node("A"), &node("B")).unwrap().unwrap();
    assert!((route.capacity - 50.0).abs() < 1e-9);
    network.update_connection(&guaranteed, &route.route_id, Some(50.0)).unwrap();
    network.start_connection(&guaranteed).unwrap();
    network.start_connection(&best_effort).unwrap();

    let snapshot = network.link_snapshot(&LinkId::new("AB")).unwrap();
    assert!(snapshot.priority_free.abs() < 1e-9);
    assert!(snapshot.best_effort_free.abs() < 1e-6);
    let rate = network.connection(&best_effort).unwrap().last_promise().unwrap().bandwidth();
    assert!((rate - 50.0).abs() < 1e-6);
}

#[test]
fn test_route_between_a_site_and_itself_has_no_capacity() {
    let (network, _clock) = network_over(line_topology(100.0, 0.0));
    let route = network.get_route(&node("A"), &node("A")).unwrap().unwrap();
    assert_eq!(route.capacity, 0.0);
}

#[test]
fn test_pass_limit_keeps_rates_within_the_pools() {
    let config = NetworkConfig { max_distribution_passes: 1, ..NetworkConfig::default() };
    let network = Network::new(line_topology(100.0, 1.0), config, Arc::new(ManualClock::new(0.0)));
    let rule = RuleId::new("rule-1");
    let long = network.create_connection(&rule, &node("A"), &node("C"), 1.0e6).unwrap();
    let short = network.create_connection(&rule, &node("A"), &node("B"), 1.0e6).unwrap();
    network.start_connection(&long).unwrap();
    network.start_connection(&short).unwrap();
    assert!(network.statistics().pass_limit_hits >= 1);

    let rate = |id: &ConnectionId| network.connection(id).unwrap().last_promise().unwrap().bandwidth();
    let (long_rate, short_rate) = (rate(&long), rate(&short));
    let ab = network.link_snapshot(&LinkId::new("AB")).unwrap();
    let bc = network.link_snapshot(&LinkId::new("BC")).unwrap();

    assert!(long_rate + short_rate <= ab.total_bandwidth + 1e-9);
    assert!(long_rate <= bc.total_bandwidth + 1e-9);
    assert!(ab.best_effort_free >= -1e-9);
    assert!(bc.best_effort_free >= -1e-9);
}
