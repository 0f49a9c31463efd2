mod common;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use common::{adjacency, coordinates, network_over, node};
use vsnet_broker::domain::clock::ManualClock;
use vsnet_broker::domain::network::{Network, Route, Topology};
use vsnet_broker::domain::utils::id::{LinkId, NodeId};
use vsnet_broker::error::Error;
use vsnet_broker::{build_network, load_config};

const SITES: [&str; 5] = ["SEA", "DEN", "CHI", "NYC", "ATL"];

fn demo_network() -> Network {
    let config_path = Path::new("data/config.yaml");
    let config = load_config(config_path).unwrap();
    build_network(config_path, &config.network, Arc::new(ManualClock::new(0.0))).unwrap()
}

#[test]
fn test_a_star_and_dijkstra_agree_on_every_pair() {
    let network = demo_network();

    network.with_topology(|topology| {
        for src in SITES {
            for dst in SITES {
                let (src, dst) = (NodeId::new(src), NodeId::new(dst));
                let dijkstra = topology.dijkstra(&src, &dst).unwrap().unwrap();
                let a_star = topology.a_star(&src, &dst).unwrap().unwrap();

                let difference = topology.route_length(&dijkstra).unwrap() - topology.route_length(&a_star).unwrap();
                assert!(difference.abs() < 1e-6, "{} -> {}: lengths differ by {}", src, dst, difference);
            }
        }
    });
}

#[test]
fn test_routes_connect_their_endpoints() {
    let network = demo_network();

    network.with_topology(|topology| {
        let route = topology.dijkstra(&node("SEA"), &node("ATL")).unwrap().unwrap();
        assert!(!route.is_empty());

        let mut at = node("SEA");
        for link in &route.links {
            at = topology.link(link).unwrap().other_end(&at).unwrap().clone();
        }
        assert_eq!(at, node("ATL"));
    });
}

#[test]
fn test_find_routes_are_distinct_and_sorted() {
    let network = demo_network();
    let routes = network.find_routes(&node("SEA"), &node("NYC"), 4).unwrap();

    assert!(!routes.is_empty());
    assert!(routes.len() <= 4);

    let ids: HashSet<_> = routes.iter().map(|r| r.id()).collect();
    assert_eq!(ids.len(), routes.len());

    let lengths: Vec<f64> = network.with_topology(|topology| routes.iter().map(|r| topology.route_length(r).unwrap()).collect());
    assert!(lengths.windows(2).all(|pair| pair[0] <= pair[1]));

    let shortest = network.shortest_path(&node("SEA"), &node("NYC")).unwrap().unwrap();
    assert_eq!(routes[0], shortest);
}

#[test]
fn test_found_routes_can_be_looked_up_by_id() {
    let network = demo_network();
    let routes = network.find_routes(&node("DEN"), &node("NYC"), 3).unwrap();

    for route in &routes {
        assert_eq!(&network.route(&route.id()).unwrap(), route);
    }
}

#[test]
fn test_exclusions_are_undone_after_find_routes() {
    let network = demo_network();
    network.find_routes(&node("SEA"), &node("ATL"), 5).unwrap();

    network.with_topology(|topology| assert!(topology.links().all(|link| !link.is_spur())));
}

#[test]
fn test_disconnected_sites_have_no_route() {
    let topology = Topology::try_from((
        vec![adjacency("AB", "A", "B", 10.0), adjacency("CD", "C", "D", 10.0)],
        coordinates(&[("A", 0.0, 0.0), ("B", 0.0, 1.0), ("C", 1.0, 0.0), ("D", 1.0, 1.0)]),
        0.0,
    ))
    .unwrap();
    let (network, _clock) = network_over(topology);

    assert!(network.get_route(&node("A"), &node("D")).unwrap().is_none());
    assert!(network.find_routes(&node("A"), &node("D"), 3).unwrap().is_empty());
}

#[test]
fn test_parallel_links_route_over_the_freer_one() {
    let topology = Topology::try_from((
        vec![adjacency("narrow", "A", "B", 10.0), adjacency("wide", "A", "B", 100.0)],
        coordinates(&[("A", 0.0, 0.0), ("B", 0.0, 1.0)]),
        0.0,
    ))
    .unwrap();
    let (network, _clock) = network_over(topology);

    let route = network.shortest_path(&node("A"), &node("B")).unwrap().unwrap();
    assert_eq!(route.links.len(), 1);
    assert_eq!(route.links[0].as_str(), "wide");
}

#[test]
fn test_route_id_with_a_detached_cycle_is_not_found() {
    let topology = Topology::try_from((
        vec![adjacency("AB", "A", "B", 10.0), adjacency("CD", "C", "D", 10.0), adjacency("DE", "D", "E", 10.0), adjacency("EC", "E", "C", 10.0)],
        coordinates(&[("A", 0.0, 0.0), ("B", 0.0, 1.0), ("C", 5.0, 0.0), ("D", 5.0, 1.0), ("E", 6.0, 0.0)]),
        0.0,
    ))
    .unwrap();
    let (network, _clock) = network_over(topology);

    let links = vec![LinkId::new("AB"), LinkId::new("CD"), LinkId::new("DE"), LinkId::new("EC")];
    let route = Route::new(node("A"), node("B"), links);
    assert!(matches!(network.route(&route.id()), Err(Error::NotFound { kind: "route", .. })));

    let path = Route::new(node("A"), node("B"), vec![LinkId::new("AB")]);
    assert_eq!(network.route(&path.id()).unwrap(), path);
}
