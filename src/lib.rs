use std::path::Path;
use std::sync::Arc;

use crate::api::config_dto::{ConfigDto, NetworkConfigDto, SchedulerConfigDto};
use crate::api::topology_dto::{AdjacencyDto, CoordinatesDto};
use crate::domain::clock::{DilatedClock, SharedClock};
use crate::domain::network::{Network, NetworkConfig, Topology};
use crate::domain::scheduler::{AllocationBoundary, Rule, Scheduler, SchedulerConfig};
use crate::domain::utils::id::NodeId;
use crate::error::{Error, Result};
use crate::loader::parser::{parse_json_file, parse_yaml_file, resolve_relative};

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Reads the YAML configuration at `config_path`.
pub fn load_config(config_path: &Path) -> Result<ConfigDto> {
    let config: ConfigDto = parse_yaml_file(config_path)?;
    log::info!("Configuration loaded from '{}'.", config_path.display());
    Ok(config)
}

/// The wall-clock driven virtual clock described by the network section.
pub fn build_clock(dto: &NetworkConfigDto) -> Result<SharedClock> {
    DilatedClock::shared(dto.time_dilation)
}

/// Loads topology and coordinates (paths relative to `config_path`) and builds the network.
pub fn build_network(config_path: &Path, dto: &NetworkConfigDto, clock: SharedClock) -> Result<Network> {
    let adjacencies: Vec<AdjacencyDto> = parse_json_file(resolve_relative(config_path, &dto.topology))?;
    let coordinates: CoordinatesDto = parse_json_file(resolve_relative(config_path, &dto.coordinates))?;
    log::info!("Parsed {} adjacency records and {} coordinates.", adjacencies.len(), coordinates.len());

    let topology = Topology::try_from((adjacencies, coordinates, dto.best_effort_fraction))?;
    let config = NetworkConfig::try_from(dto)?;

    Ok(Network::new(topology, config, clock))
}

/// Builds the scheduler over `network`. Every rule must name sites of the topology.
pub fn build_scheduler(dto: &SchedulerConfigDto, network: Arc<Network>, allocator: Arc<dyn AllocationBoundary>, clock: SharedClock) -> Result<Scheduler> {
    let config = SchedulerConfig::try_from(dto)?;

    let mut rules = Vec::with_capacity(dto.rules.len());
    for rule_dto in &dto.rules {
        for site in [&rule_dto.src_site, &rule_dto.dst_site] {
            let known = network.with_topology(|topology| topology.contains_node(&NodeId::new(site.as_str())));
            if !known {
                return Err(Error::ConfigError(format!("rule references unknown site '{}'", site)));
            }
        }
        rules.push(Rule::try_from(rule_dto)?);
    }
    log::info!("Scheduler configured with {} rules.", rules.len());

    Ok(Scheduler::new(rules, config, network, allocator, clock))
}
