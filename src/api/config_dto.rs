use serde::Deserialize;

/// Root of the YAML configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDto {
    pub network: NetworkConfigDto,
    pub scheduler: SchedulerConfigDto,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfigDto {
    /// Path of the adjacency JSON file, relative to the config file.
    pub topology: String,
    /// Path of the coordinate JSON file, relative to the config file.
    pub coordinates: String,
    #[serde(default = "default_time_dilation")]
    pub time_dilation: f64,
    #[serde(default)]
    pub best_effort_fraction: f64,
    #[serde(default = "default_max_distribution_passes")]
    pub max_distribution_passes: usize,
    #[serde(default = "default_routing_algorithm")]
    pub routing_algorithm: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfigDto {
    /// Virtual seconds between two runner iterations.
    #[serde(default = "default_heartbeat")]
    pub heartbeat: f64,
    #[serde(default)]
    pub throttler: bool,
    #[serde(default = "default_stager_poll_millis")]
    pub stager_poll_millis: u64,
    /// `false` runs the rules without touching the network.
    #[serde(default = "default_network_enabled")]
    pub network_enabled: bool,
    #[serde(default)]
    pub rules: Vec<RuleDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDto {
    /// Virtual seconds after scheduler start before the rule becomes active.
    #[serde(default)]
    pub delay: f64,
    pub src_site: String,
    pub dst_site: String,
    #[serde(default)]
    pub priority: u32,
    /// Total size of the rule, split evenly across its transfers.
    pub size_bytes: f64,
    pub n_transfers: usize,
    pub src_limit: Option<usize>,
    pub dst_limit: Option<usize>,
}

fn default_time_dilation() -> f64 {
    1.0
}

fn default_max_distribution_passes() -> usize {
    100
}

fn default_routing_algorithm() -> String {
    "dijkstra".to_string()
}

fn default_heartbeat() -> f64 {
    10.0
}

fn default_stager_poll_millis() -> u64 {
    10
}

fn default_network_enabled() -> bool {
    true
}
