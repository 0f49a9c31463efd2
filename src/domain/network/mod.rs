pub mod best_effort;
pub mod link;
pub mod network;
pub mod node;
pub mod route;
pub mod router;
pub mod topology;

pub use link::{LEDGER_TOLERANCE, Link, Pool};
pub use network::{LinkSnapshot, Network, NetworkConfig};
pub use route::Route;
pub use router::RoutingAlgorithm;
pub use topology::{LinkKey, Topology};
