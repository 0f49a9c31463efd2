pub mod boundary;
pub mod report;
pub mod rule;
pub mod scheduler;
pub mod stages;
pub mod transfer;

pub use boundary::{AllocationBoundary, LoggingAllocator, NetworkBoundary};
pub use rule::Rule;
pub use scheduler::{HeartbeatSummary, Scheduler, SchedulerConfig};
pub use transfer::{Transfer, TransferState};
