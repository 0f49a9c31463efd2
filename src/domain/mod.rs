pub mod clock;
pub mod network;
pub mod reservation;
pub mod scheduler;
pub mod utils;
