pub mod manual_clock;
pub mod virtual_clock;

pub use manual_clock::ManualClock;
pub use virtual_clock::{DilatedClock, SharedClock, VirtualClock, timed};
