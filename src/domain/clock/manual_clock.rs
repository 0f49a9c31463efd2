use std::sync::{Arc, RwLock};

use crate::domain::clock::virtual_clock::VirtualClock;

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    time: Arc<RwLock<f64>>,
    time_dilation: f64,
}

impl ManualClock {
    pub fn new(time: f64) -> Self {
        Self { time: Arc::new(RwLock::new(time)), time_dilation: 1.0 }
    }

    pub fn with_dilation(time: f64, time_dilation: f64) -> Self {
        Self { time: Arc::new(RwLock::new(time)), time_dilation }
    }

    pub fn set(&self, time: f64) {
        let mut guard = self.time.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = time;
    }

    pub fn advance(&self, seconds: f64) {
        let mut guard = self.time.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += seconds;
    }
}

impl VirtualClock for ManualClock {
    fn now(&self) -> f64 {
        *self.time.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn time_dilation(&self) -> f64 {
        self.time_dilation
    }
}
