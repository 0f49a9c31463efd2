use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Source of virtual time, in seconds.
///
/// Every duration or "is this finished yet" decision in the broker reads
/// from one of these, so tests can swap in a [`ManualClock`](super::ManualClock).
pub trait VirtualClock: Debug + Send + Sync {
    /// Current virtual time in seconds. Monotonic.
    fn now(&self) -> f64;

    /// Virtual seconds that elapse per wall-clock second.
    fn time_dilation(&self) -> f64;

    /// Wall-clock duration that corresponds to `virtual_seconds`.
    fn to_wall(&self, virtual_seconds: f64) -> Duration {
        let wall = virtual_seconds / self.time_dilation();
        if wall.is_finite() && wall > 0.0 { Duration::from_secs_f64(wall) } else { Duration::ZERO }
    }
}

pub type SharedClock = Arc<dyn VirtualClock>;

/// Wall time since construction, multiplied by a fixed dilation factor.
#[derive(Debug, Clone)]
pub struct DilatedClock {
    time_dilation: f64,
    base: Instant,
}

impl DilatedClock {
    pub fn new(time_dilation: f64) -> Result<Self> {
        if !time_dilation.is_finite() || time_dilation <= 0.0 {
            return Err(Error::ConfigError(format!("timeDilation must be a positive number, got {}", time_dilation)));
        }

        Ok(DilatedClock { time_dilation, base: Instant::now() })
    }

    pub fn shared(time_dilation: f64) -> Result<SharedClock> {
        Ok(Arc::new(Self::new(time_dilation)?))
    }
}

impl VirtualClock for DilatedClock {
    fn now(&self) -> f64 {
        self.time_dilation * self.base.elapsed().as_secs_f64()
    }

    fn time_dilation(&self) -> f64 {
        self.time_dilation
    }
}

/// Runs `f` and logs how many virtual seconds it took.
pub fn timed<R>(clock: &dyn VirtualClock, label: &str, f: impl FnOnce() -> R) -> R {
    let start = clock.now();
    let result = f();
    log::debug!("Ran {} in {} virtual seconds", label, clock.now() - start);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_dilation() {
        assert!(matches!(DilatedClock::new(0.0), Err(Error::ConfigError(_))));
        assert!(matches!(DilatedClock::new(-2.0), Err(Error::ConfigError(_))));
        assert!(matches!(DilatedClock::new(f64::NAN), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_dilation_scales_wall_durations() {
        let clock = DilatedClock::new(100.0).unwrap();
        assert!((clock.to_wall(10.0).as_secs_f64() - 0.1).abs() < 1e-6);
        assert_eq!(clock.to_wall(-1.0), Duration::ZERO);
    }

    #[test]
    fn test_is_monotonic() {
        let clock = DilatedClock::new(1000.0).unwrap();
        let first = clock.now();
        std::thread::sleep(Duration::from_millis(2));
        assert!(clock.now() > first);
    }
}
