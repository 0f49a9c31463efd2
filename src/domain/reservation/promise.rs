use crate::domain::network::link::Pool;
use crate::domain::network::route::Route;
use crate::domain::network::topology::Topology;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum PromiseKind {
    /// Fixed bandwidth held in the priority pools of every link for the promise's lifetime.
    Guaranteed { bandwidth: f64 },

    /// Share of the best-effort pools; `rate` changes whenever the holder set does.
    /// Bytes delivered up to `segment_start` are kept in `settled_bytes`.
    BestEffort { rate: f64, settled_bytes: f64 },
}

/// One segment of a connection's life on a single route.
#[derive(Debug, Clone)]
pub struct Promise {
    route: Route,
    kind: PromiseKind,
    start_time: Option<f64>,
    /// Start of the current constant-rate segment.
    segment_start: Option<f64>,
    end_time: Option<f64>,
}

impl Promise {
    pub fn guaranteed(route: Route, bandwidth: f64) -> Self {
        Self::with_kind(route, PromiseKind::Guaranteed { bandwidth })
    }

    pub fn best_effort(route: Route) -> Self {
        Self::with_kind(route, PromiseKind::BestEffort { rate: 0.0, settled_bytes: 0.0 })
    }

    /// A missing or zero bandwidth requests a best-effort promise. Negative and
    /// non-finite bandwidths are rejected.
    pub fn from_bandwidth(route: Route, bandwidth: Option<f64>) -> Result<Self> {
        match bandwidth {
            None => Ok(Self::best_effort(route)),
            Some(bandwidth) if !bandwidth.is_finite() || bandwidth < 0.0 => {
                Err(Error::ConfigError(format!("bandwidth must be a non-negative number, got {}", bandwidth)))
            }
            Some(bandwidth) if bandwidth == 0.0 => Ok(Self::best_effort(route)),
            Some(bandwidth) => Ok(Self::guaranteed(route, bandwidth)),
        }
    }

    fn with_kind(route: Route, kind: PromiseKind) -> Self {
        Self { route, kind, start_time: None, segment_start: None, end_time: None }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn kind(&self) -> &PromiseKind {
        &self.kind
    }

    pub fn is_best_effort(&self) -> bool {
        matches!(self.kind, PromiseKind::BestEffort { .. })
    }

    /// Current rate of the promise.
    pub fn bandwidth(&self) -> f64 {
        match self.kind {
            PromiseKind::Guaranteed { bandwidth } => bandwidth,
            PromiseKind::BestEffort { rate, .. } => rate,
        }
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    pub fn segment_start(&self) -> Option<f64> {
        self.segment_start
    }

    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    pub fn is_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.start_time.is_some() && self.end_time.is_none()
    }

    /// Bytes delivered before the current segment began.
    pub fn settled_bytes(&self) -> f64 {
        match self.kind {
            PromiseKind::Guaranteed { .. } => 0.0,
            PromiseKind::BestEffort { settled_bytes, .. } => settled_bytes,
        }
    }

    /// Elapsed time of the promise; frozen once it has ended.
    pub fn duration(&self, now: f64) -> f64 {
        match self.start_time {
            Some(start) => (self.end_time.unwrap_or(now) - start).max(0.0),
            None => 0.0,
        }
    }

    pub fn bytes_delivered(&self, now: f64) -> f64 {
        let Some(segment_start) = self.segment_start else {
            return 0.0;
        };
        let segment = (self.end_time.unwrap_or(now) - segment_start).max(0.0);

        self.settled_bytes() + self.bandwidth() * segment
    }

    /// Begins the promise at `now`. A guaranteed promise reserves its bandwidth on
    /// every link of the route and fails without side effects if any link lacks it.
    /// A best-effort promise starts at rate zero until the next distribution.
    pub fn start(&mut self, now: f64, topology: &mut Topology) -> Result<()> {
        if let PromiseKind::Guaranteed { bandwidth } = self.kind {
            topology.reserve_route(&self.route.links, bandwidth, Pool::Priority)?;
        }

        self.start_time = Some(now);
        self.segment_start = Some(now);
        self.end_time = None;
        Ok(())
    }

    /// Ends the promise at `time`, returning guaranteed bandwidth to the priority pools.
    /// Ending a promise that is not active is a no-op.
    pub fn end(&mut self, time: f64, topology: &mut Topology) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }
        if let PromiseKind::Guaranteed { bandwidth } = self.kind {
            topology.release_route(&self.route.links, bandwidth, Pool::Priority)?;
        }

        self.end_time = Some(time);
        Ok(())
    }

    /// Undoes [`Promise::end`], re-reserving guaranteed bandwidth.
    pub(crate) fn reopen(&mut self, topology: &mut Topology) -> Result<()> {
        if self.end_time.is_none() {
            return Ok(());
        }
        if let PromiseKind::Guaranteed { bandwidth } = self.kind {
            topology.reserve_route(&self.route.links, bandwidth, Pool::Priority)?;
        }

        self.end_time = None;
        Ok(())
    }

    /// Settles the bytes of the running segment and continues at `rate` from `now`.
    /// Only best-effort promises change; guaranteed ones keep their bandwidth.
    pub(crate) fn rebase(&mut self, now: f64, new_rate: f64) {
        let delivered = self.bytes_delivered(now);
        if let PromiseKind::BestEffort { rate, settled_bytes } = &mut self.kind {
            *settled_bytes = delivered;
            *rate = new_rate;
            self.segment_start = Some(now);
        }
    }
}
