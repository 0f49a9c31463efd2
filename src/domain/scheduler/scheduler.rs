use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::api::config_dto::SchedulerConfigDto;
use crate::api::report_dto::SubmissionAckDto;
use crate::domain::clock::{SharedClock, timed};
use crate::domain::scheduler::boundary::{AllocationBoundary, NetworkBoundary};
use crate::domain::scheduler::rule::Rule;
use crate::domain::scheduler::stages;
use crate::domain::scheduler::transfer::TransferState;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Virtual seconds between two heartbeats.
    pub heartbeat: f64,
    pub use_throttler: bool,
    /// Wall time between two stager polls.
    pub stager_poll: Duration,
    /// With `false` the stages make no network calls and transfers finish as soon
    /// as they are submitted.
    pub network_enabled: bool,
}

impl TryFrom<&SchedulerConfigDto> for SchedulerConfig {
    type Error = Error;

    fn try_from(dto: &SchedulerConfigDto) -> Result<Self> {
        if !dto.heartbeat.is_finite() || dto.heartbeat <= 0.0 {
            return Err(Error::ConfigError(format!("heartbeat must be positive, got {}", dto.heartbeat)));
        }

        Ok(Self {
            heartbeat: dto.heartbeat,
            use_throttler: dto.throttler,
            stager_poll: Duration::from_millis(dto.stager_poll_millis.max(1)),
            network_enabled: dto.network_enabled,
        })
    }
}

/// Number of transfers each stage moved during one heartbeat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatSummary {
    pub prepared: usize,
    pub admitted: usize,
    pub submitted: usize,
    pub done: usize,
    pub deleted: usize,
}

/// Stop flag that sleeping loops can be woken from.
#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    fn set(&self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.wake.notify_all();
    }

    fn is_set(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps up to `timeout`; returns `true` if the signal was set.
    fn wait(&self, timeout: Duration) -> bool {
        let guard = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self.wake.wait_timeout_while(guard, timeout, |stopped| !*stopped).unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

struct SchedulerCore {
    config: SchedulerConfig,
    network: Arc<dyn NetworkBoundary>,
    allocator: Arc<dyn AllocationBoundary>,
    clock: SharedClock,
    /// Rule delays count from here: construction, then again when the threads start.
    started_at: Mutex<f64>,

    pending: Mutex<Vec<Rule>>,
    active: Mutex<Vec<Rule>>,
    acks: Mutex<SubmissionAckDto>,
    /// Held for a whole heartbeat so two heartbeats never work on copies of the same rules.
    beating: Mutex<()>,
    heartbeats: AtomicU64,
    stop: StopSignal,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SchedulerCore {
    fn stage_due_rules(&self) -> usize {
        let elapsed = self.clock.now() - *lock(&self.started_at);

        // Pending stays locked until the due rules are active. Lock order: pending, then active.
        let mut pending = lock(&self.pending);
        let (due, waiting): (Vec<Rule>, Vec<Rule>) = pending.drain(..).partition(|rule| elapsed >= rule.delay);
        *pending = waiting;

        let staged = due.len();
        if staged > 0 {
            for rule in &due {
                log::info!("Staging rule {} with {} transfers at virtual time {:.3}.", rule.id, rule.transfers().len(), elapsed);
            }
            lock(&self.active).extend(due);
        }
        staged
    }

    fn heartbeat(&self) -> HeartbeatSummary {
        let _beating = lock(&self.beating);
        let n = self.heartbeats.fetch_add(1, Ordering::Relaxed);
        log::debug!("Starting heartbeat {}", n);

        // 1. Prune deleted transfers and copy the active rules out of the lock.
        let mut rules: Vec<Rule> = {
            let mut active = lock(&self.active);
            for rule in active.iter_mut() {
                rule.clean();
            }
            active.clone()
        };

        // 2. Run the stages on the copy; boundary calls happen outside the lock.
        let clock = self.clock.as_ref();
        let network = self.config.network_enabled.then_some(self.network.as_ref());
        let allocator = self.allocator.as_ref();

        let mut summary = HeartbeatSummary {
            prepared: timed(clock, "preparer", || stages::preparer(network, allocator, &mut rules, self.config.use_throttler)),
            ..HeartbeatSummary::default()
        };
        if self.config.use_throttler {
            summary.admitted = timed(clock, "throttler", || stages::throttler(&mut rules));
        }
        let (submitted, ack) = timed(clock, "submitter", || stages::submitter(network, allocator, &mut rules));
        summary.submitted = submitted;
        summary.done = timed(clock, "poller", || stages::poller(network, &mut rules));
        summary.deleted = timed(clock, "finisher", || stages::finisher(network, allocator, &mut rules));

        if let Some(ack) = ack {
            let mut acks = lock(&self.acks);
            for (rule_id, mappings) in ack.mappings {
                acks.mappings.entry(rule_id).or_default().extend(mappings);
            }
        }

        // 3. Write the new states back.
        let mut active = lock(&self.active);
        for copy in &rules {
            if let Some(rule) = active.iter_mut().find(|rule| rule.id == copy.id) {
                rule.sync_states(copy);
            }
        }

        summary
    }

    fn stager_loop(&self) {
        log::debug!("Starting rule stager; {} rules to stage", lock(&self.pending).len());
        while !self.stop.is_set() {
            self.stage_due_rules();
            if lock(&self.pending).is_empty() {
                break;
            }
            if self.stop.wait(self.config.stager_poll) {
                break;
            }
        }
        log::debug!("Stopping rule stager");
    }

    fn runner_loop(&self) {
        let interval = self.clock.to_wall(self.config.heartbeat);
        while !self.stop.is_set() {
            self.heartbeat();
            if self.stop.wait(interval) {
                break;
            }
        }
        log::debug!("Stopping rule runner after {} heartbeats", self.heartbeats.load(Ordering::Relaxed));
    }
}

/// Drives rules through their transfer lifecycle with two threads: a stager that
/// activates rules once their delay has passed, and a runner that executes the
/// stage pipeline on every heartbeat.
///
/// [`Scheduler::stage_due_rules`] and [`Scheduler::heartbeat`] run one iteration
/// of either loop on the caller's thread.
pub struct Scheduler {
    core: Arc<SchedulerCore>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        rules: Vec<Rule>,
        config: SchedulerConfig,
        network: Arc<dyn NetworkBoundary>,
        allocator: Arc<dyn AllocationBoundary>,
        clock: SharedClock,
    ) -> Self {
        let started_at = Mutex::new(clock.now());
        let core = SchedulerCore {
            config,
            network,
            allocator,
            clock,
            started_at,
            pending: Mutex::new(rules),
            active: Mutex::new(Vec::new()),
            acks: Mutex::new(SubmissionAckDto::default()),
            beating: Mutex::new(()),
            heartbeats: AtomicU64::new(0),
            stop: StopSignal::default(),
        };

        Self { core: Arc::new(core), threads: Mutex::new(Vec::new()) }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.core.config
    }

    /// Spawns the stager and runner threads; rule delays count from this call on.
    /// Calling it twice has no effect.
    pub fn start(&self) -> Result<()> {
        let mut threads = lock(&self.threads);
        if !threads.is_empty() {
            return Ok(());
        }
        *lock(&self.core.started_at) = self.core.clock.now();

        let stager = Arc::clone(&self.core);
        threads.push(thread::Builder::new().name("StagerThread".to_string()).spawn(move || stager.stager_loop())?);

        let runner = Arc::clone(&self.core);
        threads.push(thread::Builder::new().name("RunnerThread".to_string()).spawn(move || runner.runner_loop())?);

        log::info!("Scheduler started with heartbeat {} virtual seconds.", self.core.config.heartbeat);
        Ok(())
    }

    /// Signals both loops and waits for them. No new heartbeat or stage starts
    /// afterwards; a heartbeat in progress runs to completion.
    pub fn stop(&self) {
        self.core.stop.set();

        let threads: Vec<JoinHandle<()>> = lock(&self.threads).drain(..).collect();
        for handle in threads {
            let name = handle.thread().name().unwrap_or("scheduler").to_string();
            if handle.join().is_err() {
                log::error!("{} panicked.", name);
            }
        }
    }

    pub fn close(&self) {
        self.stop();
        log::info!("Scheduler closed after {} heartbeats.", self.heartbeat_count());
    }

    pub fn is_stopped(&self) -> bool {
        self.core.stop.is_set()
    }

    /// Moves every pending rule whose delay has elapsed into the active set.
    pub fn stage_due_rules(&self) -> usize {
        self.core.stage_due_rules()
    }

    /// Runs one heartbeat: prune, then preparer, throttler, submitter, poller, finisher.
    /// Waits for a heartbeat already running on another thread.
    pub fn heartbeat(&self) -> HeartbeatSummary {
        self.core.heartbeat()
    }

    pub fn heartbeat_count(&self) -> u64 {
        self.core.heartbeats.load(Ordering::Relaxed)
    }

    pub fn pending_rules(&self) -> usize {
        lock(&self.core.pending).len()
    }

    /// Copy of the active rules and their transfers.
    pub fn active_rules(&self) -> Vec<Rule> {
        lock(&self.core.active).clone()
    }

    pub fn submission_acks(&self) -> SubmissionAckDto {
        lock(&self.core.acks).clone()
    }

    /// `true` once every rule was staged and all of their transfers were deleted.
    pub fn is_idle(&self) -> bool {
        let pending = lock(&self.core.pending);
        if !pending.is_empty() {
            return false;
        }
        lock(&self.core.active).iter().all(|rule| rule.transfers().iter().all(|t| t.state() == TransferState::Delete))
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
