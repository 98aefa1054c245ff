//! The top-level driver: owns the root node and the shared
//! [`NodeContext`], and advances discrete-event time by repeatedly
//! firing the root's four dispatch entry points. Ported from
//! `sydevs::simulation`.

use sydevs_types::{Duration, Scale, TimePoint};

use crate::context::{NodeContext, Printer, Rng, StdRngSource};
use crate::discrete_event_time::DiscreteEventTime;
use crate::error::{KernelError, Result};
use crate::node::SystemNode;
use crate::time_cache::TimeCache;
use crate::time_queue::TimeQueue;

/// The sentinel id the root-level queue/cache pair uses for the root
/// node's own schedule — there is only ever one entry, since a
/// simulation has exactly one root.
const ROOT_EVENT_ID: i64 = 0;

/// The simulation's own observable lifecycle, forward-only:
/// `NotStarted -> Running -> Finishing -> Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    NotStarted,
    Running,
    Finishing,
    Finished,
}

/// Builder-style configuration for a [`Simulation`] run, gathering the
/// constructor options that would otherwise be a long positional
/// argument list.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub seed: u64,
    pub start_t: TimePoint,
    pub end_t: Option<TimePoint>,
    pub can_end_early: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            start_t: TimePoint::new(),
            end_t: None,
            can_end_early: true,
        }
    }
}

impl SimConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_start_t(mut self, start_t: TimePoint) -> Self {
        self.start_t = start_t;
        self
    }

    /// Bounds the run at `end_t` and disables `can_end_early`, since a
    /// caller naming an explicit end time almost always wants the run
    /// to reach it rather than stop early once the queue runs dry.
    pub fn with_end_t(mut self, end_t: TimePoint) -> Self {
        self.end_t = Some(end_t);
        self.can_end_early = false;
        self
    }

    pub fn with_can_end_early(mut self, can_end_early: bool) -> Self {
        self.can_end_early = can_end_early;
        self
    }
}

/// Owns the root [`SystemNode`], the [`NodeContext`] shared by every
/// node in the tree, and the root-level `TimeQueue`/`TimeCache` pair
/// used only to schedule the root's own next event.
pub struct Simulation {
    root: Box<dyn SystemNode>,
    ctx: NodeContext,
    root_queue: TimeQueue,
    root_cache: TimeCache,
    end_t: Option<TimePoint>,
    can_end_early: bool,
    started: bool,
    finishing: bool,
    finished: bool,
    time_printed: bool,
    /// `false` once an event other than the first at the current `t`
    /// still needs `NodeContext::tick()` called before it fires.
    time_is_fresh: bool,
    event_count: u64,
}

impl Simulation {
    /// Constructs a simulation from a [`SimConfig`], defaulting to an
    /// unbounded, early-ending run when the config leaves `end_t` unset.
    pub fn from_config(config: SimConfig, printer: Printer, root: Box<dyn SystemNode>) -> Result<Self> {
        match config.end_t {
            Some(end_t) => Self::new(config.start_t, end_t, config.can_end_early, config.seed, printer, root),
            None => {
                if root.interface().port_count() != 0 {
                    return Err(KernelError::RootNodeHasPorts);
                }
                let mut ctx = NodeContext::new(Box::new(StdRngSource::from_seed(config.seed)), printer);
                ctx.set_time(config.start_t.clone());
                tracing::debug!(root = root.node_full_name(), can_end_early = true, "simulation constructed");
                Ok(Self {
                    root,
                    ctx,
                    root_queue: TimeQueue::at(config.start_t),
                    root_cache: TimeCache::new(),
                    end_t: None,
                    can_end_early: true,
                    started: false,
                    finishing: false,
                    finished: false,
                    time_printed: false,
                    time_is_fresh: true,
                    event_count: 0,
                })
            }
        }
    }

    /// Constructs a simulation bounded by an explicit `[start_t, end_t]`
    /// window. `can_end_early` permits the run to transition to
    /// finalization before `end_t` once the event queue runs dry.
    ///
    /// Fails with [`KernelError::RootNodeHasPorts`] if `root` declares
    /// any ports — the root of a simulation has nothing to connect to.
    pub fn new(
        start_t: TimePoint,
        end_t: TimePoint,
        can_end_early: bool,
        seed: u64,
        printer: Printer,
        root: Box<dyn SystemNode>,
    ) -> Result<Self> {
        Self::with_rng(start_t, end_t, can_end_early, Box::new(StdRngSource::from_seed(seed)), printer, root)
    }

    /// As [`Simulation::new`], but with an injectable [`Rng`] instead
    /// of a seed — used by tests that need a deterministic stub rather
    /// than the production PRNG.
    pub fn with_rng(
        start_t: TimePoint,
        end_t: TimePoint,
        can_end_early: bool,
        rng: Box<dyn Rng>,
        printer: Printer,
        root: Box<dyn SystemNode>,
    ) -> Result<Self> {
        if root.interface().port_count() != 0 {
            return Err(KernelError::RootNodeHasPorts);
        }
        let mut ctx = NodeContext::new(rng, printer);
        ctx.set_time(start_t.clone());
        tracing::debug!(root = root.node_full_name(), can_end_early, "simulation constructed");
        Ok(Self {
            root,
            ctx,
            root_queue: TimeQueue::at(start_t),
            root_cache: TimeCache::new(),
            end_t: Some(end_t),
            can_end_early,
            started: false,
            finishing: false,
            finished: false,
            time_printed: false,
            time_is_fresh: true,
            event_count: 0,
        })
    }

    /// Constructs a simulation starting at time zero and running for
    /// exactly `total_dt`. If `total_dt` is infinite, there is no
    /// `end_t` to reach and `can_end_early` is forced to `true` —
    /// otherwise the run could never finish.
    pub fn with_duration(total_dt: Duration, seed: u64, printer: Printer, root: Box<dyn SystemNode>) -> Result<Self> {
        if root.interface().port_count() != 0 {
            return Err(KernelError::RootNodeHasPorts);
        }
        let start_t = TimePoint::new();
        let can_end_early = !total_dt.finite();
        let end_t = if total_dt.finite() {
            Some(start_t.clone() + total_dt)
        } else {
            None
        };
        let mut ctx = NodeContext::new(Box::new(StdRngSource::from_seed(seed)), printer);
        ctx.set_time(start_t.clone());
        tracing::debug!(root = root.node_full_name(), can_end_early, "simulation constructed");
        Ok(Self {
            root,
            ctx,
            root_queue: TimeQueue::at(start_t),
            root_cache: TimeCache::new(),
            end_t,
            can_end_early,
            started: false,
            finishing: false,
            finished: false,
            time_printed: false,
            time_is_fresh: true,
            event_count: 0,
        })
    }

    pub fn state(&self) -> SimState {
        if self.finished {
            SimState::Finished
        } else if self.finishing {
            SimState::Finishing
        } else if self.started {
            SimState::Running
        } else {
            SimState::NotStarted
        }
    }

    pub fn time(&self) -> &DiscreteEventTime {
        self.ctx.time()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn root(&self) -> &dyn SystemNode {
        self.root.as_ref()
    }

    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut NodeContext {
        &mut self.ctx
    }

    /// Prints the `$time:` line for the current instant exactly once
    /// per distinct `t`, matching the external line format. A
    /// node's own print calls are expected to call this first so a
    /// run's output groups all lines for one `t` under a single time
    /// header.
    pub fn print_time_if_needed(&mut self) {
        if !self.time_printed {
            let time = self.ctx.time().clone();
            self.ctx.printer().print_time(&time);
            self.time_printed = true;
        }
    }

    fn elapsed_since_root(&self) -> Duration {
        let dt = self.root_cache.duration_since(ROOT_EVENT_ID, self.ctx.time().t());
        if dt.finite() {
            dt
        } else {
            Duration::zero()
        }
    }

    fn schedule_root(&mut self, dt: Duration) -> Result<()> {
        if dt.infinite() {
            self.root_queue.cancel_event(ROOT_EVENT_ID);
        } else {
            self.root_queue.plan_event(ROOT_EVENT_ID, dt)?;
        }
        self.root_cache.retain_event(ROOT_EVENT_ID, Scale::new(0), self.ctx.time().t());
        Ok(())
    }

    /// Steps simulated time forward by `min(imminent_duration, end_t -
    /// now)`. Decides whether the run should enter
    /// `finishing` — either this step would land exactly on `end_t`,
    /// or there is nothing left to schedule and the run isn't allowed
    /// to end early.
    fn advance_time(&mut self) -> Result<bool> {
        let imminent = self.root_queue.imminent_duration();
        let remaining = match &self.end_t {
            Some(end_t) => end_t.diff(self.root_queue.current_time()),
            None => Duration::inf(),
        };
        let reaches_end = self.end_t.is_some() && remaining <= imminent;
        let dt = if reaches_end { remaining } else { imminent };

        let moved = dt.finite() && dt > Duration::zero();
        if moved {
            self.root_queue.advance_time_by(dt)?;
            let t = self.root_queue.current_time().clone();
            self.ctx.set_time(t.clone());
            self.root_cache.advance_time(&t);
            self.time_printed = false;
        }

        if reaches_end || (imminent.infinite() && self.can_end_early) {
            self.finishing = true;
        }
        Ok(moved)
    }

    /// Runs exactly one step of the three-state main loop:
    /// initialize, or fire the next planned event, or finalize. Events
    /// that fire at an unchanged `t` bump the superdense index `c`
    /// before dispatch; `set_time` already reset it to zero for events
    /// at a newly reached `t`.
    pub fn process_next_event(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        if !self.started {
            self.started = true;
            tracing::info!(root = self.root.node_full_name(), "simulation started");
            let dt = self.root.initialization_event(&mut self.ctx)?;
            self.schedule_root(dt)?;
            self.time_is_fresh = self.advance_time()?;
        } else if !self.finishing {
            if !self.time_is_fresh {
                self.ctx.tick();
            }
            let elapsed = self.elapsed_since_root();
            let dt = self.root.planned_event(&mut self.ctx, elapsed)?;
            self.schedule_root(dt)?;
            self.time_is_fresh = self.advance_time()?;
        } else {
            if !self.time_is_fresh {
                self.ctx.tick();
            }
            let elapsed = self.elapsed_since_root();
            self.root.finalization_event(&mut self.ctx, elapsed)?;
            self.finished = true;
            tracing::info!(event_count = self.event_count, "simulation finished");
        }
        self.event_count += 1;
        tracing::trace!(event_count = self.event_count, time = %self.ctx.time().t(), "event processed");
        Ok(())
    }

    /// Total number of events dispatched to the root so far, including
    /// the initialization and finalization events.
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Runs events until simulated time `t` itself advances (or the
    /// run finishes first).
    pub fn process_next_events(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        let t0 = self.time().t().clone();
        loop {
            self.process_next_event()?;
            if self.finished || self.time().t() != &t0 {
                break;
            }
        }
        Ok(())
    }

    /// Runs events while `self.time().t() < t`.
    pub fn process_events_until(&mut self, t: TimePoint) -> Result<()> {
        while !self.finished && self.time().t() < &t {
            self.process_next_event()?;
        }
        Ok(())
    }

    /// Runs events to completion.
    pub fn process_remaining_events(&mut self) -> Result<()> {
        while !self.finished {
            self.process_next_event()?;
        }
        Ok(())
    }
}
