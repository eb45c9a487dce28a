//! Scheduling
//!
//! Every continuation runs in a later scheduling turn, never inside the call
//! that registered or settled it. The core only needs one capability from its
//! host for that: [`Scheduler::schedule`]. [`EventLoop`] is the bundled
//! single-threaded implementation: a FIFO macrotask queue with virtual-time
//! timers, driven explicitly by the embedder.

use crate::config::EventLoopConfig;
use rustc_hash::FxHashMap as HashMap;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{trace, warn};

/// A unit of work handed to a scheduler
pub type Task = Box<dyn FnOnce()>;

/// Timer identifier returned by [`EventLoop::set_timeout`]
pub type TimerId = u64;

/// The "run later" capability.
///
/// Implementations must never run `task` synchronously inside `schedule`, and
/// must preserve FIFO order among tasks scheduled from the same source.
pub trait Scheduler {
    fn schedule(&self, task: Task);
}

/// Shared handle to a scheduler, held by every deferred value
pub type SchedulerHandle = Rc<dyn Scheduler>;

/// Result of driving the event loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Number of tasks executed
    pub tasks_run: usize,
    /// Virtual time when the run stopped
    pub final_time: u64,
    /// Whether the run stopped because the task budget was used up
    pub budget_exhausted: bool,
}

/// Runtime statistics for the event loop
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EventLoopStats {
    /// Tasks queued, including timers
    pub tasks_scheduled: u64,
    /// Tasks executed
    pub tasks_run: u64,
    /// Timers cancelled before they fired
    pub timers_cancelled: u64,
    /// Number of run calls
    pub runs: u64,
    /// Most tasks executed by a single run call
    pub max_tasks_per_run: u64,
}

/// How far a run may go
#[derive(Clone, Copy, Debug)]
enum Horizon {
    /// Only tasks due at the current virtual time
    Now,
    /// Tasks due at or before the given virtual time
    Until(u64),
    /// Everything, advancing virtual time as needed
    Idle,
}

struct LoopState {
    /// Queued tasks ordered by (fire time, sequence); the sequence keeps FIFO order
    /// among tasks due at the same time
    queue: BTreeMap<(u64, TimerId), Task>,
    /// Fire time of every queued task, for cancellation
    deadlines: HashMap<TimerId, u64>,
    virtual_time: u64,
    next_id: TimerId,
    stats: EventLoopStats,
}

/// Single-threaded macrotask executor with virtual time
pub struct EventLoop {
    config: EventLoopConfig,
    state: RefCell<LoopState>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    /// Create a new event loop with the default configuration
    pub fn new() -> Self {
        Self::with_config(EventLoopConfig::default())
    }

    /// Create a new event loop
    pub fn with_config(config: EventLoopConfig) -> Self {
        let state = LoopState {
            queue: BTreeMap::new(),
            deadlines: HashMap::default(),
            virtual_time: config.start_time,
            next_id: 1,
            stats: EventLoopStats::default(),
        };
        Self {
            config,
            state: RefCell::new(state),
        }
    }

    /// Create a shared event loop together with its scheduler handle
    pub fn shared(config: EventLoopConfig) -> (Rc<EventLoop>, SchedulerHandle) {
        let event_loop = Rc::new(Self::with_config(config));
        let handle: SchedulerHandle = event_loop.clone();
        (event_loop, handle)
    }

    pub fn config(&self) -> &EventLoopConfig {
        &self.config
    }

    /// Get current virtual time
    pub fn current_time(&self) -> u64 {
        self.state.borrow().virtual_time
    }

    /// Queue `task` to run once `delay` ms of virtual time have passed
    pub fn set_timeout(&self, delay: u64, task: Task) -> TimerId {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;

        let fire_at = state.virtual_time.saturating_add(delay);
        state.queue.insert((fire_at, id), task);
        state.deadlines.insert(id, fire_at);
        state.stats.tasks_scheduled += 1;
        trace!(id, fire_at, "task queued");
        id
    }

    /// Cancel a queued task. Returns false if it already ran or never existed.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(fire_at) = state.deadlines.remove(&id) else {
            return false;
        };
        state.queue.remove(&(fire_at, id));
        state.stats.timers_cancelled += 1;
        true
    }

    /// Number of queued tasks
    pub fn pending_tasks(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Check if the event loop has any pending work
    pub fn has_pending_work(&self) -> bool {
        !self.state.borrow().queue.is_empty()
    }

    /// Fire time of the earliest queued task
    pub fn next_task_time(&self) -> Option<u64> {
        self.state
            .borrow()
            .queue
            .first_key_value()
            .map(|(&(fire_at, _), _)| fire_at)
    }

    /// Run every task due at the current virtual time, including tasks those
    /// tasks queue with no delay. Virtual time does not move.
    pub fn run_pending(&self) -> RunResult {
        self.drive(Horizon::Now)
    }

    /// Advance virtual time by `ms`, running tasks as their fire time is reached
    pub fn advance_time(&self, ms: u64) -> RunResult {
        let target = self.current_time().saturating_add(ms);
        self.drive(Horizon::Until(target))
    }

    /// Run until no work is left, jumping virtual time forward to each timer
    pub fn run_until_idle(&self) -> RunResult {
        self.drive(Horizon::Idle)
    }

    /// Get a snapshot of the current event loop statistics
    pub fn stats(&self) -> EventLoopStats {
        self.state.borrow().stats.clone()
    }

    /// Reset all event loop statistics to zero
    pub fn reset_stats(&self) {
        self.state.borrow_mut().stats = EventLoopStats::default();
    }

    /// Drop all queued work
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.queue.clear();
        state.deadlines.clear();
    }

    fn drive(&self, horizon: Horizon) -> RunResult {
        let mut result = RunResult::default();

        loop {
            if !self.config.is_unbounded() && result.tasks_run >= self.config.task_budget {
                if self.has_pending_work() {
                    result.budget_exhausted = true;
                    warn!(
                        budget = self.config.task_budget,
                        pending = self.pending_tasks(),
                        "event loop run stopped at task budget"
                    );
                }
                break;
            }

            // The borrow must be released before the task runs: tasks schedule more tasks.
            let Some(task) = self.take_due(horizon) else {
                break;
            };
            task();
            result.tasks_run += 1;
        }

        let mut state = self.state.borrow_mut();
        if let Horizon::Until(target) = horizon {
            if !result.budget_exhausted {
                state.virtual_time = state.virtual_time.max(target);
            }
        }
        state.stats.runs += 1;
        state.stats.tasks_run += result.tasks_run as u64;
        state.stats.max_tasks_per_run = state.stats.max_tasks_per_run.max(result.tasks_run as u64);
        result.final_time = state.virtual_time;
        result
    }

    fn take_due(&self, horizon: Horizon) -> Option<Task> {
        let mut state = self.state.borrow_mut();
        let (&(fire_at, id), _) = state.queue.first_key_value()?;
        let due = match horizon {
            Horizon::Now => fire_at <= state.virtual_time,
            Horizon::Until(limit) => fire_at <= limit,
            Horizon::Idle => true,
        };
        if !due {
            return None;
        }

        let (_, task) = state.queue.pop_first()?;
        state.deadlines.remove(&id);
        state.virtual_time = state.virtual_time.max(fire_at);
        trace!(id, time = state.virtual_time, "running task");
        Some(task)
    }
}

impl Scheduler for EventLoop {
    fn schedule(&self, task: Task) {
        self.set_timeout(0, task);
    }
}
