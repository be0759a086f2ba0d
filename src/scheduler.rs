//! Deferred task scheduling.
//!
//! Every continuation of a [`Promise`](crate::Promise) goes through a
//! [`Scheduler`], so a handler never runs inside the call that registered or
//! triggered it. The only ordering a scheduler must keep is FIFO among the
//! tasks it was handed.
//!
//! [`EventLoop`] is the deterministic implementation: nothing runs until the
//! owner drives it with [`EventLoop::run_once`] or [`EventLoop::run_until_idle`].
//!
//! # Examples
//!
//! ```
//! use promise_chain::{EventLoop, Scheduler};
//! use std::sync::{Arc, Mutex};
//!
//! let event_loop = EventLoop::new();
//! let seen = Arc::new(Mutex::new(vec![]));
//! let (a, b) = (seen.clone(), seen.clone());
//! event_loop.set_timeout(5, Box::new(move || a.lock().unwrap().push("timer")));
//! event_loop.defer(Box::new(move || b.lock().unwrap().push("deferred")));
//! assert_eq!(event_loop.run_until_idle(), Ok(2));
//! assert_eq!(*seen.lock().unwrap(), vec!["deferred", "timer"]);
//! ```
use crate::SchedulerError;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The "run this later" primitive promises are built on.
pub trait Scheduler: Send + Sync {
    /// Queue `task` to run after the caller's current synchronous work.
    fn defer(&self, task: Task);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopConfig {
    turn_limit: Option<usize>,
}

impl LoopConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of tasks one [`EventLoop::run_until_idle`] call may run.
    pub fn turn_limit(mut self, limit: usize) -> Self {
        self.turn_limit = Some(limit);
        self
    }
}

/// A single-queue, virtual-clock event loop.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone, Default)]
pub struct EventLoop {
    inner: Arc<Mutex<LoopInner>>,
    config: LoopConfig,
}

#[derive(Default)]
struct LoopInner {
    ready: VecDeque<Task>,
    // (due tick, registration sequence)
    timers: BTreeMap<(u64, u64), Task>,
    now: u64,
    next_seq: u64,
}

impl LoopInner {
    /// Jump the clock to the earliest timer and queue everything due by then.
    fn advance_clock(&mut self) -> bool {
        let Some(&(due, _)) = self.timers.keys().next() else {
            return false;
        };
        self.now = due;
        while let Some(entry) = self.timers.first_entry() {
            if entry.key().0 > due {
                break;
            }
            self.ready.push_back(entry.remove());
        }
        true
    }
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LoopConfig) -> Self {
        Self {
            inner: Arc::default(),
            config,
        }
    }

    /// A type-erased handle suitable for [`Promise::new`](crate::Promise::new).
    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::new(self.clone())
    }

    /// Run `task` once the virtual clock has advanced `ticks` past now.
    ///
    /// The clock only moves when the ready queue is empty, so a timer always
    /// runs after every task deferred before it fires.
    pub fn set_timeout(&self, ticks: u64, task: Task) {
        let mut inner = self.inner.lock().unwrap();
        let key = (inner.now.saturating_add(ticks), inner.next_seq);
        inner.next_seq += 1;
        inner.timers.insert(key, task);
    }

    pub fn now(&self) -> u64 {
        self.inner.lock().unwrap().now
    }

    /// Tasks that are queued or waiting on a timer.
    pub fn pending_tasks(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.ready.len() + inner.timers.len()
    }

    /// Run the next task, advancing the clock if only timers remain.
    /// Returns `false` when there was nothing to run.
    pub fn run_once(&self) -> bool {
        let task = {
            let mut inner = self.inner.lock().unwrap();
            if inner.ready.is_empty() && !inner.advance_clock() {
                return false;
            }
            inner.ready.pop_front()
        };
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run until no task or timer is left, returning how many tasks ran.
    pub fn run_until_idle(&self) -> Result<usize, SchedulerError> {
        let mut turns = 0;
        loop {
            if let Some(limit) = self.config.turn_limit {
                if turns >= limit && self.pending_tasks() > 0 {
                    tracing::debug!(limit, "event loop hit its turn limit");
                    return Err(SchedulerError::TurnLimitExceeded { limit });
                }
            }
            if !self.run_once() {
                return Ok(turns);
            }
            turns += 1;
        }
    }
}

impl Scheduler for EventLoop {
    fn defer(&self, task: Task) {
        self.inner.lock().unwrap().ready.push_back(task);
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("EventLoop")
            .field("ready", &inner.ready.len())
            .field("timers", &inner.timers.len())
            .field("now", &inner.now)
            .field("config", &self.config)
            .finish()
    }
}
