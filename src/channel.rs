//! A channel scheduler uses a multi-producer, single-consumer channel as its
//! task queue. The scheduler side can be cloned and sent to any thread, while
//! the single [`TaskReceiver`] runs the tasks wherever it lives.
//!
//! # Examples
//!
//! ```
//! use promise_chain::{channel::task_channel, Promise};
//! use futures::executor::block_on;
//! use std::thread;
//!
//! let (scheduler, receiver) = task_channel();
//! let worker = thread::spawn(move || receiver.run_blocking());
//! let promise = Promise::<u32, String>::fulfilled(&scheduler.scheduler(), 20)
//!     .then(|v| Ok(v + 1))
//!     .then(|v| Ok(v * 2));
//! assert_eq!(block_on(promise), Ok(42));
//! drop(scheduler);
//! assert_eq!(worker.join().expect("The worker thread has panicked"), 2);
//! ```
use crate::scheduler::{Scheduler, Task};
use crate::SchedulerError;
use std::sync::{
    mpsc::{channel, Receiver, RecvError, Sender, TryRecvError},
    Arc,
};

/// Create a connected scheduler/receiver pair.
pub fn task_channel() -> (ChannelScheduler, TaskReceiver) {
    let (sender, receiver) = channel();
    (ChannelScheduler { sender }, TaskReceiver { receiver })
}

#[derive(Debug, Clone)]
pub struct ChannelScheduler {
    sender: Sender<Task>,
}

#[derive(Debug)]
pub struct TaskReceiver {
    receiver: Receiver<Task>,
}

impl ChannelScheduler {
    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::new(self.clone())
    }
}

impl Scheduler for ChannelScheduler {
    fn defer(&self, task: Task) {
        if self.sender.send(task).is_err() {
            tracing::warn!("task receiver dropped, discarding deferred task");
        }
    }
}

impl TaskReceiver {
    /// Run everything queued right now without blocking.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return ran,
            }
        }
    }

    /// Block for the next task and run it.
    pub fn run_next(&self) -> Result<(), SchedulerError> {
        match self.receiver.recv() {
            Ok(task) => {
                task();
                Ok(())
            }
            Err(RecvError) => Err(SchedulerError::Disconnected),
        }
    }

    /// Run tasks until every scheduler handle, including those held by
    /// promises, has been dropped.
    pub fn run_blocking(&self) -> usize {
        let mut ran = 0;
        while self.run_next().is_ok() {
            ran += 1;
        }
        tracing::trace!(ran, "task channel disconnected");
        ran
    }
}
