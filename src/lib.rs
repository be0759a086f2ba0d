//! Chainable promises for rust.
//!
//! A [`Promise`] is a placeholder for a value that is produced later. Its
//! executor receives a [`Resolver`] that settles it exactly once, and any
//! number of continuations can be chained with [`Promise::then`],
//! [`Promise::catch`] and [`Promise::then_with`]. Continuations always run on a
//! [`Scheduler`], after the code that registered them has returned.
//!
//! # Examples
//!
//! ```
//! use promise_chain::{EventLoop, Promise, Status};
//!
//! let event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//! let sum = Promise::all(
//!     &scheduler,
//!     vec![
//!         Promise::<i32, String>::fulfilled(&scheduler, 1),
//!         Promise::<i32, String>::fulfilled(&scheduler, 2).then(|v| Ok(v * 10)),
//!     ],
//! )
//! .then(|values: Vec<i32>| Ok(values.iter().sum::<i32>()))
//! .catch(|_| Ok(-1));
//! event_loop.run_until_idle().unwrap();
//! assert_eq!(sum.status(), Status::Fulfilled(21));
//! ```
pub mod channel;
mod combinators;
mod error;
mod promise;
mod resolution;
pub mod scheduler;

pub use error::{Error, SchedulerError};
pub use promise::{Promise, Resolver, Status};
pub use resolution::{IntoResolution, OnFulfilled, OnRejected, Resolution, Thenable};
pub use scheduler::{EventLoop, LoopConfig, Scheduler, Task};
