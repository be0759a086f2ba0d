//! Constructors that do not start from a single pending executor.
use crate::promise::{Promise, Reaction};
use crate::resolution::{IntoResolution, Resolution};
use crate::scheduler::Scheduler;
use std::sync::{Arc, Mutex};

struct Collected<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Wrap `value` in a promise.
    ///
    /// A promise is handed back as is, a thenable is adopted, `Ok` fulfills
    /// and `Err` rejects.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::{EventLoop, Promise};
    ///
    /// let scheduler = EventLoop::new().scheduler();
    /// let five = Promise::<i32, ()>::fulfilled(&scheduler, 5);
    /// assert!(Promise::resolve(&scheduler, five.clone()).ptr_eq(&five));
    /// ```
    pub fn resolve(scheduler: &Arc<dyn Scheduler>, value: impl IntoResolution<T, E>) -> Self {
        match value.into_resolution() {
            Resolution::Promise(promise) => promise,
            resolution => Self::new(scheduler, |resolver| {
                resolver.settle(resolution);
                Ok(())
            }),
        }
    }

    pub fn fulfilled(scheduler: &Arc<dyn Scheduler>, value: T) -> Self {
        Promise::resolve(scheduler, Resolution::Value(value))
    }

    /// A promise already rejected with `reason`, which is never unwrapped.
    pub fn reject(scheduler: &Arc<dyn Scheduler>, reason: E) -> Self {
        Self::new(scheduler, |resolver| {
            resolver.reject(reason);
            Ok(())
        })
    }

    /// Wait for every input, keeping input order.
    ///
    /// The first rejection rejects the result right away; anything that
    /// fulfills after that is ignored. No inputs means an immediate
    /// `vec![]`.
    pub fn all<I>(scheduler: &Arc<dyn Scheduler>, items: I) -> Promise<Vec<T>, E>
    where
        I: IntoIterator,
        I::Item: IntoResolution<T, E>,
    {
        let promises: Vec<Promise<T, E>> = items
            .into_iter()
            .map(|item| Promise::resolve(scheduler, item))
            .collect();
        Promise::<Vec<T>, E>::new(scheduler, move |resolver| {
            if promises.is_empty() {
                resolver.resolve(vec![]);
                return Ok(());
            }
            let collected = Arc::new(Mutex::new(Collected {
                slots: vec![None; promises.len()],
                remaining: promises.len(),
            }));
            for (index, promise) in promises.into_iter().enumerate() {
                let (collected, fulfilled, rejected) =
                    (collected.clone(), resolver.clone(), resolver.clone());
                promise.shared.react(Reaction {
                    on_fulfilled: Box::new(move |value| {
                        if fulfilled.is_settled() {
                            return;
                        }
                        let values = {
                            let mut collected = collected.lock().unwrap();
                            collected.slots[index] = Some(value);
                            collected.remaining -= 1;
                            if collected.remaining > 0 {
                                return;
                            }
                            collected.slots.drain(..).flatten().collect::<Vec<T>>()
                        };
                        fulfilled.resolve(values);
                    }),
                    on_rejected: Box::new(move |reason| {
                        tracing::trace!(index, "all short-circuited by rejection");
                        rejected.reject(reason)
                    }),
                });
            }
            Ok(())
        })
    }

    /// Settle like whichever input settles first.
    ///
    /// With no inputs the result never settles.
    pub fn race<I>(scheduler: &Arc<dyn Scheduler>, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoResolution<T, E>,
    {
        let promises: Vec<Promise<T, E>> = items
            .into_iter()
            .map(|item| Promise::resolve(scheduler, item))
            .collect();
        Self::new(scheduler, move |resolver| {
            for promise in promises {
                let (fulfilled, rejected) = (resolver.clone(), resolver.clone());
                promise.shared.react(Reaction {
                    on_fulfilled: Box::new(move |value| fulfilled.resolve(value)),
                    on_rejected: Box::new(move |reason| rejected.reject(reason)),
                });
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
use crate::{EventLoop, Promise, Resolver, Scheduler, Status};
use std::sync::Arc;

fn delayed(event_loop: &EventLoop, ticks: u64, outcome: Result<i32, &'static str>) -> Promise<i32, &'static str> {
    let timers = event_loop.clone();
    Promise::<i32, &'static str>::new(&event_loop.scheduler(), move |resolver| {
        timers.set_timeout(ticks, Box::new(move || resolver.settle(outcome)));
        Ok(())
    })
}

fn never(scheduler: &Arc<dyn Scheduler>) -> (Promise<i32, &'static str>, Resolver<i32, &'static str>) {
    let mut slot = None;
    let promise = Promise::new(scheduler, |resolver| {
        slot = Some(resolver);
        Ok(())
    });
    (promise, slot.unwrap())
}

#[test]
fn test_resolve_wraps_values() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let value = Promise::<i32, &str>::resolve(&scheduler, Ok(1));
    let error = Promise::<i32, &str>::resolve(&scheduler, Err("no"));
    assert_eq!(value.status(), Status::Fulfilled(1));
    assert_eq!(error.status(), Status::Rejected("no"));
}

#[test]
fn test_resolve_returns_same_promise() {
    let scheduler = EventLoop::new().scheduler();
    let (pending, _resolver) = never(&scheduler);
    assert!(Promise::resolve(&scheduler, pending.clone()).ptr_eq(&pending));
}

#[test]
fn test_reject_does_not_unwrap() {
    let scheduler = EventLoop::new().scheduler();
    let inner = Promise::<i32, ()>::fulfilled(&scheduler, 3);
    let outer = Promise::<i32, Promise<i32, ()>>::reject(&scheduler, inner.clone());
    match outer.status() {
        Status::Rejected(reason) => assert!(reason.ptr_eq(&inner)),
        Status::Pending | Status::Fulfilled(_) => panic!("expected a rejection"),
    }
}

#[test]
fn test_all_keeps_input_order() {
    let event_loop = EventLoop::new();
    let all = Promise::all(
        &event_loop.scheduler(),
        vec![
            delayed(&event_loop, 30, Ok(1)),
            Promise::fulfilled(&event_loop.scheduler(), 2),
            delayed(&event_loop, 10, Ok(3)),
        ],
    );
    event_loop.run_until_idle().unwrap();
    assert_eq!(all.status(), Status::Fulfilled(vec![1, 2, 3]));
}

#[test]
fn test_all_accepts_plain_values() {
    let event_loop = EventLoop::new();
    let all = Promise::<i32, &str>::all(&event_loop.scheduler(), vec![Ok(4), Ok(5)]);
    assert!(all.status().is_pending());
    event_loop.run_until_idle().unwrap();
    assert_eq!(all.status(), Status::Fulfilled(vec![4, 5]));
}

#[test]
fn test_all_empty() {
    let event_loop = EventLoop::new();
    let all = Promise::<i32, &str>::all(&event_loop.scheduler(), Vec::<Promise<i32, &str>>::new());
    assert_eq!(all.status(), Status::Fulfilled(vec![]));
}

#[test]
fn test_all_rejects_on_first_rejection() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let (stalled, _resolver) = never(&scheduler);
    let all = Promise::all(
        &scheduler,
        vec![
            stalled,
            delayed(&event_loop, 1, Err("b")),
            delayed(&event_loop, 2, Err("c")),
        ],
    );
    while all.status().is_pending() {
        assert!(event_loop.run_once());
    }
    assert_eq!(all.status(), Status::Rejected("b"));
    assert_eq!(event_loop.now(), 1);
    event_loop.run_until_idle().unwrap();
    assert_eq!(all.status(), Status::Rejected("b"));
}

#[test]
fn test_race_first_wins() {
    let event_loop = EventLoop::new();
    let race = Promise::race(
        &event_loop.scheduler(),
        vec![delayed(&event_loop, 20, Ok(1)), delayed(&event_loop, 5, Err("x"))],
    );
    event_loop.run_until_idle().unwrap();
    assert_eq!(race.status(), Status::Rejected("x"));
}

#[test]
fn test_race_fulfillment_wins() {
    let event_loop = EventLoop::new();
    let race = Promise::race(
        &event_loop.scheduler(),
        vec![delayed(&event_loop, 5, Ok(1)), delayed(&event_loop, 20, Err("x"))],
    );
    event_loop.run_until_idle().unwrap();
    assert_eq!(race.status(), Status::Fulfilled(1));
}

#[test]
fn test_race_empty_stays_pending() {
    let event_loop = EventLoop::new();
    let race = Promise::<i32, &str>::race(&event_loop.scheduler(), Vec::<Result<i32, &str>>::new());
    event_loop.run_until_idle().unwrap();
    assert!(race.status().is_pending());
}
}
