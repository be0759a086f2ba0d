use crate::resolution::{IntoResolution, OnFulfilled, OnRejected, Resolution, Thenable};
use crate::scheduler::Scheduler;
use crate::Error;
use std::cell::RefCell;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::{future::Future, task::{Poll, Waker}};

/// A value that will be known later, plus the continuations waiting on it.
///
/// `Promise` is a cheap handle: clones observe the same settlement. Every
/// continuation runs on the [`Scheduler`] the promise was created with, never
/// inside the call that registered it.
///
/// # Examples
///
/// ```
/// use promise_chain::{EventLoop, Promise};
/// use std::sync::{Arc, Mutex};
///
/// let event_loop = EventLoop::new();
/// let seen = Arc::new(Mutex::new(None));
/// let sink = seen.clone();
/// Promise::<i32, String>::new(&event_loop.scheduler(), |resolver| {
///     resolver.resolve(1);
///     Ok(())
/// })
/// .then(|v| Ok(v + 1))
/// .then(move |v| {
///     *sink.lock().unwrap() = Some(v);
///     Ok(())
/// });
/// assert_eq!(*seen.lock().unwrap(), None);
/// event_loop.run_until_idle().unwrap();
/// assert_eq!(*seen.lock().unwrap(), Some(2));
/// ```
pub struct Promise<T, E> {
    pub(crate) shared: Arc<Shared<T, E>>,
}

/// A snapshot of where a promise is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Status<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Status::Pending)
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Status::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Status::Rejected(_))
    }
}

pub(crate) struct Reaction<T, E> {
    pub(crate) on_fulfilled: OnFulfilled<T>,
    pub(crate) on_rejected: OnRejected<E>,
}

enum State<T, E> {
    Pending(Vec<Reaction<T, E>>),
    Fulfilled(T),
    Rejected(E),
}

struct Inner<T, E> {
    state: State<T, E>,
    // Set once a resolver has committed to an outcome (possibly by adopting
    // a thenable that has not settled yet).
    locked: bool,
    abandoned: bool,
    wakers: Vec<Waker>,
}

pub(crate) struct Shared<T, E> {
    inner: Mutex<Inner<T, E>>,
    scheduler: Arc<dyn Scheduler>,
}

impl<T, E> Shared<T, E> {
    fn is_pending(&self) -> bool {
        matches!(self.inner.lock().unwrap().state, State::Pending(_))
    }

    /// Claim the right to settle. Only the first caller gets it.
    fn lock_in(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.locked || !matches!(inner.state, State::Pending(_)) {
            return false;
        }
        inner.locked = true;
        true
    }

    /// Move out of `Pending`, handing back the queued reactions.
    fn transition(&self, settled: State<T, E>) -> Option<Vec<Reaction<T, E>>> {
        let (reactions, wakers) = {
            let mut inner = self.inner.lock().unwrap();
            let State::Pending(reactions) = &mut inner.state else {
                return None;
            };
            let reactions = std::mem::take(reactions);
            inner.state = settled;
            (reactions, std::mem::take(&mut inner.wakers))
        };
        for waker in wakers {
            waker.wake()
        }
        Some(reactions)
    }

    /// Called when the last resolver goes away.
    fn abandon(&self) {
        let (reactions, wakers) = {
            let mut inner = self.inner.lock().unwrap();
            let State::Pending(reactions) = &mut inner.state else {
                return;
            };
            let reactions = std::mem::take(reactions);
            inner.abandoned = true;
            (reactions, std::mem::take(&mut inner.wakers))
        };
        tracing::debug!(
            dropped_reactions = reactions.len(),
            "promise abandoned while pending"
        );
        // Reactions hold resolvers of derived promises. Their guards only
        // enqueue onto ABANDONING while it is draining, so this stays flat.
        drop(reactions);
        for waker in wakers {
            waker.wake()
        }
    }
}

impl<T, E> Shared<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn fulfill(&self, value: T) {
        let Some(reactions) = self.transition(State::Fulfilled(value.clone())) else {
            return;
        };
        tracing::trace!(reactions = reactions.len(), "promise fulfilled");
        if reactions.is_empty() {
            return;
        }
        self.scheduler.defer(Box::new(move || {
            for reaction in reactions {
                (reaction.on_fulfilled)(value.clone());
            }
        }));
    }

    fn reject(&self, reason: E) {
        let Some(reactions) = self.transition(State::Rejected(reason.clone())) else {
            return;
        };
        tracing::trace!(reactions = reactions.len(), "promise rejected");
        if reactions.is_empty() {
            return;
        }
        self.scheduler.defer(Box::new(move || {
            for reaction in reactions {
                (reaction.on_rejected)(reason.clone());
            }
        }));
    }

    /// Queue `reaction` while pending, otherwise schedule it right away.
    pub(crate) fn react(&self, reaction: Reaction<T, E>) {
        let settled = {
            let mut inner = self.inner.lock().unwrap();
            if inner.abandoned {
                return;
            }
            match &mut inner.state {
                State::Pending(reactions) => {
                    reactions.push(reaction);
                    return;
                }
                State::Fulfilled(value) => Ok(value.clone()),
                State::Rejected(reason) => Err(reason.clone()),
            }
        };
        tracing::trace!(fulfilled = settled.is_ok(), "scheduling reaction on settled promise");
        self.scheduler.defer(Box::new(move || match settled {
            Ok(value) => (reaction.on_fulfilled)(value),
            Err(reason) => (reaction.on_rejected)(reason),
        }));
    }
}

/// The capability to settle one promise, handed to its executor.
///
/// Clones settle the same promise and may be sent to other threads. Only the
/// first `resolve`, `reject`, `adopt` or `settle` across all clones counts.
/// Dropping the last clone of a still-pending promise marks it abandoned,
/// which is what awaiting it reports.
pub struct Resolver<T, E> {
    shared: Arc<Shared<T, E>>,
    _guard: Arc<AbandonGuard>,
}

trait Abandon {
    fn abandon_if_pending(&self);
}

impl<T, E> Abandon for Shared<T, E> {
    fn abandon_if_pending(&self) {
        if self.is_pending() {
            self.abandon();
        }
    }
}

type AbandonTarget = Arc<dyn Abandon + Send + Sync>;

thread_local! {
    // Promises whose last resolver went away while another abandonment on
    // this thread was already running.
    static ABANDONING: RefCell<Option<Vec<AbandonTarget>>> = const { RefCell::new(None) };
}

struct AbandonGuard {
    shared: AbandonTarget,
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        let target = self.shared.clone();
        let nested = ABANDONING.with(|queue| match queue.borrow_mut().as_mut() {
            Some(queue) => {
                queue.push(target.clone());
                true
            }
            None => false,
        });
        if nested {
            return;
        }
        ABANDONING.with(|queue| *queue.borrow_mut() = Some(vec![target]));
        while let Some(next) = ABANDONING.with(|queue| queue.borrow_mut().as_mut().and_then(Vec::pop)) {
            next.abandon_if_pending();
        }
        ABANDONING.with(|queue| *queue.borrow_mut() = None);
    }
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            _guard: self._guard.clone(),
        }
    }
}

impl<T, E> Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("settled", &!self.shared.is_pending())
            .finish()
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn new(shared: Arc<Shared<T, E>>) -> Self {
        let guard = AbandonGuard { shared: shared.clone() };
        Self { shared, _guard: Arc::new(guard) }
    }

    pub fn resolve(&self, value: T) {
        self.settle(Resolution::Value(value))
    }

    /// Reject with `reason` as given; a promise passed here is not unwrapped.
    pub fn reject(&self, reason: E) {
        self.settle(Resolution::Error(reason))
    }

    /// Follow `thenable` and settle the same way it eventually does.
    pub fn adopt(&self, thenable: impl Thenable<T, E> + 'static) {
        self.settle(Resolution::thenable(thenable))
    }

    pub fn settle(&self, resolution: impl IntoResolution<T, E>) {
        if self.shared.lock_in() {
            self.follow(resolution.into_resolution());
        }
    }

    pub fn is_settled(&self) -> bool {
        !self.shared.is_pending()
    }

    fn follow(&self, resolution: Resolution<T, E>) {
        match resolution {
            Resolution::Value(value) => self.shared.fulfill(value),
            Resolution::Error(reason) => self.shared.reject(reason),
            Resolution::Promise(promise) => {
                if Arc::ptr_eq(&promise.shared, &self.shared) {
                    tracing::warn!("promise resolved with itself; it will never settle");
                    return;
                }
                tracing::debug!("adopting promise");
                promise.shared.react(self.forwarding_reaction());
            }
            Resolution::Thenable(thenable) => {
                tracing::debug!("adopting thenable");
                let Reaction { on_fulfilled, on_rejected } = self.forwarding_reaction();
                thenable.subscribe(on_fulfilled, on_rejected);
            }
        }
    }

    fn forwarding_reaction(&self) -> Reaction<T, E> {
        let (fulfilled, rejected) = (self.clone(), self.clone());
        Reaction {
            on_fulfilled: Box::new(move |value| fulfilled.shared.fulfill(value)),
            on_rejected: Box::new(move |reason| rejected.shared.reject(reason)),
        }
    }
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self { shared: self.shared.clone() }
    }
}

impl<T, E> Debug for Promise<T, E>
where
    T: Debug,
    E: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock().unwrap();
        let mut debug = f.debug_struct("Promise");
        match &inner.state {
            State::Pending(reactions) => debug.field("pending_reactions", &reactions.len()),
            State::Fulfilled(value) => debug.field("fulfilled", value),
            State::Rejected(reason) => debug.field("rejected", reason),
        };
        debug.finish()
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Create a promise, running `executor` right away on this thread.
    ///
    /// An `Err` from the executor rejects the promise, unless the executor
    /// already settled it.
    pub fn new<F>(scheduler: &Arc<dyn Scheduler>, executor: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) -> Result<(), E>,
    {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: State::Pending(vec![]),
                locked: false,
                abandoned: false,
                wakers: vec![],
            }),
            scheduler: scheduler.clone(),
        });
        let resolver = Resolver::new(shared.clone());
        if let Err(reason) = executor(resolver.clone()) {
            resolver.reject(reason);
        }
        Self { shared }
    }

    /// Register both continuations and get the promise they settle.
    ///
    /// Whichever handler matches the outcome runs once, on the scheduler.
    /// Its return value settles the returned promise: `Ok` fulfills, `Err`
    /// rejects, and a promise or thenable is followed until it settles.
    pub fn then_with<U, F, G, R, S>(&self, on_fulfilled: F, on_rejected: G) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        G: FnOnce(E) -> S + Send + 'static,
        R: IntoResolution<U, E>,
        S: IntoResolution<U, E>,
    {
        Promise::new(&self.shared.scheduler, |resolver: Resolver<U, E>| {
            let fulfilled = resolver.clone();
            self.shared.react(Reaction {
                on_fulfilled: Box::new(move |value| fulfilled.settle(on_fulfilled(value))),
                on_rejected: Box::new(move |reason| resolver.settle(on_rejected(reason))),
            });
            Ok(())
        })
    }

    /// Continue on fulfillment. A rejection passes through untouched.
    pub fn then<U, F, R>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> R + Send + 'static,
        R: IntoResolution<U, E>,
    {
        self.then_with(on_fulfilled, Err::<U, E>)
    }

    /// Continue on rejection. A fulfillment passes through untouched.
    pub fn catch<G, S>(&self, on_rejected: G) -> Promise<T, E>
    where
        G: FnOnce(E) -> S + Send + 'static,
        S: IntoResolution<T, E>,
    {
        self.then_with(Ok::<T, E>, on_rejected)
    }

    pub fn status(&self) -> Status<T, E> {
        match &self.shared.inner.lock().unwrap().state {
            State::Pending(_) => Status::Pending,
            State::Fulfilled(value) => Status::Fulfilled(value.clone()),
            State::Rejected(reason) => Status::Rejected(reason.clone()),
        }
    }
}

impl<T, E> Promise<T, E> {
    /// Whether both handles point at the same promise.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.shared.scheduler
    }
}

impl<T, E> Thenable<T, E> for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn subscribe(self: Box<Self>, on_fulfilled: OnFulfilled<T>, on_rejected: OnRejected<E>) {
        self.shared.react(Reaction { on_fulfilled, on_rejected });
    }
}

impl<T, E> Future for Promise<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Result<T, Error<E>>;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        let mut inner = self.shared.inner.lock().unwrap();
        let settled = match &inner.state {
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(Error::Rejected(reason.clone()))),
            State::Pending(_) if inner.abandoned => Some(Err(Error::Abandoned)),
            State::Pending(_) => None,
        };
        match settled {
            Some(output) => Poll::Ready(output),
            None => {
                inner.wakers.push(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
