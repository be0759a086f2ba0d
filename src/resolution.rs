//! What a promise can be resolved with.
//!
//! A value is either final (`Ok`/`Err`) or something to adopt: another
//! [`Promise`] or any foreign [`Thenable`]. Adoption forwards the eventual
//! outcome, so a promise never fulfills with a thenable as its payload.
use crate::Promise;

/// Fulfillment callback handed to [`Thenable::subscribe`].
pub type OnFulfilled<T> = Box<dyn FnOnce(T) + Send + 'static>;
/// Rejection callback handed to [`Thenable::subscribe`].
pub type OnRejected<E> = Box<dyn FnOnce(E) + Send + 'static>;

/// Anything exposing a `then`-shaped capability that a promise can adopt.
///
/// An implementation should call at most one of the two callbacks, at most
/// once. Calling both, or calling late, is tolerated: the adopting promise
/// keeps whichever outcome arrived first.
///
/// # Examples
///
/// ```
/// use promise_chain::{EventLoop, OnFulfilled, OnRejected, Promise, Thenable};
///
/// struct Ready(u8);
///
/// impl Thenable<u8, String> for Ready {
///     fn subscribe(self: Box<Self>, on_fulfilled: OnFulfilled<u8>, _: OnRejected<String>) {
///         on_fulfilled(self.0)
///     }
/// }
///
/// let event_loop = EventLoop::new();
/// let promise = Promise::<u8, String>::new(&event_loop.scheduler(), |resolver| {
///     resolver.adopt(Ready(9));
///     Ok(())
/// });
/// assert!(promise.status().is_fulfilled());
/// ```
pub trait Thenable<T, E>: Send {
    fn subscribe(self: Box<Self>, on_fulfilled: OnFulfilled<T>, on_rejected: OnRejected<E>);
}

/// The outcome a resolver or a continuation handler asks for.
pub enum Resolution<T, E> {
    /// Fulfill with a plain value.
    Value(T),
    /// Reject; this is how a handler "throws".
    Error(E),
    /// Adopt another promise of the same kind.
    Promise(Promise<T, E>),
    /// Adopt a foreign thenable.
    Thenable(Box<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    pub fn thenable(thenable: impl Thenable<T, E> + 'static) -> Self {
        Resolution::Thenable(Box::new(thenable))
    }
}

impl<T, E> std::fmt::Debug for Resolution<T, E>
where
    T: std::fmt::Debug,
    E: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Error(reason) => f.debug_tuple("Error").field(reason).finish(),
            Resolution::Promise(_) => f.write_str("Promise(..)"),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

/// Conversion for everything a `then`/`catch` handler may return.
///
/// - `Result<T, E>`: `Ok` fulfills, `Err` rejects.
/// - `Promise<T, E>`: adopted.
/// - `Resolution<T, E>`: used as is.
pub trait IntoResolution<T, E> {
    fn into_resolution(self) -> Resolution<T, E>;
}

impl<T, E> IntoResolution<T, E> for Resolution<T, E> {
    fn into_resolution(self) -> Resolution<T, E> {
        self
    }
}

impl<T, E> IntoResolution<T, E> for Result<T, E> {
    fn into_resolution(self) -> Resolution<T, E> {
        match self {
            Ok(value) => Resolution::Value(value),
            Err(reason) => Resolution::Error(reason),
        }
    }
}

impl<T, E> IntoResolution<T, E> for Promise<T, E> {
    fn into_resolution(self) -> Resolution<T, E> {
        Resolution::Promise(self)
    }
}

impl<T, E> From<Result<T, E>> for Resolution<T, E> {
    fn from(result: Result<T, E>) -> Self {
        result.into_resolution()
    }
}

impl<T, E> From<Promise<T, E>> for Resolution<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Resolution::Promise(promise)
    }
}
