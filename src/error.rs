use thiserror::Error;

/// What awaiting a [`Promise`](crate::Promise) yields when it does not fulfill.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error<E> {
    #[error("promise rejected: {0:?}")]
    Rejected(E),
    /// Every [`Resolver`](crate::Resolver) was dropped while the promise was
    /// still pending, so it can never settle.
    #[error("every resolver was dropped before the promise settled")]
    Abandoned,
}

impl<E> Error<E> {
    /// The rejection reason, if there is one.
    pub fn into_reason(self) -> Option<E> {
        match self {
            Error::Rejected(reason) => Some(reason),
            Error::Abandoned => None,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("event loop ran {limit} tasks without going idle")]
    TurnLimitExceeded { limit: usize },
    #[error("every scheduler handle was dropped")]
    Disconnected,
}
