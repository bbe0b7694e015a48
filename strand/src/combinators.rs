//! Futures derived from other futures.
//!
//! A derived future is an ordinary [`Future`] whose worker joins its sources.
//! Since every source started running when it was built, the derived worker
//! only waits and assembles.

use crate::future::{Builder, Future};

/// What [`Future::join_with`] does when the task failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnFailure<T> {
    /// Hand the failure to the caller.
    Propagate,
    /// Substitute this value and report the task as not completed.
    Fallback(T),
}

impl<T> Default for OnFailure<T> {
    fn default() -> Self {
        OnFailure::Propagate
    }
}

/// Returns a future of `transform` applied to the outcome of `future`.
///
/// `transform` runs exactly once, on a new worker, after `future` resolves.
/// With [`OnFailure::Propagate`] a failure of `future` becomes the failure of
/// the returned future, so failures travel through chains of `map`.
pub fn map<T, U, E, F>(transform: F, future: &Future<T, E>, on_failure: OnFailure<T>) -> Future<U, E>
where
    T: Clone + Send + Sync + 'static,
    U: Send + Sync + 'static,
    E: Send + Sync + 'static,
    F: FnOnce(T) -> U + Send + 'static,
{
    let source = future.clone();
    Builder::new().launch(move || {
        let (val, _) = source.join_with(on_failure)?;
        Ok(transform(val))
    })
}

/// Returns a future of all the values of `futures`, in the order given.
///
/// Inputs are joined in order, not in order of completion. The first failed
/// input in that order becomes the failure of the returned future and no
/// later input is waited on.
pub fn sequence<T, E, I>(futures: I) -> Future<Vec<T>, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
    I: IntoIterator<Item = Future<T, E>>,
{
    let futures: Vec<_> = futures.into_iter().collect();
    Builder::new().launch(move || futures.iter().map(Future::join).collect())
}
