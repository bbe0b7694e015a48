//! Thread-backed futures.
//!
//! A [`Future`] starts a dedicated worker thread as soon as it is built and
//! records the task's value in a write-once [`Promise`] or, if the task
//! fails, a [`TaskError`]. Results are retrieved with [`Future::join`] and
//! composed with [`map`] and [`sequence`].

pub mod combinators;
pub mod error;
mod future;
mod spawn;

pub use combinators::{map, sequence, OnFailure};
pub use error::TaskError;
pub use future::{Builder, Future};
pub use strand_promise::{Latch, Promise, Reader};
