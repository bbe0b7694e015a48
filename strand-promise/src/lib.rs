//! Synchronization cells shared between task workers and their readers.

mod latch;
mod promise;

pub use latch::Latch;
pub use promise::{Promise, Reader};
