use parking_lot::{Condvar, Mutex};

/// A one-shot signal that can be waited on any number of times.
#[derive(Debug, Default)]
pub struct Latch {
    open: Mutex<bool>,
    done: Condvar,
}

impl Latch {
    pub fn new() -> Self {
        Default::default()
    }

    /// Opens the latch and wakes every waiter. Returns `true` only for the
    /// call that actually opened it.
    pub fn open(&self) -> bool {
        let mut locked = self.open.lock();
        if *locked {
            return false;
        }
        *locked = true;
        self.done.notify_all();
        true
    }

    /// Whether the latch has been opened. Never blocks.
    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// Blocks until the latch is open. Returns at once every time after.
    pub fn wait(&self) {
        let mut locked = self.open.lock();
        while !*locked {
            self.done.wait(&mut locked);
        }
    }
}
