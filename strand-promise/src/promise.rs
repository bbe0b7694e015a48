use crossbeam_utils::Backoff;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::{Acquire, Release};
use std::sync::Arc;

/// A write-once value cell.
///
/// The first call to [`Promise::deliver`] stores its value and every later
/// call is rejected. Readers block in [`Promise::get`] until a value has been
/// delivered and then observe that exact value forever.
pub struct Promise<T> {
    value: Mutex<Option<Arc<T>>>,
    // Mirrors `value.is_some()`. Written with the lock held.
    delivered: AtomicBool,
    ready: Condvar,
}

impl<T> Promise<T> {
    /// An empty promise.
    pub fn new() -> Promise<T> {
        Promise {
            value: Mutex::new(None),
            delivered: AtomicBool::new(false),
            ready: Condvar::new(),
        }
    }

    pub fn completed(val: T) -> Promise<T> {
        Promise {
            value: Mutex::new(Some(Arc::new(val))),
            delivered: AtomicBool::new(true),
            ready: Condvar::new(),
        }
    }

    /// Stores `val` if nothing has been delivered yet.
    ///
    /// Returns `true` for the single accepted delivery and `false` for every
    /// other call, in which case `val` is dropped and the cell is unchanged.
    pub fn deliver(&self, val: T) -> bool {
        let mut value = self.value.lock();
        if value.is_some() {
            return false;
        }

        *value = Some(Arc::new(val));
        self.delivered.store(true, Release);
        self.ready.notify_all();
        true
    }

    /// Whether a value has been accepted. Never blocks.
    pub fn delivered(&self) -> bool {
        self.delivered.load(Acquire)
    }

    /// Blocks until a value is delivered and applies `f` to it.
    ///
    /// `f` runs after the internal lock is released, so it may use this
    /// promise freely. There is no timeout. A promise that is never delivered
    /// blocks the caller forever.
    pub fn with<R, F: FnOnce(&T) -> R>(&self, f: F) -> R {
        let val = self.wait();
        f(&*val)
    }

    /// A view of this promise that can read but not deliver.
    pub fn reader(&self) -> Reader<'_, T> {
        Reader { promise: self }
    }

    fn wait(&self) -> Arc<T> {
        self.spin();

        let mut value = self.value.lock();
        loop {
            if let Some(val) = value.as_ref() {
                return Arc::clone(val);
            }
            self.ready.wait(&mut value);
        }
    }

    // Short deliveries are common, so poll with cooperative yields for a
    // while before parking on the condvar.
    fn spin(&self) {
        let backoff = Backoff::new();
        while !self.delivered() && !backoff.is_completed() {
            backoff.snooze();
        }
    }
}

impl<T: Clone> Promise<T> {
    /// Blocks until a value is delivered and returns a copy of it.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// A copy of the value if one has been delivered. Never blocks.
    pub fn try_get(&self) -> Option<T> {
        if !self.delivered() {
            return None;
        }
        let val = self.value.lock().clone();
        val.map(|val| T::clone(&*val))
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Promise::new()
    }
}

/// Read-only access to a [`Promise`].
///
/// Handed out to callers that may observe the value but must not deliver it.
pub struct Reader<'a, T> {
    promise: &'a Promise<T>,
}

impl<'a, T> Reader<'a, T> {
    /// See [`Promise::delivered`].
    pub fn delivered(&self) -> bool {
        self.promise.delivered()
    }

    /// See [`Promise::with`].
    pub fn with<R, F: FnOnce(&T) -> R>(&self, f: F) -> R {
        self.promise.with(f)
    }
}

impl<'a, T: Clone> Reader<'a, T> {
    /// See [`Promise::get`].
    pub fn get(&self) -> T {
        self.promise.get()
    }

    /// See [`Promise::try_get`].
    pub fn try_get(&self) -> Option<T> {
        self.promise.try_get()
    }
}

impl<'a, T> Clone for Reader<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for Reader<'a, T> {}
