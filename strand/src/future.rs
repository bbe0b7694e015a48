use crate::combinators::{self, OnFailure};
use crate::error::TaskError;
use crate::spawn::{Worker, WorkerConfig};
use log::{debug, error, trace, warn};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use strand_promise::{Latch, Promise, Reader};

type Outcome<T, E> = Result<T, TaskError<E>>;

/// A handle to a task running on its own worker thread.
///
/// The worker is started when the future is constructed. It either delivers
/// a value or records a [`TaskError`], exactly once. Handles are cheap to
/// clone and every clone observes the same outcome.
pub struct Future<T, E = Infallible> {
    inner: Arc<Inner<T, E>>,
}

struct Inner<T, E> {
    value: Promise<T>,
    failure: Promise<TaskError<E>>,
    finished: Latch,
    // Taken by the first joiner, which reaps the thread.
    worker: Mutex<Option<Worker>>,
}

impl<T, E> Inner<T, E> {
    fn new() -> Self {
        Inner {
            value: Promise::new(),
            failure: Promise::new(),
            finished: Latch::new(),
            worker: Mutex::new(None),
        }
    }

    fn complete(&self, outcome: Outcome<T, E>) {
        let accepted = match outcome {
            Ok(val) => self.value.deliver(val),
            Err(err) => self.failure.deliver(err),
        };
        if !accepted {
            trace!("Outcome already recorded; ignoring.");
        }
        self.finished.open();
    }

    fn realized(&self) -> bool {
        self.failure.delivered() || self.value.delivered()
    }
}

/// Per-worker configuration for new futures.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: WorkerConfig,
}

impl Builder {
    pub fn new() -> Builder {
        Default::default()
    }

    /// Names the worker thread. Unnamed workers are called
    /// `strand-worker-{n}`. A name containing a NUL byte cannot be given to
    /// the OS, and futures built with it fail with [`TaskError::Spawn`].
    pub fn name<S: Into<String>>(mut self, name: S) -> Builder {
        self.config.name = Some(name.into());
        self
    }

    pub fn stack_size(mut self, size: usize) -> Builder {
        self.config.stack_size = Some(size);
        self
    }

    pub fn spawn<T, E, F>(&self, f: F) -> Future<T, E>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        self.launch(move || f().map_err(|err| TaskError::Failed(Arc::new(err))))
    }

    pub fn call<T, F>(&self, f: F) -> Future<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.launch(move || Ok(f()))
    }

    pub fn apply<T, E, A, F>(&self, f: F, args: A) -> Future<T, E>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
        A: Send + 'static,
        F: FnOnce(A) -> Result<T, E> + Send + 'static,
    {
        self.spawn(move || f(args))
    }

    /// Starts a worker for a task that already speaks in `TaskError`s, so a
    /// failure it forwards from another future is recorded unchanged.
    pub(crate) fn launch<T, E, F>(&self, f: F) -> Future<T, E>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
        F: FnOnce() -> Outcome<T, E> + Send + 'static,
    {
        let inner = Arc::new(Inner::new());
        let worker = {
            let inner = Arc::clone(&inner);
            Worker::spawn(&self.config, move || {
                let outcome = match panic::catch_unwind(AssertUnwindSafe(f)) {
                    Ok(outcome) => outcome,
                    Err(payload) => Err(TaskError::from_panic(payload)),
                };

                let name = thread::current().name().unwrap_or("<unnamed>").to_owned();
                match &outcome {
                    Ok(_) => debug!("Worker {} finished.", name),
                    Err(TaskError::Panicked(msg)) => warn!("Worker {} panicked: {}", name, msg),
                    Err(_) => debug!("Worker {} failed.", name),
                }
                inner.complete(outcome);
            })
        };

        match worker {
            Ok(worker) => {
                debug!("Spawned worker {}.", worker.name());
                *inner.worker.lock() = Some(worker);
            }
            Err(err) => {
                error!("Unable to spawn worker: {}", err);
                inner.complete(Err(TaskError::Spawn(Arc::new(err))));
            }
        }

        Future { inner }
    }
}

impl<T, E> Future<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Runs `f` on a new worker thread.
    pub fn spawn<F>(f: F) -> Future<T, E>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        Builder::new().spawn(f)
    }

    /// Runs `f(args)` on a new worker thread. `args` is captured now.
    pub fn apply<A, F>(f: F, args: A) -> Future<T, E>
    where
        A: Send + 'static,
        F: FnOnce(A) -> Result<T, E> + Send + 'static,
    {
        Builder::new().apply(f, args)
    }
}

impl<T: Send + Sync + 'static> Future<T> {
    pub fn call<F>(f: F) -> Future<T>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Builder::new().call(f)
    }
}

impl<T, E> Future<T, E> {
    /// An already realized future. No worker is started.
    pub fn completed(val: T) -> Future<T, E> {
        let inner = Inner::new();
        inner.complete(Ok(val));
        Future {
            inner: Arc::new(inner),
        }
    }

    /// Whether the task has produced a value or a failure. Never blocks.
    pub fn realized(&self) -> bool {
        self.inner.realized()
    }

    /// Read access to the cell the task's value is delivered into. Only the
    /// worker can deliver it.
    ///
    /// ```compile_fail
    /// let future = strand::Future::call(|| 1);
    /// future.promise().deliver(2);
    /// ```
    pub fn promise(&self) -> Reader<'_, T> {
        self.inner.value.reader()
    }

    pub fn failure(&self) -> Option<TaskError<E>> {
        self.inner.failure.try_get()
    }

    // The first caller consumes the worker handle and reaps the thread.
    // Everyone, including that caller, then waits on the latch.
    fn wait(&self) {
        let worker = self.inner.worker.lock().take();
        if let Some(worker) = worker {
            let name = worker.name().to_owned();
            if !worker.await_termination() {
                warn!("Worker {} terminated abnormally.", name);
            }
            if !self.inner.realized() {
                self.inner.complete(Err(TaskError::Panicked(Arc::from(
                    "worker terminated without an outcome",
                ))));
            }
        }
        self.inner.finished.wait();
    }
}

impl<T: Clone, E> Future<T, E> {
    /// Waits for the worker to terminate and returns its value, or the
    /// failure it recorded.
    ///
    /// May be called any number of times from any number of threads; every
    /// call returns the same outcome.
    pub fn join(&self) -> Result<T, TaskError<E>> {
        self.wait();
        match self.inner.failure.try_get() {
            Some(err) => Err(err),
            None => Ok(self.inner.value.get()),
        }
    }

    /// Like [`Future::join`] but swallows a failure, returning
    /// `(fallback, false)` instead.
    pub fn join_or(&self, fallback: T) -> (T, bool) {
        match self.join() {
            Ok(val) => (val, true),
            Err(_) => (fallback, false),
        }
    }

    pub fn join_with(&self, on_failure: OnFailure<T>) -> Result<(T, bool), TaskError<E>> {
        match on_failure {
            OnFailure::Propagate => self.join().map(|val| (val, true)),
            OnFailure::Fallback(fallback) => Ok(self.join_or(fallback)),
        }
    }
}

impl<T, E> Future<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// A future of `f` applied to this future's value. A failure here
    /// becomes the new future's failure.
    pub fn map<U, F>(&self, f: F) -> Future<U, E>
    where
        U: Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        combinators::map(f, self, OnFailure::Propagate)
    }

    /// A future of `f` applied to this future's value, or to `fallback` if
    /// this future fails.
    pub fn map_or<U, F>(&self, fallback: T, f: F) -> Future<U, E>
    where
        U: Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        combinators::map(f, self, OnFailure::Fallback(fallback))
    }

    /// See [`combinators::sequence`].
    pub fn sequence<I>(futures: I) -> Future<Vec<T>, E>
    where
        I: IntoIterator<Item = Future<T, E>>,
    {
        combinators::sequence(futures)
    }
}

impl<T, E> Clone for Future<T, E> {
    fn clone(&self) -> Self {
        Future {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Builder, Future};
    use crate::combinators::OnFailure;
    use crate::error::TaskError;
    use parking_lot::Mutex;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn square(x: i64) -> i64 {
        x * x
    }

    #[test]
    fn spawn_then_join() {
        let future = Future::call(|| square(5));
        assert_eq!(Ok(25), future.join());
    }

    #[test]
    fn apply_captures_arguments() {
        let future = Future::apply(|(a, b): (i64, i64)| Ok::<_, String>(a - b), (10, 3));
        assert_eq!(Ok(7), future.join());
    }

    #[test]
    fn failure_is_captured() {
        let future = Future::<i64, _>::spawn(|| Err("boom".to_string()));
        let err = future.join().unwrap_err();
        assert_eq!(Some(&"boom".to_string()), err.failed());
        assert!(!future.promise().delivered());
        assert!(future.failure().is_some());
    }

    #[test]
    fn join_or_returns_fallback_on_failure() {
        let future = Future::<i64, _>::spawn(|| Err("boom"));
        assert_eq!((-1, false), future.join_or(-1));

        let future = Future::<i64, &str>::spawn(|| Ok(3));
        assert_eq!((3, true), future.join_or(-1));
    }

    #[test]
    fn join_with_policies() {
        let future = Future::<i64, _>::spawn(|| Err("boom"));
        assert!(future.join_with(OnFailure::Propagate).is_err());
        assert_eq!(Ok((0, false)), future.join_with(OnFailure::Fallback(0)));
    }

    #[test]
    fn panic_is_captured() {
        let future = Future::<i64>::call(|| panic!("Hello, panic!"));
        match future.join() {
            Err(TaskError::Panicked(msg)) => assert_eq!("Hello, panic!", &*msg),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(future.realized());
    }

    #[test]
    fn join_is_repeatable() {
        let future = Future::call(|| "Hello, world!".to_string());
        for _ in 0..3 {
            assert_eq!(Ok("Hello, world!".to_string()), future.join());
        }

        let future = Future::<(), _>::spawn(|| Err(7));
        for _ in 0..3 {
            assert_eq!(Err(TaskError::Failed(Arc::new(7))), future.join());
        }
    }

    #[test]
    fn concurrent_joiners_agree() {
        let (tx, rx) = mpsc::channel::<()>();
        let future = Future::call(move || {
            let _ = rx.recv();
            42
        });

        let results = Mutex::new(Vec::new());
        crossbeam::scope(|s| {
            for _ in 0..8 {
                let future = future.clone();
                let results = &results;
                s.spawn(move |_| results.lock().push(future.join()));
            }
            std::thread::sleep(Duration::from_millis(50));
            tx.send(()).unwrap();
        })
        .unwrap();

        assert_eq!(vec![Ok(42); 8], results.into_inner());
    }

    #[test]
    fn realized_transitions_once() {
        let (tx, rx) = mpsc::channel::<()>();
        let future = Future::call(move || {
            let _ = rx.recv();
        });
        assert!(!future.realized());

        tx.send(()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !future.realized() {
            assert!(Instant::now() < deadline, "future never realized");
            std::thread::sleep(Duration::from_millis(1));
        }
        future.join().unwrap();
        assert!(future.realized());
    }

    #[test]
    fn completed_has_no_worker() {
        let future: Future<&str> = Future::completed("Hello, world!");
        assert!(future.realized());
        assert_eq!(Ok("Hello, world!"), future.join());
    }

    #[test]
    fn builder_names_worker() {
        let future = Builder::new()
            .name("named-worker")
            .stack_size(512 * 1024)
            .call(|| std::thread::current().name().map(str::to_owned));
        assert_eq!(Ok(Some("named-worker".to_string())), future.join());
    }

    #[test]
    fn promise_accessor_shares_value() {
        let future = Future::call(|| 11);
        let promise = future.promise();
        assert_eq!(11, promise.get());
        assert!(promise.delivered());
        assert!(future.failure().is_none());
    }

    #[test]
    fn promise_view_cannot_realize_running_future() {
        let (tx, rx) = mpsc::channel::<()>();
        let future = Future::call(move || {
            let _ = rx.recv();
            1
        });

        let promise = future.promise();
        assert!(!promise.delivered());
        assert_eq!(None, promise.try_get());
        assert!(!future.realized());

        tx.send(()).unwrap();
        assert_eq!(Ok(1), future.join());
        assert_eq!(Some(1), future.promise().try_get());
    }

    #[test]
    fn failed_future_never_delivers_promise() {
        let future = Future::<i64, _>::spawn(|| Err("boom"));
        assert!(future.join().is_err());
        assert!(!future.promise().delivered());
        assert_eq!(None, future.promise().try_get());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn spawn_failure_is_captured() {
        let future = Builder::new().stack_size(1 << 46).call(|| 1);
        assert!(future.realized());
        assert!(matches!(future.join(), Err(TaskError::Spawn(_))));
        assert!(matches!(future.failure(), Some(TaskError::Spawn(_))));
        assert!(!future.promise().delivered());
    }

    #[test]
    fn nul_in_name_is_captured() {
        let future = Builder::new().name("bad\0name").call(|| 1);
        match future.join() {
            Err(TaskError::Spawn(err)) => {
                assert_eq!(std::io::ErrorKind::InvalidInput, err.kind())
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
