use std::io;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::Relaxed;
use std::thread::{self, JoinHandle};

static NEXT_WORKER_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Default)]
pub(crate) struct WorkerConfig {
    pub(crate) name: Option<String>,
    pub(crate) stack_size: Option<usize>,
}

/// A dedicated OS thread running a single task.
pub(crate) struct Worker {
    handle: JoinHandle<()>,
}

impl Worker {
    pub(crate) fn spawn<F>(config: &WorkerConfig, op: F) -> io::Result<Worker>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = match &config.name {
            Some(name) => name.clone(),
            None => format!("strand-worker-{}", NEXT_WORKER_ID.fetch_add(1, Relaxed)),
        };

        if name.contains('\0') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "worker name contains a NUL byte",
            ));
        }

        let mut builder = thread::Builder::new().name(name);
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let handle = builder.spawn(op)?;
        Ok(Worker { handle })
    }

    pub(crate) fn name(&self) -> &str {
        self.handle.thread().name().unwrap_or("<unnamed>")
    }

    /// Blocks until the thread exits. Returns `false` if it unwound.
    pub(crate) fn await_termination(self) -> bool {
        self.handle.join().is_ok()
    }
}
