use std::any::Any;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::io;
use std::sync::Arc;

/// Why a task did not produce a value.
///
/// Every reader of a failed task observes the same `TaskError`, so the
/// payloads are shared rather than owned.
pub enum TaskError<E> {
    /// The task returned an error.
    Failed(Arc<E>),
    /// The task panicked. Holds the panic message.
    Panicked(Arc<str>),
    /// The worker thread could not be started.
    Spawn(Arc<io::Error>),
}

impl<E> TaskError<E> {
    pub fn failed(&self) -> Option<&E> {
        match self {
            TaskError::Failed(err) => Some(&**err),
            _ => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked(_))
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message: Arc<str> = if let Some(msg) = payload.downcast_ref::<&str>() {
            Arc::from(*msg)
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            Arc::from(msg.as_str())
        } else {
            Arc::from("Box<dyn Any>")
        };
        TaskError::Panicked(message)
    }
}

impl<E> Clone for TaskError<E> {
    fn clone(&self) -> Self {
        match self {
            TaskError::Failed(err) => TaskError::Failed(Arc::clone(err)),
            TaskError::Panicked(msg) => TaskError::Panicked(Arc::clone(msg)),
            TaskError::Spawn(err) => TaskError::Spawn(Arc::clone(err)),
        }
    }
}

impl<E: Debug> Debug for TaskError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskError::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
            TaskError::Panicked(msg) => f.debug_tuple("Panicked").field(msg).finish(),
            TaskError::Spawn(err) => f.debug_tuple("Spawn").field(err).finish(),
        }
    }
}

impl<E: Display> Display for TaskError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskError::Failed(err) => write!(f, "task failed: {}", err),
            TaskError::Panicked(msg) => write!(f, "task panicked: {}", msg),
            TaskError::Spawn(err) => write!(f, "unable to spawn worker: {}", err),
        }
    }
}

impl<E: Error + 'static> Error for TaskError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TaskError::Failed(err) => Some(&**err),
            TaskError::Panicked(_) => None,
            TaskError::Spawn(err) => Some(&**err),
        }
    }
}

impl<E: PartialEq> PartialEq for TaskError<E> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TaskError::Failed(a), TaskError::Failed(b)) => a == b,
            (TaskError::Panicked(a), TaskError::Panicked(b)) => a == b,
            (TaskError::Spawn(a), TaskError::Spawn(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }
}
