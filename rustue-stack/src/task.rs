//! Deferred work primitives
//!
//! Everything the stack does happens as a task: an owned, run-at-most-once
//! closure. Producers hand tasks to the dispatcher; the single consumer
//! thread pops them and runs them with exclusive access to the protocol
//! core. The `&mut StackCore` parameter is what makes the single-writer
//! guarantee structural: only the thread currently executing a task can
//! touch layer state, and there is exactly one such thread.

use crate::executor::StackCore;

/// A unit of deferred work applied to the protocol core.
///
/// Ownership transfers to the dispatcher at submission and to the consumer
/// thread at execution; a task runs at most once.
pub type StackTask = Box<dyn FnOnce(&mut StackCore) + Send + 'static>;

/// A long/blocking operation hosted by the background worker pool.
///
/// Jobs never see the protocol core. A job that needs to mutate layer state
/// captures a queue handle and posts a continuation [`StackTask`] when done.
pub type BackgroundJob = Box<dyn FnOnce() + Send + 'static>;

/// Message envelope wrapping payloads with a shutdown control signal.
///
/// Used on the worker-pool feed so each worker can be told to exit through
/// the same channel it takes jobs from.
#[derive(Debug)]
pub enum TaskMessage<T> {
    /// Regular payload
    Message(T),
    /// Receiver should terminate gracefully
    Shutdown,
}

impl<T> TaskMessage<T> {
    /// Creates a new envelope containing the given payload.
    pub fn message(msg: T) -> Self {
        TaskMessage::Message(msg)
    }

    /// Creates a shutdown signal.
    pub fn shutdown() -> Self {
        TaskMessage::Shutdown
    }
}
