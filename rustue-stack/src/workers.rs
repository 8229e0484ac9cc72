//! Background worker pool
//!
//! A small fixed set of OS threads hosting long or blocking operations
//! (cell search, hardware reconfiguration) so the consumer thread never
//! waits on them. Jobs arrive over one shared unbounded feed: rejecting a
//! background request has no safe degraded behavior, so submission never
//! fails and never blocks.
//!
//! Jobs must not touch protocol-layer state. A job that needs to apply a
//! result captures a queue handle and pushes a continuation task; the
//! continuation runs on the consumer thread like any other task. Domain
//! failures travel inside the continuation's captured result; a panicking
//! job is caught at the worker boundary and logged without killing the
//! worker.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::task::{BackgroundJob, TaskMessage};

type JobFeed = Arc<Mutex<mpsc::UnboundedReceiver<TaskMessage<BackgroundJob>>>>;

/// Cloneable submission handle for the pool.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::UnboundedSender<TaskMessage<BackgroundJob>>,
}

impl WorkerHandle {
    /// Enqueues a job; a worker eventually executes it. Never blocks, never
    /// drops. Silently ignored once the pool has stopped.
    pub fn submit(&self, job: BackgroundJob) {
        let _ = self.tx.send(TaskMessage::message(job));
    }
}

/// Fixed-size pool of background worker threads.
pub struct WorkerPool {
    tx: mpsc::UnboundedSender<TaskMessage<BackgroundJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `count` worker threads named `bg-0`, `bg-1`, ...
    pub fn start(count: usize) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let feed: JobFeed = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(count);
        for worker_id in 0..count {
            let feed = Arc::clone(&feed);
            let handle = std::thread::Builder::new()
                .name(format!("bg-{worker_id}"))
                .spawn(move || Self::worker_loop(worker_id, feed))?;
            workers.push(handle);
        }

        Ok(Self { tx, workers })
    }

    fn worker_loop(worker_id: usize, feed: JobFeed) {
        loop {
            // Hold the feed lock only while waiting; execution happens after
            // release so the other workers can keep pulling jobs.
            let msg = {
                let mut rx = feed.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                rx.blocking_recv()
            };
            match msg {
                Some(TaskMessage::Message(job)) => {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!(worker_id, "background job panicked");
                    }
                }
                Some(TaskMessage::Shutdown) | None => {
                    debug!(worker_id, "background worker exiting");
                    break;
                }
            }
        }
    }

    /// Returns a cloneable submission handle.
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            tx: self.tx.clone(),
        }
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stops the pool: queued jobs already submitted still run, then each
    /// worker takes one shutdown envelope and exits. Blocks until all
    /// workers have joined. Safe to call more than once.
    pub fn stop(&mut self) {
        for _ in &self.workers {
            let _ = self.tx.send(TaskMessage::shutdown());
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}
