//! Multi-producer task queue dispatcher
//!
//! A fixed set of named FIFO queues multiplexed onto a single consumer.
//! Queues are created once during construction; afterwards the dispatcher
//! splits into a cloneable producer handle (any thread may push) and a
//! consumer half owned by exactly one thread.
//!
//! Each queue is a bounded channel. `push` applies backpressure to the
//! producer when the target queue is full; `try_push` never blocks and
//! reports the drop instead. The consumer pops with a round-robin scan
//! across queues so that no queue is starved indefinitely.

use std::sync::Arc;
use std::task::Poll;

use tokio::sync::mpsc;

/// Opaque handle identifying one queue of a [`TaskMultiqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(usize);

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "queue#{}", self.0)
    }
}

/// Builder owning both halves of every queue.
///
/// `add_queue` may only be called before [`TaskMultiqueue::into_parts`],
/// i.e. before any consumer exists.
pub struct TaskMultiqueue<T> {
    capacity: usize,
    senders: Vec<mpsc::Sender<T>>,
    receivers: Vec<mpsc::Receiver<T>>,
}

impl<T: Send + 'static> TaskMultiqueue<T> {
    /// Creates an empty dispatcher; every queue added later holds up to
    /// `per_queue_capacity` pending items.
    pub fn new(per_queue_capacity: usize) -> Self {
        Self {
            capacity: per_queue_capacity,
            senders: Vec::new(),
            receivers: Vec::new(),
        }
    }

    /// Creates a new queue and returns its handle.
    pub fn add_queue(&mut self) -> QueueId {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.senders.push(tx);
        self.receivers.push(rx);
        QueueId(self.senders.len() - 1)
    }

    /// Number of queues created so far.
    pub fn num_queues(&self) -> usize {
        self.senders.len()
    }

    /// Splits into the shared producer handle and the single consumer half.
    pub fn into_parts(self) -> (QueueProducers<T>, QueueConsumer<T>) {
        (
            QueueProducers {
                senders: Arc::new(self.senders),
            },
            QueueConsumer {
                queues: self.receivers,
                cursor: 0,
            },
        )
    }
}

/// Cloneable producer handle; safe to use from any thread.
#[derive(Debug)]
pub struct QueueProducers<T> {
    senders: Arc<Vec<mpsc::Sender<T>>>,
}

impl<T> Clone for QueueProducers<T> {
    fn clone(&self) -> Self {
        Self {
            senders: Arc::clone(&self.senders),
        }
    }
}

impl<T: Send + 'static> QueueProducers<T> {
    /// Pushes an item, blocking the calling thread while the queue is full.
    ///
    /// Use for must-deliver events where losing the item would desynchronize
    /// state. Must not be called from the consumer thread. If the consumer
    /// half is gone (shutdown) the item is silently discarded.
    pub fn push(&self, queue: QueueId, item: T) {
        let _ = self.senders[queue.0].blocking_send(item);
    }

    /// Pushes an item without blocking.
    ///
    /// Returns `false` if the queue was full (item dropped) or the consumer
    /// half is gone. Use for high-rate, loss-tolerant traffic.
    pub fn try_push(&self, queue: QueueId, item: T) -> bool {
        self.senders[queue.0].try_send(item).is_ok()
    }

    /// Pending depth of a queue. Non-blocking; used for backpressure checks.
    pub fn size(&self, queue: QueueId) -> usize {
        let tx = &self.senders[queue.0];
        tx.max_capacity() - tx.capacity()
    }
}

/// Consumer half; owned by the single consumer thread.
pub struct QueueConsumer<T> {
    queues: Vec<mpsc::Receiver<T>>,
    cursor: usize,
}

impl<T: Send + 'static> QueueConsumer<T> {
    /// Waits until some queue has an item and returns one.
    ///
    /// Queues are scanned round-robin starting after the last-served queue,
    /// so every non-empty queue is visited within one full rotation and no
    /// queue starves. Returns `None` once all producer handles are dropped
    /// and every queue has drained.
    pub async fn wait_pop(&mut self) -> Option<T> {
        std::future::poll_fn(|cx| {
            let n = self.queues.len();
            if n == 0 {
                return Poll::Ready(None);
            }
            let mut open = false;
            for offset in 0..n {
                let idx = (self.cursor + offset) % n;
                match self.queues[idx].poll_recv(cx) {
                    Poll::Ready(Some(item)) => {
                        self.cursor = (idx + 1) % n;
                        return Poll::Ready(Some(item));
                    }
                    Poll::Ready(None) => {}
                    Poll::Pending => open = true,
                }
            }
            if open {
                Poll::Pending
            } else {
                Poll::Ready(None)
            }
        })
        .await
    }
}
