//! Bounded FIFO task queue.
//!
//! Decouples message ingress from the much slower generation step.
//! Producers suspend while the queue is full; the single consumer
//! suspends while it is empty. Nothing is dropped or deduplicated.

use sdbot_core::Job;
use tokio::sync::mpsc;

/// Default number of pending jobs held before producers block.
pub const DEFAULT_CAPACITY: usize = 32;

/// Create a queue holding at most `capacity` pending jobs.
///
/// # Panics
///
/// Panics if `capacity` is zero; configuration rejects that earlier.
pub fn task_queue(capacity: usize) -> (JobSender, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (JobSender { tx }, JobReceiver { rx })
}

/// Producer half. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JobSender {
    tx: mpsc::Sender<Job>,
}

/// Consumer half. Owned by exactly one worker.
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::Receiver<Job>,
}

impl JobSender {
    /// Append a job, waiting for a free slot if the queue is full.
    pub async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        self.tx
            .send(job)
            .await
            .map_err(|e| QueueError::Closed(Box::new(e.0)))
    }

    /// Number of jobs that can be enqueued without blocking.
    pub fn free_slots(&self) -> usize {
        self.tx.capacity()
    }
}

impl JobReceiver {
    /// Take the oldest pending job, waiting while the queue is empty.
    ///
    /// Returns `None` once every sender is dropped and the queue drained.
    pub async fn dequeue(&mut self) -> Option<Job> {
        self.rx.recv().await
    }

    /// Number of jobs currently waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Errors from queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The consumer is gone; the rejected job is handed back.
    #[error("Task queue is closed")]
    Closed(Box<Job>),
}
