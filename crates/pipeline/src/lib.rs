//! Job dispatch and progress-streaming pipeline.
//!
//! - [`queue`] — bounded FIFO between ingress and the worker.
//! - [`worker`] — the single owner of the generation engine.
//! - [`progress`] — turns engine step callbacks into card updates.
//! - [`composer`] — renders and sends card / markdown replies.
//! - [`router`] — ingress entry point, async or inline dispatch.

pub mod composer;
pub mod progress;
pub mod queue;
pub mod router;
pub mod worker;

pub use composer::{Delivery, ReplyComposer, ReplyError};
pub use progress::ProgressReporter;
pub use queue::{task_queue, JobReceiver, JobSender, QueueError};
pub use router::{Dispatcher, Router};
pub use worker::{JobOutcome, Worker, WorkerSettings, WorkerState};
