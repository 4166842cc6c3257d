//! Ingress entry point.
//!
//! The [`Router`] turns each inbound message into a [`Job`] and hands it
//! to the dispatcher chosen at startup. It always acknowledges: the
//! platform redelivers unacknowledged callbacks, so the ack must not
//! depend on how the job fares.

use async_trait::async_trait;
use sdbot_core::engine::GenerationEngine;
use sdbot_core::ingress::{Ack, ChatbotHandler};
use sdbot_core::{IncomingMessage, Job};

use crate::queue::{JobSender, QueueError};
use crate::worker::Worker;

/// Where routed jobs go.
pub enum Dispatcher<E> {
    /// Enqueue for the dedicated worker task. May wait under backpressure.
    Queued(JobSender),
    /// Run the job on the calling task before acknowledging.
    Inline(Box<Worker<E>>),
}

pub struct Router<E> {
    dispatcher: Dispatcher<E>,
    image_count: u32,
}

impl<E: GenerationEngine> Router<E> {
    pub fn new(dispatcher: Dispatcher<E>, image_count: u32) -> Self {
        Self {
            dispatcher,
            image_count,
        }
    }

    /// Build a job from `message`, dispatch it and acknowledge.
    pub async fn route(&mut self, message: IncomingMessage) -> Ack {
        tracing::info!(
            message_id = %message.message_id,
            conversation_id = %message.conversation_id,
            sender = %message.sender_nick,
            "Received incoming message",
        );

        let job = Job::new(message, self.image_count);
        let job_id = job.id;

        match &mut self.dispatcher {
            Dispatcher::Queued(queue) => match queue.enqueue(job).await {
                Ok(()) => {
                    tracing::debug!(%job_id, free_slots = queue.free_slots(), "Job enqueued");
                }
                Err(QueueError::Closed(_)) => {
                    tracing::error!(%job_id, "Task queue closed, job discarded");
                }
            },
            Dispatcher::Inline(worker) => {
                worker.execute(job).await;
            }
        }

        Ack::ok()
    }
}

#[async_trait]
impl<E: GenerationEngine> ChatbotHandler for Router<E> {
    async fn process(&mut self, message: IncomingMessage) -> Ack {
        self.route(message).await
    }
}
