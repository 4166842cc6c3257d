//! The single generation worker.
//!
//! [`Worker`] owns the engine by value, so no other task can reach it.
//! It runs one job at a time in queue order and never lets a job's
//! failure escape its loop: failed jobs are logged and dropped without a
//! reply.

use std::time::{Duration, Instant};

use sdbot_core::engine::{EngineError, GenerationEngine, GenerationRequest};
use sdbot_core::{CompletedResult, Job, JobId};

use crate::composer::{Delivery, ReplyComposer};
use crate::progress::ProgressReporter;
use crate::queue::JobReceiver;

/// Default number of sampling steps per generation.
pub const DEFAULT_STEPS: u32 = 50;

/// Default deadline for one generation run.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(600);

/// Tunables fixed at worker construction.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub steps: u32,
    /// `None` lets a run take as long as the engine needs.
    pub generation_timeout: Option<Duration>,
    pub progress_min_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS,
            generation_timeout: Some(DEFAULT_GENERATION_TIMEOUT),
            progress_min_interval: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running { job_id: JobId },
}

/// How a job ended.
#[derive(Debug)]
pub enum JobOutcome {
    Replied(Delivery),
    /// Generation succeeded but the final reply could not be delivered.
    ReplyFailed,
    /// Generation failed; nothing was sent.
    Dropped(EngineError),
}

pub struct Worker<E> {
    engine: E,
    composer: ReplyComposer,
    settings: WorkerSettings,
    state: WorkerState,
}

impl<E: GenerationEngine> Worker<E> {
    pub fn new(engine: E, composer: ReplyComposer, settings: WorkerSettings) -> Self {
        Self {
            engine,
            composer,
            settings,
            state: WorkerState::Idle,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Process jobs until every queue producer is gone.
    pub async fn run(mut self, mut queue: JobReceiver) {
        tracing::info!(
            steps = self.settings.steps,
            reply_mode = %self.composer.mode(),
            "Worker started",
        );

        while let Some(job) = queue.dequeue().await {
            self.execute(job).await;
        }

        tracing::info!("Task queue closed, worker exiting");
    }

    /// Run one job to completion or failure and return to idle.
    pub async fn execute(&mut self, job: Job) -> JobOutcome {
        let queued_ms = (chrono::Utc::now() - job.created_at).num_milliseconds();
        tracing::info!(
            job_id = %job.id,
            prompt = %job.prompt(),
            image_count = job.image_count,
            queued_ms,
            "Job started",
        );

        self.state = WorkerState::Running { job_id: job.id };
        let outcome = self.run_job(&job).await;
        self.state = WorkerState::Idle;

        match &outcome {
            JobOutcome::Replied(delivery) => {
                tracing::info!(job_id = %job.id, ?delivery, "Job replied");
            }
            JobOutcome::ReplyFailed => {
                tracing::error!(job_id = %job.id, "Job finished but reply failed");
            }
            JobOutcome::Dropped(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Generation failed, job dropped");
            }
        }

        outcome
    }

    async fn run_job(&mut self, job: &Job) -> JobOutcome {
        let request = GenerationRequest {
            prompt: job.prompt().to_string(),
            steps: self.settings.steps,
            image_count: job.image_count,
        };
        let started = Instant::now();
        let mut reporter =
            ProgressReporter::new(&self.composer, &job.message, job.image_count, started)
                .with_min_interval(self.settings.progress_min_interval);

        let run = self.engine.generate(&request, &mut reporter);
        let generated = match self.settings.generation_timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .unwrap_or(Err(EngineError::Timeout(limit.as_secs()))),
            None => run.await,
        };

        let images = match generated {
            Ok(images) if images.len() < job.image_count as usize => {
                return JobOutcome::Dropped(EngineError::InsufficientImages {
                    expected: job.image_count,
                    actual: images.len(),
                });
            }
            Ok(mut images) => {
                if images.len() > job.image_count as usize {
                    tracing::warn!(
                        job_id = %job.id,
                        expected = job.image_count,
                        actual = images.len(),
                        "Engine returned extra images, keeping the first ones",
                    );
                    images.truncate(job.image_count as usize);
                }
                images
            }
            Err(e) => {
                if matches!(e, EngineError::Timeout(_)) {
                    tracing::warn!(job_id = %job.id, "Generation deadline expired, resetting engine");
                    self.engine.reset().await;
                }
                return JobOutcome::Dropped(e);
            }
        };

        let result = CompletedResult {
            images,
            elapsed_secs: started.elapsed().as_secs_f64(),
            message: job.message.clone(),
        };

        match reporter.finish(&result).await {
            Ok(delivery) => JobOutcome::Replied(delivery),
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to deliver reply");
                JobOutcome::ReplyFailed
            }
        }
    }
}
