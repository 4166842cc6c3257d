//! `sdbot` -- DingTalk Stable Diffusion bot.
//!
//! Receives bot messages over DingTalk Stream mode, renders each prompt
//! on a ComfyUI server, and streams progress back as an interactive card
//! (or a markdown message). Configuration comes from the environment;
//! see [`sdbot::config::BotConfig::from_env`].

use std::sync::Arc;

use anyhow::Context;
use sdbot::config::BotConfig;
use sdbot::telemetry;
use sdbot_comfyui::api::ComfyUIApi;
use sdbot_comfyui::client::ComfyUIClient;
use sdbot_comfyui::ComfyUIEngine;
use sdbot_core::modes::DispatchMode;
use sdbot_core::platform::ChatPlatform;
use sdbot_dingtalk::{DingTalkApi, StreamClient};
use sdbot_pipeline::{task_queue, Dispatcher, ReplyComposer, Router, Worker};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = BotConfig::from_env().context("Invalid configuration")?;
    telemetry::init(config.log_format);

    tracing::info!(
        reply_mode = %config.reply_mode,
        dispatch_mode = %config.dispatch_mode,
        image_count = config.image_count,
        steps = config.generation_steps,
        comfyui_url = %config.comfyui_url,
        "Starting sdbot",
    );

    // --- Outbound: DingTalk replies ---
    let platform: Arc<dyn ChatPlatform> = Arc::new(
        DingTalkApi::new(
            config.credentials.clone(),
            config.endpoints.clone(),
            config.http_timeout,
        )
        .context("Failed to build DingTalk client")?,
    );
    let composer = ReplyComposer::new(config.reply_mode, platform);

    // --- Generation engine ---
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build ComfyUI HTTP client")?;
    let engine = ComfyUIEngine::new(
        ComfyUIApi::with_client(http, config.comfyui_url.clone()),
        ComfyUIClient::from_http_url(&config.comfyui_url),
        config.workflow.clone(),
    );
    let worker = Worker::new(engine, composer, config.worker_settings());

    // --- Inbound: Stream session ---
    let stream = StreamClient::new(
        config.credentials.clone(),
        config.endpoints.clone(),
        config.http_timeout,
    )
    .context("Failed to build Stream client")?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    match config.dispatch_mode {
        DispatchMode::Async => {
            let (queue, jobs) = task_queue(config.queue_capacity);
            let worker_handle = tokio::spawn(worker.run(jobs));

            let mut router = Router::new(Dispatcher::<ComfyUIEngine>::Queued(queue), config.image_count);
            stream.run(&mut router, &cancel).await;

            // Dropping the last sender lets the worker drain and exit.
            drop(router);
            tracing::info!("Ingress stopped, draining task queue");
            match tokio::time::timeout(config.shutdown_timeout, worker_handle).await {
                Ok(Ok(())) => tracing::info!("Worker drained"),
                Ok(Err(e)) => tracing::error!(error = %e, "Worker task failed"),
                Err(_) => tracing::warn!(
                    timeout_secs = config.shutdown_timeout.as_secs(),
                    "Worker did not drain in time, abandoning queued jobs",
                ),
            }
        }
        DispatchMode::Sync => {
            let mut router = Router::new(Dispatcher::Inline(Box::new(worker)), config.image_count);
            stream.run(&mut router, &cancel).await;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
