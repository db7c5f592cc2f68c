use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod bluesky;
mod clean;
mod clock;
mod config;
mod error;
mod handlers;
mod metrics;
mod models;
mod ollama;
mod pipeline;
mod rate_limit;
mod scheduler;
mod state;
mod validator;

use bluesky::BlueskyClient;
use clock::{Clock, SystemClock};
use config::{Args, Settings};
use ollama::OllamaGenerator;
use pipeline::{DispatchMode, Pipeline, PipelineConfig, TracingObserver};
use rate_limit::RateLimiter;
use scheduler::CycleScheduler;
use state::AppState;
use validator::ContentValidator;

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_tracing(args.log_json);

    let settings = match Settings::try_from(args) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Configuration error");
            return Err(e.into());
        }
    };

    info!(
        source = %settings.source.handle,
        destination = %settings.destination_handle,
        model = %settings.model,
        char_limit = settings.char_limit,
        dry_run = settings.dry_run,
        "Starting Bluesky Ollama bot"
    );
    if settings.dry_run {
        warn!("DRY-RUN MODE: posts will be generated but not published");
    }

    let http = reqwest::Client::new();

    let source_client = BlueskyClient::login(
        http.clone(),
        &settings.host_url,
        &settings.source.handle,
        &settings.source.password,
    )
    .await
    .context("logging into source account")?;
    let source_did = source_client
        .resolve_handle(&settings.source.handle)
        .await
        .context("resolving source handle")?;

    let dispatch = match &settings.destination {
        Some(credentials) => {
            let destination = BlueskyClient::login(
                http.clone(),
                &settings.host_url,
                &credentials.handle,
                &credentials.password,
            )
            .await
            .context("logging into destination account")?;
            DispatchMode::Live(Arc::new(destination))
        }
        None => {
            info!("Skipping destination login (dry-run)");
            DispatchMode::DryRun
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let validator = ContentValidator::new(settings.char_limit, settings.min_length)?;
    let limiter = RateLimiter::new(clock.clone(), settings.hourly_limit, settings.daily_limit);
    let scheduler = CycleScheduler::new(clock.clone(), settings.interval, settings.jitter);

    let pipeline = Pipeline::new(
        PipelineConfig {
            source_account: source_did,
            page_limit: settings.page_limit,
            max_pages: settings.max_pages,
            sample_size: settings.sample_size,
            char_limit: settings.char_limit,
            model: settings.model.clone(),
            languages: settings.languages.clone(),
            rate_policy: settings.rate_policy,
        },
        Arc::new(source_client),
        Arc::new(OllamaGenerator::new(http, &settings.ollama_url)),
        dispatch,
        validator,
        limiter,
        scheduler,
        clock.clone(),
        Box::new(TracingObserver),
    );

    let cancel = CancellationToken::new();

    // Ctrl-C stops the loop at its next suspension point
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Exiting on user interrupt");
                ctrl_c_token.cancel();
            }
            Err(e) => error!(error = %e, "Unable to listen for Ctrl-C"),
        }
    });

    if let Some(port) = settings.status_port {
        let state = Arc::new(AppState {
            started_at: clock.now(),
            dry_run: settings.dry_run,
            model: settings.model.clone(),
        });
        let addr = format!("0.0.0.0:{}", port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding status server to {addr}"))?;
        info!("Status server running on http://localhost:{}", port);

        let shutdown = cancel.clone();
        tokio::spawn(async move {
            let server = axum::serve(listener, handlers::router(state))
                .with_graceful_shutdown(shutdown.cancelled_owned());
            if let Err(e) = server.await {
                error!(error = %e, "Status server stopped");
            }
        });
    }

    pipeline.run(cancel).await;
    info!("Goodbye");
    Ok(())
}
