/// Incursion tracker entry point
mod clients;
mod commands;
mod config;
mod domain;
mod errors;
mod handlers;
mod routes;
mod services;
mod utils;

use crate::clients::{EsiApi, EsiClient, HttpClient};
use crate::commands::incursion_commands;
use crate::config::AppConfig;
use crate::handlers::AppState;
use crate::routes::build_router;
use crate::services::poller::Poller;
use crate::services::{
    IncursionManager, IncursionNotifier, LogNotifier, MessageFormatter, Supervisor,
    WebhookNotifier,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    // Load configuration
    let config = AppConfig::from_env()?;
    info!("Configuration loaded successfully");
    let started_at = Utc::now();
    let timings = config.timings.clone();

    // Initialize clients
    let http = Arc::new(HttpClient::new(
        &config.user_agent,
        timings.request_timeout_seconds,
    )?);
    let esi: Arc<dyn EsiApi> = Arc::new(EsiClient::new(config.esi_base_url.clone(), http.clone()));

    // Initialize services
    let formatter = MessageFormatter::new(config.home_region_ids.clone());
    let notifier: Arc<dyn IncursionNotifier> = match &config.notify_webhook_url {
        Some(url) => {
            info!("Sending notifications to webhook");
            Arc::new(WebhookNotifier::new(
                http.get_client().clone(),
                url.clone(),
                formatter,
            ))
        }
        None => Arc::new(LogNotifier::new(formatter)),
    };
    let manager = Arc::new(IncursionManager::new(esi.clone(), notifier));
    let poller = Arc::new(Poller::new(
        esi,
        manager.clone(),
        config.home_system_id,
        Duration::from_secs(timings.retry_delay_seconds),
        Duration::from_secs(timings.min_poll_seconds),
    ));

    // Initialize application state
    let state = AppState {
        commands: Arc::new(incursion_commands(
            manager.clone(),
            poller.esi_status(),
            started_at,
        )),
        manager,
        started_at,
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("incursion_tracker listening on {}", config.bind_addr);

    let supervisor = Supervisor::new("incursions", timings.max_restarts);
    tokio::select! {
        restarts = supervisor.supervise(|| poller.clone().run()) => {
            error!("Incursion poller stopped after {} restarts, shutting down", restarts);
            anyhow::bail!("incursion poller exhausted its restart budget");
        }
        served = axum::serve(listener, app.into_make_service()) => {
            served?;
        }
    }

    Ok(())
}
