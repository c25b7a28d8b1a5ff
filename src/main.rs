use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use session_gateway::{
    adapters::{
        ChannelBroadcaster, FileSessionStore, GatewayEvent, HttpWebhookDispatcher, ScriptMode,
        SimulatedTransport,
    },
    application::session::SessionManager,
    config::{AppConfig, LogFormat},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    let json = config.logging.format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    config.validate()?;

    let store = Arc::new(FileSessionStore::new(&config.sessions.data_dir));
    tracing::warn!("No production transport linked, sessions use the simulated transport");
    let transport = Arc::new(SimulatedTransport::with_mode(ScriptMode::AutoLink));
    let webhooks = Arc::new(HttpWebhookDispatcher::new(config.webhook.http_config())?);
    let broadcaster = Arc::new(ChannelBroadcaster::with_default_capacity());

    let manager = SessionManager::new(
        config.session_manager_options(),
        transport,
        store,
        webhooks,
        broadcaster.clone(),
        broadcaster.clone(),
    );

    let mut events = broadcaster.subscribe();
    let log_events = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(GatewayEvent::StateChanged(update)) => tracing::info!(
                    session = %update.session_name,
                    status = %update.status,
                    detail = %update.detail,
                    "Session state changed"
                ),
                Ok(GatewayEvent::PairingCode(update)) => tracing::info!(
                    session = %update.session_name,
                    code = %update.pairing_code,
                    "Pairing code issued"
                ),
                Ok(GatewayEvent::SessionDeleted(deleted)) => {
                    tracing::info!(session = %deleted.session_name, "Session deleted")
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event log fell behind")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let restored = manager.initialize_existing_sessions().await?;
    tracing::info!(
        restored,
        data_dir = %config.sessions.data_dir.display(),
        max_sessions = config.sessions.max_sessions,
        "Session gateway started"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    manager.shutdown().await;
    log_events.abort();

    Ok(())
}
