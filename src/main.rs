//! ugene-realtime entry point.
//!
//! Connects to the configured backend, subscribes to `REALTIME_SUBSCRIBE`
//! topics and logs every client event until Ctrl-C.

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use ugene_realtime::config::ClientConfig;
use ugene_realtime::domain::ClientEvent;
use ugene_realtime::service::RealtimeClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let config = ClientConfig::from_env()?;
    tracing::info!(
        origin = %config.base_origin,
        principal = %config.principal,
        topics = config.initial_topics.len(),
        "starting ugene-realtime"
    );

    let client = RealtimeClient::new(config);
    let mut events = client.events();
    client.connect().await?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event log lagged behind client");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    client.dispose().await;
    Ok(())
}

fn log_event(event: &ClientEvent) {
    match serde_json::to_string(event) {
        Ok(json) => tracing::info!(event = event.event_type_str(), %json, "client event"),
        Err(err) => tracing::warn!(error = %err, "cannot serialize client event"),
    }
    if let ClientEvent::ReconnectExhausted { attempts, .. } = event {
        tracing::error!(attempts, "gave up reconnecting; restart to retry");
    }
}
