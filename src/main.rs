use anyhow::Result;
use postrun::config::PostRunConfig;
use postrun::dispatch::{self, EventReceiver};
use postrun::events::PostRunEvent;
use postrun::http_server::{self, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::var("POSTRUN_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("postrun.toml"));
    let config = PostRunConfig::load(&config_path)?;

    if !config.webhook_enabled() {
        warn!("no webhook secret configured (POSTRUN_WEBHOOK_SECRET), endpoint disabled; exiting");
        return Ok(());
    }

    let (event_tx, event_rx) = dispatch::event_channel();
    tokio::spawn(log_events(event_rx));

    let state = Arc::new(AppState { config, event_tx });
    http_server::serve(state).await
}

/// Default consumer: log every event. Host applications replace this with
/// their own receiver.
async fn log_events(mut rx: EventReceiver) {
    while let Some(event) = rx.recv().await {
        match &event {
            PostRunEvent::Received(received) => {
                info!(
                    kind = event.kind(),
                    event_type = %received.event_type,
                    "webhook received"
                );
            }
            PostRunEvent::Bounced(bounced) => {
                info!(
                    kind = event.kind(),
                    message_id = %bounced.message.message_id,
                    email = %bounced.message.email,
                    bounce_type = %bounced.bounce_type,
                    permanent = bounced.is_permanent(),
                    "message bounced"
                );
            }
            PostRunEvent::Sent(e) => log_message(&event, &e.message),
            PostRunEvent::Delivered(e) => log_message(&event, &e.message),
            PostRunEvent::Complained(e) => log_message(&event, &e.message),
            PostRunEvent::Rejected(e) => log_message(&event, &e.message),
            PostRunEvent::Opened(e) => log_message(&event, &e.message),
            PostRunEvent::Clicked(e) => log_message(&event, &e.message),
        }
    }
}

fn log_message(event: &PostRunEvent, message: &postrun::events::MessageInfo) {
    info!(
        kind = event.kind(),
        message_id = %message.message_id,
        email = %message.email,
        "message event"
    );
}
