//! Stream a raw audio file into a live analytics session
//!
//! Reads 16-bit PCM from disk, sends it in real-time sized chunks and prints
//! the analytics events the server reports.
//!
//! Usage:
//!   cargo run --bin live_stream -- <audio.raw>
//!
//! Configuration:
//!   LIVE_CONFIG_PATH - settings file (default: config/live_config.yaml)
//!   LIVE_ANALYTICS_URL - overrides the endpoint URL

use anyhow::{Context, Result};
use conversation_analytics::bin_common::{load_config_from_env, parse_args, ConfigType};
use conversation_analytics::live_analytics::{EventKind, LiveClientBuilder, SessionEvent};
use conversation_analytics::logging::init_tracing;
use conversation_analytics::settings::LiveConfig;
use std::time::Duration;
use tracing::{info, warn};

/// Audio sent per chunk
const CHUNK_DURATION: Duration = Duration::from_millis(100);

fn print_event(event: &SessionEvent) {
    match event.data() {
        Some(data) => println!("[{}] {}", event.kind(), data),
        None => println!("[{}]", event.kind()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config_path = load_config_from_env(ConfigType::Live);
    let config = LiveConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    init_tracing(&config.log_level);
    config.log();

    let audio_path = parse_args()
        .into_iter()
        .next()
        .context("usage: live_stream <audio.raw>")?;
    let audio = std::fs::read(&audio_path).with_context(|| format!("reading {}", audio_path))?;

    let sample_rate = config.session.sample_rate.unwrap_or(16_000) as usize;
    let channels = config.session.channels.unwrap_or(1) as usize;
    let chunk_size = (sample_rate * channels * 2 / 10).max(1);

    let mut builder = LiveClientBuilder::from_config(config.client_config())
        .config(config.session.clone())
        .event_channel();
    for kind in EventKind::ALL {
        if !kind.is_lifecycle() {
            builder = builder.on(kind, print_event);
        }
    }
    let client = builder.connect().await?;
    info!("Connecting to {}", client.url());

    match client.next_event(Duration::from_secs(10)).await {
        Some(SessionEvent::Open) => info!("Session open"),
        Some(other) => anyhow::bail!("session did not open: {:?}", other),
        None => anyhow::bail!("timed out waiting for the session to open"),
    }

    let mut ticker = tokio::time::interval(CHUNK_DURATION);
    let mut chunks = audio.chunks(chunk_size);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match chunks.next() {
                    Some(chunk) => client.send(chunk)?,
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, finishing early");
                break;
            }
        }

        while let Some(event) = client.try_recv_event() {
            if let Some(error) = event.as_error() {
                warn!("Session error ({:?}): {}", error.kind, error.message);
            }
            if event.is_terminal() {
                anyhow::bail!("session ended while streaming: {:?}", event);
            }
        }
    }

    info!("Audio sent, finalizing");
    client.finalize()?;

    let session = client.session().clone();
    client.close(config.close_timeout()).await?;
    let metrics = session.metrics();

    info!(
        "Done: {} frames sent, {} received, {} discarded",
        metrics.frames_sent, metrics.frames_received, metrics.sends_discarded
    );
    Ok(())
}
