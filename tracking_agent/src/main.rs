use std::fs::OpenOptions;

use fleet_tracker_lib::comms::ConsumerMessage;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracking_agent::{agent::TrackingAgent, config::AgentConfig, transport::HttpPingTransport};

/// Runs the resident tracking agent and bridges its message protocol to
/// stdio: consumer messages come in as JSON lines on stdin, position
/// requests go out as JSON lines on stdout.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "agent.conf".to_string());
    let config = AgentConfig::load(&config_path)?;

    std::fs::create_dir_all(&config.log_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(format!("{}/agent.log", config.log_dir))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(log_file),
        )
        .init();

    tracing::info!("starting tracking agent against {}", config.api_base);

    let transport = HttpPingTransport::new(config.api_base.clone());
    let handle = TrackingAgent::spawn_with_interval(transport, config.poll_interval);

    let mut requests = handle.subscribe();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        loop {
            let request = match requests.recv().await {
                Ok(request) => request,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("stdout bridge lagged, {skipped} requests dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let Ok(mut line) = serde_json::to_vec(&request) else {
                continue;
            };
            line.push(b'\n');
            if stdout.write_all(&line).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ConsumerMessage>(&line) {
            Ok(message) => handle.send(message).await,
            Err(err) => tracing::warn!("ignoring malformed consumer message: {err}"),
        }
    }

    tracing::info!("stdin closed, shutting down");
    writer.abort();
    Ok(())
}
