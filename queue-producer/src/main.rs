//! queue-publish - publish a single envelope from the command line.
//!
//! Broker settings come from the environment (see `ProducerConfig::from_env`).

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use queue_producer::{Message, Producer, ProducerConfig, RequestContext};

#[derive(Debug, Parser)]
#[command(author, version, about = "Publish one JSON envelope to a topic", long_about = None)]
struct Cli {
    /// Destination topic
    #[arg(long)]
    topic: String,

    /// Message type tag
    #[arg(long = "type")]
    message_type: String,

    /// Payload as a JSON document
    #[arg(long, default_value = "null")]
    payload: String,

    /// Deliver after this many seconds instead of immediately
    #[arg(long)]
    delay: Option<i64>,

    /// Request identifier to propagate; generated when absent
    #[arg(long, env = "REQUEST_ID")]
    request_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    let cli = Cli::parse();

    let payload: Value =
        serde_json::from_str(&cli.payload).context("Payload is not valid JSON")?;

    let config = ProducerConfig::from_env();
    tracing::info!(
        address = %config.address(),
        vhost = %config.broker.vhost,
        delayed_exchange = %config.broker.delayed_exchange,
        "config_loaded"
    );

    let producer = Producer::connect(config)
        .await
        .context("Failed to connect producer")?;

    let ctx = cli
        .request_id
        .map(RequestContext::with_request_id)
        .unwrap_or_default();
    let message = Message::now(cli.message_type, payload);

    let result = match cli.delay {
        Some(delay) => {
            producer
                .deferred_publish(&ctx, &cli.topic, delay, message)
                .await
        }
        None => producer.publish(&ctx, &cli.topic, message).await,
    };

    producer.stop().await;

    result.with_context(|| format!("Failed to publish to {}", cli.topic))?;
    Ok(())
}
