//! Collector demo - shows the wiring from a raw exchange-shaped payload to
//! `System::ingest`, per the external-interfaces section of the governance
//! spec. The real exchange WebSocket client is an external collaborator,
//! out of scope for this crate; this binary stands in with a small
//! synthetic feed so the single-consumer ingestion loop has something to
//! drive.

use anyhow::Result;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use observation_substrate::{Config, EventKind, System};

/// One message crossing the collector -> core boundary.
struct IngestMessage {
    timestamp: f64,
    symbol: String,
    event_type: EventKind,
    payload: Value,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "observation_substrate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Synthesize a short, deterministic feed for one symbol: a liquidation
/// that sparks a node, a trade that fuels it, and a depth update that
/// shows consumption.
fn synthetic_feed(symbol: &str) -> Vec<IngestMessage> {
    vec![
        IngestMessage {
            timestamp: 1000.0,
            symbol: symbol.to_string(),
            event_type: EventKind::Liquidation,
            payload: json!({
                "timestamp_ms": 1_000_000.0,
                "price": 50000.0,
                "quantity": 100.0,
                "side": "BUY",
            }),
        },
        IngestMessage {
            timestamp: 1001.0,
            symbol: symbol.to_string(),
            event_type: EventKind::Trade,
            payload: json!({
                "timestamp_ms": 1_001_000.0,
                "price": 50000.0,
                "quantity": 5.0,
                "aggressor_side": "SELL",
            }),
        },
        IngestMessage {
            timestamp: 1002.0,
            symbol: symbol.to_string(),
            event_type: EventKind::Depth,
            payload: json!({
                "timestamp_ms": 1_002_000.0,
                "bids": [[50000.0, 3.0]],
                "asks": [],
            }),
        },
    ]
}

/// Runs on its own task, standing in for the real exchange WebSocket
/// client; forwards normalized calls into the single-consumer channel.
async fn run_collector(symbols: Vec<String>, tx: mpsc::Sender<IngestMessage>) {
    for symbol in symbols {
        for message in synthetic_feed(&symbol) {
            if tx.send(message).await.is_err() {
                warn!("ingestion loop closed, stopping collector");
                return;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    let mut system = System::from_config(&config)?;
    info!(symbols = ?config.symbol_allowlist, "observation system constructed");

    let (tx, mut rx) = mpsc::channel::<IngestMessage>(256);
    let collector = tokio::spawn(run_collector(config.symbol_allowlist.clone(), tx));

    while let Some(message) = rx.recv().await {
        system.ingest(message.timestamp, &message.symbol, message.event_type, &message.payload);
        if system.is_halted() {
            warn!(reason = ?system.halt_reason(), "observation system halted, stopping");
            break;
        }
    }
    collector.await?;

    let snapshot = system.query();
    info!(status = ?snapshot.status, timestamp = snapshot.timestamp, "final snapshot");
    for symbol in &snapshot.symbols_active {
        if let Some(bundle) = snapshot.primitives.get(symbol) {
            info!(
                symbol,
                liquidation_density = ?bundle.liquidation_density,
                order_consumption = ?bundle.order_consumption,
                "bundle"
            );
        }
    }

    Ok(())
}
