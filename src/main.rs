use anyhow::Context as _;
use ltp_engine::config::EngineConfig;
use ltp_engine::services::{load_history_file, Engine, EngineEvent, EngineUpdate};
use ltp_engine::types::Tick;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EVENT_CHANNEL_CAPACITY: usize = 4096;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries analysis output, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ltp_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Arc::new(EngineConfig::from_env());
    info!(
        "Starting LTP engine: {} candles, session {} {}",
        config.timeframe,
        config.session_tz.name(),
        config.session_open.format("%H:%M")
    );

    let (engine, updates) = Engine::new(config.clone());
    let (events, engine_task) = engine.spawn(EVENT_CHANNEL_CAPACITY);
    let printer = tokio::spawn(print_analyses(updates));

    if let Some(symbol) = config.initial_symbol.clone() {
        events.send(EngineEvent::Focus { symbol }).await?;
    }

    if let Some(path) = config.history_file.as_deref() {
        match load_history_file(path)
            .await
            .with_context(|| format!("loading history file {}", path))
        {
            Ok(seeds) => {
                info!("Loaded history for {} symbols from {}", seeds.len(), path);
                for (symbol, seed) in seeds {
                    events.send(seed.into_event(symbol)).await?;
                }
            }
            Err(e) => warn!("{:#}", e),
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_event(line) {
            Ok(event) => events.send(event).await?,
            Err(e) => warn!("Skipping input line: {}", e),
        }
    }

    debug!("Input closed, draining engine");
    drop(events);
    engine_task.await?;
    printer.await?;
    info!("LTP engine shut down");
    Ok(())
}

/// A tagged engine event, or a bare tick object.
fn parse_event(line: &str) -> serde_json::Result<EngineEvent> {
    serde_json::from_str::<EngineEvent>(line)
        .or_else(|e| serde_json::from_str::<Tick>(line).map(EngineEvent::Tick).map_err(|_| e))
}

async fn print_analyses(mut updates: broadcast::Receiver<EngineUpdate>) {
    loop {
        match updates.recv().await {
            Ok(update @ EngineUpdate::Analysis(_)) => match serde_json::to_string(&update) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Failed to serialize analysis: {}", e),
            },
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Output lagged, dropped {} updates", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
