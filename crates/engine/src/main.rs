pub mod admission;
pub mod config;
pub mod csv_streamer;
pub mod error;
pub mod producer;
pub mod simulator;
pub mod types;
pub mod writer;

use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{RwLock, mpsc, watch};
use tracing::{error, info};

use admission::{AdmissionQueue, CrossRateRequest};
use common::types::RateSnapshot;
use cross_rate_core::CrossRateCalculator;
use csv_streamer::CsvStreamer;
use producer::Producer;
use simulator::SimulatorStreamer;
use types::{DataSource, JoinHandleResult, SharedCalculator};
use writer::Writer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let source = parse_args();
    let config = config::load_config().expect("Failed to load config");

    let calculator: SharedCalculator = Arc::new(RwLock::new(CrossRateCalculator::new()));

    let (snapshot_sender, snapshot_receiver) =
        mpsc::channel::<RateSnapshot>(config.engine.snapshot_buffer_size);
    let (_shutdown_sender, shutdown_receiver) = watch::channel(());

    let producer_handle = spawn_producer(&source, snapshot_sender, &config);
    let writer_handle = Writer::new(calculator.clone(), snapshot_receiver, shutdown_receiver)
        .spawn_task();
    let (queue, queue_handle) = AdmissionQueue::spawn(calculator, config.engine.queue_capacity);

    let console_handle = tokio::spawn(run_query_console(queue));

    let _ = tokio::join!(
        producer_handle,
        writer_handle,
        queue_handle,
        console_handle
    );

    info!("Pipeline shut down.");
}

/// Parse command-line arguments to determine the snapshot source
fn parse_args() -> DataSource {
    let args: Vec<String> = env::args().collect();
    let source = args
        .get(1)
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "sim".to_string());

    match source.as_str() {
        "sim" => DataSource::SIM,
        "csv" => {
            let path = args.get(2).expect("CSV path required for CSV mode").clone();
            DataSource::CSV(path)
        }
        _ => {
            eprintln!(
                "Usage: {} <SIM|CSV> [path_to_csv]\n  - SIM: run simulated snapshot feed\n  - CSV: build one snapshot from a CSV file",
                args[0]
            );
            std::process::exit(1);
        }
    }
}

fn spawn_producer(
    source: &DataSource,
    sender: mpsc::Sender<RateSnapshot>,
    config: &config::Config,
) -> JoinHandleResult {
    match source {
        DataSource::SIM => {
            info!("Starting SimulatorStreamer producer task...");
            let streamer = SimulatorStreamer::new(config.simulator.clone());
            Producer::new(streamer).spawn(sender)
        }
        DataSource::CSV(path) => {
            info!("Starting CsvStreamer producer task...");
            let streamer = CsvStreamer::new(path.clone());
            Producer::new(streamer).spawn(sender)
        }
    }
}

/// Minimal stand-in for the transport collaborator: reads
/// `SOURCE TARGET [AMOUNT]` lines from stdin and submits them through the
/// admission queue.
async fn run_query_console(queue: AdmissionQueue) {
    info!("Query console ready. Enter: SOURCE TARGET [AMOUNT]");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(request) = parse_query(&line) else {
            if !line.trim().is_empty() {
                error!("Could not parse query '{}'", line.trim());
            }
            continue;
        };

        match queue.submit(request).await {
            Ok(result) => {
                info!(rate = result.rate, path = ?result.path, "cross rate");
            }
            Err(e) => {
                error!("cross rate unavailable: {}", e);
            }
        }
    }
}

fn parse_query(line: &str) -> Option<CrossRateRequest> {
    let mut parts = line.split_whitespace();
    let source = parts.next()?.to_string();
    let target = parts.next()?.to_string();
    let amount = match parts.next() {
        Some(raw) => Some(raw.parse().ok()?),
        None => None,
    };

    if parts.next().is_some() {
        return None;
    }

    Some(CrossRateRequest {
        source,
        target,
        amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pair_without_amount() {
        let request = parse_query("APT USDT").unwrap();
        assert_eq!(request.source, "APT");
        assert_eq!(request.target, "USDT");
        assert_eq!(request.amount, None);
    }

    #[test]
    fn parses_pair_with_amount() {
        let request = parse_query("  APT USDT 42.5 ").unwrap();
        assert_eq!(request.amount, Some(42.5));
    }

    #[test]
    fn rejects_malformed_queries() {
        assert!(parse_query("").is_none());
        assert!(parse_query("APT").is_none());
        assert!(parse_query("APT USDT abc").is_none());
        assert!(parse_query("APT USDT 1.0 extra").is_none());
    }
}
