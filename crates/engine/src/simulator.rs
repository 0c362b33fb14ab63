use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::Sender;
use tokio::time::{self, Duration};
use tracing::{info, warn};

use super::config::SimulatorConfig;
use super::error::Error;
use super::types::SnapshotStreamer;
use common::types::{AssetBook, Quote, RateSnapshot};

/// Produces synthetic full-graph snapshots for development runs.
///
/// Every tick builds a fresh randomized rate graph over `asset_count`
/// synthetic assets and pushes it as a wholesale replacement, the same
/// cadence the live rate-acquisition collaborator would use.
pub struct SimulatorStreamer {
    config: SimulatorConfig,
}

impl SimulatorStreamer {
    pub fn new(config: SimulatorConfig) -> Self {
        SimulatorStreamer { config }
    }

    fn build_snapshot(&self, rng: &mut SmallRng) -> RateSnapshot {
        let ids: Vec<String> = (0..self.config.asset_count)
            .map(|i| format!("TOK{i}"))
            .collect();
        let book = AssetBook::from_ids(ids.clone()).expect("generated IDs are distinct");

        // random_bool panics outside [0, 1]; a misconfigured probability
        // degrades to a full or empty graph instead.
        let edge_probability = self.config.edge_probability.clamp(0.0, 1.0);

        let mut quotes = Vec::new();
        for base in &ids {
            for quote in &ids {
                if base == quote || !rng.random_bool(edge_probability) {
                    continue;
                }
                quotes.push(Quote {
                    base: base.clone(),
                    quote: quote.clone(),
                    rate: rng.random_range(self.config.min_rate..self.config.max_rate),
                });
            }
        }

        RateSnapshot::from_quotes(book, &quotes)
    }
}

#[async_trait]
impl SnapshotStreamer for SimulatorStreamer {
    /// Runs the simulation loop. Backpressure is handled naturally by
    /// awaiting on `sender.send()`; exits when the receiver is dropped.
    async fn run_stream(self, sender: Sender<RateSnapshot>) -> Result<(), Error> {
        let mut interval = time::interval(Duration::from_secs(self.config.refresh_interval_secs));
        let mut rng: SmallRng = SmallRng::from_os_rng();

        loop {
            interval.tick().await;

            let snapshot = self.build_snapshot(&mut rng);
            info!(
                vertices = snapshot.len(),
                "Simulator produced a new snapshot."
            );

            if sender.send(snapshot).await.is_err() {
                warn!("Simulator shutting down: snapshot receiver dropped.");
                return Err(Error::ChannelSendFailed);
            }
        }
    }
}
