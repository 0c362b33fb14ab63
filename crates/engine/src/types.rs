use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

use super::error::Error;
use common::types::RateSnapshot;
use cross_rate_core::CrossRateCalculator;

/// Which snapshot source feeds the engine.
pub enum DataSource {
    SIM,
    CSV(String),
}

pub type SharedCalculator = Arc<RwLock<CrossRateCalculator>>;
pub type JoinHandleResult = JoinHandle<Result<(), Error>>;

/// Contract for any source that produces whole rate-graph snapshots and
/// pushes them into the engine.
///
/// Snapshots are always full replacements; a streamer never mutates a
/// previously delivered snapshot. The trait bounds (`Send`, `Sync`,
/// `'static`) are mandatory so implementations can run on the
/// multi-threaded Tokio runtime.
#[async_trait::async_trait]
pub trait SnapshotStreamer: Send + Sync + 'static {
    async fn run_stream(self, sender: Sender<RateSnapshot>) -> Result<(), Error>;
}
