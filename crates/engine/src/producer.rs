use tokio::sync::mpsc::Sender;

use super::error::Error;
use super::types::SnapshotStreamer;
use common::types::RateSnapshot;

/// Spawns a snapshot streamer onto the runtime, decoupling the feed task
/// from the concrete source (simulator vs. CSV).
pub struct Producer<S: SnapshotStreamer> {
    streamer: S,
}

impl<S> Producer<S>
where
    S: SnapshotStreamer,
{
    pub fn new(streamer: S) -> Self {
        Producer { streamer }
    }

    pub fn spawn(
        self,
        sender: Sender<RateSnapshot>,
    ) -> tokio::task::JoinHandle<Result<(), Error>> {
        tracing::info!("Producer ready.");
        tokio::spawn(async move { self.streamer.run_stream(sender).await })
    }
}
