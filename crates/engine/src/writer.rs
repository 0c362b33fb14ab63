use tokio::select;
use tokio::sync::mpsc::Receiver;
use tokio::sync::watch;
use tracing::info;

use super::error::Error;
use super::types::SharedCalculator;
use common::types::RateSnapshot;

/// Async consumer that applies incoming snapshots to the shared calculator.
///
/// Each application takes the calculator's write lock, so a snapshot that
/// arrives while a search session holds the read lock waits until that
/// session completes; an in-flight computation never observes a
/// half-replaced graph.
pub struct Writer {
    calculator: SharedCalculator,
    receiver: Receiver<RateSnapshot>,
    shutdown: watch::Receiver<()>, // signal for graceful shutdown
}

impl Writer {
    pub fn new(
        calculator: SharedCalculator,
        receiver: Receiver<RateSnapshot>,
        shutdown: watch::Receiver<()>,
    ) -> Self {
        Self {
            calculator,
            receiver,
            shutdown,
        }
    }

    /// Consumes snapshots from the receiver and applies them wholesale.
    /// Exits gracefully when the feed closes or shutdown is signalled.
    pub async fn process_snapshots(mut self) -> Result<(), Error> {
        info!("Writer ready.");

        loop {
            select! {
                snapshot = self.receiver.recv() => {
                    match snapshot {
                        Some(snapshot) => {
                            let mut calculator = self.calculator.write().await;
                            calculator.set_snapshot(snapshot);
                        }
                        None => {
                            info!("Feed closed, shutting down writer.");
                            break;
                        }
                    }
                }

                _ = self.shutdown.changed() => {
                    info!("Shutdown signal received, stopping writer.");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Spawns the Writer task onto the Tokio runtime, returning a
    /// JoinHandle so the pipeline orchestrator can monitor it.
    pub fn spawn_task(self) -> tokio::task::JoinHandle<Result<(), Error>> {
        tokio::spawn(self.process_snapshots())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::{AssetBook, Quote};
    use cross_rate_core::{CrossRateCalculator, Mode};
    use std::sync::Arc;
    use tokio::sync::{RwLock, mpsc};
    use tokio::time::{Duration, timeout};

    fn sample_snapshot() -> RateSnapshot {
        let book =
            AssetBook::from_ids(["A".to_string(), "B".to_string()]).unwrap();
        RateSnapshot::from_quotes(
            book,
            &[Quote {
                base: "A".to_string(),
                quote: "B".to_string(),
                rate: 2.0,
            }],
        )
    }

    #[tokio::test]
    async fn applies_snapshots_to_the_calculator() {
        let calculator: SharedCalculator =
            Arc::new(RwLock::new(CrossRateCalculator::with_worker_count(1)));
        let (tx, rx) = mpsc::channel(2);
        let (_shutdown_tx, shutdown_rx) = watch::channel(());

        let handle = Writer::new(calculator.clone(), rx, shutdown_rx).spawn_task();

        tx.send(sample_snapshot()).await.unwrap();
        drop(tx); // close the feed so the writer exits

        timeout(Duration::from_secs(1), handle)
            .await
            .expect("writer should exit")
            .expect("writer task should not panic")
            .expect("writer should finish cleanly");

        let calculator = calculator.read().await;
        assert_eq!(calculator.mode(), Mode::ClosedForm);
        assert_eq!(calculator.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn stops_on_shutdown_signal() {
        let calculator: SharedCalculator =
            Arc::new(RwLock::new(CrossRateCalculator::new()));
        let (_tx, rx) = mpsc::channel::<RateSnapshot>(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let handle = Writer::new(calculator, rx, shutdown_rx).spawn_task();
        shutdown_tx.send(()).unwrap();

        timeout(Duration::from_secs(1), handle)
            .await
            .expect("writer should exit on shutdown")
            .unwrap()
            .unwrap();
    }
}
