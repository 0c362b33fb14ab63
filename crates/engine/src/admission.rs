use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::Error;
use super::types::SharedCalculator;
use common::error::Error as CoreError;
use common::types::CrossRate;

/// A single client request as handed over by the transport boundary.
#[derive(Debug, Clone)]
pub struct CrossRateRequest {
    pub source: String,
    pub target: String,
    pub amount: Option<f64>,
}

type Reply = oneshot::Sender<Result<CrossRate, Error>>;

/// Single-flight admission queue in front of the calculator.
///
/// The solver's derived matrices and the search engine's worker pool are
/// session-scoped shared state, so at most one computation may run at a
/// time. A bounded mpsc channel provides the FIFO; the single consumer loop
/// is the busy flag: it pops the next request only after the previous
/// computation fully completed. No request is dropped, and a computation
/// that panics fails only its own request before the loop advances.
#[derive(Clone)]
pub struct AdmissionQueue {
    sender: mpsc::Sender<(CrossRateRequest, Reply)>,
}

impl AdmissionQueue {
    /// Spawns the consumer loop and returns the queue handle plus the
    /// loop's JoinHandle for pipeline supervision.
    pub fn spawn(calculator: SharedCalculator, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let handle = tokio::spawn(run(calculator, receiver));

        (AdmissionQueue { sender }, handle)
    }

    /// Enqueues a request and waits for its result. Requests are served in
    /// strict submission order, one at a time.
    pub async fn submit(&self, request: CrossRateRequest) -> Result<CrossRate, Error> {
        let (reply_sender, reply_receiver) = oneshot::channel();

        self.sender
            .send((request, reply_sender))
            .await
            .map_err(|_| Error::ChannelSendFailed)?;

        reply_receiver
            .await
            .map_err(|_| Error::ComputationDropped)?
    }
}

async fn run(calculator: SharedCalculator, mut receiver: mpsc::Receiver<(CrossRateRequest, Reply)>) {
    while let Some((request, reply)) = receiver.recv().await {
        debug!(
            source = %request.source,
            target = %request.target,
            "admission queue dispatching request"
        );

        let shared = calculator.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            // The search session is CPU-bound; blocking_read keeps it off
            // the async worker threads while still serializing against
            // snapshot replacement.
            let calculator = shared.blocking_read();
            let amount = request.amount.unwrap_or(1.0);
            calculator.cross_rate(&request.source, &request.target, amount)
        })
        .await;

        let result = match outcome {
            Ok(result) => result.map_err(Error::EngineError),
            Err(join_error) => {
                warn!(%join_error, "cross-rate computation died; failing the request");
                Err(Error::EngineError(CoreError::SearchSessionFailed(usize::MAX)))
            }
        };

        // A caller that gave up waiting is not an error for the queue.
        let _ = reply.send(result);
    }

    debug!("admission queue closed");
}
