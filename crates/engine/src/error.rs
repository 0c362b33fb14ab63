use thiserror::Error;

use common::error::Error as CoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Channel sender failed: Receiver has been dropped.")]
    ChannelSendFailed,

    #[error("Failed to load configuration: {0}")]
    ConfigLoadError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Rate engine error: {0}")]
    EngineError(#[from] CoreError),

    #[error("Computation was dropped before completing.")]
    ComputationDropped,
}
