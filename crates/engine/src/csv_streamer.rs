use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use tokio::sync::mpsc::Sender;
use tracing::{error, info};

use super::error::Error;
use super::types::SnapshotStreamer;
use common::types::{AssetBook, Quote, RateSnapshot};

// Helper struct for CSV parsing
#[derive(Debug, Deserialize)]
pub struct CsvRecord {
    #[serde(rename = "base")]
    pub base_asset: String,

    #[serde(rename = "quote")]
    pub quote_asset: String,

    #[serde(rename = "rate")]
    pub rate_value: f64,
}

/// Builds one full snapshot from a `base,quote,rate` CSV file and delivers
/// it once. The asset book is discovered from the file, indexed in order of
/// first appearance.
pub struct CsvStreamer {
    path: String,
}

impl CsvStreamer {
    pub fn new(path: String) -> Self {
        CsvStreamer { path }
    }

    fn parse_csv_to_quotes(&self) -> Result<Vec<Quote>, Error> {
        let file = File::open(&self.path).map_err(|e| {
            error!("Failed to read file {}: {:?}", self.path, e);
            Error::IoError(e)
        })?;

        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut quotes = Vec::new();

        for result in rdr.deserialize() {
            let record: CsvRecord = result?;
            quotes.push(Quote {
                base: record.base_asset,
                quote: record.quote_asset,
                rate: record.rate_value,
            });
        }
        Ok(quotes)
    }

    fn build_snapshot(&self) -> Result<RateSnapshot, Error> {
        let quotes = self.parse_csv_to_quotes()?;

        let mut ids: Vec<String> = Vec::new();
        for quote in &quotes {
            for id in [&quote.base, &quote.quote] {
                if !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
        }

        let book = AssetBook::from_ids(ids).map_err(Error::EngineError)?;
        Ok(RateSnapshot::from_quotes(book, &quotes))
    }
}

#[async_trait::async_trait]
impl SnapshotStreamer for CsvStreamer {
    async fn run_stream(self, sender: Sender<RateSnapshot>) -> Result<(), Error> {
        let snapshot = self.build_snapshot()?;
        info!(
            vertices = snapshot.len(),
            "CsvStreamer: snapshot assembled, delivering..."
        );

        if sender.send(snapshot).await.is_err() {
            error!("CsvStreamer shutting down: snapshot receiver dropped.");
            return Err(Error::ChannelSendFailed);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MOCK_CSV_CONTENT: &str = "\
base,quote,rate
APT,USDT,8.5
USDT,APT,0.11
USDT,BTC,0.000025
BTC,APT,330000
";

    fn streamer_for(content: &str) -> (CsvStreamer, NamedTempFile) {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        temp_file
            .write_all(content.as_bytes())
            .expect("Failed to write mock content");

        let path = temp_file
            .path()
            .to_str()
            .expect("Failed to get path string")
            .to_string();

        (CsvStreamer::new(path), temp_file)
    }

    #[test]
    fn test_build_snapshot_success() {
        let (streamer, _guard) = streamer_for(MOCK_CSV_CONTENT);

        let snapshot = streamer.build_snapshot().expect("snapshot should build");

        // Assets indexed in order of first appearance.
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.assets().index_of("APT"), Some(0));
        assert_eq!(snapshot.assets().index_of("USDT"), Some(1));
        assert_eq!(snapshot.assets().index_of("BTC"), Some(2));

        assert_eq!(snapshot.rate(0, 1), 8.5);
        assert_eq!(snapshot.rate(1, 0), 0.11);
        assert_eq!(snapshot.rate(2, 0), 330000.0);
        assert!(!snapshot.has_edge(0, 2));
    }

    #[test]
    fn test_build_snapshot_file_not_found() {
        let streamer = CsvStreamer::new("non_existent_file.csv".to_string());
        let result = streamer.build_snapshot();

        assert!(
            result.is_err(),
            "Should have failed to open non-existent file."
        );

        if let Err(Error::IoError(e)) = result {
            assert_eq!(e.kind(), std::io::ErrorKind::NotFound);
        } else {
            panic!("Expected IoError, got: {:?}", result.err());
        }
    }

    #[tokio::test]
    async fn test_run_stream_delivers_once() {
        let (streamer, _guard) = streamer_for(MOCK_CSV_CONTENT);
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);

        streamer.run_stream(tx).await.expect("stream should finish");

        let snapshot = rx.recv().await.expect("snapshot delivered");
        assert_eq!(snapshot.len(), 3);
        assert!(rx.recv().await.is_none(), "sender dropped after one delivery");
    }
}
