#![cfg(feature = "capture-http")]

use std::io::Read;
use std::time::Duration;

use super::{CaptureSource, CapturedFrame};
use crate::error::PipelineError;

const MAX_SNAPSHOT_BYTES: u64 = 5 * 1024 * 1024;
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP snapshot camera: one GET per frame against a still-capture URL
/// (the `/capture` endpoint most IP cameras expose).
pub struct HttpSnapshotSource {
    url: String,
    frame_count: u64,
}

impl HttpSnapshotSource {
    pub fn new(url: String) -> Self {
        Self {
            url,
            frame_count: 0,
        }
    }
}

impl CaptureSource for HttpSnapshotSource {
    fn name(&self) -> &'static str {
        "http"
    }

    fn connect(&mut self) -> Result<(), PipelineError> {
        url::Url::parse(&self.url)
            .map_err(|e| PipelineError::capture(format!("invalid snapshot url: {}", e)))?;
        log::info!("http capture source: {}", self.url);
        Ok(())
    }

    fn snapshot(&mut self) -> Result<CapturedFrame, PipelineError> {
        let response = ureq::get(&self.url)
            .timeout(SNAPSHOT_TIMEOUT)
            .call()
            .map_err(|e| PipelineError::capture(format!("snapshot GET failed: {}", e)))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_SNAPSHOT_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| PipelineError::capture(format!("failed to read snapshot body: {}", e)))?;

        if bytes.is_empty() {
            return Err(PipelineError::capture("empty snapshot response"));
        }

        self.frame_count += 1;
        CapturedFrame::from_bytes(&bytes)
    }
}
