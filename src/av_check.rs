use crate::error::ScanError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScanResult {
    #[default]
    Unknown,
    Clean,
    VirusDetected,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfectedFile {
    pub file_name: String,
    pub virus_name: String,
}

/// Verdict of a single malware scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvResult {
    pub result: ScanResult,
    pub raw_result: String,
    pub infected_files: Vec<InfectedFile>,
}

impl AvResult {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn not_scanned() -> Self {
        Self {
            raw_result: "URL not scanned".to_string(),
            ..Self::default()
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            result: ScanResult::Error,
            raw_result: message.to_string(),
            infected_files: Vec::new(),
        }
    }

    pub fn is_virus_detected(&self) -> bool {
        self.result == ScanResult::VirusDetected
    }
}

/// A malware scanning backend.
///
/// Connectivity failures must surface as errors rather than a verdict: a
/// scanner that cannot be reached has not said the content is clean.
#[async_trait]
pub trait MalwareScanner: Send + Sync {
    async fn scan_stream(&self, data: &[u8]) -> Result<AvResult, ScanError>;

    /// Scan a file readable by this process.
    async fn scan_file(&self, path: &str) -> Result<AvResult, ScanError> {
        if path.trim().is_empty() {
            return Ok(AvResult::error(
                "File not found or file path cannot be null or empty",
            ));
        }
        let data = tokio::fs::read(path).await?;
        self.scan_stream(&data).await
    }

    /// Download `url` and scan the response body.
    async fn scan_url(&self, url: &str) -> Result<AvResult, ScanError> {
        if url.trim().is_empty() {
            return Ok(AvResult::error("URL cannot be null or empty"));
        }

        let download = |e: reqwest::Error| ScanError::Download {
            url: url.to_string(),
            message: e.to_string(),
        };
        let body = reqwest::get(url)
            .await
            .map_err(download)?
            .bytes()
            .await
            .map_err(download)?;

        self.scan_stream(&body).await
    }
}
