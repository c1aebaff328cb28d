use crate::av_check::{AvResult, InfectedFile, MalwareScanner, ScanResult};
use crate::error::ScanError;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const INSTREAM_CHUNK_SIZE: usize = 128 * 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

static FOUND_LINE: OnceLock<Option<Regex>> = OnceLock::new();

fn found_line_regex() -> Option<&'static Regex> {
    FOUND_LINE
        .get_or_init(|| Regex::new(r"(?m)^(?P<file>.*?): (?P<virus>.+) FOUND\s*$").ok())
        .as_ref()
}

/// Client for a `clamd` daemon over TCP.
#[derive(Debug, Clone)]
pub struct ClamAvScanner {
    host: String,
    port: u16,
    timeout: Duration,
}

impl ClamAvScanner {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `true` when the daemon answers `PONG`.
    pub async fn ping(&self) -> Result<bool, ScanError> {
        Ok(self.command("PING").await? == "PONG")
    }

    pub async fn version(&self) -> Result<String, ScanError> {
        self.command("VERSION").await
    }

    async fn connect(&self) -> Result<TcpStream, ScanError> {
        let address = self.address();
        let connected = match timeout(self.timeout, TcpStream::connect(&address)).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "connection timed out",
            )),
        };

        connected.map_err(|source| {
            log::error!("Error trying to connect to ClamAV at {address}: {source}");
            ScanError::Connection { address, source }
        })
    }

    /// Send a null-terminated command and return the reply.
    async fn command(&self, command: &str) -> Result<String, ScanError> {
        let mut stream = self.connect().await?;
        stream.write_all(format!("z{command}\0").as_bytes()).await?;
        self.read_reply(&mut stream).await
    }

    async fn read_reply(&self, stream: &mut TcpStream) -> Result<String, ScanError> {
        let mut reply = Vec::new();
        match timeout(self.timeout, stream.read_to_end(&mut reply)).await {
            Ok(read) => {
                read?;
            }
            Err(_) => {
                return Err(ScanError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "timed out waiting for clamd reply",
                )))
            }
        }

        let reply = String::from_utf8_lossy(&reply);
        Ok(reply.trim_end_matches('\0').trim().to_string())
    }

    /// Classify a clamd reply such as `stream: Eicar-Test-Signature FOUND`.
    pub fn parse_reply(raw: &str) -> AvResult {
        let raw = raw.trim_end_matches('\0').trim();

        let result = if raw.ends_with("OK") {
            ScanResult::Clean
        } else if raw.ends_with("FOUND") {
            ScanResult::VirusDetected
        } else if raw.ends_with("ERROR") {
            ScanResult::Error
        } else {
            ScanResult::Unknown
        };

        let mut infected_files = Vec::new();
        if result == ScanResult::VirusDetected {
            if let Some(regex) = found_line_regex() {
                for captures in regex.captures_iter(raw) {
                    infected_files.push(InfectedFile {
                        file_name: captures["file"].to_string(),
                        virus_name: captures["virus"].to_string(),
                    });
                }
            }
        }

        AvResult {
            result,
            raw_result: raw.to_string(),
            infected_files,
        }
    }
}

#[async_trait]
impl MalwareScanner for ClamAvScanner {
    async fn scan_stream(&self, data: &[u8]) -> Result<AvResult, ScanError> {
        let mut stream = self.connect().await?;
        stream.write_all(b"zINSTREAM\0").await?;

        for chunk in data.chunks(INSTREAM_CHUNK_SIZE) {
            stream.write_all(&(chunk.len() as u32).to_be_bytes()).await?;
            stream.write_all(chunk).await?;
        }
        stream.write_all(&[0, 0, 0, 0]).await?;
        stream.flush().await?;

        let reply = self.read_reply(&mut stream).await?;
        log::debug!("ClamAV scanned {} bytes: {reply}", data.len());
        Ok(Self::parse_reply(&reply))
    }

    /// Ask clamd to scan a path on its own filesystem.
    async fn scan_file(&self, path: &str) -> Result<AvResult, ScanError> {
        if path.trim().is_empty() {
            return Ok(AvResult::error(
                "File not found or file path cannot be null or empty",
            ));
        }

        let reply = self.command(&format!("SCAN {path}")).await?;
        Ok(Self::parse_reply(&reply))
    }
}
