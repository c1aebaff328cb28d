use thiserror::Error;

/// Failures while building a rule table. A table is never partially built.
#[derive(Error, Debug)]
pub enum RuleTableError {
    #[error("Failed to read rule list {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to fetch rule list from {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Reasons a domain could not be decomposed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("The domain cannot be blank")]
    InvalidArgument,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Domain {0} contains an empty label")]
    EmptyLabel(String),
    #[error("The domain {0} does not have a recognized TLD")]
    UnrecognizedTld(String),
    #[error("Domain {domain} has no label left of the public suffix {suffix}")]
    NoRegistrableLabel { domain: String, suffix: String },
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("HTTP request failed: {0}")]
    Request(String),
    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Redirect from {0} has no usable Location header")]
    BadRedirect(String),
    #[error("Unexpected HTTP client failure: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_connect()
            || err.is_request()
            || err.is_redirect()
            || err.is_body()
            || err.is_decode()
        {
            FetchError::Request(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            FetchError::Unexpected(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Error trying to connect to ClamAV at {address}. Please check ClamAV is up and running: {source}")]
    Connection {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ClamAV I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to download {url} for scanning: {message}")]
    Download { url: String, message: String },
}

#[derive(Error, Debug)]
pub enum CheckError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Unexpected failure while fetching {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("Domain name parser is enabled but no parser was provided")]
    MissingParser,
    #[error("ClamAV scanning is enabled but no scanner was provided")]
    MissingScanner,
}
