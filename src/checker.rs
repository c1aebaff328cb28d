use crate::av_check::{AvResult, MalwareScanner, ScanResult};
use crate::clamav::ClamAvScanner;
use crate::config::{Config, DomainCheckerOptions};
use crate::domain_parser::{DomainParser, ParsedDomain};
use crate::error::{CheckError, FetchError};
use crate::rule_table::RuleTable;
use crate::url_fetcher::{FetchResponse, HttpFetcher, UrlFetcher};
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

/// Hops of `301 Moved Permanently` followed by hand after the client gives
/// one back (e.g. HTTPS to HTTP downgrades).
pub const MAX_MOVED_REDIRECTS: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct EndPointInfo {
    pub basic_domain_validation: bool,
    pub domain: ParsedDomain,
}

/// Everything learned about one URL.
#[derive(Debug, Clone, Serialize)]
pub struct CheckAnalysis {
    pub original_url: String,
    /// Where the redirect chain ended. `None` when the request failed.
    pub last_redirection_url: Option<String>,
    pub end_point_analysis: Vec<EndPointInfo>,
    pub av_result: AvResult,
    pub http_status: Option<u16>,
}

impl CheckAnalysis {
    /// Every analysed end point parsed cleanly, none is excluded and the
    /// scanner found nothing.
    pub fn is_safe(&self) -> bool {
        !self.end_point_analysis.is_empty()
            && self
                .end_point_analysis
                .iter()
                .all(|end_point| end_point.domain.is_valid && !end_point.domain.is_excluded)
            && self.av_result.result != ScanResult::VirusDetected
    }
}

struct UrlAvResult {
    url: Option<String>,
    av_result: AvResult,
    http_status: Option<StatusCode>,
}

impl UrlAvResult {
    fn failed() -> Self {
        Self {
            url: None,
            av_result: AvResult::unknown(),
            http_status: None,
        }
    }

    fn timed_out() -> Self {
        Self {
            http_status: Some(StatusCode::REQUEST_TIMEOUT),
            ..Self::failed()
        }
    }
}

/// Combines scheme validation, suffix parsing, fetching and malware scanning.
pub struct DomainCheckHandler {
    options: DomainCheckerOptions,
    parser: Option<DomainParser>,
    scanner: Option<Arc<dyn MalwareScanner>>,
    fetcher: Arc<dyn HttpFetcher>,
}

impl DomainCheckHandler {
    pub fn new(
        options: DomainCheckerOptions,
        parser: Option<DomainParser>,
        scanner: Option<Arc<dyn MalwareScanner>>,
        fetcher: Arc<dyn HttpFetcher>,
    ) -> Result<Self, CheckError> {
        if options.use_domain_name_parser && parser.is_none() {
            return Err(CheckError::MissingParser);
        }
        if options.call_url && options.use_clam_av && scanner.is_none() {
            return Err(CheckError::MissingScanner);
        }

        Ok(Self {
            options,
            parser,
            scanner,
            fetcher,
        })
    }

    /// Wire up a handler from configuration. `None` when the checker is
    /// switched off.
    pub async fn from_config(config: &Config) -> anyhow::Result<Option<Self>> {
        let options = config.domain_name_checker.clone();
        if !options.use_domain_name_checker {
            log::info!("Domain name checker is disabled");
            return Ok(None);
        }

        let parser = if options.use_domain_name_parser {
            let table = RuleTable::load(
                &config.effective_rule_source(),
                &config.domain_name_parser.excluded_domain_list,
            )
            .await?;
            Some(DomainParser::new(Arc::new(table)))
        } else {
            None
        };

        let scanner: Option<Arc<dyn MalwareScanner>> =
            if options.use_clam_av && config.clam_av.use_clam_av {
                let scanner = ClamAvScanner::new(&config.clam_av.host, config.clam_av.port)
                    .with_timeout(Duration::from_secs(config.clam_av.timeout_seconds));
                Some(Arc::new(scanner))
            } else {
                None
            };

        let fetcher = Arc::new(UrlFetcher::new(
            options.http_request_timeout(),
            options.max_redirects,
        )?);

        Ok(Some(Self::new(options, parser, scanner, fetcher)?))
    }

    pub fn parser(&self) -> Option<&DomainParser> {
        self.parser.as_ref()
    }

    pub fn options(&self) -> &DomainCheckerOptions {
        &self.options
    }

    /// Analyse `url`. Only scanner failures and unexpected HTTP client
    /// failures are returned as errors.
    pub async fn analyze(&self, url: &str) -> Result<CheckAnalysis, CheckError> {
        let mut analysis = CheckAnalysis {
            original_url: url.to_string(),
            last_redirection_url: Some(url.to_string()),
            end_point_analysis: Vec::new(),
            av_result: AvResult::unknown(),
            http_status: None,
        };

        let end_point = self.end_point_info(url);
        let proceed = end_point.domain.is_valid && !end_point.domain.is_excluded;
        analysis.end_point_analysis.push(end_point);

        if !proceed {
            log::info!("Skipping fetch for {url}: domain is invalid or excluded");
            return Ok(analysis);
        }

        if self.options.call_url {
            let fetched = self.scan_call_url_and_get_last_redirection(url).await?;
            analysis.last_redirection_url = fetched.url;
            analysis.av_result = fetched.av_result;
            analysis.http_status = fetched.http_status.map(|status| status.as_u16());
        }

        if let Some(last_url) = analysis.last_redirection_url.clone() {
            if !last_url.is_empty()
                && !Self::same_url(&last_url, url)
                && !analysis.av_result.is_virus_detected()
            {
                log::info!("{url} redirected to {last_url}, analysing destination");
                analysis.end_point_analysis.push(self.end_point_info(&last_url));
            }
        }

        Ok(analysis)
    }

    fn end_point_info(&self, url: &str) -> EndPointInfo {
        let basic_domain_validation =
            self.options.use_basic_domain_check && Self::basic_domain_check(url);

        let domain = match &self.parser {
            Some(parser) if self.options.use_domain_name_parser => parser.parse(url),
            _ => ParsedDomain::skipped(),
        };

        EndPointInfo {
            basic_domain_validation,
            domain,
        }
    }

    /// Absolute URL with the `https` scheme and a host.
    pub fn basic_domain_check(url: &str) -> bool {
        Url::parse(url.trim())
            .map(|parsed| parsed.scheme() == "https" && parsed.has_host())
            .unwrap_or(false)
    }

    /// Fetching and scanning share a single deadline.
    async fn scan_call_url_and_get_last_redirection(
        &self,
        url: &str,
    ) -> Result<UrlAvResult, CheckError> {
        if url.trim().is_empty() {
            return Ok(UrlAvResult {
                url: Some(String::new()),
                ..UrlAvResult::failed()
            });
        }

        let deadline = self.options.http_request_timeout();
        match timeout(deadline, self.fetch_and_scan(url)).await {
            Ok(result) => result,
            Err(_) => {
                log::error!("Request to {url} timed out after {}s", deadline.as_secs());
                Ok(UrlAvResult::timed_out())
            }
        }
    }

    async fn fetch_and_scan(&self, url: &str) -> Result<UrlAvResult, CheckError> {
        let response = match self.follow_moved_redirects(url).await {
            Ok(response) => response,
            Err(FetchError::Timeout(e)) => {
                log::error!("Request to {url} timed out: {e}");
                return Ok(UrlAvResult::timed_out());
            }
            Err(FetchError::Unexpected(e)) => {
                log::error!("Unexpected failure fetching {url}: {e}");
                return Err(CheckError::Fetch {
                    url: url.to_string(),
                    source: FetchError::Unexpected(e),
                });
            }
            Err(e) => {
                log::error!("HTTP request to {url} failed: {e}");
                return Ok(UrlAvResult::failed());
            }
        };

        let av_result = if self.options.use_clam_av {
            let scanner = self.scanner.as_ref().ok_or(CheckError::MissingScanner)?;
            scanner.scan_stream(&response.body).await?
        } else {
            AvResult::not_scanned()
        };

        if av_result.is_virus_detected() {
            log::warn!("Malware detected at {}: {}", response.url, av_result.raw_result);
        }

        Ok(UrlAvResult {
            url: Some(response.url),
            av_result,
            http_status: Some(response.status),
        })
    }

    /// GET `url`, then keep following `301` responses the client handed back.
    async fn follow_moved_redirects(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let mut response = self.fetcher.get(url).await?;
        let mut redirect_count = 0;

        while redirect_count < MAX_MOVED_REDIRECTS && response.status == StatusCode::MOVED_PERMANENTLY
        {
            let target = response
                .redirect_target()
                .ok_or_else(|| FetchError::BadRedirect(response.url.clone()))?;
            log::debug!("Following 301 from {} to {target}", response.url);
            response = self.fetcher.get(&target).await?;
            redirect_count += 1;
        }

        if !response.status.is_success() {
            return Err(FetchError::Status {
                status: response.status.as_u16(),
                url: response.url,
            });
        }

        Ok(response)
    }

    fn same_url(a: &str, b: &str) -> bool {
        match (Url::parse(a), Url::parse(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        }
    }
}
