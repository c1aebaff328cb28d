pub mod av_check;
pub mod checker;
pub mod clamav;
pub mod config;
pub mod domain_parser;
pub mod domain_utils;
pub mod error;
pub mod rule;
pub mod rule_table;
pub mod url_fetcher;

#[cfg(test)]
pub(crate) mod test_support;

pub use av_check::{AvResult, InfectedFile, MalwareScanner, ScanResult};
pub use checker::{CheckAnalysis, DomainCheckHandler, EndPointInfo};
pub use clamav::ClamAvScanner;
pub use config::Config;
pub use domain_parser::{DomainParser, ParsedDomain};
pub use error::{CheckError, FetchError, ParseError, RuleTableError, ScanError};
pub use rule::{Rule, RuleKind};
pub use rule_table::{RuleSource, RuleTable};
pub use url_fetcher::{FetchResponse, HttpFetcher, UrlFetcher};
