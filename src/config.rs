use crate::rule_table::RuleSource;
use anyhow::Context;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: Option<LoggingConfig>,
    pub domain_name_checker: DomainCheckerOptions,
    pub domain_name_parser: DomainParserOptions,
    pub clam_av: ClamAvOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Which analysis stages run for each checked URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainCheckerOptions {
    pub use_domain_name_checker: bool,
    pub use_basic_domain_check: bool,
    pub use_clam_av: bool,
    pub use_domain_name_parser: bool,
    pub call_url: bool,
    pub http_request_timeout_seconds: u64,
    /// Redirects the HTTP client follows on its own before handing back a 3xx
    pub max_redirects: usize,
}

impl Default for DomainCheckerOptions {
    fn default() -> Self {
        Self {
            use_domain_name_checker: true,
            use_basic_domain_check: true,
            use_clam_av: false,
            use_domain_name_parser: true,
            call_url: false,
            http_request_timeout_seconds: 30,
            max_redirects: 100,
        }
    }
}

impl DomainCheckerOptions {
    pub fn http_request_timeout(&self) -> Duration {
        Duration::from_secs(self.http_request_timeout_seconds.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainParserOptions {
    pub use_domain_name_parser: bool,
    pub rule_source: RuleSource,
    pub excluded_domain_list: Vec<String>,
}

impl Default for DomainParserOptions {
    fn default() -> Self {
        Self {
            use_domain_name_parser: true,
            rule_source: RuleSource::Embedded,
            excluded_domain_list: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClamAvOptions {
    pub use_clam_av: bool,
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
}

impl Default for ClamAvOptions {
    fn default() -> Self {
        Self {
            use_clam_av: false,
            host: "127.0.0.1".to_string(),
            port: 3310,
            timeout_seconds: 60,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_yaml()?)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn default_path() -> &'static str {
        "/etc/domain-checker.yaml"
    }

    /// Rule source to load. A disabled parser section means no rules at all.
    pub fn effective_rule_source(&self) -> RuleSource {
        if self.domain_name_parser.use_domain_name_parser {
            self.domain_name_parser.rule_source.clone()
        } else {
            RuleSource::None
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.logging
            .as_ref()
            .and_then(|logging| logging.level.parse().ok())
            .unwrap_or(LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
domain_name_checker:
  call_url: true
  http_request_timeout_seconds: 5
domain_name_parser:
  rule_source:
    type: RemoteUrl
    url: https://publicsuffix.org/list/public_suffix_list.dat
  excluded_domain_list:
    - bit.ly
    - tk
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert!(config.domain_name_checker.use_domain_name_checker);
        assert!(config.domain_name_checker.call_url);
        assert!(!config.domain_name_checker.use_clam_av);
        assert_eq!(
            config.domain_name_checker.http_request_timeout(),
            Duration::from_secs(5)
        );
        assert_eq!(config.domain_name_checker.max_redirects, 100);
        assert_eq!(
            config.effective_rule_source(),
            RuleSource::RemoteUrl {
                url: "https://publicsuffix.org/list/public_suffix_list.dat".to_string()
            }
        );
        assert_eq!(config.domain_name_parser.excluded_domain_list.len(), 2);
        assert_eq!(config.clam_av.port, 3310);
    }

    #[test]
    fn test_disabled_parser_has_no_rule_source() {
        let yaml = "domain_name_parser:\n  use_domain_name_parser: false\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.effective_rule_source(), RuleSource::None);
    }

    #[test]
    fn test_default_config_round_trips_through_yaml() {
        let yaml = Config::default().to_yaml().unwrap();
        let config: Config = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(config.domain_name_checker, DomainCheckerOptions::default());
        assert_eq!(config.domain_name_parser.rule_source, RuleSource::Embedded);
        assert_eq!(config.effective_rule_source(), RuleSource::Embedded);
    }

    #[test]
    fn test_log_level() {
        let mut config = Config::default();
        assert_eq!(config.log_level(), LevelFilter::Info);

        config.logging = Some(LoggingConfig {
            level: "debug".to_string(),
        });
        assert_eq!(config.log_level(), LevelFilter::Debug);

        config.logging = Some(LoggingConfig {
            level: "chatty".to_string(),
        });
        assert_eq!(config.log_level(), LevelFilter::Info);
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let options = DomainCheckerOptions {
            http_request_timeout_seconds: 0,
            ..DomainCheckerOptions::default()
        };
        assert_eq!(options.http_request_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_to_file_then_from_file() {
        let path = std::env::temp_dir().join(format!("domain-checker-{}.yaml", std::process::id()));
        let mut config = Config::default();
        config.clam_av.use_clam_av = true;
        config.domain_name_parser.excluded_domain_list = vec!["example.org".to_string()];
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.clam_av, config.clam_av);
        assert_eq!(loaded.domain_name_parser, config.domain_name_parser);
    }

    #[test]
    fn test_from_file_reports_missing_file() {
        let err = Config::from_file("/nonexistent/domain-checker.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
