use crate::error::RuleTableError;
use crate::rule::{Rule, RuleKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

const EMBEDDED_RULE_DATA: &str = include_str!("../data/effective_tld_names.dat");
const REMOTE_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

static EMBEDDED_RULES: OnceLock<Arc<RuleIndex>> = OnceLock::new();

/// Where the suffix rules come from. Exactly one source per table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type")]
pub enum RuleSource {
    /// The list compiled into the binary
    Embedded,
    LocalFile {
        path: String,
    },
    RemoteUrl {
        url: String,
    },
    /// No rules at all; every lookup fails
    #[default]
    None,
}

/// Rules indexed by kind, then by lowercase name.
#[derive(Debug, Default)]
struct RuleIndex {
    by_kind: HashMap<RuleKind, HashMap<String, Arc<Rule>>>,
}

impl RuleIndex {
    fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_kind: HashMap<RuleKind, HashMap<String, Arc<Rule>>> = RuleKind::ALL
            .iter()
            .map(|kind| (*kind, HashMap::new()))
            .collect();

        for line in lines {
            if let Some(rule) = Rule::parse_line(line.as_ref()) {
                // Later duplicates replace earlier ones
                by_kind
                    .entry(rule.kind())
                    .or_default()
                    .insert(rule.key(), Arc::new(rule));
            }
        }

        Self { by_kind }
    }

    fn len(&self) -> usize {
        self.by_kind.values().map(HashMap::len).sum()
    }
}

/// An immutable, shareable set of public suffix rules plus the configured
/// excluded suffixes.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Arc<RuleIndex>,
    excluded_suffixes: HashSet<String>,
}

impl RuleTable {
    /// Build a table from the configured source.
    pub async fn load(source: &RuleSource, excluded: &[String]) -> Result<Self, RuleTableError> {
        let table = match source {
            RuleSource::Embedded => Self::embedded(excluded),
            RuleSource::LocalFile { path } => {
                if path.trim().is_empty() {
                    log::warn!("Local rule list path is empty, using no rule set");
                    Self::with_index(Arc::default(), excluded)
                } else {
                    let content = tokio::fs::read_to_string(path).await.map_err(|source| {
                        RuleTableError::Io {
                            path: path.clone(),
                            source,
                        }
                    })?;
                    Self::from_lines(content.lines(), excluded)
                }
            }
            RuleSource::RemoteUrl { url } => {
                if url.trim().is_empty() {
                    log::warn!("Remote rule list URL is empty, using no rule set");
                    Self::with_index(Arc::default(), excluded)
                } else {
                    let content = Self::fetch_remote(url).await?;
                    Self::from_lines(content.lines(), excluded)
                }
            }
            RuleSource::None => Self::with_index(Arc::default(), excluded),
        };

        log::info!("Loaded {} rules into cache", table.len());
        Ok(table)
    }

    /// Table backed by the bundled list. The list is parsed once per process.
    pub fn embedded(excluded: &[String]) -> Self {
        let index = EMBEDDED_RULES
            .get_or_init(|| Arc::new(RuleIndex::from_lines(EMBEDDED_RULE_DATA.lines())))
            .clone();
        Self::with_index(index, excluded)
    }

    pub fn from_lines<I, S>(lines: I, excluded: &[String]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_index(Arc::new(RuleIndex::from_lines(lines)), excluded)
    }

    pub fn empty() -> Self {
        Self::with_index(Arc::default(), &[])
    }

    fn with_index(rules: Arc<RuleIndex>, excluded: &[String]) -> Self {
        let excluded_suffixes = excluded
            .iter()
            .map(|suffix| {
                let suffix = suffix.trim().trim_start_matches('.');
                idna::domain_to_ascii(suffix).unwrap_or_else(|_| suffix.to_lowercase())
            })
            .filter(|suffix| !suffix.is_empty())
            .collect();

        Self {
            rules,
            excluded_suffixes,
        }
    }

    async fn fetch_remote(url: &str) -> Result<String, RuleTableError> {
        let to_error = |source: reqwest::Error| RuleTableError::Http {
            url: url.to_string(),
            source,
        };

        let client = reqwest::Client::builder()
            .timeout(REMOTE_FETCH_TIMEOUT)
            .build()
            .map_err(to_error)?;

        client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(to_error)?
            .text()
            .await
            .map_err(to_error)
    }

    /// Case-insensitive lookup of a rule by kind and name.
    pub fn get(&self, kind: RuleKind, name: &str) -> Option<&Arc<Rule>> {
        self.rules
            .by_kind
            .get(&kind)
            .and_then(|rules| rules.get(&name.to_lowercase()))
    }

    pub fn rules(&self, kind: RuleKind) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.by_kind.get(&kind).into_iter().flat_map(HashMap::values)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_excluded(&self, suffix: &str) -> bool {
        !suffix.is_empty() && self.excluded_suffixes.contains(&suffix.to_lowercase())
    }

    pub fn excluded_suffixes(&self) -> impl Iterator<Item = &str> {
        self.excluded_suffixes.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_http;

    #[test]
    fn test_from_lines_indexes_by_kind() {
        let table = RuleTable::from_lines(
            ["// comment", "", "uk", "co.uk", "*.ck", "!www.ck"],
            &[],
        );

        assert_eq!(table.len(), 4);
        assert!(table.get(RuleKind::Normal, "uk").is_some());
        assert!(table.get(RuleKind::Normal, "co.uk").is_some());
        assert!(table.get(RuleKind::Wildcard, "ck").is_some());
        assert!(table.get(RuleKind::Exception, "www.ck").is_some());
        assert!(table.get(RuleKind::Normal, "ck").is_none());
        assert_eq!(table.rules(RuleKind::Normal).count(), 2);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = RuleTable::from_lines(["CO.UK"], &[]);
        assert!(table.get(RuleKind::Normal, "co.uk").is_some());
        assert!(table.get(RuleKind::Normal, "Co.Uk").is_some());
    }

    #[test]
    fn test_duplicate_names_last_write_wins() {
        let table = RuleTable::from_lines(["Example.Org", "example.org"], &[]);
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get(RuleKind::Normal, "EXAMPLE.ORG").unwrap().name(),
            "example.org"
        );
    }

    #[test]
    fn test_excluded_suffixes() {
        let table = RuleTable::from_lines(["tk", "com"], &[".TK".to_string(), " ".to_string()]);
        assert!(table.is_excluded("tk"));
        assert!(table.is_excluded("TK"));
        assert!(!table.is_excluded("com"));
        assert!(!table.is_excluded(""));
        assert_eq!(table.excluded_suffixes().count(), 1);
    }

    #[test]
    fn test_embedded_list_is_shared() {
        let first = RuleTable::embedded(&[]);
        let second = RuleTable::embedded(&["com".to_string()]);

        assert!(!first.is_empty());
        assert!(Arc::ptr_eq(&first.rules, &second.rules));
        assert!(first.get(RuleKind::Normal, "co.uk").is_some());
        assert!(first.get(RuleKind::Wildcard, "kawasaki.jp").is_some());
        assert!(first.get(RuleKind::Exception, "city.kawasaki.jp").is_some());
        assert!(!first.is_excluded("com"));
        assert!(second.is_excluded("com"));
    }

    #[test]
    fn test_embedded_list_is_complete() {
        let table = RuleTable::embedded(&[]);
        assert!(table.len() > 9000, "only {} rules bundled", table.len());
        for name in ["me", "top", "live", "club", "icu", "web.app", "uk.com"] {
            assert!(table.get(RuleKind::Normal, name).is_some(), "{name} missing");
        }
    }

    #[test]
    fn test_unicode_rules_and_exclusions_are_punycode() {
        let table = RuleTable::from_lines(["рф", "*.公司.香港"], &["РФ".to_string()]);
        assert!(table.get(RuleKind::Normal, "xn--p1ai").is_some());
        assert!(table.rules(RuleKind::Wildcard).count() == 1);
        assert!(table.is_excluded("xn--p1ai"));
    }

    #[tokio::test]
    async fn test_load_none_is_empty() {
        let table = RuleTable::load(&RuleSource::None, &[]).await.unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_load_blank_path_or_url_is_empty() {
        let table = RuleTable::load(&RuleSource::LocalFile { path: "".to_string() }, &[])
            .await
            .unwrap();
        assert!(table.is_empty());

        let table = RuleTable::load(&RuleSource::RemoteUrl { url: " ".to_string() }, &[])
            .await
            .unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_load_local_file() {
        let path = std::env::temp_dir().join(format!(
            "domain-checker-rules-{}.dat",
            std::process::id()
        ));
        std::fs::write(&path, "// local list\ncom\n*.bd\n!www.bd\n").unwrap();

        let source = RuleSource::LocalFile {
            path: path.to_string_lossy().to_string(),
        };
        let table = RuleTable::load(&source, &[]).await.unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(table.len(), 3);
        assert!(table.get(RuleKind::Wildcard, "bd").is_some());
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let source = RuleSource::LocalFile {
            path: "/nonexistent/domain-checker/rules.dat".to_string(),
        };
        let err = RuleTable::load(&source, &[]).await.unwrap_err();
        assert!(matches!(err, RuleTableError::Io { .. }));
    }

    #[tokio::test]
    async fn test_load_remote_url() {
        let base = serve_http(vec![(
            200,
            vec![],
            "// remote list\nnet\nuk\nco.uk\n".to_string(),
        )])
        .await;

        let source = RuleSource::RemoteUrl {
            url: format!("{base}/public_suffix_list.dat"),
        };
        let table = RuleTable::load(&source, &[]).await.unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.get(RuleKind::Normal, "co.uk").is_some());
    }

    #[tokio::test]
    async fn test_load_remote_error_status_fails() {
        let base = serve_http(vec![(404, vec![], "missing".to_string())]).await;
        let source = RuleSource::RemoteUrl {
            url: format!("{base}/missing.dat"),
        };
        let err = RuleTable::load(&source, &[]).await.unwrap_err();
        assert!(matches!(err, RuleTableError::Http { .. }));
    }

    #[test]
    fn test_rule_source_yaml() {
        let source: RuleSource =
            serde_yaml::from_str("type: LocalFile\npath: /etc/psl.dat\n").unwrap();
        assert_eq!(
            source,
            RuleSource::LocalFile {
                path: "/etc/psl.dat".to_string()
            }
        );
        let source: RuleSource = serde_yaml::from_str("type: Embedded\n").unwrap();
        assert_eq!(source, RuleSource::Embedded);
    }
}
