use crate::domain_utils::DomainUtils;
use crate::error::ParseError;
use crate::rule::{Rule, RuleKind};
use crate::rule_table::RuleTable;
use serde::Serialize;
use std::sync::Arc;

/// A domain split into subdomain, second-level domain and public suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedDomain {
    pub tld: String,
    pub sld: String,
    pub subdomain: String,
    pub matched_rule: Option<Arc<Rule>>,
    pub is_valid: bool,
    pub is_excluded: bool,
}

impl ParsedDomain {
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Placeholder used when parsing is switched off: never valid, always
    /// excluded, so nothing downstream runs.
    pub fn skipped() -> Self {
        Self {
            is_excluded: true,
            ..Self::default()
        }
    }

    /// `sld.tld`, the name a registrant actually owns.
    pub fn registrable_domain(&self) -> Option<String> {
        if !self.is_valid {
            return None;
        }
        Some(format!("{}.{}", self.sld, self.tld))
    }

    /// Whether the host is, or sits under, one of the listed domains.
    pub fn hits_domain_list(&self, domain_list: &[String]) -> bool {
        self.hostname()
            .is_some_and(|host| DomainUtils::matches_domain_list(&host, domain_list))
    }

    /// Reassemble the full host name.
    pub fn hostname(&self) -> Option<String> {
        let registrable = self.registrable_domain()?;
        if self.subdomain.is_empty() {
            Some(registrable)
        } else {
            Some(format!("{}.{}", self.subdomain, registrable))
        }
    }
}

/// Splits host names against a shared [`RuleTable`] using longest-match
/// public suffix semantics.
#[derive(Debug, Clone)]
pub struct DomainParser {
    table: Arc<RuleTable>,
}

impl DomainParser {
    pub fn new(table: Arc<RuleTable>) -> Self {
        Self { table }
    }

    /// Reduce a URL or host to the lowercase host without scheme, port or `www.`.
    pub fn normalize(&self, url: &str) -> Result<String, ParseError> {
        let host = DomainUtils::host_from_url(url)?;
        Ok(DomainUtils::canonicalize_domain(&host))
    }

    /// Find the best rule for `domain`. Every suffix of the domain is tried
    /// against every rule kind and the longest matching rule name wins.
    pub fn find_matching_rule(&self, domain: &str) -> Option<Arc<Rule>> {
        let mut candidate = String::new();
        let mut best: Option<&Arc<Rule>> = None;

        for label in domain.rsplit('.') {
            candidate = if candidate.is_empty() {
                label.to_string()
            } else {
                format!("{label}.{candidate}")
            };

            for kind in RuleKind::ALL {
                let matched = self.table.get(kind, &candidate);
                log::debug!(
                    "Domain part {candidate} matched {} {kind} rules",
                    usize::from(matched.is_some())
                );

                if let Some(rule) = matched {
                    // Strictly longer only: on equal length the earlier kind stays
                    if best.map_or(true, |b| rule.name().len() > b.name().len()) {
                        best = Some(rule);
                    }
                }
            }
        }

        match best {
            Some(rule) => log::debug!("Best match for {domain} is the {} rule {rule}", rule.kind()),
            None => log::debug!("No rules matched domain: {domain}"),
        }

        best.cloned()
    }

    /// Decompose `input`, reporting why it failed.
    pub fn try_parse(&self, input: &str) -> Result<ParsedDomain, ParseError> {
        let domain = self.normalize(input)?;
        if domain.split('.').any(str::is_empty) {
            return Err(ParseError::EmptyLabel(domain));
        }

        let rule = self
            .find_matching_rule(&domain)
            .ok_or_else(|| ParseError::UnrecognizedTld(domain.clone()))?;

        let split_at = Self::suffix_boundary(&domain, &rule)?;
        let rest = &domain[..split_at];
        let tld = &domain[split_at + 1..];

        let (subdomain, sld) = match rest.rsplit_once('.') {
            Some((subdomain, sld)) => (subdomain, sld),
            None => ("", rest),
        };

        Ok(ParsedDomain {
            tld: tld.to_string(),
            sld: sld.to_string(),
            subdomain: subdomain.to_string(),
            is_excluded: self.table.is_excluded(tld),
            matched_rule: Some(rule),
            is_valid: true,
        })
    }

    /// Decompose `input`. Never fails: errors are logged and come back as
    /// an invalid [`ParsedDomain`].
    pub fn parse(&self, input: &str) -> ParsedDomain {
        match self.try_parse(input) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Could not parse domain '{}': {e}", input.trim());
                let is_excluded = matches!(
                    &e,
                    ParseError::NoRegistrableLabel { suffix, .. } if self.table.is_excluded(suffix)
                );
                ParsedDomain {
                    is_excluded,
                    ..ParsedDomain::invalid()
                }
            }
        }
    }

    /// Byte index of the dot separating the registrable part from the suffix.
    fn suffix_boundary(domain: &str, rule: &Rule) -> Result<usize, ParseError> {
        let key = rule.key();
        let missing = |suffix: &str| ParseError::NoRegistrableLabel {
            domain: domain.to_string(),
            suffix: suffix.to_string(),
        };

        match rule.kind() {
            RuleKind::Normal => domain
                .strip_suffix(&format!(".{key}"))
                .map(str::len)
                .ok_or_else(|| missing(&key)),
            RuleKind::Wildcard => {
                // The label matched by `*` belongs to the suffix as well
                let head = domain
                    .strip_suffix(&format!(".{key}"))
                    .ok_or_else(|| missing(&key))?;
                head.rfind('.').ok_or_else(|| missing(domain))
            }
            // Only the final label is split off
            RuleKind::Exception => domain.rfind('.').ok_or_else(|| missing(domain)),
        }
    }
}
