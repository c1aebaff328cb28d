use crate::error::ParseError;
use url::Url;

/// Host extraction and canonicalisation helpers
pub struct DomainUtils;

impl DomainUtils {
    /// Extract the lowercase host from a URL or bare host name.
    /// Port, path and a trailing FQDN dot are dropped.
    pub fn host_from_url(input: &str) -> Result<String, ParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ParseError::InvalidArgument);
        }

        let parsed = if trimmed.contains("://") {
            Url::parse(trimmed)
        } else {
            Url::parse(&format!("http://{trimmed}"))
        }
        .map_err(|e| ParseError::InvalidUrl(format!("{trimmed}: {e}")))?;

        let host = parsed
            .host_str()
            .ok_or_else(|| ParseError::InvalidUrl(format!("{trimmed}: URL has no host")))?;

        let host = host.strip_suffix('.').unwrap_or(host);
        Ok(host.to_lowercase())
    }

    /// Check if domain matches any in list (with hierarchy support)
    pub fn matches_domain_list(domain: &str, domain_list: &[String]) -> bool {
        let domain_lower = domain.to_lowercase();

        domain_list.iter().any(|pattern| {
            let pattern_lower = pattern.trim_start_matches('.').to_lowercase();
            domain_lower == pattern_lower || domain_lower.ends_with(&format!(".{pattern_lower}"))
        })
    }

    /// Canonicalize domain (remove www prefix)
    pub fn canonicalize_domain(domain: &str) -> String {
        let domain_lower = domain.to_lowercase();
        if let Some(stripped) = domain_lower.strip_prefix("www.") {
            stripped.to_string()
        } else {
            domain_lower
        }
    }
}
