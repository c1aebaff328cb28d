use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    Normal,
    /// `*.label`: any single label may stand in for the wildcard position
    Wildcard,
    /// `!label`: overrides a wildcard for one explicitly listed name
    Exception,
}

impl RuleKind {
    /// Matching checks kinds in this order.
    pub const ALL: [RuleKind; 3] = [RuleKind::Normal, RuleKind::Wildcard, RuleKind::Exception];
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleKind::Normal => "normal",
            RuleKind::Wildcard => "wildcard",
            RuleKind::Exception => "exception",
        };
        f.write_str(name)
    }
}

/// A single public suffix rule, stored without its `*.` or `!` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    name: String,
    kind: RuleKind,
}

impl Rule {
    /// Classify a rule string by its leading marker.
    pub fn new(rule: &str) -> Self {
        if let Some(name) = rule.strip_prefix("*.") {
            Self {
                name: name.to_string(),
                kind: RuleKind::Wildcard,
            }
        } else if let Some(name) = rule.strip_prefix('!') {
            Self {
                name: name.to_string(),
                kind: RuleKind::Exception,
            }
        } else {
            Self {
                name: rule.to_string(),
                kind: RuleKind::Normal,
            }
        }
    }

    /// Parse one line of a suffix list. Returns `None` for comments and blank lines.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            return None;
        }

        // Only the first token counts; the rest of the line is free text
        let token = line.split_whitespace().next()?;
        let rule = Self::new(token);
        if rule.name.is_empty() {
            return None;
        }
        Some(rule)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Lookup key used by the rule table: lowercase ASCII, with
    /// internationalised labels in punycode to match parsed hosts.
    pub fn key(&self) -> String {
        idna::domain_to_ascii(&self.name).unwrap_or_else(|_| self.name.to_lowercase())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RuleKind::Normal => write!(f, "{}", self.name),
            RuleKind::Wildcard => write!(f, "*.{}", self.name),
            RuleKind::Exception => write!(f, "!{}", self.name),
        }
    }
}
