//! Hostname and MOTD banner extraction/substitution for device config text.
//!
//! The engine works on plain strings only. It never fails: a directive that
//! is not present parses as an empty value and is left alone on reassembly.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Literal two-character marker delimiting a banner block
pub const BANNER_SENTINEL: &str = "^C";

lazy_static::lazy_static! {
    // `hostname`, horizontal whitespace, then the token. Anchored at line start.
    static ref HOSTNAME_PATTERN: Regex = Regex::new(r"(?m)^hostname[^\S\r\n]+(\S+)").unwrap();

    // Opener through the first closing sentinel; the body may span lines.
    static ref MOTD_PATTERN: Regex = Regex::new(r"(?ms)^banner motd \^C\s*(.*?)\s*\^C").unwrap();
}

/// Fields projected out of a configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFields {
    /// Hostname token, empty when there is no `hostname` directive
    pub hostname: String,
    /// Banner body with surrounding whitespace trimmed, empty when absent
    pub motd: String,
}

/// New values to substitute into a document. `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldUpdate {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub motd: Option<String>,
}

impl FieldUpdate {
    /// Update both fields
    pub fn new(hostname: impl Into<String>, motd: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            motd: Some(motd.into()),
        }
    }

    pub fn hostname(hostname: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            motd: None,
        }
    }

    pub fn motd(motd: impl Into<String>) -> Self {
        Self {
            hostname: None,
            motd: Some(motd.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hostname.is_none() && self.motd.is_none()
    }
}

impl From<ParsedFields> for FieldUpdate {
    fn from(fields: ParsedFields) -> Self {
        Self::new(fields.hostname, fields.motd)
    }
}

/// Extract the first hostname directive and the first banner block.
pub fn parse(document: &str) -> ParsedFields {
    let hostname = HOSTNAME_PATTERN
        .captures(document)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let motd = MOTD_PATTERN
        .captures(document)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    ParsedFields { hostname, motd }
}

/// Substitute the requested fields into `original`.
///
/// Only the first hostname directive and the first banner block are
/// rewritten, each in its canonical form. Text outside those spans is copied
/// through byte for byte. Missing directives are never created.
pub fn reassemble(update: &FieldUpdate, original: &str) -> String {
    let mut content = original.to_string();

    if let Some(hostname) = &update.hostname {
        content = replace_first(&HOSTNAME_PATTERN, &content, &render_hostname(hostname));
    }

    if let Some(motd) = &update.motd {
        content = replace_first(&MOTD_PATTERN, &content, &render_banner(motd));
    }

    content
}

/// Canonical hostname directive
pub fn render_hostname(hostname: &str) -> String {
    format!("hostname {}", hostname)
}

/// Canonical banner block, opener through closing sentinel
pub fn render_banner(motd: &str) -> String {
    format!(
        "banner motd {sentinel}\n{motd}\n{sentinel}",
        sentinel = BANNER_SENTINEL,
        motd = motd
    )
}

fn replace_first(pattern: &Regex, content: &str, replacement: &str) -> String {
    match pattern.find(content) {
        Some(m) => {
            let mut out = String::with_capacity(content.len() + replacement.len());
            out.push_str(&content[..m.start()]);
            out.push_str(replacement);
            out.push_str(&content[m.end()..]);
            out
        }
        None => content.to_string(),
    }
}
