//! Input sanitisation for raw tickets.
//!
//! Runs before any format sniffing:
//! - Length bounds
//! - Script/markup injection denylist
//!
//! Also hosts the key normalisation used for station lookups.

use crate::TicketError;
use ecofare_core::TicketConfig;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Script and markup injection patterns, checked in order
    static ref DENYLIST: Vec<(&'static str, Regex)> = vec![
        ("script_tag", Regex::new(r"(?i)<\s*/?\s*script").unwrap()),
        ("markup_embed", Regex::new(r"(?i)<\s*(iframe|object|embed|svg|img|link|meta|style)\b").unwrap()),
        ("javascript_uri", Regex::new(r"(?i)javascript\s*:").unwrap()),
        ("vbscript_uri", Regex::new(r"(?i)vbscript\s*:").unwrap()),
        ("html_data_uri", Regex::new(r"(?i)data\s*:\s*text/html").unwrap()),
        ("event_handler", Regex::new(r"(?i)\bon[a-z]+\s*=").unwrap()),
        ("eval_call", Regex::new(r"(?i)\beval\s*\(").unwrap()),
        ("css_expression", Regex::new(r"(?i)\bexpression\s*\(").unwrap()),
        ("document_access", Regex::new(r"(?i)document\s*\.\s*(cookie|write|location)").unwrap()),
    ];

    /// Multiple whitespace pattern
    static ref MULTI_SPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Reject empty and out-of-bounds payloads
pub fn check_length(text: &str, limits: &TicketConfig) -> Result<(), TicketError> {
    if text.trim().is_empty() {
        return Err(TicketError::Malformed("ticket is empty".to_string()));
    }

    let len = text.chars().count();
    if len < limits.min_length || len > limits.max_length {
        return Err(TicketError::Malformed(format!(
            "ticket length {} outside {}..={}",
            len, limits.min_length, limits.max_length
        )));
    }

    Ok(())
}

/// Reject payloads that carry script or markup
pub fn check_denylist(text: &str) -> Result<(), TicketError> {
    match DENYLIST.iter().find(|(_, re)| re.is_match(text)) {
        Some((name, _)) => Err(TicketError::UnsafeContent {
            pattern: (*name).to_string(),
        }),
        None => Ok(()),
    }
}

/// Normalise a station name or id for lookup
pub fn normalize_key(text: &str) -> String {
    let lowered = text.trim().to_lowercase().replace(['_', '-'], " ");
    MULTI_SPACE.replace_all(lowered.trim(), " ").to_string()
}
