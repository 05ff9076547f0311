//! Ticket encodings and structural sniffing.
//!
//! Encodings are tried in priority order and the first structural match
//! wins:
//!
//! ```text
//! colon-delimited → JSON object → base64 (unwrapped once) → URL query
//! ```
//!
//! A match that then fails to yield the required fields is a malformed
//! ticket, not a reason to try the next encoding.

mod colon;
mod json;
mod url;
mod wrapped;

use crate::{sanitizer, TicketError};
use chrono::{DateTime, TimeZone, Utc};
use ecofare_core::SourceFormat;

/// Fields every encoding yields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TicketFields {
    pub from: String,
    pub to: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub distance_meters: Option<u64>,
    pub duration_seconds: Option<u64>,
}

/// A payload successfully dispatched to one encoding
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTicket {
    pub fields: TicketFields,
    pub format: SourceFormat,
    /// Payload the fingerprint is computed over (base64 wrapper removed)
    pub canonical: String,
}

impl DecodedTicket {
    fn plain(fields: TicketFields, format: SourceFormat, text: &str) -> Self {
        Self {
            fields,
            format,
            canonical: text.to_string(),
        }
    }
}

/// Dispatch a sanitised payload to the first matching encoding
pub fn decode(text: &str) -> Result<DecodedTicket, TicketError> {
    let text = text.trim();

    if let Some(fields) = colon::parse(text)? {
        return Ok(DecodedTicket::plain(fields, SourceFormat::ColonDelimited, text));
    }

    if let Some(fields) = json::parse(text)? {
        return Ok(DecodedTicket::plain(fields, SourceFormat::Json, text));
    }

    if let Some(inner) = wrapped::unwrap(text) {
        let inner = inner.trim().to_string();
        sanitizer::check_denylist(&inner)?;
        return match decode_plain(&inner)? {
            Some(fields) => Ok(DecodedTicket {
                fields,
                format: SourceFormat::Base64,
                canonical: inner,
            }),
            None => Err(TicketError::UnsupportedFormat),
        };
    }

    if let Some(fields) = url::parse(text)? {
        return Ok(DecodedTicket::plain(fields, SourceFormat::Url, text));
    }

    Err(TicketError::UnsupportedFormat)
}

/// Every encoding except base64, which is only ever unwrapped once
fn decode_plain(text: &str) -> Result<Option<TicketFields>, TicketError> {
    if let Some(fields) = colon::parse(text)? {
        return Ok(Some(fields));
    }
    if let Some(fields) = json::parse(text)? {
        return Ok(Some(fields));
    }
    url::parse(text)
}

/// Parse a ticket timestamp.
///
/// 9-11 digits are unix seconds, 12-14 digits unix milliseconds, anything
/// else must be RFC 3339.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TicketError> {
    let raw = raw.trim();
    let malformed = || TicketError::Malformed(format!("unreadable timestamp '{}'", raw));

    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        let value: i64 = raw.parse().map_err(|_| malformed())?;
        let parsed = match raw.len() {
            9..=11 => Utc.timestamp_opt(value, 0).single(),
            12..=14 => Utc.timestamp_millis_opt(value).single(),
            _ => None,
        };
        return parsed.ok_or_else(malformed);
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| malformed())
}

/// Parse an optional non-negative integer field
pub(crate) fn parse_number(name: &str, raw: &str) -> Result<u64, TicketError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| TicketError::Malformed(format!("field '{}' is not a whole number: '{}'", name, raw)))
}

/// Require a non-blank station field
pub(crate) fn require_station(name: &str, value: Option<String>) -> Result<String, TicketError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(TicketError::Malformed(format!("missing '{}' station", name))),
    }
}
