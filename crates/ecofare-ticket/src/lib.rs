//! Ecofare Ticket: raw ticket encoding to canonical JourneyDraft
//!
//! This crate turns whatever a rider scanned or typed into a validated
//! [`JourneyDraft`]:
//!
//! ```text
//! raw → length/denylist → sniff encoding → resolve stations → distance → invariants
//! ```
//!
//! Parsing is pure given the same input, station snapshot and `now`.
//!
//! # Example
//!
//! ```
//! use ecofare_core::TicketConfig;
//! use ecofare_ticket::{RawTicket, Station, StationCatalog, TicketParser};
//! use chrono::{TimeZone, Utc};
//! use std::sync::Arc;
//!
//! let catalog = StationCatalog::new(vec![
//!     Station::new("CAI", "Cais do Sodre", 38.7060, -9.1447),
//!     Station::new("ORI", "Oriente", 38.7678, -9.0990),
//! ]).unwrap();
//! let parser = TicketParser::new(Arc::new(catalog), TicketConfig::default());
//!
//! let now = Utc.with_ymd_and_hms(2026, 5, 12, 9, 30, 0).unwrap();
//! let draft = parser.parse(&RawTicket::from("TRANSIT:CAI:ORI:1778576400"), now).unwrap();
//! assert_eq!(draft.to_station.as_str(), "ORI");
//! ```

pub mod formats;
pub mod geo;
pub mod sanitizer;
pub mod stations;

pub use formats::{DecodedTicket, TicketFields};
pub use stations::{CatalogError, Station, StationCatalog, StationDirectory};

use chrono::{DateTime, Utc};
use ecofare_core::{Fingerprint, InvariantViolation, JourneyDraft, TicketConfig};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while turning a raw ticket into a JourneyDraft
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TicketError {
    #[error("TICKET/MALFORMED: {0}")]
    Malformed(String),

    #[error("TICKET/UNSAFE: payload matches denylisted pattern '{pattern}'")]
    UnsafeContent { pattern: String },

    #[error("TICKET/UNSUPPORTED_FORMAT: no supported ticket encoding matched")]
    UnsupportedFormat,

    #[error("TICKET/UNKNOWN_STATION: '{0}'")]
    UnknownStation(String),

    #[error("TICKET/INVALID_JOURNEY: {0}")]
    InvalidJourney(#[from] InvariantViolation),
}

/// What the rider presented: typed text or a payload decoded from an image
#[derive(Debug, Clone, PartialEq)]
pub enum RawTicket {
    Text(String),
    Bytes(Vec<u8>),
}

impl RawTicket {
    /// The payload as text; image payloads must be UTF-8
    pub fn as_text(&self) -> Result<&str, TicketError> {
        match self {
            RawTicket::Text(text) => Ok(text),
            RawTicket::Bytes(bytes) => std::str::from_utf8(bytes)
                .map_err(|_| TicketError::Malformed("ticket payload is not text".to_string())),
        }
    }
}

impl From<&str> for RawTicket {
    fn from(text: &str) -> Self {
        RawTicket::Text(text.to_string())
    }
}

impl From<String> for RawTicket {
    fn from(text: String) -> Self {
        RawTicket::Text(text)
    }
}

impl From<Vec<u8>> for RawTicket {
    fn from(bytes: Vec<u8>) -> Self {
        RawTicket::Bytes(bytes)
    }
}

/// Parser and validator bound to a station directory snapshot
#[derive(Clone)]
pub struct TicketParser {
    directory: Arc<dyn StationDirectory>,
    limits: TicketConfig,
}

impl TicketParser {
    pub fn new(directory: Arc<dyn StationDirectory>, limits: TicketConfig) -> Self {
        Self { directory, limits }
    }

    /// Parse and validate a raw ticket against `now`
    pub fn parse(&self, raw: &RawTicket, now: DateTime<Utc>) -> Result<JourneyDraft, TicketError> {
        let text = raw.as_text()?;
        sanitizer::check_length(text, &self.limits)?;
        sanitizer::check_denylist(text)?;

        let decoded = formats::decode(text)?;
        let fingerprint = Fingerprint::of(decoded.canonical.as_bytes());
        tracing::debug!(
            format = %decoded.format,
            fingerprint = fingerprint.short(),
            "ticket decoded"
        );

        let fields = decoded.fields;
        let from = self.resolve(&fields.from)?;
        let to = self.resolve(&fields.to)?;

        let distance_meters = match fields.distance_meters {
            Some(d) => u32::try_from(d).unwrap_or(u32::MAX),
            None => geo::great_circle_meters(from.coordinates, to.coordinates).round() as u32,
        };

        let duration_seconds = fields
            .duration_seconds
            .map(|d| {
                u32::try_from(d)
                    .map_err(|_| TicketError::Malformed(format!("duration {}s out of range", d)))
            })
            .transpose()?;

        let draft = JourneyDraft {
            from_station: from.id,
            to_station: to.id,
            distance_meters,
            observed_at: fields.timestamp.unwrap_or(now),
            raw_encoding_fingerprint: fingerprint,
            source_format: decoded.format,
            duration_seconds,
        };

        draft.validate(now, &self.limits)?;
        Ok(draft)
    }

    fn resolve(&self, reference: &str) -> Result<Station, TicketError> {
        self.directory
            .resolve(reference)
            .ok_or_else(|| TicketError::UnknownStation(reference.to_string()))
    }
}
