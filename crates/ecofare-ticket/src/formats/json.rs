//! JSON object tickets
use super::{parse_timestamp, require_station, TicketFields};
use crate::{sanitizer, TicketError};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct JsonTicket {
    #[serde(default, alias = "fromStation", alias = "origin")]
    from: Option<StationRef>,
    #[serde(default, alias = "toStation", alias = "destination")]
    to: Option<StationRef>,
    #[serde(default, alias = "ts", alias = "observedAt")]
    timestamp: Option<JsonTimestamp>,
    #[serde(default, alias = "distanceMeters")]
    distance: Option<u64>,
    #[serde(default, alias = "durationSeconds")]
    duration: Option<u64>,
}

/// Station ids may be published as numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StationRef {
    Text(String),
    Number(u64),
}

impl StationRef {
    fn into_text(self) -> String {
        match self {
            StationRef::Text(s) => s,
            StationRef::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonTimestamp {
    Number(u64),
    Text(String),
}

pub(super) fn parse(text: &str) -> Result<Option<TicketFields>, TicketError> {
    if !text.starts_with('{') {
        return Ok(None);
    }
    let value: Value = match serde_json::from_str(text) {
        Ok(value @ Value::Object(_)) => value,
        _ => return Ok(None),
    };
    // Escapes such as \u003c only become markup once unescaped
    check_strings(&value)?;

    let ticket: JsonTicket = serde_json::from_value(value)
        .map_err(|e| TicketError::Malformed(format!("invalid JSON ticket: {}", e)))?;

    let timestamp = match ticket.timestamp {
        Some(JsonTimestamp::Number(n)) => Some(parse_timestamp(&n.to_string())?),
        Some(JsonTimestamp::Text(s)) => Some(parse_timestamp(&s)?),
        None => None,
    };

    Ok(Some(TicketFields {
        from: require_station("from", ticket.from.map(StationRef::into_text))?,
        to: require_station("to", ticket.to.map(StationRef::into_text))?,
        timestamp,
        distance_meters: ticket.distance,
        duration_seconds: ticket.duration,
    }))
}

fn check_strings(value: &Value) -> Result<(), TicketError> {
    match value {
        Value::String(s) => sanitizer::check_denylist(s),
        Value::Array(items) => items.iter().try_for_each(check_strings),
        Value::Object(map) => map
            .iter()
            .try_for_each(|(key, v)| sanitizer::check_denylist(key).and_then(|_| check_strings(v))),
        _ => Ok(()),
    }
}
