//! URL tickets: `https://host/path?from=..&to=..&ts=..&distance=..&duration=..`
use super::{parse_number, parse_timestamp, require_station, TicketFields};
use crate::{sanitizer, TicketError};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref URL_TICKET: Regex = Regex::new(r"^(?i)https?://[^\s?#/]+[^\s?#]*\?(?P<query>[^\s#]+)(?:#\S*)?$").unwrap();
}

pub(super) fn parse(text: &str) -> Result<Option<TicketFields>, TicketError> {
    let query = match URL_TICKET.captures(text) {
        Some(caps) => caps["query"].to_string(),
        None => return Ok(None),
    };

    let mut params: HashMap<String, String> = HashMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key)?.to_lowercase();
        let value = decode_component(value)?;
        params.entry(key).or_insert(value);
    }

    let lookup = |keys: &[&str]| keys.iter().find_map(|k| params.get(*k).cloned());

    let timestamp = lookup(&["ts", "timestamp", "t"][..])
        .map(|ts| parse_timestamp(&ts))
        .transpose()?;
    let distance_meters = lookup(&["distance", "distance_m"][..])
        .map(|d| parse_number("distance", &d))
        .transpose()?;
    let duration_seconds = lookup(&["duration", "duration_s"][..])
        .map(|d| parse_number("duration", &d))
        .transpose()?;

    Ok(Some(TicketFields {
        from: require_station("from", lookup(&["from", "origin"][..]))?,
        to: require_station("to", lookup(&["to", "destination"][..]))?,
        timestamp,
        distance_meters,
        duration_seconds,
    }))
}

/// Percent-decode one key or value; the decoded text must pass the denylist too
fn decode_component(raw: &str) -> Result<String, TicketError> {
    let decoded = urlencoding::decode(&raw.replace('+', " "))
        .map(|s| s.into_owned())
        .map_err(|_| TicketError::Malformed("query parameter is not valid UTF-8".to_string()))?;
    sanitizer::check_denylist(&decoded)?;
    Ok(decoded)
}
