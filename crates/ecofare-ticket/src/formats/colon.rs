//! Colon-delimited fixed-field tickets: `PREFIX:from:to:timestamp[:distance[:duration]]`
use super::{parse_number, parse_timestamp, require_station, TicketFields};
use crate::TicketError;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref COLON_TICKET: Regex = Regex::new(
        r"^(?P<prefix>[A-Z]{2,12}):(?P<from>[^:/]+):(?P<to>[^:/]+):(?P<ts>\d+)(?::(?P<distance>\d+))?(?::(?P<duration>\d+))?$"
    ).unwrap();
}

pub(super) fn parse(text: &str) -> Result<Option<TicketFields>, TicketError> {
    let caps = match COLON_TICKET.captures(text) {
        Some(caps) => caps,
        None => return Ok(None),
    };

    let field = |name: &str| caps.name(name).map(|m| m.as_str().to_string());

    Ok(Some(TicketFields {
        from: require_station("from", field("from"))?,
        to: require_station("to", field("to"))?,
        timestamp: Some(parse_timestamp(&caps["ts"])?),
        distance_meters: field("distance")
            .map(|d| parse_number("distance", &d))
            .transpose()?,
        duration_seconds: field("duration")
            .map(|d| parse_number("duration", &d))
            .transpose()?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_colon_ticket() {
        let fields = parse("TRANSIT:CAI:ORI:1778576400").unwrap().unwrap();
        assert_eq!(fields.from, "CAI");
        assert_eq!(fields.to, "ORI");
        assert!(fields.timestamp.is_some());
        assert_eq!(fields.distance_meters, None);
    }

    #[test]
    fn test_full_colon_ticket() {
        let fields = parse("METRO:Cais do Sodre:Oriente:1778576400000:8100:960")
            .unwrap()
            .unwrap();
        assert_eq!(fields.from, "Cais do Sodre");
        assert_eq!(fields.distance_meters, Some(8_100));
        assert_eq!(fields.duration_seconds, Some(960));
    }

    #[test]
    fn test_urls_do_not_match() {
        assert_eq!(parse("https://tickets.example/scan?from=A&to=B").unwrap(), None);
        assert_eq!(parse("https://host:8080/x:y:1778576400").unwrap(), None);
    }

    #[test]
    fn test_bad_timestamp_is_malformed() {
        assert!(matches!(
            parse("TRANSIT:CAI:ORI:12345"),
            Err(TicketError::Malformed(_))
        ));
    }

    #[test]
    fn test_blank_station_is_malformed() {
        assert!(matches!(
            parse("TRANSIT: :ORI:1778576400"),
            Err(TicketError::Malformed(_))
        ));
    }
}
