//! base64-wrapped tickets
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref BASE64_BODY: Regex = Regex::new(r"^[A-Za-z0-9+/_-]{8,}={0,2}$").unwrap();
}

/// Decode a base64 body into UTF-8 text, `None` when it is not one
pub(super) fn unwrap(text: &str) -> Option<String> {
    if !BASE64_BODY.is_match(text) {
        return None;
    }

    [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(text).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
