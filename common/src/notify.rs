//! Request building for the text-message relay.
//!
//! The relay takes everything in the query string:
//! `GET <endpoint>?phone=<phone>&apikey=<key>&text=<message>`, and answers 200
//! when it accepted the message.

use core::fmt::Write as _;

use crate::config::RelayConfig;

pub const RELAY_SUCCESS_STATUS: u16 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    url: String,
    redacted: String,
}

impl RelayRequest {
    pub fn new(relay: &RelayConfig, message: &str) -> Self {
        let build = |api_key: &str| {
            format!(
                "{}?phone={}&apikey={}&text={}",
                relay.endpoint,
                url_encode(&relay.phone),
                url_encode(api_key),
                url_encode(message)
            )
        };

        Self {
            url: build(&relay.api_key),
            redacted: build("***"),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The same URL with the API key masked, for logs.
    pub fn redacted_url(&self) -> &str {
        &self.redacted
    }
}

pub fn is_success_status(status: u16) -> bool {
    status == RELAY_SUCCESS_STATUS
}

/// Form-style percent encoding: unreserved characters pass through, space
/// becomes `+`, every other UTF-8 byte becomes `%XX`.
pub fn url_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            b' ' => encoded.push('+'),
            _ => {
                let _ = write!(&mut encoded, "%{byte:02X}");
            }
        }
    }
    encoded
}
