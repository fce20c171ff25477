// Status-code classification
// Maps every failure to one of a closed set of numeric codes

use crate::{error_chain_message, SparkError};

/// Stable numeric status codes reported for failed checks.
///
/// These values are a wire contract for downstream analytics and must not be
/// renumbered.
pub struct StatusCode;

impl StatusCode {
    /// Fallback for anything unrecognized
    pub const UNKNOWN_ERROR: u16 = 600;

    // 7xx: multiaddr translation
    pub const UNSUPPORTED_MULTIADDR_HOST_TYPE: u16 = 701;
    pub const UNSUPPORTED_MULTIADDR_PROTO: u16 = 702;
    pub const UNSUPPORTED_MULTIADDR_SCHEME: u16 = 703;
    pub const MULTIADDR_HAS_TOO_MANY_PARTS: u16 = 704;
    pub const INVALID_HTTP_PATH: u16 = 705;

    // 8xx: network connection
    pub const DNS_ERROR: u16 = 801;
    pub const TCP_CONNECT_ERROR: u16 = 802;

    // 9xx: content verification
    pub const UNSUPPORTED_HASH: u16 = 901;
    pub const HASH_MISMATCH: u16 = 902;
    pub const UNEXPECTED_CAR_BLOCK: u16 = 903;
    pub const CANNOT_PARSE_CAR_BYTES: u16 = 904;
}

/// Substrings searched for in transport error text, in order.
///
/// The HTTP stack does not expose structured connect errors, so this is a
/// best-effort match on the wording of its connector.
pub const TRANSPORT_PATTERNS: &[(&str, u16)] = &[
    ("dns error", StatusCode::DNS_ERROR),
    ("tcp connect error", StatusCode::TCP_CONNECT_ERROR),
];

/// Look up the status code for a stable error code
pub fn status_for_code(code: &str) -> Option<u16> {
    let status = match code {
        "UNSUPPORTED_MULTIADDR_HOST_TYPE" => StatusCode::UNSUPPORTED_MULTIADDR_HOST_TYPE,
        "UNSUPPORTED_MULTIADDR_PROTO" => StatusCode::UNSUPPORTED_MULTIADDR_PROTO,
        "UNSUPPORTED_MULTIADDR_SCHEME" => StatusCode::UNSUPPORTED_MULTIADDR_SCHEME,
        "MULTIADDR_HAS_TOO_MANY_PARTS" => StatusCode::MULTIADDR_HAS_TOO_MANY_PARTS,
        "INVALID_HTTP_PATH" => StatusCode::INVALID_HTTP_PATH,
        "UNSUPPORTED_HASH" => StatusCode::UNSUPPORTED_HASH,
        "HASH_MISMATCH" => StatusCode::HASH_MISMATCH,
        "UNEXPECTED_CAR_BLOCK" => StatusCode::UNEXPECTED_CAR_BLOCK,
        "CANNOT_PARSE_CAR_BYTES" => StatusCode::CANNOT_PARSE_CAR_BYTES,
        _ => return None,
    };
    Some(status)
}

/// Classify free-form error text using the transport substring table
pub fn classify_message(message: &str) -> u16 {
    TRANSPORT_PATTERNS
        .iter()
        .find(|(pattern, _)| message.contains(pattern))
        .map(|(_, status)| *status)
        .unwrap_or(StatusCode::UNKNOWN_ERROR)
}

/// Map an error to its status code. Never fails: unmapped errors yield 600.
pub fn classify<E: SparkError>(err: &E) -> u16 {
    status_for_code(err.error_code())
        .unwrap_or_else(|| classify_message(&error_chain_message(err)))
}
