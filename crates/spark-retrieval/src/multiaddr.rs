//! Multiaddr to HTTP(S) URL translation
//!
//! Supports the subset of multiaddrs that retrieval providers advertise:
//! `/<host-type>/<host>/tcp/<port>/<scheme>`, `/<host-type>/<host>/<scheme>` and
//! either of those followed by `/http-path/<percent-encoded path>`.

use percent_encoding::percent_decode_str;
use spark_error::{MultiaddrError, MultiaddrResult};

const HTTP_PATH: &str = "/http-path";

/// Convert a multiaddr such as `/ip4/127.0.0.1/tcp/80/http` to a URL such as
/// `http://127.0.0.1`.
pub fn multiaddr_to_http_url(addr: &str) -> MultiaddrResult<String> {
    let (multi_addr, http_path) = match addr.split_once(HTTP_PATH) {
        Some((head, tail)) => (head, Some(tail)),
        None => (addr, None),
    };

    let mut segments = multi_addr.split('/');
    segments.next();
    let host_type = segments.next().unwrap_or_default();
    let host_value = segments.next().unwrap_or_default();
    let parts: Vec<&str> = segments.collect();

    let (scheme, port, rest, path) = if let Some(http_path) = http_path {
        let path = decode_http_path(skip_first_char(http_path)).ok_or_else(|| {
            MultiaddrError::InvalidHttpPath {
                addr: addr.to_string(),
            }
        })?;
        (parts.first().copied(), None, tail(&parts, 1), Some(path))
    } else if matches!(parts.first(), Some(&"http") | Some(&"https")) {
        (parts.first().copied(), None, tail(&parts, 1), None)
    } else {
        let ip_protocol = parts.first().copied().unwrap_or_default();
        if ip_protocol != "tcp" {
            return Err(MultiaddrError::UnsupportedProtocol {
                addr: addr.to_string(),
                protocol: ip_protocol.to_string(),
            });
        }
        (parts.get(2).copied(), parts.get(1).copied(), tail(&parts, 3), None)
    };

    let scheme = match scheme {
        Some(scheme @ ("http" | "https")) => scheme,
        other => {
            return Err(MultiaddrError::UnsupportedScheme {
                addr: addr.to_string(),
                scheme: other.unwrap_or_default().to_string(),
            })
        }
    };

    if !rest.is_empty() {
        return Err(MultiaddrError::TooManyParts {
            addr: addr.to_string(),
        });
    }

    let mut url = format!("{}://{}", scheme, uri_host(host_type, host_value)?);
    if let Some(port) = port.filter(|port| !port.is_empty()) {
        url.push_str(&uri_port(scheme, port));
    }
    if let Some(path) = path {
        url.push_str(&path);
    }
    Ok(url)
}

fn tail<'a>(parts: &'a [&'a str], from: usize) -> &'a [&'a str] {
    parts.get(from..).unwrap_or(&[])
}

fn skip_first_char(value: &str) -> &str {
    let mut chars = value.chars();
    chars.next();
    chars.as_str()
}

/// Strict percent-decoding: every `%` must start a valid escape and the result
/// must be UTF-8.
fn decode_http_path(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3)?;
            if !escape.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|path| path.into_owned())
}

fn uri_host(host_type: &str, host_value: &str) -> MultiaddrResult<String> {
    match host_type {
        "ip4" | "dns" | "dns4" | "dns6" => Ok(host_value.to_string()),
        // RFC 2732: literal IPv6 addresses go inside square brackets
        "ip6" => Ok(format!("[{}]", host_value)),
        other => Err(MultiaddrError::UnsupportedHostType {
            host_type: other.to_string(),
        }),
    }
}

fn uri_port(scheme: &str, port: &str) -> String {
    match (scheme, port) {
        ("http", "80") | ("https", "443") => String::new(),
        _ => format!(":{}", port),
    }
}
