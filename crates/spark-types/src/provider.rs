//! Retrieval providers as advertised by the content-routing index

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Retrieval protocol advertised by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Bitswap,
    Graphsync,
    Http,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Bitswap => "bitswap",
            Protocol::Graphsync => "graphsync",
            Protocol::Http => "http",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the index query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexerResult {
    /// An HTTP advertisement was found for the provider
    Ok,
    /// Only a Graphsync advertisement was found
    HttpNotAdvertised,
    /// Nothing usable was advertised by the provider
    NoValidAdvertisement,
    /// The index answered with this HTTP status after all retries
    Error(u16),
    /// The index could not be reached at all
    ErrorFetch,
}

impl IndexerResult {
    /// Whether the result carries a provider to retrieve from
    pub fn provider_found(&self) -> bool {
        matches!(self, IndexerResult::Ok | IndexerResult::HttpNotAdvertised)
    }
}

impl fmt::Display for IndexerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexerResult::Ok => f.write_str("OK"),
            IndexerResult::HttpNotAdvertised => f.write_str("HTTP_NOT_ADVERTISED"),
            IndexerResult::NoValidAdvertisement => f.write_str("NO_VALID_ADVERTISEMENT"),
            IndexerResult::Error(status) => write!(f, "ERROR_{}", status),
            IndexerResult::ErrorFetch => f.write_str("ERROR_FETCH"),
        }
    }
}

impl FromStr for IndexerResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(IndexerResult::Ok),
            "HTTP_NOT_ADVERTISED" => Ok(IndexerResult::HttpNotAdvertised),
            "NO_VALID_ADVERTISEMENT" => Ok(IndexerResult::NoValidAdvertisement),
            "ERROR_FETCH" => Ok(IndexerResult::ErrorFetch),
            other => other
                .strip_prefix("ERROR_")
                .and_then(|status| status.parse().ok())
                .map(IndexerResult::Error)
                .ok_or_else(|| format!("unknown indexer result \"{}\"", other)),
        }
    }
}

impl Serialize for IndexerResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IndexerResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// A retrieval endpoint selected from the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    /// Multiaddr of the endpoint
    pub address: String,
    pub protocol: Protocol,
}

/// Result of querying the index for a (CID, provider) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub indexer_result: IndexerResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
}

impl ProviderResult {
    /// A result without a provider
    pub fn without_provider(indexer_result: IndexerResult) -> Self {
        Self {
            indexer_result,
            provider: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexer_result_strings() {
        let cases = [
            (IndexerResult::Ok, "OK"),
            (IndexerResult::HttpNotAdvertised, "HTTP_NOT_ADVERTISED"),
            (IndexerResult::NoValidAdvertisement, "NO_VALID_ADVERTISEMENT"),
            (IndexerResult::Error(503), "ERROR_503"),
            (IndexerResult::ErrorFetch, "ERROR_FETCH"),
        ];
        for (result, text) in cases {
            assert_eq!(result.to_string(), text);
            assert_eq!(text.parse::<IndexerResult>().unwrap(), result);
            assert_eq!(serde_json::to_string(&result).unwrap(), format!("\"{}\"", text));
        }
        assert!("ERROR_teapot".parse::<IndexerResult>().is_err());
    }

    #[test]
    fn test_provider_found() {
        assert!(IndexerResult::Ok.provider_found());
        assert!(IndexerResult::HttpNotAdvertised.provider_found());
        assert!(!IndexerResult::NoValidAdvertisement.provider_found());
        assert!(!IndexerResult::Error(500).provider_found());
    }

    #[test]
    fn test_provider_result_without_provider_omits_field() {
        let json = serde_json::to_string(&ProviderResult::without_provider(
            IndexerResult::NoValidAdvertisement,
        ))
        .unwrap();
        assert_eq!(json, r#"{"indexerResult":"NO_VALID_ADVERTISEMENT"}"#);
    }
}
