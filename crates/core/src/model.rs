use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Connection status string `sdm` reports for an open tunnel.
pub const CONNECTED_STATUS: &str = "connected";

/// A resource reachable through `sdm`, as kept in the local cache.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DataSource {
    /// Unique name, used as the cache key.
    pub name: String,
    pub status: String,
    /// Connection target, or the tool's human-readable location when it has none.
    pub address: String,
    /// Resource category such as `postgres`, `httpNoAuth` or `rawtcp`.
    pub kind: String,
    pub tags: String,
    pub web_url: Option<String>,
    /// Unix timestamp of the last successful connect, zero if never used.
    pub last_used_at: i64,
}

impl DataSource {
    pub fn key(&self) -> &str {
        &self.name
    }

    pub fn is_connected(&self) -> bool {
        self.status == CONNECTED_STATUS
    }

    pub fn is_web(&self) -> bool {
        self.web_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    /// Whether a connect should open the address in a browser rather than
    /// copying it to the clipboard.
    pub fn opens_in_browser(&self) -> bool {
        self.address.starts_with("http")
    }

    pub fn status_icon(&self) -> &'static str {
        if self.is_web() {
            "🌐"
        } else if self.is_connected() {
            "⚡"
        } else {
            "🔌"
        }
    }

    /// Serializes the record into the cache's blob format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(postcard::to_stdvec(self)?)
    }

    /// Deserializes a record from the cache's blob format.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid record.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

impl Display for DataSource {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        if self.address.is_empty() {
            formatter.write_str(&self.name)
        } else {
            write!(formatter, "{} ({})", self.name, self.address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_data_source(name: &str) -> DataSource {
        DataSource {
            name: name.to_string(),
            status: "not connected".to_string(),
            address: "localhost:10001".to_string(),
            kind: "postgres".to_string(),
            tags: "env=dev".to_string(),
            web_url: None,
            last_used_at: 0,
        }
    }

    #[test]
    fn test_status_icon() {
        let mut data_source = create_test_data_source("db");
        assert_eq!(data_source.status_icon(), "🔌");

        data_source.status = CONNECTED_STATUS.to_string();
        assert_eq!(data_source.status_icon(), "⚡");

        data_source.web_url = Some("https://admin.example.com".to_string());
        assert_eq!(data_source.status_icon(), "🌐");
    }

    #[test]
    fn test_empty_web_url_is_not_web() {
        let mut data_source = create_test_data_source("db");
        data_source.web_url = Some(String::new());

        assert!(!data_source.is_web());
    }

    #[test]
    fn test_opens_in_browser() {
        let mut data_source = create_test_data_source("panel");
        assert!(!data_source.opens_in_browser());

        data_source.address = "http://localhost:10002".to_string();
        assert!(data_source.opens_in_browser());
    }

    #[test]
    fn test_blob_encoding_keeps_every_field() {
        let mut data_source = create_test_data_source("db");
        data_source.web_url = Some("https://example.com".to_string());
        data_source.last_used_at = 1_700_000_000;

        let decoded = DataSource::decode(&data_source.encode().unwrap()).unwrap();
        assert_eq!(decoded, data_source);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(DataSource::decode(&[0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn test_display() {
        let mut data_source = create_test_data_source("db");
        assert_eq!(data_source.to_string(), "db (localhost:10001)");

        data_source.address = String::new();
        assert_eq!(data_source.to_string(), "db");
    }
}
