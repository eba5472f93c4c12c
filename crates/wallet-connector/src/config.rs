use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::DEFAULT_MESSAGE_LIMIT;

/// Tunables for the session manager and token query engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Re-fetch token data whenever the token address, provider or account changes.
    #[serde(rename = "autoRefresh")]
    pub auto_refresh: bool,

    /// Delay between receipt polls while waiting for a transfer to confirm.
    #[serde(rename = "receiptPollIntervalMs")]
    pub receipt_poll_interval_ms: u64,

    /// Maximum characters of an unclassified error message before it is cut.
    #[serde(rename = "errorMessageLimit")]
    pub error_message_limit: usize,

    /// Decimals assumed for a transfer when token metadata is not loaded.
    #[serde(rename = "defaultTokenDecimals")]
    pub default_token_decimals: u8,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            auto_refresh: true,
            receipt_poll_interval_ms: 1_000,
            error_message_limit: DEFAULT_MESSAGE_LIMIT,
            default_token_decimals: 18,
        }
    }
}

impl ConnectorConfig {
    /// Parse a config from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectorConfig::default();
        assert!(config.auto_refresh);
        assert_eq!(config.error_message_limit, 100);
        assert_eq!(config.default_token_decimals, 18);
        assert_eq!(config.receipt_poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_json() {
        let config = ConnectorConfig::from_json(r#"{ "autoRefresh": false, "receiptPollIntervalMs": 250 }"#).unwrap();
        assert!(!config.auto_refresh);
        assert_eq!(config.receipt_poll_interval_ms, 250);
        assert_eq!(config.error_message_limit, 100);
    }
}
