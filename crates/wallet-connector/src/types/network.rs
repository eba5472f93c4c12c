use serde::{Deserialize, Serialize};

/// A known network in the chain registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Hex chain identifier, e.g. `0x89`.
    #[serde(rename = "chainId")]
    pub chain_id: String,

    /// Display name, e.g. `Polygon Mainnet`.
    pub name: String,

    /// Native currency symbol.
    pub symbol: String,

    /// Native currency decimals.
    #[serde(default = "default_decimals")]
    pub decimals: u8,

    /// Block explorer base URL, without trailing slash.
    #[serde(rename = "blockExplorerUrl")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_explorer_url: Option<String>,
}

fn default_decimals() -> u8 {
    18
}
