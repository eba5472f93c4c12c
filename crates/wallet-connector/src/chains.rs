use std::sync::OnceLock;

use crate::error::CallError;
use crate::types::network::NetworkConfig;

/// Native symbol used for chains missing from the registry.
pub const DEFAULT_NATIVE_SYMBOL: &str = "ETH";

/// Native decimals used for chains missing from the registry.
pub const DEFAULT_NATIVE_DECIMALS: u8 = 18;

/// Ordered table of known networks, used for labeling only.
///
/// Unknown chain ids never fail a lookup; they degrade to a synthesized
/// `Unknown (<chainId>)` name and the default native symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRegistry {
    networks: Vec<NetworkConfig>,
}

impl ChainRegistry {
    pub fn new(networks: Vec<NetworkConfig>) -> Self {
        let networks = networks
            .into_iter()
            .map(|mut n| {
                n.chain_id = normalize_chain_id(&n.chain_id);
                n
            })
            .collect();
        Self { networks }
    }

    /// The process-wide builtin registry.
    pub fn builtin() -> &'static ChainRegistry {
        static BUILTIN: OnceLock<ChainRegistry> = OnceLock::new();
        BUILTIN.get_or_init(|| ChainRegistry::new(builtin_networks()))
    }

    /// Load a replacement table from a JSON array of network entries.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let networks: Vec<NetworkConfig> = serde_json::from_str(json)?;
        Ok(Self::new(networks))
    }

    /// Look up a network by hex chain id.
    pub fn get(&self, chain_id: &str) -> Option<&NetworkConfig> {
        let wanted = normalize_chain_id(chain_id);
        self.networks.iter().find(|n| n.chain_id == wanted)
    }

    pub fn symbol(&self, chain_id: &str) -> &str {
        self.get(chain_id)
            .map(|n| n.symbol.as_str())
            .unwrap_or(DEFAULT_NATIVE_SYMBOL)
    }

    pub fn name(&self, chain_id: &str) -> String {
        self.get(chain_id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| format!("Unknown ({chain_id})"))
    }

    pub fn decimals(&self, chain_id: &str) -> u8 {
        self.get(chain_id)
            .map(|n| n.decimals)
            .unwrap_or(DEFAULT_NATIVE_DECIMALS)
    }

    /// Explorer page for an address, if the chain has an explorer.
    pub fn explorer_address_url(&self, chain_id: &str, address: &str) -> Option<String> {
        let base = self.get(chain_id)?.block_explorer_url.as_deref()?;
        Some(format!("{}/address/{address}", base.trim_end_matches('/')))
    }

    /// Explorer page for a transaction, if the chain has an explorer.
    pub fn explorer_tx_url(&self, chain_id: &str, tx_hash: &str) -> Option<String> {
        let base = self.get(chain_id)?.block_explorer_url.as_deref()?;
        Some(format!("{}/tx/{tx_hash}", base.trim_end_matches('/')))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.iter()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::builtin().clone()
    }
}

/// Canonical `0x`-prefixed lowercase form without leading zeros.
///
/// Inputs that are not hex are returned lowercased and otherwise untouched so
/// that lookups on them simply miss.
pub fn normalize_chain_id(chain_id: &str) -> String {
    match parse_chain_id(chain_id) {
        Ok(id) => format!("{id:#x}"),
        Err(_) => chain_id.trim().to_lowercase(),
    }
}

/// Parse a `0x`-prefixed hex chain id into its numeric value.
pub fn parse_chain_id(chain_id: &str) -> Result<u64, CallError> {
    let trimmed = chain_id.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| CallError::InvalidArgument(format!("invalid chain id {chain_id:?}")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|_| CallError::InvalidArgument(format!("invalid chain id {chain_id:?}")))
}

fn network(chain_id: &str, name: &str, symbol: &str, explorer: &str) -> NetworkConfig {
    NetworkConfig {
        chain_id: chain_id.to_string(),
        name: name.to_string(),
        symbol: symbol.to_string(),
        decimals: 18,
        block_explorer_url: Some(explorer.to_string()),
    }
}

fn builtin_networks() -> Vec<NetworkConfig> {
    vec![
        network("0x1", "Ethereum Mainnet", "ETH", "https://etherscan.io"),
        network("0xa86a", "Avalanche C-Chain", "AVAX", "https://snowtrace.io"),
        network("0xa869", "Avalanche Fuji Testnet", "AVAX", "https://testnet.snowtrace.io"),
        network("0xaa36a7", "Sepolia Testnet", "ETH", "https://sepolia.etherscan.io"),
        network("0x89", "Polygon Mainnet", "MATIC", "https://polygonscan.com"),
        network("0x13882", "Polygon Amoy Testnet", "MATIC", "https://amoy.polygonscan.com"),
        network("0xa4b1", "Arbitrum One", "ETH", "https://arbiscan.io"),
        network("0xa4ba", "Arbitrum Sepolia", "ETH", "https://sepolia.arbiscan.io"),
    ]
}
