//! Wallet session and ERC-20 token queries over an injected EIP-1193 provider.
//!
//! [`SessionManager`] owns the connection to the wallet: account, chain,
//! native balance and signatures, reconciled against the provider's
//! `accountsChanged`/`chainChanged` events. [`TokenQuery`] reads ERC-20
//! metadata and balances through whatever provider the session currently
//! holds, and submits transfers signed by the session account.
//!
//! Every failure surfaces as an [`Error`] recorded in state, never as a
//! panic or an `Err` across the public operations.

pub mod abi;
pub mod chains;
pub mod classify;
pub mod config;
pub mod erc20;
pub mod error;
pub mod provider;
pub mod session;
pub mod testing;
pub mod token;
pub mod types;
pub mod units;

// Re-exports for convenience
pub use chains::ChainRegistry;
pub use config::ConnectorConfig;
pub use error::{CallError, Error, ProviderError};
pub use provider::{BrowserProvider, Eip1193Provider, ProviderEvent, Signer};
pub use session::{SessionManager, SessionState};
pub use token::{TokenQuery, TokenState, TransferStatus};
pub use types::address::Address;
pub use types::network::NetworkConfig;
