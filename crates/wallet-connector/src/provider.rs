//! The EIP-1193 boundary and the connection handles built on top of it.
//!
//! ```text
//! Eip1193Provider (injected object, consumed)
//!   └── BrowserProvider   fresh handle per connect / chain / account change
//!         └── Signer      BrowserProvider + authorized account
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;

use crate::abi;
use crate::chains::normalize_chain_id;
use crate::error::{CallError, ProviderError};
use crate::types::address::Address;

/// Events pushed by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// `accountsChanged`: the authorized account list, possibly empty.
    AccountsChanged(Vec<String>),
    /// `chainChanged`: the new hex chain id.
    ChainChanged(String),
}

/// An EIP-1193-shaped wallet provider.
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    /// `provider.request({ method, params })`.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Register a listener for `accountsChanged` / `chainChanged`.
    ///
    /// The provider must stop delivering to a receiver once it is closed or
    /// dropped; that is how listeners are removed.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent>;

    /// Whether the injected object identifies as MetaMask.
    fn is_metamask(&self) -> bool {
        true
    }
}

/// A live event listener registration. Dropping it removes the listener.
#[derive(Debug)]
pub struct EventSubscription {
    receiver: mpsc::UnboundedReceiver<ProviderEvent>,
}

impl EventSubscription {
    pub fn new(provider: &dyn Eip1193Provider) -> Self {
        debug!("subscribing to provider events");
        Self {
            receiver: provider.subscribe(),
        }
    }

    /// Wait for the next event; `None` once the provider has gone away.
    pub async fn recv(&mut self) -> Option<ProviderEvent> {
        self.receiver.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<ProviderEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.receiver.close();
        debug!("provider event subscription released");
    }
}

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

/// A connection handle over the injected provider.
///
/// Handles are never mutated; a new one (with a new [`id`](Self::id)) is
/// created whenever the chain or account changes, so holders can detect a
/// stale handle by comparing ids.
#[derive(Clone)]
pub struct BrowserProvider {
    id: u64,
    inner: Arc<dyn Eip1193Provider>,
}

impl fmt::Debug for BrowserProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserProvider")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl PartialEq for BrowserProvider {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BrowserProvider {}

impl BrowserProvider {
    pub fn new(inner: Arc<dyn Eip1193Provider>) -> Self {
        Self {
            id: NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed),
            inner,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Raw request with error lifting.
    pub async fn send(&self, method: &str, params: Value) -> Result<Value, CallError> {
        debug!(provider = self.id, method, "provider request");
        Ok(self.inner.request(method, params).await?)
    }

    /// `eth_requestAccounts`: prompts the user for access.
    pub async fn request_accounts(&self) -> Result<Vec<Address>, CallError> {
        parse_accounts(self.send("eth_requestAccounts", json!([])).await?)
    }

    /// `eth_accounts`: already-authorized accounts, never prompts.
    pub async fn accounts(&self) -> Result<Vec<Address>, CallError> {
        parse_accounts(self.send("eth_accounts", json!([])).await?)
    }

    /// `eth_chainId`, normalized to lowercase `0x…` without leading zeros.
    pub async fn chain_id(&self) -> Result<String, CallError> {
        match self.send("eth_chainId", json!([])).await? {
            Value::String(id) => Ok(normalize_chain_id(&id)),
            other => Err(CallError::UnexpectedResponse(format!("eth_chainId returned {other}"))),
        }
    }

    /// Native balance in wei at the latest block.
    pub async fn get_balance(&self, address: &Address) -> Result<BigUint, CallError> {
        let result = self
            .send("eth_getBalance", json!([address.to_string(), "latest"]))
            .await?;
        parse_quantity(&result)
    }

    /// `eth_call` against `to`, returning raw return data.
    pub async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, CallError> {
        let result = self
            .send(
                "eth_call",
                json!([{ "to": to.to_string(), "data": abi::to_hex_data(data) }, "latest"]),
            )
            .await?;
        match result {
            Value::String(hex_data) => Ok(abi::from_hex_data(&hex_data)?),
            other => Err(CallError::UnexpectedResponse(format!("eth_call returned {other}"))),
        }
    }

    /// Signer for the first authorized account.
    pub async fn get_signer(&self) -> Result<Signer, CallError> {
        let accounts = self.accounts().await?;
        let address = accounts
            .first()
            .copied()
            .ok_or_else(|| CallError::UnexpectedResponse("no authorized account".into()))?;
        Ok(self.signer_for(address))
    }

    /// Signer for a known account, without asking the wallet.
    pub fn signer_for(&self, address: Address) -> Signer {
        Signer {
            provider: self.clone(),
            address,
        }
    }

    /// `wallet_switchEthereumChain`.
    pub async fn switch_chain(&self, chain_id: &str) -> Result<(), CallError> {
        self.send("wallet_switchEthereumChain", json!([{ "chainId": chain_id }]))
            .await?;
        Ok(())
    }

    /// `eth_getTransactionReceipt`; `None` while the transaction is pending.
    pub async fn transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionReceipt>, CallError> {
        let result = self
            .send("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .map_err(|e| CallError::UnexpectedResponse(format!("malformed receipt: {e}")))
    }
}

/// A provider handle bound to one authorized account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signer {
    provider: BrowserProvider,
    address: Address,
}

impl Signer {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn provider(&self) -> &BrowserProvider {
        &self.provider
    }

    /// EIP-191 `personal_sign` over the UTF-8 message.
    pub async fn sign_message(&self, message: &str) -> Result<String, CallError> {
        let result = self
            .provider
            .send(
                "personal_sign",
                json!([abi::to_hex_data(message.as_bytes()), self.address.to_string()]),
            )
            .await?;
        match result {
            Value::String(signature) => Ok(signature),
            other => Err(CallError::UnexpectedResponse(format!("personal_sign returned {other}"))),
        }
    }

    /// `eth_sendTransaction` from this account; returns the transaction hash.
    pub async fn send_transaction(&self, to: &Address, data: &[u8]) -> Result<String, CallError> {
        let request = TransactionRequest {
            from: self.address,
            to: *to,
            data: abi::to_hex_data(data),
        };
        let result = self
            .provider
            .send("eth_sendTransaction", json!([request]))
            .await?;
        match result {
            Value::String(hash) => Ok(hash),
            other => Err(CallError::UnexpectedResponse(format!(
                "eth_sendTransaction returned {other}"
            ))),
        }
    }

    /// Poll until the transaction is mined.
    ///
    /// A mined-but-failed transaction is [`CallError::Reverted`]. There is no
    /// timeout here; the provider's own limits apply.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        poll_interval: Duration,
    ) -> Result<TransactionReceipt, CallError> {
        loop {
            if let Some(receipt) = self.provider.transaction_receipt(tx_hash).await? {
                if receipt.is_success() {
                    return Ok(receipt);
                }
                return Err(CallError::Reverted {
                    tx_hash: tx_hash.to_string(),
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[derive(Debug, Serialize)]
struct TransactionRequest {
    from: Address,
    to: Address,
    data: String,
}

/// The fields of `eth_getTransactionReceipt` the connector cares about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransactionReceipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,

    #[serde(rename = "blockNumber")]
    #[serde(default)]
    pub block_number: Option<String>,

    /// `0x1` on success, `0x0` on revert. Pre-Byzantium receipts omit it.
    #[serde(default)]
    pub status: Option<String>,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() != Some("0x0")
    }
}

fn parse_accounts(value: Value) -> Result<Vec<Address>, CallError> {
    let Value::Array(items) = value else {
        return Err(CallError::UnexpectedResponse(format!(
            "expected account list, got {value}"
        )));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Address::parse(s),
            other => Err(CallError::UnexpectedResponse(format!(
                "expected account string, got {other}"
            ))),
        })
        .collect()
}

/// Parse a JSON-RPC hex quantity such as `0x1bc16d674ec80000`.
fn parse_quantity(value: &Value) -> Result<BigUint, CallError> {
    let Some(s) = value.as_str() else {
        return Err(CallError::UnexpectedResponse(format!(
            "expected hex quantity, got {value}"
        )));
    };
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Ok(BigUint::default());
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| CallError::UnexpectedResponse(format!("invalid hex quantity {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;

    const ALICE: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn test_parse_quantity() {
        assert_eq!(
            parse_quantity(&json!("0xde0b6b3a7640000")).unwrap(),
            BigUint::from(1_000_000_000_000_000_000u64)
        );
        assert_eq!(parse_quantity(&json!("0x")).unwrap(), BigUint::default());
        assert!(parse_quantity(&json!(12)).is_err());
    }

    #[test]
    fn test_parse_accounts_rejects_garbage() {
        assert!(parse_accounts(json!(["0x12"])).is_err());
        assert!(parse_accounts(json!("0x12")).is_err());
        assert_eq!(parse_accounts(json!([])).unwrap(), vec![]);
    }

    #[test]
    fn test_handles_are_distinct() {
        let mock = Arc::new(MockProvider::new());
        let a = BrowserProvider::new(mock.clone());
        let b = BrowserProvider::new(mock);
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
        assert_eq!(a, a.clone());
    }

    #[tokio::test]
    async fn test_chain_id_normalized() {
        let mock = Arc::new(MockProvider::new());
        mock.respond("eth_chainId", json!("0x0089"));
        let provider = BrowserProvider::new(mock);
        assert_eq!(provider.chain_id().await.unwrap(), "0x89");
    }

    #[tokio::test]
    async fn test_sign_message_params() {
        let mock = Arc::new(MockProvider::new());
        mock.respond("eth_accounts", json!([ALICE]));
        mock.respond("personal_sign", json!("0xsig"));
        let provider = BrowserProvider::new(mock.clone());
        let signer = provider.get_signer().await.unwrap();

        assert_eq!(signer.sign_message("hi").await.unwrap(), "0xsig");
        let params = mock.last_params("personal_sign").unwrap();
        assert_eq!(params, json!(["0x6869", ALICE]));
    }

    #[tokio::test]
    async fn test_get_signer_without_accounts() {
        let mock = Arc::new(MockProvider::new());
        mock.respond("eth_accounts", json!([]));
        let provider = BrowserProvider::new(mock);
        assert!(matches!(
            provider.get_signer().await,
            Err(CallError::UnexpectedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_wait_for_receipt_polls_until_mined() {
        let mock = Arc::new(MockProvider::new());
        mock.respond("eth_accounts", json!([ALICE]));
        mock.respond_queue(
            "eth_getTransactionReceipt",
            vec![
                Ok(Value::Null),
                Ok(json!({ "transactionHash": "0xabc", "blockNumber": "0x10", "status": "0x1" })),
            ],
        );
        let signer = BrowserProvider::new(mock.clone()).get_signer().await.unwrap();

        let receipt = signer
            .wait_for_receipt("0xabc", Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(receipt.block_number.as_deref(), Some("0x10"));
        assert_eq!(mock.call_count("eth_getTransactionReceipt"), 2);
    }

    #[tokio::test]
    async fn test_wait_for_receipt_reverted() {
        let mock = Arc::new(MockProvider::new());
        mock.respond("eth_accounts", json!([ALICE]));
        mock.respond(
            "eth_getTransactionReceipt",
            json!({ "transactionHash": "0xabc", "status": "0x0" }),
        );
        let signer = BrowserProvider::new(mock).get_signer().await.unwrap();

        let err = signer
            .wait_for_receipt("0xabc", Duration::from_millis(1))
            .await
            .unwrap_err();
        assert_eq!(err, CallError::Reverted { tx_hash: "0xabc".into() });
    }

    #[tokio::test]
    async fn test_subscription_drop_unregisters() {
        let mock = Arc::new(MockProvider::new());
        let mut sub = EventSubscription::new(mock.as_ref());
        mock.emit(ProviderEvent::ChainChanged("0x89".into()));
        assert_eq!(sub.recv().await, Some(ProviderEvent::ChainChanged("0x89".into())));
        assert_eq!(mock.listener_count(), 1);

        drop(sub);
        mock.emit(ProviderEvent::ChainChanged("0x1".into()));
        assert_eq!(mock.listener_count(), 0);
    }
}
