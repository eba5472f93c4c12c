//! Read-through queries for one ERC-20 token at a time.
//!
//! [`TokenQuery`] never holds a provider. Every call borrows the current
//! [`SessionState`] and reads the provider, account and signer from it, so a
//! provider replaced by a chain switch is picked up on the next call.

use num_bigint::BigUint;
use tracing::{debug, info, warn};

use crate::classify::classify_token_error;
use crate::config::ConnectorConfig;
use crate::erc20::Erc20;
use crate::error::{CallError, Error};
use crate::provider::{BrowserProvider, Signer};
use crate::session::SessionState;
use crate::types::address::Address;
use crate::units::{format_units, parse_units};

/// Token metadata and the account's balance, fetched together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Balance of the session account as a decimal string.
    pub balance: String,
}

/// Outcome of the last transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TransferStatus {
    #[default]
    Idle,
    /// Submitted or awaiting signature; not yet mined.
    Pending,
    /// Mined successfully.
    Confirmed { tx_hash: String },
    Failed(Error),
}

/// Snapshot of a token query.
///
/// `info` and `error` are never both set: a fetch commits all four fields or
/// none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenState {
    info: Option<TokenInfo>,
    is_loading: bool,
    error: Option<Error>,
    transfer: TransferStatus,
}

impl TokenState {
    pub fn info(&self) -> Option<&TokenInfo> {
        self.info.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.info.as_ref().map(|i| i.name.as_str())
    }

    pub fn symbol(&self) -> Option<&str> {
        self.info.as_ref().map(|i| i.symbol.as_str())
    }

    pub fn decimals(&self) -> Option<u8> {
        self.info.as_ref().map(|i| i.decimals)
    }

    pub fn balance(&self) -> Option<&str> {
        self.info.as_ref().map(|i| i.balance.as_str())
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn transfer(&self) -> &TransferStatus {
        &self.transfer
    }

    /// Nothing fetched and nothing failed.
    pub fn is_empty(&self) -> bool {
        self.info.is_none() && self.error.is_none() && !self.is_loading
    }

    fn commit(&mut self, info: TokenInfo) {
        self.info = Some(info);
        self.error = None;
        self.is_loading = false;
    }

    fn reject(&mut self, error: Error) {
        self.info = None;
        self.error = Some(error);
        self.is_loading = false;
    }
}

/// Inputs of the last fetch, compared to decide whether auto-refresh is due.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FetchInputs {
    token_address: String,
    provider_id: u64,
    account: Address,
}

/// Query engine for the token at [`token_address`](Self::token_address).
#[derive(Debug, Default)]
pub struct TokenQuery {
    token_address: String,
    state: TokenState,
    config: ConnectorConfig,
    last_fetch: Option<FetchInputs>,
}

impl TokenQuery {
    pub fn new(config: ConnectorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn token_address(&self) -> &str {
        &self.token_address
    }

    pub fn state(&self) -> &TokenState {
        &self.state
    }

    /// Point the query at another contract. Any change, including to empty,
    /// drops everything fetched for the previous address.
    pub fn set_token_address(&mut self, token_address: &str) {
        if self.token_address == token_address {
            return;
        }
        debug!(from = %self.token_address, to = %token_address, "token address changed");
        self.token_address = token_address.to_string();
        self.state = TokenState::default();
        self.last_fetch = None;
    }

    /// Switch to `token_address` and fetch it.
    pub async fn fetch_all(&mut self, token_address: &str, session: &SessionState) {
        self.set_token_address(token_address);
        self.refresh_balance(session).await;
    }

    /// Fetch metadata and balance of the current token.
    ///
    /// A blank address resets to empty. Without a connected session this is
    /// a no-op.
    pub async fn refresh_balance(&mut self, session: &SessionState) {
        if self.token_address.trim().is_empty() {
            self.state = TokenState::default();
            self.last_fetch = None;
            return;
        }
        let (Some(provider), Some(account)) = (session.provider(), session.account()) else {
            return;
        };

        self.state.is_loading = true;
        self.state.error = None;
        self.last_fetch = Some(FetchInputs {
            token_address: self.token_address.clone(),
            provider_id: provider.id(),
            account,
        });

        match fetch_token(&self.token_address, provider, &account).await {
            Ok(info) => {
                debug!(token = %self.token_address, symbol = %info.symbol, "token fetched");
                self.state.commit(info);
            }
            Err(e) => {
                warn!(token = %self.token_address, error = %e, "token fetch failed");
                self.state.reject(classify_token_error(&e));
            }
        }
    }

    /// Auto-refresh: fetch when the token address, provider or account has
    /// changed since the last fetch and all three are present.
    ///
    /// Returns whether a fetch ran.
    pub async fn sync(&mut self, session: &SessionState) -> bool {
        if !self.config.auto_refresh || self.token_address.trim().is_empty() {
            return false;
        }
        let (Some(provider), Some(account)) = (session.provider(), session.account()) else {
            return false;
        };

        let inputs = FetchInputs {
            token_address: self.token_address.clone(),
            provider_id: provider.id(),
            account,
        };
        if self.last_fetch.as_ref() == Some(&inputs) {
            return false;
        }

        self.refresh_balance(session).await;
        true
    }

    /// Send `amount` (decimal, in token units) to `recipient` and wait for it
    /// to be mined, then refetch.
    ///
    /// Missing session, token, recipient or a zero amount is a silent no-op.
    /// Failures are recorded as [`TransferStatus::Failed`] with the underlying
    /// message.
    pub async fn transfer(&mut self, session: &SessionState, recipient: &str, amount: &str) {
        let Some(signer) = session.signer() else {
            return;
        };
        let Some(provider) = session.provider() else {
            return;
        };
        if self.token_address.trim().is_empty()
            || recipient.trim().is_empty()
            || amount.trim().is_empty()
        {
            return;
        }

        let decimals = self
            .state
            .decimals()
            .unwrap_or(self.config.default_token_decimals);
        let units = match parse_units(amount, decimals) {
            Ok(units) if units.bits() == 0 => return,
            Ok(units) => units,
            Err(e) => {
                self.fail_transfer(&e);
                return;
            }
        };

        self.state.transfer = TransferStatus::Pending;
        match self.submit_transfer(provider, signer, recipient, units).await {
            Ok(tx_hash) => {
                info!(token = %self.token_address, tx_hash = %tx_hash, "transfer confirmed");
                self.state.transfer = TransferStatus::Confirmed { tx_hash };
                self.refresh_balance(session).await;
            }
            Err(e) => self.fail_transfer(&e),
        }
    }

    async fn submit_transfer(
        &self,
        provider: &BrowserProvider,
        signer: &Signer,
        recipient: &str,
        units: BigUint,
    ) -> Result<String, CallError> {
        let token = Erc20::at(&self.token_address, provider)?;
        let to = Address::parse(recipient)?;

        let tx_hash = token.transfer(signer, &to, units).await?;
        debug!(tx_hash = %tx_hash, "transfer submitted");

        signer
            .wait_for_receipt(&tx_hash, self.config.receipt_poll_interval())
            .await?;
        Ok(tx_hash)
    }

    fn fail_transfer(&mut self, err: &CallError) {
        warn!(token = %self.token_address, error = %err, "transfer failed");
        self.state.transfer = TransferStatus::Failed(Error::Transaction(err.message()));
    }
}

async fn fetch_token(
    token_address: &str,
    provider: &BrowserProvider,
    account: &Address,
) -> Result<TokenInfo, CallError> {
    let token = Erc20::at(token_address, provider)?;
    let (balance, decimals, symbol, name) = tokio::try_join!(
        token.balance_of(account),
        token.decimals(),
        token.symbol(),
        token.name(),
    )?;

    Ok(TokenInfo {
        balance: format_units(&balance, decimals),
        name,
        symbol,
        decimals,
    })
}
