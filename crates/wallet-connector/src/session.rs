//! The wallet session state machine.
//!
//! [`SessionManager`] is the single writer of [`SessionState`]. Every
//! mutating operation takes `&mut self`, so user intents and provider events
//! are applied one at a time; events queue on the subscription until the
//! owner calls [`SessionManager::next_event`] or
//! [`SessionManager::drain_events`]. Read-only views are handed out through
//! [`SessionManager::subscribe`].

use std::fmt;
use std::sync::Arc;

use num_bigint::BigUint;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::chains::{normalize_chain_id, ChainRegistry, DEFAULT_NATIVE_DECIMALS};
use crate::classify::{classify_switch_error, format_error};
use crate::config::ConnectorConfig;
use crate::error::{CallError, Error};
use crate::provider::{BrowserProvider, Eip1193Provider, EventSubscription, ProviderEvent, Signer};
use crate::types::address::Address;
use crate::units::format_units;

/// The most recent successful signature together with the signed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    pub signature: String,
    pub message: String,
}

/// The live handles of a connected session. Replaced wholesale, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    account: Address,
    provider: BrowserProvider,
    signer: Signer,
}

impl Connection {
    fn new(provider: BrowserProvider, account: Address) -> Self {
        let signer = provider.signer_for(account);
        Self {
            account,
            provider,
            signer,
        }
    }
}

/// Snapshot of the wallet session.
///
/// `account`, `provider` and `signer` live in one [`Connection`], so they are
/// present together or not at all, and `signature`/`signed_message` live in
/// one [`SignedMessage`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    connection: Option<Connection>,
    chain_id: Option<String>,
    symbol: Option<String>,
    balance: Option<String>,
    signed: Option<SignedMessage>,
    is_loading: bool,
    error: Option<Error>,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Connected account, lowercase hex.
    pub fn account(&self) -> Option<Address> {
        self.connection.as_ref().map(|c| c.account)
    }

    pub fn provider(&self) -> Option<&BrowserProvider> {
        self.connection.as_ref().map(|c| &c.provider)
    }

    pub fn signer(&self) -> Option<&Signer> {
        self.connection.as_ref().map(|c| &c.signer)
    }

    pub fn chain_id(&self) -> Option<&str> {
        self.chain_id.as_deref()
    }

    /// Native currency symbol of the active chain.
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    /// Native balance as a decimal string.
    pub fn balance(&self) -> Option<&str> {
        self.balance.as_deref()
    }

    pub fn signature(&self) -> Option<&str> {
        self.signed.as_ref().map(|s| s.signature.as_str())
    }

    pub fn signed_message(&self) -> Option<&str> {
        self.signed.as_ref().map(|s| s.message.as_str())
    }

    pub fn signed(&self) -> Option<&SignedMessage> {
        self.signed.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Display label of the active chain.
    pub fn network_name(&self, registry: &ChainRegistry) -> Option<String> {
        self.chain_id.as_deref().map(|id| registry.name(id))
    }
}

/// Canonical text of the automatic post-connect signature request.
pub fn welcome_message(account: &Address, signed_at: OffsetDateTime) -> String {
    let timestamp = signed_at
        .to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        ))
        .unwrap_or_else(|_| signed_at.unix_timestamp().to_string());

    format!(
        "Welcome to MetaMask!\n\n\
         이 서명 요청은 블록체인 트랜잭션을 발생시키지 않으며,\n\
         가스비가 들지 않습니다.\n\n\
         Wallet address:\n{account}\n\n\
         Timestamp:\n{timestamp}"
    )
}

/// Owner of the single wallet session.
pub struct SessionManager {
    wallet: Option<Arc<dyn Eip1193Provider>>,
    registry: Arc<ChainRegistry>,
    config: ConnectorConfig,
    state: SessionState,
    publisher: watch::Sender<SessionState>,
    events: Option<EventSubscription>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("wallet_detected", &self.wallet.is_some())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager for the injected provider, if any, and subscribe to
    /// its events. The subscription lives as long as the manager.
    pub fn new(wallet: Option<Arc<dyn Eip1193Provider>>) -> Self {
        let events = wallet.as_deref().map(EventSubscription::new);
        let (publisher, _) = watch::channel(SessionState::default());
        Self {
            wallet,
            registry: Arc::new(ChainRegistry::builtin().clone()),
            config: ConnectorConfig::default(),
            state: SessionState::default(),
            publisher,
            events,
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ChainRegistry>) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ConnectorConfig) -> Self {
        self.config = config;
        self
    }

    /// [`new`](Self::new) followed by the startup [`probe`](Self::probe).
    pub async fn start(wallet: Option<Arc<dyn Eip1193Provider>>) -> Self {
        let mut manager = Self::new(wallet);
        manager.probe().await;
        manager
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// A read-only view that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.publisher.subscribe()
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Restore an already-authorized session without prompting the user.
    ///
    /// Unlike [`connect`](Self::connect) this never asks for a signature.
    /// Failures are logged and leave the session empty.
    pub async fn probe(&mut self) {
        let Some(wallet) = self.detected_wallet() else {
            return;
        };
        let provider = BrowserProvider::new(wallet);

        let restored = match provider.accounts().await {
            Ok(accounts) => match accounts.first().copied() {
                Some(account) => self.open_session(provider, account).await.map(Some),
                None => Ok(None),
            },
            Err(e) => Err(e),
        };

        match restored {
            Ok(Some(state)) => {
                info!(
                    account = %state.account().map(|a| a.to_string()).unwrap_or_default(),
                    chain_id = state.chain_id().unwrap_or_default(),
                    "restored existing wallet session"
                );
                self.state = state;
                self.publish();
            }
            Ok(None) => debug!("no previously authorized account"),
            Err(e) => warn!(error = %e, "failed to check existing connection"),
        }
    }

    /// Ask the wallet for account access and open a session, then request
    /// the welcome signature.
    ///
    /// A rejected signature is recorded as the session error but does not
    /// undo the connection.
    pub async fn connect(&mut self) {
        let Some(wallet) = self.detected_wallet() else {
            self.state.error = Some(Error::ProviderNotFound);
            self.publish();
            return;
        };

        self.state.is_loading = true;
        self.state.error = None;
        self.publish();

        let provider = BrowserProvider::new(wallet);
        let opened = match provider.request_accounts().await {
            Ok(accounts) => match accounts.first().copied() {
                Some(account) => self.open_session(provider, account).await,
                None => Err(CallError::UnexpectedResponse(
                    "eth_requestAccounts returned no accounts".into(),
                )),
            },
            Err(e) => Err(e),
        };

        match opened {
            Ok(state) => {
                info!(
                    account = %state.account().map(|a| a.to_string()).unwrap_or_default(),
                    chain_id = state.chain_id().unwrap_or_default(),
                    "wallet connected"
                );
                self.state = state;
                self.publish();
            }
            Err(e) => {
                warn!(error = %e, "wallet connection failed");
                self.state.is_loading = false;
                self.state.error = Some(format_error(&e, self.config.error_message_limit));
                self.publish();
                return;
            }
        }

        self.sign_message(None).await;
    }

    /// Reset to the initial empty session. The wallet is not notified.
    pub fn disconnect(&mut self) {
        self.state = SessionState::default();
        self.publish();
        info!("wallet disconnected");
    }

    /// Re-read the native balance. Failures are logged and otherwise ignored.
    pub async fn refresh_balance(&mut self) {
        let Some(connection) = self.state.connection.clone() else {
            return;
        };

        match connection.provider.get_balance(&connection.account).await {
            Ok(wei) => {
                self.state.balance = Some(self.format_native(&wei, self.state.chain_id.as_deref()));
                self.publish();
            }
            Err(e) => warn!(error = %e, account = %connection.account, "failed to fetch balance"),
        }
    }

    /// Sign `custom`, or the welcome message when `custom` is absent or empty.
    ///
    /// On failure the previous signature, if any, stays in place.
    pub async fn sign_message(&mut self, custom: Option<&str>) {
        let Some(connection) = self.state.connection.clone() else {
            self.state.error = Some(Error::NotConnected);
            self.publish();
            return;
        };

        let message = match custom {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => welcome_message(&connection.account, OffsetDateTime::now_utc()),
        };

        match connection.signer.sign_message(&message).await {
            Ok(signature) => {
                debug!(account = %connection.account, "message signed");
                self.state.signed = Some(SignedMessage { signature, message });
                self.state.error = None;
            }
            Err(e) => {
                warn!(error = %e, "message signing failed");
                self.state.error = Some(format_error(&e, self.config.error_message_limit));
            }
        }
        self.publish();
    }

    /// Ask the wallet to switch chains.
    ///
    /// Local chain state is not touched here; it follows the `chainChanged`
    /// event the wallet emits once the switch happens.
    pub async fn switch_chain(&mut self, target_chain_id: &str) {
        let Some(wallet) = self.detected_wallet() else {
            self.state.error = Some(Error::ProviderNotFound);
            self.publish();
            return;
        };

        let provider = BrowserProvider::new(wallet);
        match provider.switch_chain(target_chain_id).await {
            Ok(()) => debug!(chain_id = target_chain_id, "chain switch requested"),
            Err(e) => {
                warn!(error = %e, chain_id = target_chain_id, "chain switch failed");
                self.state.error = Some(classify_switch_error(&e, self.config.error_message_limit));
                self.publish();
            }
        }
    }

    pub fn clear_error(&mut self) {
        self.state.error = None;
        self.publish();
    }

    /// Wait for one provider event and reconcile it.
    ///
    /// Returns `false` when there is no subscription or the provider went away.
    pub async fn next_event(&mut self) -> bool {
        let Some(events) = self.events.as_mut() else {
            return false;
        };
        match events.recv().await {
            Some(event) => {
                self.handle_event(event).await;
                true
            }
            None => false,
        }
    }

    /// Reconcile every event already delivered; returns how many were handled.
    pub async fn drain_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.events.as_mut().and_then(EventSubscription::try_recv) {
            self.handle_event(event).await;
            handled += 1;
        }
        handled
    }

    pub async fn handle_event(&mut self, event: ProviderEvent) {
        match event {
            ProviderEvent::ChainChanged(chain_id) => self.on_chain_changed(&chain_id).await,
            ProviderEvent::AccountsChanged(accounts) => self.on_accounts_changed(&accounts).await,
        }
    }

    /// A chain switch invalidates the provider handle, so a new one is built
    /// and the balance re-read through it.
    ///
    /// With no connected account only chain id and symbol move; balance and
    /// handles are left as they were until the next reconnect.
    async fn on_chain_changed(&mut self, raw_chain_id: &str) {
        let chain_id = normalize_chain_id(raw_chain_id);
        info!(chain_id = %chain_id, "chain changed");

        let refreshed = match self.wallet.clone() {
            Some(wallet) if self.state.is_connected() => {
                let provider = BrowserProvider::new(wallet);
                match provider.accounts().await {
                    Ok(accounts) => match accounts.first().copied() {
                        Some(account) => {
                            let balance = provider.get_balance(&account).await;
                            balance.map(|wei| Some((provider, account, wei)))
                        }
                        None => Ok(None),
                    },
                    Err(e) => Err(e),
                }
            }
            _ => Ok(None),
        };

        self.state.symbol = Some(self.registry.symbol(&chain_id).to_string());
        match refreshed {
            Ok(Some((provider, account, wei))) => {
                if self.state.account() != Some(account) {
                    self.state.signed = None;
                }
                self.state.balance = Some(self.format_native(&wei, Some(chain_id.as_str())));
                self.state.connection = Some(Connection::new(provider, account));
            }
            Ok(None) => debug!("chain changed without an active account"),
            Err(e) => warn!(error = %e, "failed to update chain"),
        }
        self.state.chain_id = Some(chain_id);
        self.publish();
    }

    /// An empty list is a disconnect; otherwise the first account is adopted
    /// with fresh handles and any signature from the previous account dropped.
    async fn on_accounts_changed(&mut self, accounts: &[String]) {
        let Some(first) = accounts.first() else {
            info!("wallet reported no accounts");
            self.disconnect();
            return;
        };

        self.state.signed = None;

        let Some(wallet) = self.wallet.clone() else {
            self.publish();
            return;
        };

        let account = match Address::parse(first) {
            Ok(account) => account,
            Err(e) => {
                warn!(error = %e, "wallet reported a malformed account");
                self.state.error = Some(format_error(&e, self.config.error_message_limit));
                self.publish();
                return;
            }
        };

        let connection = Connection::new(BrowserProvider::new(wallet), account);
        info!(account = %account, "account changed");

        if self.state.chain_id.is_none() {
            match connection.provider.chain_id().await {
                Ok(chain_id) => {
                    self.state.symbol = Some(self.registry.symbol(&chain_id).to_string());
                    self.state.chain_id = Some(chain_id);
                }
                Err(e) => warn!(error = %e, "failed to fetch chain id"),
            }
        }

        self.state.balance = match connection.provider.get_balance(&account).await {
            Ok(wei) => Some(self.format_native(&wei, self.state.chain_id.as_deref())),
            Err(e) => {
                warn!(error = %e, account = %account, "failed to fetch balance");
                None
            }
        };
        self.state.connection = Some(connection);
        self.state.is_loading = false;
        self.publish();
    }

    /// Read chain and balance through `provider` and build a connected state.
    async fn open_session(
        &self,
        provider: BrowserProvider,
        account: Address,
    ) -> Result<SessionState, CallError> {
        let chain_id = provider.chain_id().await?;
        let wei = provider.get_balance(&account).await?;

        Ok(SessionState {
            symbol: Some(self.registry.symbol(&chain_id).to_string()),
            balance: Some(self.format_native(&wei, Some(chain_id.as_str()))),
            chain_id: Some(chain_id),
            connection: Some(Connection::new(provider, account)),
            ..SessionState::default()
        })
    }

    /// The injected provider, if it is one this connector drives.
    fn detected_wallet(&self) -> Option<Arc<dyn Eip1193Provider>> {
        self.wallet.as_ref().filter(|w| w.is_metamask()).cloned()
    }

    fn format_native(&self, wei: &BigUint, chain_id: Option<&str>) -> String {
        let decimals = chain_id
            .map(|id| self.registry.decimals(id))
            .unwrap_or(DEFAULT_NATIVE_DECIMALS);
        format_units(wei, decimals)
    }

    fn publish(&self) {
        self.publisher.send_replace(self.state.clone());
    }
}
