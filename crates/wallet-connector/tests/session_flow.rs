use std::sync::Arc;

use serde_json::json;
use wallet_connector::testing::MockProvider;
use wallet_connector::{
    ConnectorConfig, Error, ProviderError, ProviderEvent, SessionManager, SessionState, TokenQuery,
};

const ALICE: &str = "0x1111111111111111111111111111111111111111";
const TOKEN: &str = "0x4b34dd1d58B2915eE0414b1870C027095893F7dB";

fn metamask() -> Arc<MockProvider> {
    let mock = Arc::new(MockProvider::new());
    mock.respond("eth_requestAccounts", json!([ALICE]));
    mock.respond("eth_accounts", json!([ALICE]));
    mock.respond("eth_chainId", json!("0x1"));
    mock.respond("eth_getBalance", json!("0x6f05b59d3b20000"));
    mock.respond("personal_sign", json!("0xsig"));
    mock
}

#[tokio::test]
async fn switching_to_polygon_updates_symbol_and_name() {
    let mock = metamask();
    mock.respond("wallet_switchEthereumChain", json!(null));
    let mut session = SessionManager::new(Some(mock.clone()));
    session.connect().await;
    assert_eq!(session.state().symbol(), Some("ETH"));
    assert_eq!(session.state().balance(), Some("0.5"));

    session.switch_chain("0x89").await;
    mock.emit(ProviderEvent::ChainChanged("0x89".into()));
    assert!(session.next_event().await);

    let state = session.state();
    assert_eq!(state.chain_id(), Some("0x89"));
    assert_eq!(state.symbol(), Some("MATIC"));
    assert_eq!(
        state.network_name(session.registry()).as_deref(),
        Some("Polygon Mainnet")
    );
}

#[tokio::test]
async fn unknown_chain_gets_fallback_name() {
    let mock = metamask();
    mock.respond("eth_chainId", json!("0x2105"));
    let mut session = SessionManager::new(Some(mock.clone()));
    session.connect().await;

    let state = session.state();
    assert_eq!(state.symbol(), Some("ETH"));
    assert_eq!(
        state.network_name(session.registry()).as_deref(),
        Some("Unknown (0x2105)")
    );
}

#[tokio::test]
async fn disconnect_then_wallet_lock_return_to_initial_state() {
    let mock = metamask();
    let mut session = SessionManager::new(Some(mock.clone()));
    session.connect().await;
    assert!(session.state().is_connected());

    session.disconnect();
    assert_eq!(session.state(), &SessionState::default());

    session.connect().await;
    mock.emit(ProviderEvent::AccountsChanged(vec![]));
    assert_eq!(session.drain_events().await, 1);
    assert_eq!(session.state(), &SessionState::default());
}

#[tokio::test]
async fn rejected_welcome_signature_keeps_session() {
    let mock = metamask();
    mock.fail("personal_sign", ProviderError::user_rejected());
    let mut session = SessionManager::new(Some(mock.clone()));
    session.connect().await;

    let state = session.state();
    assert!(state.is_connected());
    assert_eq!(state.account().map(|a| a.to_string()).as_deref(), Some(ALICE));
    assert_eq!(
        state.error().map(ToString::to_string).as_deref(),
        Some("사용자가 요청을 취소했습니다.")
    );
}

#[tokio::test]
async fn long_provider_errors_are_truncated() {
    let mock = metamask();
    mock.fail("eth_requestAccounts", ProviderError::new(-32603, "x".repeat(150)));
    let mut session = SessionManager::new(Some(mock.clone()))
        .with_config(ConnectorConfig::default());
    session.connect().await;

    match session.state().error() {
        Some(Error::Unclassified(message)) => {
            assert_eq!(message.chars().count(), 103);
            assert!(message.ends_with("..."));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn token_missing_on_chain_is_reported_in_korean() {
    let mock = metamask();
    mock.respond("eth_call", json!("0x"));
    let mut session = SessionManager::new(Some(mock.clone()));
    session.connect().await;

    let mut query = TokenQuery::default();
    query.fetch_all(TOKEN, session.state()).await;

    let state = query.state();
    assert!(state.info().is_none());
    assert_eq!(
        state.error().map(ToString::to_string).as_deref(),
        Some("현재 네트워크에 해당 토큰이 존재하지 않습니다.")
    );
}
