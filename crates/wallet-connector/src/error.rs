use thiserror::Error;

/// User-facing error taxonomy.
///
/// Every failure that reaches session or token state is one of these. The
/// `Display` form is the banner text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("메타마스크가 설치되어 있지 않습니다.")]
    ProviderNotFound,

    #[error("먼저 메타마스크를 연결해주세요.")]
    NotConnected,

    #[error("사용자가 요청을 취소했습니다.")]
    UserRejected,

    #[error("해당 네트워크를 메타마스크에 추가해주세요.")]
    ChainNotAdded,

    #[error("유효하지 않은 토큰 주소입니다.")]
    InvalidAddress,

    #[error("현재 네트워크에 해당 토큰이 존재하지 않습니다.")]
    ContractNotFound,

    #[error("{0}")]
    Unclassified(String),

    /// Transfer failure, carrying the underlying message verbatim.
    #[error("{0}")]
    Transaction(String),
}

/// An EIP-1193 `ProviderRpcError`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (code {code})")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ProviderError {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const DISCONNECTED: i64 = 4900;
    pub const CHAIN_DISCONNECTED: i64 = 4901;
    /// Returned by `wallet_switchEthereumChain` for a chain the wallet does not know.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(Self::USER_REJECTED, "User rejected the request.")
    }

    pub fn is_user_rejected(&self) -> bool {
        self.code == Self::USER_REJECTED
    }
}

/// Errors while decoding ABI return data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("could not decode result data: empty response")]
    EmptyData,

    #[error("could not decode result data: expected at least {expected} bytes, got {actual}")]
    DataTooShort { expected: usize, actual: usize },

    #[error("could not decode result data: invalid hex ({0})")]
    InvalidHex(String),

    #[error("could not decode result data: invalid UTF-8 ({0})")]
    InvalidUtf8(String),

    #[error("could not decode result data: value out of range for {0}")]
    OutOfRange(&'static str),
}

/// Failure of a single provider or contract call, before classification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transaction reverted: {tx_hash}")]
    Reverted { tx_hash: String },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl CallError {
    /// The underlying human-readable message, without the variant prefix for
    /// provider errors.
    pub fn message(&self) -> String {
        match self {
            CallError::Provider(e) => e.message.clone(),
            other => other.to_string(),
        }
    }

    /// The EIP-1193 error code, if this came from the provider.
    pub fn provider_code(&self) -> Option<i64> {
        match self {
            CallError::Provider(e) => Some(e.code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(
            Error::ContractNotFound.to_string(),
            "현재 네트워크에 해당 토큰이 존재하지 않습니다."
        );
        assert_eq!(Error::Unclassified("boom".into()).to_string(), "boom");
        assert_eq!(Error::Transaction("nonce too low".into()).to_string(), "nonce too low");
    }

    #[test]
    fn test_call_error_message() {
        let err = CallError::from(ProviderError::new(-32000, "execution reverted"));
        assert_eq!(err.message(), "execution reverted");
        assert_eq!(err.provider_code(), Some(-32000));

        let err = CallError::from(DecodeError::EmptyData);
        assert!(err.message().contains("could not decode"));
        assert_eq!(err.provider_code(), None);
    }
}
