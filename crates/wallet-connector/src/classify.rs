//! Mapping of raw call failures onto the user-facing [`Error`] taxonomy.

use crate::error::{CallError, Error, ProviderError};

/// Default bound for unclassified messages shown in an error banner.
pub const DEFAULT_MESSAGE_LIMIT: usize = 100;

/// Classify a session-level failure (connect, sign, switch, event handling).
///
/// Overlong unclassified messages are cut to `limit` characters plus `...`.
pub fn format_error(err: &CallError, limit: usize) -> Error {
    if is_user_rejection(err) {
        return Error::UserRejected;
    }

    let message = err.message();
    if message.contains("window.ethereum") {
        return Error::ProviderNotFound;
    }

    Error::Unclassified(truncate_message(&message, limit))
}

/// Classify a failure of the token metadata/balance reads.
pub fn classify_token_error(err: &CallError) -> Error {
    match err {
        CallError::Decode(_) => Error::ContractNotFound,
        CallError::InvalidArgument(_) => Error::InvalidAddress,
        other => {
            let message = other.message();
            if message.contains("could not decode") {
                Error::ContractNotFound
            } else {
                Error::Unclassified(message)
            }
        }
    }
}

/// Classify a failed `wallet_switchEthereumChain` request.
pub fn classify_switch_error(err: &CallError, limit: usize) -> Error {
    match err.provider_code() {
        Some(ProviderError::UNRECOGNIZED_CHAIN) => Error::ChainNotAdded,
        _ => format_error(err, limit),
    }
}

fn is_user_rejection(err: &CallError) -> bool {
    if let CallError::Provider(e) = err {
        if e.is_user_rejected() {
            return true;
        }
    }
    let message = err.message();
    message.contains("User rejected") || message.contains("user rejected")
}

/// Cut `message` to at most `limit` characters, appending `...` when cut.
pub fn truncate_message(message: &str, limit: usize) -> String {
    match message.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    #[test]
    fn test_user_rejected_by_code() {
        let err = CallError::from(ProviderError::user_rejected());
        assert_eq!(format_error(&err, 100), Error::UserRejected);
    }

    #[test]
    fn test_user_rejected_by_message() {
        let err = CallError::from(ProviderError::new(-32603, "MetaMask: user rejected signing"));
        assert_eq!(format_error(&err, 100), Error::UserRejected);
    }

    #[test]
    fn test_provider_missing_message() {
        let err = CallError::UnexpectedResponse("window.ethereum is undefined".into());
        assert_eq!(format_error(&err, 100), Error::ProviderNotFound);
    }

    #[test]
    fn test_long_message_truncated() {
        let long = "x".repeat(150);
        let err = CallError::from(ProviderError::new(-32000, long));
        let Error::Unclassified(msg) = format_error(&err, 100) else {
            panic!("expected Unclassified");
        };
        assert_eq!(msg.len(), 103);
        assert!(msg.ends_with("..."));
    }

    #[test]
    fn test_short_message_untouched() {
        let err = CallError::from(ProviderError::new(-32000, "insufficient funds"));
        assert_eq!(
            format_error(&err, 100),
            Error::Unclassified("insufficient funds".into())
        );
    }

    #[test]
    fn test_truncate_counts_characters() {
        let msg = "가".repeat(101);
        let cut = truncate_message(&msg, 100);
        assert_eq!(cut.chars().count(), 103);
        assert_eq!(truncate_message("abc", 3), "abc");
    }

    #[test]
    fn test_token_error_classes() {
        assert_eq!(
            classify_token_error(&CallError::Decode(DecodeError::EmptyData)),
            Error::ContractNotFound
        );
        assert_eq!(
            classify_token_error(&CallError::InvalidArgument("bad address".into())),
            Error::InvalidAddress
        );
        let passthrough = "y".repeat(120);
        assert_eq!(
            classify_token_error(&CallError::from(ProviderError::new(-32000, passthrough.clone()))),
            Error::Unclassified(passthrough)
        );
    }

    #[test]
    fn test_switch_unrecognized_chain() {
        let err = CallError::from(ProviderError::new(
            ProviderError::UNRECOGNIZED_CHAIN,
            "Unrecognized chain ID",
        ));
        assert_eq!(classify_switch_error(&err, 100), Error::ChainNotAdded);

        let err = CallError::from(ProviderError::user_rejected());
        assert_eq!(classify_switch_error(&err, 100), Error::UserRejected);
    }
}
