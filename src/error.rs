//! Error types for detection, connection and session persistence.

use thiserror::Error;

/// EIP-1193 code a wallet uses when the user declines a request.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Typed outcome of a failed connection handshake.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("no injected wallet provider found")]
    NoProviderFound,

    #[error("no provider matched the selection policy")]
    SelectionEmpty,

    #[error("connection request rejected by user")]
    UserRejected,

    #[error("connection request timed out after {0} ms")]
    Timeout(u64),

    #[error("wallet returned no unlocked accounts")]
    EmptyAccountList,

    #[error("invalid address format: {0}")]
    InvalidFormat(String),

    #[error("a connection attempt is already pending")]
    Busy,

    /// Stale handle or transport failure. Eligible for the single fallback retry.
    #[error("provider transport error: {0}")]
    TransportError(String),

    /// A disconnect landed while this attempt was still pending.
    #[error("connection attempt superseded by disconnect")]
    Superseded,
}

impl ConnectError {
    /// Stable machine-readable tag (JS bindings, CLI output).
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectError::NoProviderFound => "no_provider_found",
            ConnectError::SelectionEmpty => "selection_empty",
            ConnectError::UserRejected => "user_rejected",
            ConnectError::Timeout(_) => "timeout",
            ConnectError::EmptyAccountList => "empty_account_list",
            ConnectError::InvalidFormat(_) => "invalid_format",
            ConnectError::Busy => "busy",
            ConnectError::TransportError(_) => "transport_error",
            ConnectError::Superseded => "superseded",
        }
    }
}

/// Rejection payload surfaced by an injected provider's `request()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("provider error (code {code:?}): {message}")]
pub struct ProviderError {
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code: Some(code), message: message.into() }
    }

    /// Failure without a wallet error code (missing method, broken bridge, ...).
    pub fn transport(message: impl Into<String>) -> Self {
        Self { code: None, message: message.into() }
    }

    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED_CODE, "User rejected the request.")
    }

    pub fn is_user_rejected(&self) -> bool {
        self.code == Some(USER_REJECTED_CODE)
    }
}

impl From<ProviderError> for ConnectError {
    fn from(err: ProviderError) -> Self {
        if err.is_user_rejected() {
            ConnectError::UserRejected
        } else {
            ConnectError::TransportError(err.to_string())
        }
    }
}

/// Durable session storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("store json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_declined_maps_to_rejected() {
        let err: ConnectError = ProviderError::user_rejected().into();
        assert_eq!(err, ConnectError::UserRejected);
    }

    #[test]
    fn other_codes_map_to_transport() {
        let err: ConnectError = ProviderError::new(-32603, "internal").into();
        assert!(matches!(err, ConnectError::TransportError(_)));
        assert_eq!(err.kind(), "transport_error");

        let err: ConnectError = ProviderError::transport("bridge gone").into();
        assert!(matches!(err, ConnectError::TransportError(ref m) if m.contains("bridge gone")));
    }
}
