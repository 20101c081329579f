use crate::transport::TransportError;
use serde_json::{Map, Value};

/// Coarse classification of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ProviderError,
    CsrfMismatch,
    ArgumentError,
    DecodeError,
    Transport,
}

/// Errors from OAuth2 operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provider answered, but not with a success payload.
    #[error("Provider error {code}: {description}")]
    Provider {
        code: String,
        description: String,
        /// HTTP status of the failed exchange.
        status: Option<u16>,
        /// Decoded body of the failed exchange, kept for post-hoc inspection.
        body: Map<String, Value>,
    },

    #[error("State mismatch: callback state does not match the stored state")]
    CsrfMismatch,

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Provider { .. } => ErrorKind::ProviderError,
            AuthError::CsrfMismatch => ErrorKind::CsrfMismatch,
            AuthError::Argument(_) => ErrorKind::ArgumentError,
            AuthError::Decode(_) => ErrorKind::DecodeError,
            AuthError::Transport(_) => ErrorKind::Transport,
        }
    }

    /// The decoded provider body, when the error came from a provider exchange.
    pub fn body(&self) -> Option<&Map<String, Value>> {
        match self {
            AuthError::Provider { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Build a provider error for a success field that is absent from the body.
    pub(crate) fn missing_field(field: &str, status: u16, body: Map<String, Value>) -> Self {
        AuthError::Provider {
            code: "missing_field".into(),
            description: format!("response has no `{}` field", field),
            status: Some(status),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_every_variant() {
        let provider = AuthError::Provider {
            code: "100".into(),
            description: "x".into(),
            status: Some(400),
            body: Map::new(),
        };
        assert_eq!(provider.kind(), ErrorKind::ProviderError);
        assert_eq!(AuthError::CsrfMismatch.kind(), ErrorKind::CsrfMismatch);
        assert_eq!(AuthError::Argument("iv".into()).kind(), ErrorKind::ArgumentError);
        assert_eq!(AuthError::Decode("json".into()).kind(), ErrorKind::DecodeError);
        let transport = AuthError::from(TransportError::Other("reset".into()));
        assert_eq!(transport.kind(), ErrorKind::Transport);
    }

    #[test]
    fn provider_error_keeps_body() {
        let mut body = Map::new();
        body.insert("error".into(), Value::from("invalid_grant"));
        let err = AuthError::Provider {
            code: "invalid_grant".into(),
            description: "expired".into(),
            status: Some(401),
            body,
        };
        assert_eq!(
            err.body().and_then(|b| b.get("error")).and_then(|v| v.as_str()),
            Some("invalid_grant")
        );
        assert_eq!(err.to_string(), "Provider error invalid_grant: expired");
        assert!(AuthError::CsrfMismatch.body().is_none());
    }
}
