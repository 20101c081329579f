use crate::error::AuthError;
use crate::response::{field_i64, field_str};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Application credentials registered with a provider. Fixed per client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub appid: String,
    pub app_secret: String,
    pub callback_url: String,
    /// When set, authorization requests are routed through this URL instead of
    /// the provider's own authorize endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_agent_url: Option<String>,
    /// Default scope for providers that take one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Credentials {
    pub fn new(
        appid: impl Into<String>,
        app_secret: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            appid: appid.into(),
            app_secret: app_secret.into(),
            callback_url: callback_url.into(),
            login_agent_url: None,
            scope: None,
        }
    }

    pub fn with_login_agent_url(mut self, url: impl Into<String>) -> Self {
        self.login_agent_url = Some(url.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Authorization step
// ---------------------------------------------------------------------------

/// Parameters of the authorization redirect. Built per call, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: String,
    pub state: String,
    pub scope: Option<String>,
    pub display: Option<String>,
}

impl AuthorizationRequest {
    /// The four parameters every provider sends.
    pub fn standard_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("client_id", self.client_id.clone()),
            ("redirect_uri", self.redirect_uri.clone()),
            ("response_type", self.response_type.clone()),
            ("state", self.state.clone()),
        ]
    }
}

/// Values delivered to the callback URL by the provider redirect.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
    /// Redirect URI used for the authorization request, when it differs from
    /// the configured callback URL. Providers require the two to match.
    #[serde(skip)]
    pub redirect_uri: Option<String>,
}

impl CallbackParams {
    pub fn new(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            state: state.into(),
            redirect_uri: None,
        }
    }

    /// Parse a raw callback query string (`code=...&state=...`), with or
    /// without the leading `?`. Unknown parameters are ignored.
    pub fn from_query(query: &str) -> Result<Self, AuthError> {
        serde_urlencoded::from_str(query.trim_start_matches('?'))
            .map_err(|e| AuthError::Decode(format!("invalid callback query: {}", e)))
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A successful token exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, as reported by the provider.
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub obtained_at: DateTime<Utc>,
    /// Full decoded response body.
    pub raw: Map<String, Value>,
}

impl TokenResponse {
    /// Build from a decoded body; `access_token` is required.
    pub fn from_fields(fields: Map<String, Value>, status: u16) -> Result<Self, AuthError> {
        let Some(access_token) = field_str(&fields, "access_token") else {
            return Err(AuthError::missing_field("access_token", status, fields));
        };
        Ok(Self {
            access_token,
            refresh_token: field_str(&fields, "refresh_token"),
            expires_in: field_i64(&fields, "expires_in"),
            scope: field_str(&fields, "scope"),
            obtained_at: Utc::now(),
            raw: fields,
        })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(Duration::try_seconds)
            .and_then(|ttl| self.obtained_at.checked_add_signed(ttl))
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at().is_some_and(|at| Utc::now() >= at)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Refreshed(TokenResponse),
    /// The provider has no refresh grant.
    Unsupported,
}

/// Which identifier becomes the user's stable id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenidMode {
    #[default]
    OpenId,
    UnionId,
    /// UnionID when the provider returns one, otherwise OpenID.
    UnionIdFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderIdentity {
    pub openid: String,
    pub unionid: Option<String>,
}

impl ProviderIdentity {
    pub fn resolve(&self, mode: OpenidMode) -> Option<&str> {
        match mode {
            OpenidMode::OpenId => Some(self.openid.as_str()),
            OpenidMode::UnionId => self.unionid.as_deref(),
            OpenidMode::UnionIdFirst => self
                .unionid
                .as_deref()
                .filter(|u| !u.is_empty())
                .or(Some(self.openid.as_str())),
        }
    }
}

/// A fetched user profile with the provider-native identity extracted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserInfo {
    pub openid: String,
    pub unionid: Option<String>,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    /// Full decoded profile body.
    pub raw: Map<String, Value>,
}
