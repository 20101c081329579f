pub mod gitee;
pub mod oschina;
pub mod qq;
pub mod qq_mini_program;

use crate::error::AuthError;
use crate::response::{decode, DecodedBody, ResponseFormat};
use crate::sanitize::sanitize_body;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::types::{AuthorizationRequest, Credentials, RefreshOutcome, TokenResponse, UserInfo};
use async_trait::async_trait;

/// Identifiers of the built-in providers.
pub fn provider_ids() -> &'static [&'static str] {
    &["gitee", "oschina", "qq"]
}

/// What an adapter gets to talk to its provider: the app credentials and a transport.
pub struct ProviderContext<'a> {
    pub credentials: &'a Credentials,
    transport: &'a dyn HttpTransport,
}

impl<'a> ProviderContext<'a> {
    pub fn new(credentials: &'a Credentials, transport: &'a dyn HttpTransport) -> Self {
        Self {
            credentials,
            transport,
        }
    }

    /// Send a request and return the raw response, whatever the status.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthError> {
        tracing::debug!(method = ?request.method, url = %request.url, "provider request");
        let resp = self.transport.send(request).await?;
        if resp.is_success() {
            tracing::debug!(
                status = resp.status,
                body = %sanitize_body(&resp.body),
                "provider response"
            );
        } else {
            // Error bodies are still decoded by the caller.
            tracing::debug!(
                status = resp.status,
                body = %sanitize_body(&resp.body),
                "provider answered with an error status"
            );
        }
        Ok(resp)
    }

    /// Send a request and decode its body with `format`.
    pub async fn fetch(
        &self,
        request: HttpRequest,
        format: ResponseFormat,
    ) -> Result<(u16, DecodedBody), AuthError> {
        let resp = self.send(request).await?;
        Ok((resp.status, decode(&resp.body, format)))
    }
}

/// Per-provider OAuth2 adapter. The generic core in [`crate::client`] handles
/// state, URL assembly and the CSRF check; adapters only speak their vendor's API.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider ID (e.g. "gitee", "qq").
    fn id(&self) -> &'static str;

    /// Human-readable name.
    fn name(&self) -> &'static str;

    /// Base URL, including the trailing slash.
    fn api_domain(&self) -> &str;

    fn authorize_path(&self) -> &str;

    /// Login page style, for providers that offer more than one.
    fn display(&self) -> Option<String> {
        None
    }

    /// Query parameters of the authorization URL, in order. `None` values are dropped.
    fn authorize_params(&self, request: &AuthorizationRequest) -> Vec<(&'static str, Option<String>)> {
        request
            .standard_params()
            .into_iter()
            .map(|(k, v)| (k, Some(v)))
            .collect()
    }

    /// Exchange an authorization code. The callback state has already been verified.
    async fn exchange_code(
        &self,
        ctx: &ProviderContext<'_>,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AuthError>;

    /// Fetch the profile and extract the provider-native user id.
    async fn user_info(
        &self,
        ctx: &ProviderContext<'_>,
        access_token: &str,
    ) -> Result<UserInfo, AuthError>;

    async fn refresh_token(
        &self,
        _ctx: &ProviderContext<'_>,
        _refresh_token: &str,
    ) -> Result<RefreshOutcome, AuthError> {
        Ok(RefreshOutcome::Unsupported)
    }

    async fn validate_access_token(&self, ctx: &ProviderContext<'_>, access_token: &str) -> bool {
        match self.user_info(ctx, access_token).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(provider = self.id(), error = %e, "access token rejected");
                false
            }
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_domain(), path)
    }
}

/// Owned `(String, String)` pairs from borrowed ones.
pub(crate) fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
