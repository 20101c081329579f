use crate::error::AuthError;
use crate::providers::{Provider, ProviderContext};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::types::{AuthorizationRequest, CallbackParams, Credentials, RefreshOutcome, TokenResponse, UserInfo};
use rand::distr::Alphanumeric;
use rand::Rng;
use std::sync::{Arc, OnceLock};

/// Length of a generated `state` value.
pub const STATE_LEN: usize = 32;

/// Generate a random alphanumeric `state` value.
pub fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

/// OAuth2 client for one provider and one authorization flow.
///
/// Every operation returns its result instead of storing it. The only cached
/// value is the generated `state`, so construct one client per flow.
pub struct OAuth2Client<P> {
    provider: P,
    credentials: Credentials,
    transport: Arc<dyn HttpTransport>,
    state: OnceLock<String>,
}

impl<P: Provider> OAuth2Client<P> {
    pub fn new(provider: P, credentials: Credentials) -> Self {
        Self::with_transport(provider, credentials, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(
        provider: P,
        credentials: Credentials,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            provider,
            credentials,
            transport,
            state: OnceLock::new(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(crate) fn context(&self) -> ProviderContext<'_> {
        ProviderContext::new(&self.credentials, self.transport.as_ref())
    }

    /// The generated state, if one has been generated. Persist it (e.g. in the
    /// session) for the callback check.
    pub fn state(&self) -> Option<&str> {
        self.state.get().map(String::as_str)
    }

    /// Return `provided` if given, else the state generated for this client.
    pub fn get_state(&self, provided: Option<&str>) -> String {
        match provided {
            Some(state) => state.to_owned(),
            None => self.state.get_or_init(generate_state).clone(),
        }
    }

    pub fn authorization_request(
        &self,
        callback_url: Option<&str>,
        state: Option<&str>,
        scope: Option<&str>,
    ) -> AuthorizationRequest {
        AuthorizationRequest {
            client_id: self.credentials.appid.clone(),
            redirect_uri: callback_url
                .unwrap_or(&self.credentials.callback_url)
                .to_owned(),
            response_type: "code".into(),
            state: self.get_state(state),
            scope: scope
                .map(str::to_owned)
                .or_else(|| self.credentials.scope.clone()),
            display: self.provider.display(),
        }
    }

    /// URL of the provider's login page (or of the configured login agent).
    pub fn get_auth_url(
        &self,
        callback_url: Option<&str>,
        state: Option<&str>,
        scope: Option<&str>,
    ) -> String {
        let request = self.authorization_request(callback_url, state, scope);
        let params = self.provider.authorize_params(&request);
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(
                params
                    .iter()
                    .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v))),
            )
            .finish();

        let base = match &self.credentials.login_agent_url {
            Some(agent) => agent.clone(),
            None => self.provider.endpoint(self.provider.authorize_path()),
        };
        if base.ends_with('?') || base.ends_with('&') {
            format!("{}{}", base, query)
        } else if base.contains('?') {
            format!("{}&{}", base, query)
        } else {
            format!("{}?{}", base, query)
        }
    }

    /// Handle the callback: verify `state` against the stored value, then
    /// exchange the code for a token.
    pub async fn get_access_token(
        &self,
        stored_state: &str,
        callback: &CallbackParams,
    ) -> Result<TokenResponse, AuthError> {
        if stored_state.is_empty() || callback.state != stored_state {
            tracing::warn!(provider = self.provider.id(), "callback state does not match stored state");
            return Err(AuthError::CsrfMismatch);
        }

        let redirect_uri = callback
            .redirect_uri
            .as_deref()
            .unwrap_or(&self.credentials.callback_url);
        self.provider
            .exchange_code(&self.context(), &callback.code, &callback.state, redirect_uri)
            .await
            .inspect_err(|e| self.log_failure("token exchange", e))
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshOutcome, AuthError> {
        self.provider
            .refresh_token(&self.context(), refresh_token)
            .await
            .inspect_err(|e| self.log_failure("token refresh", e))
    }

    /// True if the provider accepts the token. Never fails.
    pub async fn validate_access_token(&self, access_token: &str) -> bool {
        self.provider
            .validate_access_token(&self.context(), access_token)
            .await
    }

    pub async fn get_user_info(&self, access_token: &str) -> Result<UserInfo, AuthError> {
        self.provider
            .user_info(&self.context(), access_token)
            .await
            .inspect_err(|e| self.log_failure("user info", e))
    }

    pub(crate) fn log_failure(&self, operation: &str, err: &AuthError) {
        tracing::warn!(provider = self.provider.id(), operation, error = %err, "provider call failed");
    }
}
