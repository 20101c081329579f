use super::*;
use crate::client::OAuth2Client;
use crate::response::{field_str, provider_failure};

const API_DOMAIN: &str = "https://gitee.com/";
const AUTHORIZE_PATH: &str = "oauth/authorize";
const TOKEN_PATH: &str = "oauth/token";
const USER_PATH: &str = "api/v5/user";

/// Scope requested by the password login when none is given.
pub const DEFAULT_PASSWORD_SCOPE: &str = "user_info";

/// Gitee (gitee.com) OAuth2. Token requests are form-encoded POSTs; no refresh grant.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gitee;

impl Gitee {
    async fn request_token(
        &self,
        ctx: &ProviderContext<'_>,
        form: Vec<(String, String)>,
    ) -> Result<TokenResponse, AuthError> {
        let request = HttpRequest::post_form(self.endpoint(TOKEN_PATH), form);
        let (status, decoded) = ctx.fetch(request, ResponseFormat::Json).await?;
        if let Some(err) = provider_failure(&decoded.fields, status, "error", "error_description") {
            return Err(err);
        }
        TokenResponse::from_fields(decoded.fields, status)
    }
}

#[async_trait]
impl Provider for Gitee {
    fn id(&self) -> &'static str {
        "gitee"
    }

    fn name(&self) -> &'static str {
        "Gitee"
    }

    fn api_domain(&self) -> &str {
        API_DOMAIN
    }

    fn authorize_path(&self) -> &str {
        AUTHORIZE_PATH
    }

    async fn exchange_code(
        &self,
        ctx: &ProviderContext<'_>,
        code: &str,
        _state: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AuthError> {
        let creds = ctx.credentials;
        self.request_token(
            ctx,
            params(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", creds.appid.as_str()),
                ("redirect_uri", redirect_uri),
                ("client_secret", creds.app_secret.as_str()),
            ]),
        )
        .await
    }

    async fn user_info(
        &self,
        ctx: &ProviderContext<'_>,
        access_token: &str,
    ) -> Result<UserInfo, AuthError> {
        let request = HttpRequest::get(self.endpoint(USER_PATH))
            .with_query(params(&[("access_token", access_token)]));
        let (status, decoded) = ctx.fetch(request, ResponseFormat::Json).await?;
        let fields = decoded.fields;

        let Some(openid) = field_str(&fields, "id") else {
            return Err(AuthError::Provider {
                code: status.to_string(),
                description: field_str(&fields, "message").unwrap_or_default(),
                status: Some(status),
                body: fields,
            });
        };
        Ok(UserInfo {
            openid,
            unionid: None,
            nickname: field_str(&fields, "name").or_else(|| field_str(&fields, "login")),
            avatar: field_str(&fields, "avatar_url"),
            raw: fields,
        })
    }
}

impl OAuth2Client<Gitee> {
    /// Log in with the resource owner's username and password (`password` grant).
    /// `scope` is a space-separated list; `None` means [`DEFAULT_PASSWORD_SCOPE`].
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        scope: Option<&str>,
    ) -> Result<TokenResponse, AuthError> {
        let creds = self.credentials();
        self.provider()
            .request_token(
                &self.context(),
                params(&[
                    ("grant_type", "password"),
                    ("username", username),
                    ("password", password),
                    ("client_id", creds.appid.as_str()),
                    ("client_secret", creds.app_secret.as_str()),
                    ("scope", scope.unwrap_or(DEFAULT_PASSWORD_SCOPE)),
                ]),
            )
            .await
            .inspect_err(|e| self.log_failure("password login", e))
    }
}
