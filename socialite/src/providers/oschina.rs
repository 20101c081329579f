use super::*;
use crate::response::{field_str, provider_failure};

const API_DOMAIN: &str = "https://www.oschina.net/";
const AUTHORIZE_PATH: &str = "action/oauth2/authorize";
const TOKEN_PATH: &str = "action/openapi/token";
const USER_PATH: &str = "action/openapi/user";

/// OSChina (oschina.net) OAuth2. Every API call is a GET with `dataType=json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsChina;

impl OsChina {
    async fn request_token(
        &self,
        ctx: &ProviderContext<'_>,
        query: Vec<(String, String)>,
    ) -> Result<TokenResponse, AuthError> {
        let request = HttpRequest::get(self.endpoint(TOKEN_PATH)).with_query(query);
        let (status, decoded) = ctx.fetch(request, ResponseFormat::Json).await?;
        if let Some(err) = provider_failure(&decoded.fields, status, "error", "error_description") {
            return Err(err);
        }
        TokenResponse::from_fields(decoded.fields, status)
    }
}

#[async_trait]
impl Provider for OsChina {
    fn id(&self) -> &'static str {
        "oschina"
    }

    fn name(&self) -> &'static str {
        "OSChina"
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
                ("client_id", creds.appid.as_str()),
                ("client_secret", creds.app_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
                ("code", code),
                ("dataType", "json"),
            ]),
        )
        .await
    }

    async fn user_info(
        &self,
        ctx: &ProviderContext<'_>,
        access_token: &str,
    ) -> Result<UserInfo, AuthError> {
        let request = HttpRequest::get(self.endpoint(USER_PATH)).with_query(params(&[
            ("access_token", access_token),
            ("dataType", "json"),
        ]));
        let (status, decoded) = ctx.fetch(request, ResponseFormat::Json).await?;
        let fields = decoded.fields;

        let Some(openid) = field_str(&fields, "id") else {
            return Err(AuthError::Provider {
                code: field_str(&fields, "error").unwrap_or_else(|| status.to_string()),
                description: field_str(&fields, "error_description").unwrap_or_default(),
                status: Some(status),
                body: fields,
            });
        };
        Ok(UserInfo {
            openid,
            unionid: None,
            nickname: field_str(&fields, "name"),
            avatar: field_str(&fields, "avatar"),
            raw: fields,
        })
    }

    async fn refresh_token(
        &self,
        ctx: &ProviderContext<'_>,
        refresh_token: &str,
    ) -> Result<RefreshOutcome, AuthError> {
        let creds = ctx.credentials;
        self.request_token(
            ctx,
            params(&[
                ("client_id", creds.appid.as_str()),
                ("client_secret", creds.app_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("redirect_uri", creds.callback_url.as_str()),
                ("refresh_token", refresh_token),
                ("dataType", "json"),
            ]),
        )
        .await
        .map(RefreshOutcome::Refreshed)
    }
}
