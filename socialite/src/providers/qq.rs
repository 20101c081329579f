//! QQ Connect (graph.qq.com). Token responses come back either as a JSON error
//! object or as a `key=value` success body, and the OpenID endpoint answers in
//! JSONP, so each call picks its decoder explicitly.

use super::*;
use crate::client::OAuth2Client;
use crate::response::{field_str, provider_failure, BodyShape};
use crate::types::{OpenidMode, ProviderIdentity};

const API_DOMAIN: &str = "https://graph.qq.com/";
const AUTHORIZE_PATH: &str = "oauth2.0/authorize";
const TOKEN_PATH: &str = "oauth2.0/token";
const OPENID_PATH: &str = "oauth2.0/me";
const USER_PATH: &str = "user/get_user_info";

#[derive(Debug, Clone, Default)]
pub struct Qq {
    display: Option<String>,
    openid_mode: OpenidMode,
    use_unionid: bool,
}

impl Qq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Login page style: `None` for the PC page, `"mobile"` for the mobile one.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn with_openid_mode(mut self, mode: OpenidMode) -> Self {
        self.openid_mode = mode;
        self
    }

    /// Ask the OpenID endpoint for the UnionID as well.
    pub fn with_unionid(mut self, use_unionid: bool) -> Self {
        self.use_unionid = use_unionid;
        self
    }

    pub fn openid_mode(&self) -> OpenidMode {
        self.openid_mode
    }

    fn requests_unionid(&self) -> bool {
        self.use_unionid && self.openid_mode != OpenidMode::OpenId
    }

    /// Resolve the OpenID (and UnionID, when enabled) owning an access token.
    pub async fn open_id(
        &self,
        ctx: &ProviderContext<'_>,
        access_token: &str,
    ) -> Result<ProviderIdentity, AuthError> {
        let mut query = params(&[("access_token", access_token)]);
        if self.requests_unionid() {
            query.push(("unionid".into(), "1".into()));
        }
        let request = HttpRequest::get(self.endpoint(OPENID_PATH)).with_query(query);
        let (status, decoded) = ctx.fetch(request, ResponseFormat::Jsonp).await?;
        let fields = decoded.fields;

        if let Some(err) = provider_failure(&fields, status, "error", "error_description") {
            return Err(err);
        }
        let Some(openid) = field_str(&fields, "openid") else {
            return Err(AuthError::missing_field("openid", status, fields));
        };
        Ok(ProviderIdentity {
            openid,
            unionid: field_str(&fields, "unionid"),
        })
    }
}

/// Turn a token endpoint body into a token, branching on the decoded shape.
///
/// Any JSON object from this endpoint is read as an error; QQ only answers in
/// JSON when the request failed.
fn parse_token_body(status: u16, body: &str) -> Result<TokenResponse, AuthError> {
    let decoded = decode(body, ResponseFormat::Json);
    if decoded.shape == BodyShape::Json {
        let fields = decoded.fields;
        return Err(AuthError::Provider {
            code: field_str(&fields, "error").unwrap_or_else(|| status.to_string()),
            description: field_str(&fields, "error_description").unwrap_or_default(),
            status: Some(status),
            body: fields,
        });
    }
    if let Some(err) = provider_failure(&decoded.fields, status, "code", "msg") {
        return Err(err);
    }
    TokenResponse::from_fields(decoded.fields, status)
}

#[async_trait]
impl Provider for Qq {
    fn id(&self) -> &'static str {
        "qq"
    }

    fn name(&self) -> &'static str {
        "QQ"
    }

    fn api_domain(&self) -> &str {
        API_DOMAIN
    }

    fn authorize_path(&self) -> &str {
        AUTHORIZE_PATH
    }

    fn display(&self) -> Option<String> {
        self.display.clone()
    }

    fn authorize_params(&self, request: &AuthorizationRequest) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("response_type", Some(request.response_type.clone())),
            ("client_id", Some(request.client_id.clone())),
            ("redirect_uri", Some(request.redirect_uri.clone())),
            ("state", Some(request.state.clone())),
            ("scope", request.scope.clone()),
            ("display", request.display.clone()),
        ]
    }

    async fn exchange_code(
        &self,
        ctx: &ProviderContext<'_>,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AuthError> {
        let creds = ctx.credentials;
        let request = HttpRequest::get(self.endpoint(TOKEN_PATH)).with_query(params(&[
            ("grant_type", "authorization_code"),
            ("client_id", creds.appid.as_str()),
            ("client_secret", creds.app_secret.as_str()),
            ("code", code),
            ("state", state),
            ("redirect_uri", redirect_uri),
        ]));
        let resp = ctx.send(request).await?;
        parse_token_body(resp.status, &resp.body)
    }

    async fn user_info(
        &self,
        ctx: &ProviderContext<'_>,
        access_token: &str,
    ) -> Result<UserInfo, AuthError> {
        let identity = self.open_id(ctx, access_token).await?;

        let request = HttpRequest::get(self.endpoint(USER_PATH)).with_query(params(&[
            ("access_token", access_token),
            ("oauth_consumer_key", ctx.credentials.appid.as_str()),
            ("openid", identity.openid.as_str()),
        ]));
        let (status, decoded) = ctx.fetch(request, ResponseFormat::Json).await?;
        if decoded.shape != BodyShape::Json {
            return Err(AuthError::Decode(format!(
                "QQ user info (HTTP {}) is not a JSON object",
                status
            )));
        }
        let fields = decoded.fields;
        if let Some(err) = provider_failure(&fields, status, "ret", "msg") {
            return Err(err);
        }
        Ok(UserInfo {
            openid: identity.openid,
            unionid: identity.unionid,
            nickname: field_str(&fields, "nickname"),
            avatar: field_str(&fields, "figureurl_qq_2")
                .or_else(|| field_str(&fields, "figureurl_qq_1")),
            raw: fields,
        })
    }

    async fn refresh_token(
        &self,
        ctx: &ProviderContext<'_>,
        refresh_token: &str,
    ) -> Result<RefreshOutcome, AuthError> {
        let creds = ctx.credentials;
        let request = HttpRequest::get(self.endpoint(TOKEN_PATH)).with_query(params(&[
            ("grant_type", "refresh_token"),
            ("client_id", creds.appid.as_str()),
            ("client_secret", creds.app_secret.as_str()),
            ("refresh_token", refresh_token),
        ]));
        let (status, decoded) = ctx.fetch(request, ResponseFormat::Jsonp).await?;
        for (code_key, message_key) in [("code", "msg"), ("error", "error_description")] {
            if let Some(err) = provider_failure(&decoded.fields, status, code_key, message_key) {
                return Err(err);
            }
        }
        TokenResponse::from_fields(decoded.fields, status).map(RefreshOutcome::Refreshed)
    }

    async fn validate_access_token(&self, ctx: &ProviderContext<'_>, access_token: &str) -> bool {
        match self.open_id(ctx, access_token).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(provider = self.id(), error = %e, "access token rejected");
                false
            }
        }
    }
}

impl OAuth2Client<Qq> {
    /// Resolve the OpenID/UnionID of an access token.
    pub async fn get_open_id(&self, access_token: &str) -> Result<ProviderIdentity, AuthError> {
        self.provider()
            .open_id(&self.context(), access_token)
            .await
            .inspect_err(|e| self.log_failure("openid", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::StubTransport;
    use crate::types::CallbackParams;
    use std::sync::Arc;

    fn qq_client(provider: Qq, stub: StubTransport) -> (OAuth2Client<Qq>, Arc<StubTransport>) {
        let stub = Arc::new(stub);
        let creds = Credentials::new("101000", "qq-secret", "https://example.com/qq")
            .with_scope("get_user_info");
        (OAuth2Client::with_transport(provider, creds, stub.clone()), stub)
    }

    #[test]
    fn token_body_json_error_is_provider_error() {
        let err = parse_token_body(200, r#"{"error":100,"error_description":"x"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        match err {
            AuthError::Provider { code, description, .. } => {
                assert_eq!(code, "100");
                assert_eq!(description, "x");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn token_body_query_string_is_success() {
        let token = parse_token_body(200, "access_token=ABC&expires_in=100").unwrap();
        assert_eq!(token.access_token, "ABC");
        assert_eq!(token.expires_in, Some(100));
    }

    #[test]
    fn token_body_query_string_with_code_is_error() {
        let err = parse_token_body(200, "code=100019&msg=code+to+access+token+error").unwrap_err();
        match err {
            AuthError::Provider { code, description, .. } => {
                assert_eq!(code, "100019");
                assert_eq!(description, "code to access token error");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn token_body_empty_is_provider_error() {
        let err = parse_token_body(502, "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
    }

    #[test]
    fn authorize_params_include_scope_and_display() {
        let (client, _) = qq_client(Qq::new().with_display("mobile"), StubTransport::new());
        let url = client.get_auth_url(None, Some("st"), None);
        let parsed = url::Url::parse(&url).unwrap();
        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("response_type".to_string(), "code".to_string()));
        assert!(pairs.contains(&("scope".into(), "get_user_info".into())));
        assert!(pairs.contains(&("display".into(), "mobile".into())));

        let (plain, _) = qq_client(Qq::new(), StubTransport::new());
        let url = plain.get_auth_url(None, Some("st"), Some("get_user_info,add_share"));
        assert!(url.contains("scope=get_user_info%2Cadd_share"));
        assert!(!url.contains("display="));
    }

    #[tokio::test]
    async fn code_exchange_sends_state_and_parses_query_body() {
        let (client, stub) = qq_client(
            Qq::new(),
            StubTransport::new().respond(200, "access_token=FE04&expires_in=7776000&refresh_token=88E4"),
        );
        let token = client
            .get_access_token("s1", &CallbackParams::new("code-9", "s1"))
            .await
            .unwrap();
        assert_eq!(token.access_token, "FE04");
        assert_eq!(token.refresh_token.as_deref(), Some("88E4"));

        let reqs = stub.requests();
        assert_eq!(reqs[0].url, "https://graph.qq.com/oauth2.0/token");
        assert_eq!(reqs[0].param("state"), Some("s1"));
        assert_eq!(reqs[0].param("client_secret"), Some("qq-secret"));
    }

    #[tokio::test]
    async fn code_exchange_json_error_keeps_body() {
        let (client, _) = qq_client(
            Qq::new(),
            StubTransport::new().respond(200, r#"{"error":100020,"error_description":"code is reused error"}"#),
        );
        let err = client
            .get_access_token("s", &CallbackParams::new("c", "s"))
            .await
            .unwrap_err();
        assert_eq!(err.body().unwrap()["error"], 100020);
    }

    #[tokio::test]
    async fn user_info_resolves_openid_first() {
        let (client, stub) = qq_client(
            Qq::new(),
            StubTransport::new()
                .respond(200, r#"callback( {"client_id":"101000","openid":"OPEN-1"} );"#)
                .respond(200, r#"{"ret":0,"msg":"","nickname":"Tencent","figureurl_qq_2":"http://q.qlogo.cn/100"}"#),
        );
        let info = client.get_user_info("tok").await.unwrap();
        assert_eq!(info.openid, "OPEN-1");
        assert_eq!(info.nickname.as_deref(), Some("Tencent"));
        assert_eq!(info.avatar.as_deref(), Some("http://q.qlogo.cn/100"));

        let reqs = stub.requests();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].url, "https://graph.qq.com/oauth2.0/me");
        assert_eq!(reqs[0].param("unionid"), None);
        assert_eq!(reqs[1].url, "https://graph.qq.com/user/get_user_info");
        assert_eq!(reqs[1].param("openid"), Some("OPEN-1"));
        assert_eq!(reqs[1].param("oauth_consumer_key"), Some("101000"));
    }

    #[tokio::test]
    async fn user_info_ret_error() {
        let (client, _) = qq_client(
            Qq::new(),
            StubTransport::new()
                .respond(200, r#"callback( {"client_id":"101000","openid":"OPEN-1"} );"#)
                .respond(200, r#"{"ret":1002,"msg":"请先登录"}"#),
        );
        let err = client.get_user_info("tok").await.unwrap_err();
        match err {
            AuthError::Provider { code, description, .. } => {
                assert_eq!(code, "1002");
                assert_eq!(description, "请先登录");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn unionid_is_requested_only_when_enabled() {
        let provider = Qq::new()
            .with_unionid(true)
            .with_openid_mode(OpenidMode::UnionId);
        let (client, stub) = qq_client(
            provider,
            StubTransport::new().respond(200, r#"callback( {"client_id":"101000","openid":"O","unionid":"U"} );"#),
        );
        let identity = client.get_open_id("tok").await.unwrap();
        assert_eq!(identity.resolve(client.provider().openid_mode()), Some("U"));
        assert_eq!(stub.requests()[0].param("unionid"), Some("1"));

        let (plain, stub) = qq_client(
            Qq::new().with_openid_mode(OpenidMode::UnionId),
            StubTransport::new().respond(200, r#"callback( {"openid":"O"} );"#),
        );
        plain.get_open_id("tok").await.unwrap();
        assert_eq!(stub.requests()[0].param("unionid"), None);
    }

    #[tokio::test]
    async fn unionid_first_mode_requests_unionid() {
        let (client, stub) = qq_client(
            Qq::new()
                .with_unionid(true)
                .with_openid_mode(OpenidMode::UnionIdFirst),
            StubTransport::new()
                .respond(200, r#"callback( {"client_id":"101000","openid":"O","unionid":"U"} );"#)
                .respond(200, r#"callback( {"client_id":"101000","openid":"O"} );"#),
        );
        let mode = client.provider().openid_mode();
        let with_union = client.get_open_id("tok").await.unwrap();
        assert_eq!(with_union.resolve(mode), Some("U"));
        let without_union = client.get_open_id("tok").await.unwrap();
        assert_eq!(without_union.resolve(mode), Some("O"));

        let reqs = stub.requests();
        assert_eq!(reqs[0].param("unionid"), Some("1"));
        assert_eq!(reqs[1].param("unionid"), Some("1"));
    }

    #[tokio::test]
    async fn unionid_flag_is_ignored_in_openid_mode() {
        let (client, stub) = qq_client(
            Qq::new().with_unionid(true),
            StubTransport::new().respond(200, r#"callback( {"openid":"O"} );"#),
        );
        client.get_open_id("tok").await.unwrap();
        assert_eq!(stub.requests()[0].param("unionid"), None);
    }

    #[tokio::test]
    async fn validate_checks_openid_only() {
        let (client, stub) = qq_client(
            Qq::new(),
            StubTransport::new()
                .respond(200, r#"callback( {"client_id":"101000","openid":"OPEN-1"} );"#),
        );
        assert!(client.validate_access_token("tok").await);

        let reqs = stub.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].url, "https://graph.qq.com/oauth2.0/me");
        assert_eq!(reqs[0].param("access_token"), Some("tok"));
    }

    #[tokio::test]
    async fn open_id_error_is_provider_error() {
        let (client, _) = qq_client(
            Qq::new(),
            StubTransport::new().respond(200, r#"callback( {"error":100016,"error_description":"access token check failed"} );"#),
        );
        let err = client.get_open_id("bad").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
    }

    #[tokio::test]
    async fn refresh_accepts_query_body() {
        let (client, stub) = qq_client(
            Qq::new(),
            StubTransport::new().respond(200, "access_token=NEW&expires_in=7776000&refresh_token=R2"),
        );
        match client.refresh_token("R1").await.unwrap() {
            RefreshOutcome::Refreshed(token) => assert_eq!(token.access_token, "NEW"),
            RefreshOutcome::Unsupported => panic!("qq supports refresh"),
        }
        assert_eq!(stub.requests()[0].param("grant_type"), Some("refresh_token"));
    }

    #[tokio::test]
    async fn refresh_error_shapes() {
        let (client, _) = qq_client(
            Qq::new(),
            StubTransport::new()
                .respond(200, "code=100014&msg=access+token+expired")
                .respond(200, r#"callback( {"error":100015,"error_description":"access token is revoked"} );"#),
        );
        assert_eq!(client.refresh_token("R").await.unwrap_err().kind(), ErrorKind::ProviderError);
        assert_eq!(client.refresh_token("R").await.unwrap_err().kind(), ErrorKind::ProviderError);
    }
}
