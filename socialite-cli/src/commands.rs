use crate::ProviderId;
use serde_json::{Value, json};
use socialite::providers::provider_ids;
use socialite::{
    CallbackParams, ConfigManager, Gitee, OAuth2Client, OsChina, Provider, ProviderSettings, Qq,
    RefreshOutcome, TokenResponse, decrypt_user_data,
};

/// Operations every provider supports.
pub enum Action {
    AuthUrl {
        callback_url: Option<String>,
        state: Option<String>,
        scope: Option<String>,
    },
    Callback {
        stored_state: String,
        query: String,
        redirect_uri: Option<String>,
    },
    UserInfo {
        access_token: String,
    },
    Validate {
        access_token: String,
    },
    Refresh {
        refresh_token: String,
    },
}

/// A token as JSON, plus its computed expiry when the provider reported a lifetime.
fn token_json(token: &TokenResponse) -> anyhow::Result<Value> {
    let mut out = serde_json::to_value(token)?;
    if let (Some(obj), Some(at)) = (out.as_object_mut(), token.expires_at()) {
        obj.insert("expires_at".into(), json!(at.to_rfc3339()));
        obj.insert("expired".into(), json!(token.is_expired()));
    }
    Ok(out)
}

fn settings(config: &ConfigManager, provider_id: &str) -> anyhow::Result<ProviderSettings> {
    let settings = config.provider(provider_id)?;
    settings.ensure_complete(provider_id)?;
    Ok(settings)
}

pub async fn run(config: &ConfigManager, provider: ProviderId, action: Action) -> anyhow::Result<Value> {
    let s = settings(config, provider.as_str())?;
    tracing::debug!(provider = provider.as_str(), config = %config.path().display(), "loaded provider settings");
    match provider {
        ProviderId::Gitee => run_with(OAuth2Client::new(s.gitee(), s.credentials()), action).await,
        ProviderId::Oschina => run_with(OAuth2Client::new(s.oschina(), s.credentials()), action).await,
        ProviderId::Qq => run_with(OAuth2Client::new(s.qq(), s.credentials()), action).await,
    }
}

async fn run_with<P: Provider>(client: OAuth2Client<P>, action: Action) -> anyhow::Result<Value> {
    let out = match action {
        Action::AuthUrl {
            callback_url,
            state,
            scope,
        } => {
            let url = client.get_auth_url(callback_url.as_deref(), state.as_deref(), scope.as_deref());
            json!({
                "provider": client.provider().id(),
                "url": url,
                "state": client.get_state(state.as_deref()),
            })
        }
        Action::Callback {
            stored_state,
            query,
            redirect_uri,
        } => {
            let mut params = CallbackParams::from_query(&query)?;
            if let Some(uri) = redirect_uri {
                params = params.with_redirect_uri(uri);
            }
            token_json(&client.get_access_token(&stored_state, &params).await?)?
        }
        Action::UserInfo { access_token } => {
            serde_json::to_value(client.get_user_info(&access_token).await?)?
        }
        Action::Validate { access_token } => {
            json!({ "valid": client.validate_access_token(&access_token).await })
        }
        Action::Refresh { refresh_token } => match client.refresh_token(&refresh_token).await? {
            RefreshOutcome::Refreshed(token) => token_json(&token)?,
            RefreshOutcome::Unsupported => {
                anyhow::bail!("{} does not support token refresh", client.provider().name())
            }
        },
    };
    Ok(out)
}

pub async fn gitee_login(
    config: &ConfigManager,
    username: &str,
    password: &str,
    scope: Option<&str>,
) -> anyhow::Result<Value> {
    let s = settings(config, "gitee")?;
    let client = OAuth2Client::new(Gitee, s.credentials());
    token_json(&client.login(username, password, scope).await?)
}

pub async fn qq_session_key(config: &ConfigManager, js_code: &str) -> anyhow::Result<Value> {
    // The mini-program flow has no redirect, so only appid and secret are required.
    let s = config.provider("qq")?;
    if s.appid.is_empty() || s.app_secret.is_empty() {
        anyhow::bail!("appid and app_secret must be configured for provider 'qq'");
    }
    let client: OAuth2Client<Qq> = OAuth2Client::new(s.qq(), s.credentials());
    Ok(serde_json::to_value(client.get_session_key(js_code).await?)?)
}

pub fn qq_decrypt(encrypted_data: &str, iv: &str, session_key: &str) -> anyhow::Result<Value> {
    Ok(decrypt_user_data(encrypted_data, iv, session_key)?)
}

pub fn providers() -> Value {
    let names = [Gitee.name(), OsChina.name(), Qq::new().name()];
    Value::Array(
        provider_ids()
            .iter()
            .zip(names)
            .map(|(id, name)| json!({ "id": id, "name": name }))
            .collect(),
    )
}
