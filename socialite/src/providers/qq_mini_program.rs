//! QQ mini-program login: `jscode2session` exchange and decryption of the
//! encrypted user payloads handed to the mini-program.

use super::*;
use crate::client::OAuth2Client;
use crate::providers::qq::Qq;
use crate::response::{field_str, provider_failure};
use crate::types::ProviderIdentity;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Serialize;
use serde_json::{Map, Value};

/// Fixed endpoint, independent of the QQ Connect API domain.
pub const SESSION_URL: &str = "https://api.q.qq.com/sns/jscode2session";

/// Base64 length of a 16-byte session key or IV.
const ENCODED_BLOCK_LEN: usize = 24;
const BLOCK_LEN: usize = 16;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Result of a `jscode2session` exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MiniProgramSession {
    pub session_key: String,
    pub identity: ProviderIdentity,
    /// The identity resolved with the provider's [`crate::OpenidMode`].
    pub user_id: Option<String>,
    pub raw: Map<String, Value>,
}

impl OAuth2Client<Qq> {
    /// Exchange a mini-program login code for the session key and user identity.
    pub async fn get_session_key(&self, js_code: &str) -> Result<MiniProgramSession, AuthError> {
        let creds = self.credentials();
        let request = HttpRequest::get(SESSION_URL).with_query(params(&[
            ("appid", creds.appid.as_str()),
            ("secret", creds.app_secret.as_str()),
            ("js_code", js_code),
            ("grant_type", "authorization_code"),
        ]));
        let result = self
            .context()
            .fetch(request, ResponseFormat::Json)
            .await
            .and_then(|(status, decoded)| {
                session_from_fields(decoded.fields, status, self.provider().openid_mode())
            });
        result.inspect_err(|e| self.log_failure("session key", e))
    }
}

fn session_from_fields(
    fields: Map<String, Value>,
    status: u16,
    mode: crate::types::OpenidMode,
) -> Result<MiniProgramSession, AuthError> {
    if let Some(err) = provider_failure(&fields, status, "errcode", "errmsg") {
        return Err(err);
    }
    let Some(session_key) = field_str(&fields, "session_key") else {
        return Err(AuthError::missing_field("session_key", status, fields));
    };
    let Some(openid) = field_str(&fields, "openid") else {
        return Err(AuthError::missing_field("openid", status, fields));
    };
    let identity = ProviderIdentity {
        openid,
        unionid: field_str(&fields, "unionid"),
    };
    let user_id = identity.resolve(mode).map(str::to_owned);
    Ok(MiniProgramSession {
        session_key,
        identity,
        user_id,
        raw: fields,
    })
}

fn decode_block(name: &str, value: &str) -> Result<Vec<u8>, AuthError> {
    if value.len() != ENCODED_BLOCK_LEN {
        return Err(AuthError::Argument(format!(
            "{} must be {} base64 characters, got {}",
            name,
            ENCODED_BLOCK_LEN,
            value.len()
        )));
    }
    let bytes = STANDARD
        .decode(value)
        .map_err(|e| AuthError::Argument(format!("{} is not valid base64: {}", name, e)))?;
    if bytes.len() != BLOCK_LEN {
        return Err(AuthError::Argument(format!(
            "{} must decode to {} bytes, got {}",
            name,
            BLOCK_LEN,
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Decrypt an `encryptedData` payload (AES-128-CBC, PKCS#7) with the session
/// key and IV, all base64-encoded, and parse the plaintext as JSON.
pub fn decrypt_user_data(
    encrypted_data: &str,
    iv: &str,
    session_key: &str,
) -> Result<Value, AuthError> {
    let key = decode_block("session_key", session_key)?;
    let iv = decode_block("iv", iv)?;
    let ciphertext = STANDARD
        .decode(encrypted_data)
        .map_err(|e| AuthError::Argument(format!("encrypted_data is not valid base64: {}", e)))?;

    let plaintext = Aes128CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| AuthError::Argument(format!("invalid key or iv: {}", e)))?
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| AuthError::Decode("decryption failed: bad padding".into()))?;

    serde_json::from_slice(&plaintext)
        .map_err(|e| AuthError::Decode(format!("decrypted data is not JSON: {}", e)))
}
