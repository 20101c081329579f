//! Response normalization: providers answer with JSON, `key=value&...` bodies or
//! JSONP envelopes. Each call site picks a [`ResponseFormat`]; decoding never fails.

use crate::error::AuthError;
use serde_json::{Map, Value};

/// Decode strategy for a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// JSON object, falling back to query-string decoding.
    Json,
    /// `key=value&...` only.
    QueryString,
    /// `callback( ... );` wrapper stripped, then as [`ResponseFormat::Json`].
    Jsonp,
}

/// Which decoder produced the fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    Json,
    Query,
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBody {
    pub shape: BodyShape,
    pub fields: Map<String, Value>,
}

pub fn decode(body: &str, format: ResponseFormat) -> DecodedBody {
    match format {
        ResponseFormat::Json => decode_json_or_query(body),
        ResponseFormat::QueryString => decode_query(body),
        ResponseFormat::Jsonp => decode_json_or_query(strip_jsonp(body)),
    }
}

fn decode_json_or_query(body: &str) -> DecodedBody {
    match serde_json::from_str::<Value>(body.trim()) {
        Ok(Value::Object(fields)) => DecodedBody {
            shape: BodyShape::Json,
            fields,
        },
        _ => decode_query(body),
    }
}

fn is_query_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '[' | ']'))
}

/// `key=value&...` only when every key is a plain identifier and at least one
/// value is set. Anything else (HTML pages, bare text) decodes to no fields.
fn decode_query(body: &str) -> DecodedBody {
    let empty = DecodedBody {
        shape: BodyShape::Empty,
        fields: Map::new(),
    };
    let Ok(pairs) = serde_urlencoded::from_str::<Vec<(String, String)>>(body.trim()) else {
        return empty;
    };
    if !pairs.iter().all(|(k, _)| is_query_key(k)) || pairs.iter().all(|(_, v)| v.is_empty()) {
        return empty;
    }
    DecodedBody {
        shape: BodyShape::Query,
        fields: pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
    }
}

/// Strip a `name( ... )` / `name( ... );` wrapper. Bodies without one are returned as-is.
pub fn strip_jsonp(body: &str) -> &str {
    let trimmed = body.trim();
    let Some(open) = trimmed.find('(') else {
        return trimmed;
    };
    let callback = trimmed[..open].trim();
    let is_ident = !callback.is_empty()
        && callback
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.');
    if !is_ident {
        return trimmed;
    }
    let tail = trimmed.trim_end_matches(';').trim_end();
    match tail.strip_suffix(')') {
        Some(inner) if inner.len() > open => inner[open + 1..].trim(),
        _ => trimmed,
    }
}

/// Read a string-or-number field as a string. Empty strings count as absent.
pub fn field_str(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read an integer sent either as a JSON number or a numeric string.
pub fn field_i64(fields: &Map<String, Value>, key: &str) -> Option<i64> {
    match fields.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.trim() == "0",
        Value::Null => true,
        _ => false,
    }
}

/// Classify a decoded body: failure iff `code_key` is present and not zero.
pub fn provider_failure(
    fields: &Map<String, Value>,
    status: u16,
    code_key: &str,
    message_key: &str,
) -> Option<AuthError> {
    let code = fields.get(code_key)?;
    if is_zero(code) {
        return None;
    }
    let code = match code {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some(AuthError::Provider {
        code,
        description: field_str(fields, message_key).unwrap_or_default(),
        status: Some(status),
        body: fields.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn json_object_is_json_shape() {
        let d = decode(r#"{"access_token":"t","expires_in":100}"#, ResponseFormat::Json);
        assert_eq!(d.shape, BodyShape::Json);
        assert_eq!(field_str(&d.fields, "access_token").as_deref(), Some("t"));
        assert_eq!(field_i64(&d.fields, "expires_in"), Some(100));
    }

    #[test]
    fn json_falls_back_to_query() {
        let d = decode("access_token=ABC&expires_in=100", ResponseFormat::Json);
        assert_eq!(d.shape, BodyShape::Query);
        assert_eq!(field_str(&d.fields, "access_token").as_deref(), Some("ABC"));
        assert_eq!(field_i64(&d.fields, "expires_in"), Some(100));
    }

    #[test]
    fn query_string_mode_ignores_json() {
        let d = decode(r#"{"a":1}"#, ResponseFormat::QueryString);
        assert_ne!(d.shape, BodyShape::Json);
    }

    #[test]
    fn malformed_bodies_become_empty() {
        let bodies = [
            "",
            "   ",
            "<html>502 Bad Gateway</html>",
            "Service Unavailable",
            "[1,2,3]",
            "null",
            "callback( );",
        ];
        for format in [ResponseFormat::Json, ResponseFormat::QueryString, ResponseFormat::Jsonp] {
            for body in bodies {
                let d = decode(body, format);
                assert_eq!(d.shape, BodyShape::Empty, "{format:?} {body:?}");
                assert!(d.fields.is_empty(), "{format:?} {body:?} -> {:?}", d.fields);
            }
        }
    }

    #[test]
    fn query_with_only_empty_values_is_empty() {
        let d = decode("access_token=&openid=", ResponseFormat::QueryString);
        assert_eq!(d.shape, BodyShape::Empty);
        assert!(d.fields.is_empty());
    }

    #[test]
    fn html_error_page_does_not_leak_into_provider_error_body() {
        let d = decode("<html><body>502 Bad Gateway</body></html>", ResponseFormat::Json);
        let err = crate::types::TokenResponse::from_fields(d.fields, 502).unwrap_err();
        assert!(err.body().unwrap().is_empty());
    }

    #[test]
    fn jsonp_wrapper_is_stripped() {
        let body = "callback( {\"client_id\":\"101\",\"openid\":\"OPENID\"} );\n";
        let d = decode(body, ResponseFormat::Jsonp);
        assert_eq!(d.shape, BodyShape::Json);
        assert_eq!(field_str(&d.fields, "openid").as_deref(), Some("OPENID"));
    }

    #[test]
    fn jsonp_without_wrapper_still_decodes() {
        let d = decode(r#"{"openid":"X"}"#, ResponseFormat::Jsonp);
        assert_eq!(field_str(&d.fields, "openid").as_deref(), Some("X"));
        let q = decode("code=0&access_token=Z", ResponseFormat::Jsonp);
        assert_eq!(q.shape, BodyShape::Query);
        assert_eq!(field_str(&q.fields, "access_token").as_deref(), Some("Z"));
    }

    #[test]
    fn strip_jsonp_leaves_non_wrappers_alone() {
        assert_eq!(strip_jsonp("a=b(c)"), "a=b(c)");
        assert_eq!(strip_jsonp("cb()"), "");
        assert_eq!(strip_jsonp("cb({})"), "{}");
    }

    #[test]
    fn failure_requires_nonzero_code() {
        let ok = decode(r#"{"ret":0,"nickname":"n"}"#, ResponseFormat::Json);
        assert!(provider_failure(&ok.fields, 200, "ret", "msg").is_none());

        let ok_str = decode("code=0&access_token=x", ResponseFormat::QueryString);
        assert!(provider_failure(&ok_str.fields, 200, "code", "msg").is_none());

        let absent = decode(r#"{"id":1}"#, ResponseFormat::Json);
        assert!(provider_failure(&absent.fields, 200, "error", "error_description").is_none());

        let bad = decode(r#"{"error":100,"error_description":"x"}"#, ResponseFormat::Json);
        let err = provider_failure(&bad.fields, 400, "error", "error_description").unwrap();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        match err {
            AuthError::Provider { code, description, status, .. } => {
                assert_eq!(code, "100");
                assert_eq!(description, "x");
                assert_eq!(status, Some(400));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn string_error_codes_are_failures() {
        let bad = decode(
            r#"{"error":"invalid_grant","error_description":"expired"}"#,
            ResponseFormat::Json,
        );
        let err = provider_failure(&bad.fields, 401, "error", "error_description").unwrap();
        assert!(matches!(err, AuthError::Provider { ref code, .. } if code == "invalid_grant"));
    }
}
