//! Scrub credentials from provider response bodies before they are logged, and
//! truncate them to a readable length.

const MAX_LOGGED_BODY_CHARS: usize = 200;

/// Keys whose values must never appear in logs.
const SENSITIVE_KEYS: [&str; 5] = [
    "access_token",
    "refresh_token",
    "client_secret",
    "session_key",
    "password",
];

const REDACTED: &str = "[REDACTED]";

fn is_value_char(c: char) -> bool {
    !matches!(c, '&' | '"' | ',' | '}' | ' ' | '\t' | '\n' | '\r')
}

fn value_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_value_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Offset of a JSON value after `"key"`: optional whitespace, `:`, optional
/// whitespace, then an optional opening quote. `None` if no colon follows.
fn json_value_start(input: &str, after_key: usize) -> Option<usize> {
    let rest = input[after_key..].trim_start().strip_prefix(':')?.trim_start();
    let value = rest.strip_prefix('"').unwrap_or(rest);
    Some(input.len() - value.len())
}

fn query_value_start(_input: &str, after_marker: usize) -> Option<usize> {
    Some(after_marker)
}

fn redact_after(
    scrubbed: &mut String,
    marker: &str,
    value_start: fn(&str, usize) -> Option<usize>,
) {
    let mut search_from = 0;
    while let Some(rel) = scrubbed[search_from..].find(marker) {
        let marker_end = search_from + rel + marker.len();
        let Some(content_start) = value_start(scrubbed.as_str(), marker_end) else {
            search_from = marker_end;
            continue;
        };
        let end = value_end(scrubbed.as_str(), content_start);

        // Empty values leave nothing to hide.
        if end == content_start {
            search_from = content_start;
            continue;
        }

        scrubbed.replace_range(content_start..end, REDACTED);
        search_from = content_start + REDACTED.len();
    }
}

/// Redact the values of sensitive keys in `key=value` and `"key": "value"`
/// forms, whatever the whitespace around the colon.
pub fn scrub_secrets(input: &str) -> String {
    let mut scrubbed = input.to_string();

    for key in SENSITIVE_KEYS {
        redact_after(&mut scrubbed, &format!("{}=", key), query_value_start);
        redact_after(&mut scrubbed, &format!("\"{}\"", key), json_value_start);
    }

    scrubbed
}

/// Scrub secrets and truncate a response body for logging.
pub fn sanitize_body(input: &str) -> String {
    let scrubbed = scrub_secrets(input);

    if scrubbed.chars().count() <= MAX_LOGGED_BODY_CHARS {
        return scrubbed;
    }

    let mut end = MAX_LOGGED_BODY_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}
