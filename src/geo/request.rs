//! Request URL construction for a single provider.

use super::providers::{Language, Provider};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped in the IP/host path segment. `:` and `.` stay literal
/// so IPv4 and IPv6 addresses pass through unchanged.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'/')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Characters escaped in query values.
const QUERY_VALUE: &AsciiSet = &PATH_SEGMENT.add(b'+').add(b',').add(b';');

/// Trim whitespace and strip the brackets of a bracketed IPv6 literal.
pub fn normalize_host(host: &str) -> &str {
    let h = host.trim();
    h.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(h)
}

/// Comma-joined list of raw keys the provider is asked to return: every
/// mapped canonical field, then the provider's status and message keys.
pub fn field_selector(provider: &Provider) -> String {
    let mut keys: Vec<&str> = provider.fields.iter().map(|(_, key)| *key).collect();
    if let Some(status) = provider.status {
        keys.push(status.key());
    }
    if let Some(message) = provider.message_key {
        keys.push(message);
    }
    keys.join(",")
}

/// Build the full request URL.
///
/// An empty `host` asks the provider about the caller's own address. The
/// language parameter is omitted when the provider has no code for
/// `language`; the provider's default applies then. An empty `api_key` means
/// an unauthenticated request.
pub fn build_url(provider: &Provider, host: &str, language: Option<Language>, api_key: &str) -> String {
    let mut url = String::from(provider.base_url);
    url.extend(utf8_percent_encode(normalize_host(host), PATH_SEGMENT));

    url.push('?');
    url.push_str(provider.fields_param);
    url.push('=');
    url.push_str(&field_selector(provider));

    if let Some(code) = language.and_then(|l| provider.language_code(l)) {
        push_param(&mut url, provider.lang_param, code);
    }

    let key = api_key.trim();
    if !key.is_empty() {
        push_param(&mut url, provider.key_param, key);
    }

    url
}

fn push_param(url: &mut String, name: &str, value: &str) {
    url.push('&');
    url.push_str(name);
    url.push('=');
    url.extend(utf8_percent_encode(value, QUERY_VALUE));
}

/// Copy of `url` safe to log: the API key value is masked.
///
/// Only the query string is searched, from the end, since `build_url`
/// appends the key last.
pub fn redact(url: &str, provider: &Provider) -> String {
    let Some(query_start) = url.find('?') else {
        return url.to_string();
    };
    let marker = format!("&{}=", provider.key_param);
    match url[query_start..].rfind(&marker) {
        Some(pos) => {
            let value_start = query_start + pos + marker.len();
            let value_end = url[value_start..]
                .find('&')
                .map_or(url.len(), |i| value_start + i);
            format!("{}***{}", &url[..value_start], &url[value_end..])
        }
        None => url.to_string(),
    }
}
