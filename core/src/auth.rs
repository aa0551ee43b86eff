use std::fmt;

use base64::Engine;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Primary login material: account username, password and the email the
/// platform may ask for as a secondary identifier.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordCredentials {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

impl fmt::Debug for PasswordCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Fallback login material: the four-part OAuth 1.0a user-context key set.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKeyCredentials {
    pub api_key: String,
    pub api_secret_key: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl fmt::Debug for ApiKeyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyCredentials")
            .field("api_key", &key_prefix(&self.api_key))
            .field("api_secret_key", &"<redacted>")
            .field("access_token", &key_prefix(&self.access_token))
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

/// First 6 chars of a key for display/identification.
pub fn key_prefix(key: &str) -> String {
    let prefix: String = key.chars().take(6).collect();
    format!("{prefix}…")
}

/// RFC 3986 percent-encoding as OAuth 1.0a requires (unreserved set only).
pub fn percent_encode(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

/// Fresh nonce for one signed request.
pub fn oauth_nonce() -> String {
    random_hex(16)
}

/// Build the OAuth 1.0a signature base string.
///
/// `params` must hold every query and form parameter of the request together
/// with the `oauth_*` protocol parameters (minus `oauth_signature`). JSON and
/// multipart bodies are not part of the signature.
pub fn signature_base_string(method: &str, base_url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(base_url),
        percent_encode(&normalized)
    )
}

/// HMAC-SHA1 signature of a base string, base64 encoded.
pub fn hmac_sha1_signature(
    base_string: &str,
    consumer_secret: &str,
    token_secret: &str,
) -> Option<String> {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let mut mac = HmacSha1::new_from_slice(key.as_bytes()).ok()?;
    mac.update(base_string.as_bytes());
    Some(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Produce the `Authorization` header value for a user-context request.
///
/// `base_url` is scheme, host and path without the query string;
/// `request_params` are the decoded query/form pairs of the request.
pub fn authorization_header(
    creds: &ApiKeyCredentials,
    method: &str,
    base_url: &str,
    request_params: &[(String, String)],
    nonce: &str,
    timestamp: i64,
) -> Option<String> {
    let mut oauth_params = vec![
        ("oauth_consumer_key".to_string(), creds.api_key.clone()),
        ("oauth_nonce".to_string(), nonce.to_string()),
        (
            "oauth_signature_method".to_string(),
            "HMAC-SHA1".to_string(),
        ),
        ("oauth_timestamp".to_string(), timestamp.to_string()),
        ("oauth_token".to_string(), creds.access_token.clone()),
        ("oauth_version".to_string(), "1.0".to_string()),
    ];

    let mut all_params = oauth_params.clone();
    all_params.extend(request_params.iter().cloned());
    let base = signature_base_string(method, base_url, &all_params);
    let signature =
        hmac_sha1_signature(&base, &creds.api_secret_key, &creds.access_token_secret)?;

    oauth_params.push(("oauth_signature".to_string(), signature));
    oauth_params.sort();
    let fields = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("OAuth {fields}"))
}

/// Generate `n` random bytes and return as hex string.
fn random_hex(n: usize) -> String {
    let bytes: Vec<u8> = (0..n).map(|_| rand::thread_rng().r#gen::<u8>()).collect();
    hex::encode(&bytes)
}
