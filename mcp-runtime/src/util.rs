use clap::Args;
use perch_core::auth::{ApiKeyCredentials, PasswordCredentials};
use tracing::warn;

use crate::session::Credentials;
use crate::x_api::{DEFAULT_API_BASE_URL, DEFAULT_UPLOAD_BASE_URL, XApiConfig};

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("perch-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Login material for both tiers. Values come from flags or the environment
/// and are never echoed by `--help`.
#[derive(Args, Clone, Default)]
pub struct CredentialArgs {
    #[arg(long, env = "TWITTER_USERNAME", hide_env_values = true)]
    pub username: Option<String>,
    #[arg(long, env = "TWITTER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    #[arg(long, env = "TWITTER_EMAIL", hide_env_values = true)]
    pub email: Option<String>,
    #[arg(long, env = "TWITTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    #[arg(long, env = "TWITTER_API_SECRET_KEY", hide_env_values = true)]
    pub api_secret_key: Option<String>,
    #[arg(long, env = "TWITTER_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
    #[arg(long, env = "TWITTER_ACCESS_TOKEN_SECRET", hide_env_values = true)]
    pub access_token_secret: Option<String>,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl CredentialArgs {
    /// Resolve both tiers. A partially configured tier is dropped with a
    /// warning and later counts as a failed login attempt.
    pub fn credentials(&self) -> Credentials {
        let password = match (present(&self.username), present(&self.password)) {
            (Some(username), Some(password)) => Some(PasswordCredentials {
                username,
                password,
                email: present(&self.email),
            }),
            (None, None) => None,
            _ => {
                warn!("TWITTER_USERNAME and TWITTER_PASSWORD must both be set; skipping password login");
                None
            }
        };

        let key_parts = [
            present(&self.api_key),
            present(&self.api_secret_key),
            present(&self.access_token),
            present(&self.access_token_secret),
        ];
        let configured = key_parts.iter().filter(|part| part.is_some()).count();
        let api_keys = match key_parts {
            [Some(api_key), Some(api_secret_key), Some(access_token), Some(access_token_secret)] => {
                Some(ApiKeyCredentials {
                    api_key,
                    api_secret_key,
                    access_token,
                    access_token_secret,
                })
            }
            _ => {
                if configured > 0 {
                    warn!(
                        configured,
                        "incomplete API key credentials; all four TWITTER_API_* / TWITTER_ACCESS_* values are required"
                    );
                }
                None
            }
        };

        Credentials { password, api_keys }
    }
}

#[derive(Args, Clone, Debug)]
pub struct UpstreamArgs {
    /// Base URL of the X REST API
    #[arg(long, env = "PERCH_X_API_URL", default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,
    /// Base URL of the X media upload API
    #[arg(long, env = "PERCH_X_UPLOAD_URL", default_value = DEFAULT_UPLOAD_BASE_URL)]
    pub upload_base_url: String,
}

impl UpstreamArgs {
    pub fn config(&self) -> XApiConfig {
        XApiConfig {
            api_base_url: self.api_base_url.trim_end_matches('/').to_string(),
            upload_base_url: self.upload_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn complete_tiers_resolve() {
        let args = CredentialArgs {
            username: some("bot"),
            password: some("pw"),
            api_key: some("k"),
            api_secret_key: some("s"),
            access_token: some("t"),
            access_token_secret: some("ts"),
            ..CredentialArgs::default()
        };
        let creds = args.credentials();
        assert_eq!(creds.password.unwrap().email, None);
        assert_eq!(creds.api_keys.unwrap().access_token_secret, "ts");
    }

    #[test]
    fn partial_tiers_are_dropped() {
        let args = CredentialArgs {
            username: some("bot"),
            password: some("  "),
            api_key: some("k"),
            ..CredentialArgs::default()
        };
        let creds = args.credentials();
        assert!(creds.password.is_none());
        assert!(creds.api_keys.is_none());
        assert!(creds.is_empty());
    }
}
