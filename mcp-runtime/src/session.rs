use std::sync::Arc;

use chrono::{DateTime, Utc};
use perch_core::auth::{ApiKeyCredentials, PasswordCredentials};
use perch_core::error::codes;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::upstream::{Connector, UpstreamClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    AuthenticatingPrimary,
    AuthenticatingFallback,
    Authenticated,
    Failed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::AuthenticatingPrimary => "authenticating_primary",
            SessionState::AuthenticatingFallback => "authenticating_fallback",
            SessionState::Authenticated => "authenticated",
            SessionState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginTier {
    Password,
    ApiKeys,
}

impl LoginTier {
    pub fn as_str(self) -> &'static str {
        match self {
            LoginTier::Password => "password",
            LoginTier::ApiKeys => "api_keys",
        }
    }
}

/// Both credential tiers. A tier is `None` when its variables are missing or
/// incomplete; such a tier counts as a failed attempt.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub password: Option<PasswordCredentials>,
    pub api_keys: Option<ApiKeyCredentials>,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.api_keys.is_none()
    }
}

/// The only error class that stops the process instead of producing an
/// envelope.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error(
        "no credentials configured: set TWITTER_USERNAME and TWITTER_PASSWORD, or TWITTER_API_KEY, TWITTER_API_SECRET_KEY, TWITTER_ACCESS_TOKEN and TWITTER_ACCESS_TOKEN_SECRET"
    )]
    NoCredentials,
    #[error("authentication failed (primary: {primary}; fallback: {fallback})")]
    AuthenticationFailed { primary: String, fallback: String },
    #[error("session already failed to authenticate")]
    AlreadyFailed,
}

/// The authenticated upstream handle. Immutable once created.
pub struct Session {
    client: Arc<dyn UpstreamClient>,
    tier: LoginTier,
    authenticated_at: DateTime<Utc>,
}

impl Session {
    pub fn client(&self) -> Arc<dyn UpstreamClient> {
        Arc::clone(&self.client)
    }

    pub fn tier(&self) -> LoginTier {
        self.tier
    }

    pub fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }
}

/// Owns the single upstream session of the process.
///
/// `initialize` is the only mutating operation and runs before the server
/// starts accepting calls; afterwards the manager is shared read-only.
pub struct SessionManager {
    state: SessionState,
    session: Option<Session>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            session: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Live handle, `None` unless authenticated.
    pub fn current_handle(&self) -> Option<Arc<dyn UpstreamClient>> {
        self.session.as_ref().map(Session::client)
    }

    /// Run the two-tier login: password credentials first, the API key set
    /// if that fails for any reason. No retries.
    pub async fn initialize(
        &mut self,
        connector: &dyn Connector,
        credentials: &Credentials,
    ) -> Result<&Session, FatalError> {
        match self.state {
            SessionState::Authenticated => {
                return self.session.as_ref().ok_or(FatalError::AlreadyFailed);
            }
            SessionState::Failed => return Err(FatalError::AlreadyFailed),
            _ => {}
        }

        if credentials.is_empty() {
            self.state = SessionState::Failed;
            error!(code = codes::AUTHENTICATION_FAILED, "no credentials configured");
            return Err(FatalError::NoCredentials);
        }

        self.state = SessionState::AuthenticatingPrimary;
        let primary_error = match &credentials.password {
            Some(creds) => {
                info!(username = %creds.username, "logging in with password credentials");
                match connector.login_with_password(creds).await {
                    Ok(client) => return Ok(self.authenticate(client, LoginTier::Password)),
                    Err(err) => err.to_string(),
                }
            }
            None => "password credentials not configured".to_string(),
        };

        warn!(error = %primary_error, "primary login failed, falling back to API key credentials");
        self.state = SessionState::AuthenticatingFallback;
        let fallback_error = match &credentials.api_keys {
            Some(creds) => match connector.login_with_api_keys(creds).await {
                Ok(client) => return Ok(self.authenticate(client, LoginTier::ApiKeys)),
                Err(err) => err.to_string(),
            },
            None => "API key credentials not configured".to_string(),
        };

        self.state = SessionState::Failed;
        error!(
            code = codes::AUTHENTICATION_FAILED,
            primary = %primary_error,
            fallback = %fallback_error,
            "both login attempts failed"
        );
        Err(FatalError::AuthenticationFailed {
            primary: primary_error,
            fallback: fallback_error,
        })
    }

    fn authenticate(&mut self, client: Arc<dyn UpstreamClient>, tier: LoginTier) -> &Session {
        self.state = SessionState::Authenticated;
        info!(tier = tier.as_str(), "upstream session authenticated");
        self.session.insert(Session {
            client,
            tier,
            authenticated_at: Utc::now(),
        })
    }
}
