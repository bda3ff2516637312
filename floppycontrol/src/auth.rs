//! Auth Session Manager: keeps a usable cloud token.
//!
//! ```text
//! Unauthenticated ──► AwaitingUserRedirect ──► Authenticated
//!        ▲                     │                    │
//!        └──── denied / bad ───┘                    │
//!        └──────────── refresh rejected ────────────┘
//! ```
//!
//! The token is persisted under `state.auth` so a restart does not need a
//! new login.

use std::sync::Arc;

use chrono::{Duration, Utc};
use floppyconfig::SettingsFile;
use rand::{Rng, distr::Alphanumeric};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::backend::CloudPlayback;
use crate::errors::{BackendError, ControlError, Result};
use crate::model::AuthToken;
use crate::operator::AuthPrompt;

const AUTH_PATH: [&str; 2] = ["state", "auth"];
const STATE_PARAM_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "floppyserver", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    AwaitingUserRedirect,
    Authenticated,
}

pub struct AuthSessionManager {
    backend: Arc<dyn CloudPlayback>,
    prompt: Arc<dyn AuthPrompt>,
    settings: SettingsFile,
    margin: Duration,
    token: Option<AuthToken>,
    state: watch::Sender<AuthState>,
}

impl AuthSessionManager {
    /// Builds the manager, restoring a persisted token when there is one.
    pub fn new(
        backend: Arc<dyn CloudPlayback>,
        prompt: Arc<dyn AuthPrompt>,
        settings: SettingsFile,
        margin: std::time::Duration,
    ) -> Self {
        let token = restore_token(&settings);
        let initial = if token.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        };
        let (state, _) = watch::channel(initial);
        let margin = Duration::from_std(margin).unwrap_or_else(|_| Duration::seconds(60));

        Self {
            backend,
            prompt,
            settings,
            margin,
            token,
            state,
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    /// Follows state changes from outside the worker.
    pub fn watch_state(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Returns a token that is valid for at least the safety margin.
    ///
    /// Without a token this runs the interactive handshake and suspends
    /// until the operator answers. A token close to expiry is refreshed
    /// first; a rejected refresh clears it and yields `AuthRequired`.
    pub async fn ensure_valid_token(&mut self) -> Result<AuthToken> {
        if self.token.is_none() {
            return self.authorize().await;
        }
        self.stored_token().await
    }

    /// Like [`ensure_valid_token`](Self::ensure_valid_token), but never
    /// prompts the operator: without a token this is `AuthRequired`.
    pub async fn stored_token(&mut self) -> Result<AuthToken> {
        match &self.token {
            Some(token) if !token.expires_within(self.margin, Utc::now()) => Ok(token.clone()),
            Some(token) => {
                let refresh_token = token.refresh_token.clone();
                self.refresh(&refresh_token).await
            }
            None => Err(ControlError::auth_required("no access token stored")),
        }
    }

    /// Drops a token the backend refused, so the next scan authorizes again.
    pub fn invalidate_token(&mut self) {
        if self.token.is_some() {
            warn!("Access token refused by the backend, a new authorization is needed");
            self.clear();
        }
    }

    /// Runs the headless authorization handshake unconditionally.
    pub async fn authorize(&mut self) -> Result<AuthToken> {
        let csrf: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_PARAM_LEN)
            .map(char::from)
            .collect();
        let url = self.backend.authorize_url(&csrf);

        self.set_state(AuthState::AwaitingUserRedirect);
        let result = self.complete_authorization(&url, &csrf).await;
        if result.is_err() {
            self.set_state(AuthState::Unauthenticated);
        }
        result
    }

    async fn complete_authorization(&mut self, url: &str, csrf: &str) -> Result<AuthToken> {
        let redirect = self.prompt.request_redirect(url).await?;
        let code = parse_redirect(&redirect, csrf)?;

        let token = self.backend.exchange_code(&code).await.map_err(|e| match e {
            BackendError::Network(msg) => ControlError::NetworkError(msg),
            other => ControlError::auth_required(format!("code exchange failed: {}", other)),
        })?;

        info!(expires_at = %token.expires_at, "Authorization completed");
        self.store(token.clone());
        Ok(token)
    }

    async fn refresh(&mut self, refresh_token: &str) -> Result<AuthToken> {
        debug!("Access token close to expiry, refreshing");
        match self.backend.refresh(refresh_token).await {
            Ok(token) => {
                info!(expires_at = %token.expires_at, "Access token refreshed");
                self.store(token.clone());
                Ok(token)
            }
            Err(BackendError::Network(msg)) => {
                warn!("Token refresh failed, keeping the current token: {}", msg);
                Err(ControlError::NetworkError(msg))
            }
            Err(e) => {
                warn!("Token refresh rejected, a new authorization is needed: {}", e);
                self.clear();
                Err(ControlError::auth_required(format!("refresh rejected: {}", e)))
            }
        }
    }

    fn store(&mut self, token: AuthToken) {
        match serde_yaml::to_value(&token) {
            Ok(value) => {
                if let Err(e) = self.settings.write_path(&AUTH_PATH, value) {
                    warn!("Cannot persist the access token: {:#}", e);
                }
            }
            Err(e) => warn!("Cannot serialize the access token: {}", e),
        }
        self.token = Some(token);
        self.set_state(AuthState::Authenticated);
    }

    fn clear(&mut self) {
        if let Err(e) = self.settings.remove_path(&AUTH_PATH) {
            warn!("Cannot remove the stored access token: {:#}", e);
        }
        self.token = None;
        self.set_state(AuthState::Unauthenticated);
    }

    fn set_state(&self, state: AuthState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(?previous, current = ?state, "Auth state changed");
        }
    }
}

fn restore_token(settings: &SettingsFile) -> Option<AuthToken> {
    match settings.read_path(&AUTH_PATH) {
        Ok(Some(value)) => match serde_yaml::from_value::<AuthToken>(value) {
            Ok(token) => {
                info!(expires_at = %token.expires_at, "Restored stored access token");
                Some(token)
            }
            Err(e) => {
                warn!("Ignoring unreadable stored token: {}", e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!("Cannot read stored token: {:#}", e);
            None
        }
    }
}

/// Extracts the authorization code from the redirect URL pasted by the operator.
fn parse_redirect(redirect: &str, expected_state: &str) -> Result<String> {
    let url = Url::parse(redirect.trim())
        .map_err(|e| ControlError::auth_required(format!("invalid redirect URL: {}", e)))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(ControlError::auth_required(format!("authorization denied: {}", error)));
    }
    if state.as_deref() != Some(expected_state) {
        return Err(ControlError::auth_required("state parameter mismatch"));
    }
    code.filter(|c| !c.is_empty())
        .ok_or_else(|| ControlError::auth_required("redirect URL carries no code"))
}
