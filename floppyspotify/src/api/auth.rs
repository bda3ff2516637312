//! Flux OAuth « authorization code » du service de comptes Spotify

use super::SpotifyApi;
use crate::error::{Result, SpotifyError};
use crate::models::{REQUIRED_SCOPES, TokenResponse};
use chrono::Utc;
use floppycontrol::AuthToken;
use tracing::{debug, info};

impl SpotifyApi {
    /// URL `/authorize` que l'opérateur ouvre dans un navigateur
    pub fn authorize_url(&self, state: &str) -> String {
        let mut url = self.authorize_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.credentials.redirect_uri)
            .append_pair("scope", REQUIRED_SCOPES)
            .append_pair("state", state);
        url.into()
    }

    /// Échange un code d'autorisation contre un jeton
    pub async fn exchange_code(&self, code: &str) -> Result<AuthToken> {
        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
            ])
            .await?;
        let token = response
            .into_token(None, Utc::now())
            .ok_or_else(|| SpotifyError::Other("token response carries no refresh_token".into()))?;
        info!(expires_at=%token.expires_at, "Authorization code exchanged");
        Ok(token)
    }

    /// Renouvelle le jeton d'accès avec un refresh token
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<AuthToken> {
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        let token = response
            .into_token(Some(refresh_token), Utc::now())
            .ok_or_else(|| SpotifyError::Other("token response carries no refresh_token".into()))?;
        debug!(expires_at=%token.expires_at, "Access token refreshed");
        Ok(token)
    }

    /// `POST /api/token`, client authenticated with HTTP basic
    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let request = self
            .client
            .post(self.accounts_url("/api/token"))
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(form);
        self.send_json(request).await
    }
}
