//! Couche d'accès à l'API Web Spotify
//!
//! Ce module fournit une interface bas-niveau pour les deux hôtes Spotify :
//! l'API Web (`api.spotify.com`) et le service de comptes
//! (`accounts.spotify.com`) qui délivre les jetons OAuth.

pub mod auth;
pub mod player;

use crate::error::{Result, SpotifyError};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// URL de base de l'API Web
pub const API_BASE_URL: &str = "https://api.spotify.com";

/// URL de base du service de comptes
pub const ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";

/// Identifiants de l'application enregistrée chez Spotify
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Client API bas-niveau pour communiquer avec Spotify
#[derive(Debug, Clone)]
pub struct SpotifyApi {
    /// Client HTTP
    client: Client,
    /// Base de l'API Web, sans slash final
    api_base: String,
    /// Base du service de comptes, sans slash final
    accounts_base: String,
    authorize_endpoint: Url,
    credentials: Credentials,
}

impl SpotifyApi {
    /// Crée une nouvelle instance de l'API vers les hôtes Spotify
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self> {
        Self::with_base_urls(credentials, timeout, API_BASE_URL, ACCOUNTS_BASE_URL)
    }

    /// Crée une instance vers d'autres hôtes (serveur de test, proxy)
    pub fn with_base_urls(
        credentials: Credentials,
        timeout: Duration,
        api_base: &str,
        accounts_base: &str,
    ) -> Result<Self> {
        if credentials.client_id.trim().is_empty() {
            return Err(SpotifyError::Configuration("client_id is empty".into()));
        }
        let api_base = api_base.trim_end_matches('/').to_string();
        let accounts_base = accounts_base.trim_end_matches('/').to_string();
        Url::parse(&api_base)
            .map_err(|e| SpotifyError::Configuration(format!("invalid API URL {}: {}", api_base, e)))?;
        let authorize_endpoint = Url::parse(&format!("{}/authorize", accounts_base)).map_err(|e| {
            SpotifyError::Configuration(format!("invalid accounts URL {}: {}", accounts_base, e))
        })?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base,
            accounts_base,
            authorize_endpoint,
            credentials,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn accounts_base(&self) -> &str {
        &self.accounts_base
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_base, endpoint)
    }

    fn accounts_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.accounts_base, endpoint)
    }

    /// Envoie la requête et parse la réponse JSON
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let text = Self::check_status(response).await?.text().await?;

        serde_json::from_str(&text).map_err(|e| {
            warn!("Failed to parse response: {}", e);
            SpotifyError::JsonParse(e)
        })
    }

    /// Envoie la requête en ignorant le corps de la réponse (204 No Content)
    async fn send_empty(&self, request: RequestBuilder) -> Result<()> {
        let response = request.send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// Traite le statut HTTP
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        let status_code = status.as_u16();

        debug!("Response status: {}", status);

        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        let message = error_message(&error_text);
        warn!("API error ({}): {}", status_code, message);
        Err(SpotifyError::from_status_code(status_code, message))
    }
}

/// Extrait le message lisible d'un corps d'erreur Spotify.
///
/// The Web API answers `{"error":{"status":..,"message":..}}`, the accounts
/// service `{"error":"invalid_grant","error_description":..}`.
fn error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    let error = json.get("error");
    if let Some(message) = error.and_then(|e| e.get("message")).and_then(Value::as_str) {
        return message.to_string();
    }
    match (
        error.and_then(Value::as_str),
        json.get("error_description").and_then(Value::as_str),
    ) {
        (Some(code), Some(description)) => format!("{}: {}", code, description),
        (Some(code), None) => code.to_string(),
        _ => body.trim().to_string(),
    }
}
