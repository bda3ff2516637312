//! Extension pour intégrer la configuration Spotify dans floppyconfig
//!
//! Ce module fournit le trait `SpotifyConfigExt` qui ajoute à
//! `floppyconfig::Config` les méthodes de lecture de la section `spotify`.

use std::time::Duration;

use anyhow::{Result, anyhow};
use floppyconfig::Config;

use crate::api::{ACCOUNTS_BASE_URL, API_BASE_URL};

const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Trait d'extension pour gérer la configuration Spotify
///
/// # Exemple
///
/// ```rust,ignore
/// use floppyconfig::Config;
/// use floppyspotify::SpotifyConfigExt;
///
/// let config = Config::load(Config::default_settings_path())?;
/// println!("Spotify app: {}", config.get_spotify_client_id()?);
/// ```
pub trait SpotifyConfigExt {
    /// Client ID de l'application Spotify
    ///
    /// # Errors
    ///
    /// Retourne une erreur si `spotify.client_id` est absent ou vide
    fn get_spotify_client_id(&self) -> Result<String>;

    /// Client secret de l'application Spotify
    ///
    /// # Errors
    ///
    /// Retourne une erreur si `spotify.client_secret` est absent ou vide
    fn get_spotify_client_secret(&self) -> Result<String>;

    /// Must match one of the redirect URIs registered for the application.
    fn get_spotify_redirect_uri(&self) -> String;

    fn get_spotify_request_timeout(&self) -> Duration;

    /// Base de l'API Web (`spotify.api_url`)
    fn get_spotify_api_url(&self) -> String;

    /// Base du service de comptes (`spotify.accounts_url`)
    fn get_spotify_accounts_url(&self) -> String;
}

impl SpotifyConfigExt for Config {
    fn get_spotify_client_id(&self) -> Result<String> {
        self.get_string(&["spotify", "client_id"])
            .ok_or_else(|| anyhow!("spotify.client_id is not configured"))
    }

    fn get_spotify_client_secret(&self) -> Result<String> {
        self.get_string(&["spotify", "client_secret"])
            .ok_or_else(|| anyhow!("spotify.client_secret is not configured"))
    }

    fn get_spotify_redirect_uri(&self) -> String {
        self.get_string(&["spotify", "redirect_uri"])
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string())
    }

    fn get_spotify_request_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64(
            &["spotify", "request_timeout_secs"],
            DEFAULT_REQUEST_TIMEOUT_SECS,
        ))
    }

    fn get_spotify_api_url(&self) -> String {
        self.get_string(&["spotify", "api_url"])
            .unwrap_or_else(|| API_BASE_URL.to_string())
    }

    fn get_spotify_accounts_url(&self) -> String {
        self.get_string(&["spotify", "accounts_url"])
            .unwrap_or_else(|| ACCOUNTS_BASE_URL.to_string())
    }
}
