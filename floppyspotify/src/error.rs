//! Gestion des erreurs pour le client Spotify

use floppycontrol::BackendError;
use thiserror::Error;

/// Type Result personnalisé pour floppyspotify
pub type Result<T> = std::result::Result<T, SpotifyError>;

/// Erreurs possibles lors de l'utilisation de l'API Web Spotify
#[derive(Error, Debug)]
pub enum SpotifyError {
    /// Jeton refusé (401) : une nouvelle autorisation est nécessaire
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Requête interdite pour ce compte ou cet état du lecteur (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Ressource non trouvée (device, playlist, etc.)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Erreur HTTP
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Erreur de parsing JSON
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Erreur de configuration (anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Erreur de configuration Spotify (client id, URLs, etc.)
    #[error("Spotify configuration error: {0}")]
    Configuration(String),

    /// Erreur de l'API Spotify
    #[error("Spotify API error (code {code}): {message}")]
    ApiError { code: u16, message: String },

    /// Quota dépassé (rate limiting)
    #[error("Rate limit exceeded, please try again later")]
    RateLimitExceeded,

    /// Erreur générique
    #[error("Spotify error: {0}")]
    Other(String),
}

impl SpotifyError {
    /// Crée une erreur API depuis un code de statut HTTP et un message
    pub fn from_status_code(code: u16, message: impl Into<String>) -> Self {
        match code {
            401 => Self::Unauthorized(message.into()),
            403 => Self::Forbidden(message.into()),
            404 => Self::NotFound(message.into()),
            429 => Self::RateLimitExceeded,
            _ => Self::ApiError {
                code,
                message: message.into(),
            },
        }
    }

    /// The access token itself was refused; refreshing or re-authorizing helps.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, SpotifyError::Unauthorized(_))
    }

    /// Transient failures: timeouts, refused connections, 5xx and rate limiting.
    pub fn is_network(&self) -> bool {
        match self {
            SpotifyError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            SpotifyError::ApiError { code, .. } => *code >= 500,
            SpotifyError::RateLimitExceeded => true,
            _ => false,
        }
    }
}

impl From<SpotifyError> for BackendError {
    fn from(err: SpotifyError) -> Self {
        match err {
            SpotifyError::NotFound(message) => BackendError::DeviceNotFound(message),
            e if e.is_auth_error() => BackendError::unauthorized(e.to_string()),
            e if e.is_network() => BackendError::network(e.to_string()),
            e => BackendError::rejected(e.to_string()),
        }
    }
}
