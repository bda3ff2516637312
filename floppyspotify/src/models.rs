//! Structures de données échangées avec l'API Web Spotify

use chrono::{DateTime, Duration, Utc};
use floppycontrol::{AuthToken, DeviceInfo};
use serde::{Deserialize, Serialize};

/// Scopes requis pour lister les devices et lancer la lecture
pub const REQUIRED_SCOPES: &str = "user-read-playback-state user-modify-playback-state";

/// Device Spotify Connect tel que renvoyé par `/v1/me/player/devices`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyDevice {
    /// Absent for restricted devices, which cannot be targeted
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_restricted: bool,
    #[serde(default)]
    pub volume_percent: Option<u8>,
}

impl SpotifyDevice {
    /// Vue réduite utilisée par l'orchestrateur, `None` si le device n'a pas d'id
    pub fn to_device_info(&self) -> Option<DeviceInfo> {
        self.id
            .as_deref()
            .map(|id| DeviceInfo::new(self.name.clone(), id))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<SpotifyDevice>,
}

/// Corps de `PUT /v1/me/player/play`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uris: Option<Vec<String>>,
}

impl PlayRequest {
    /// A single track is played through `uris`; albums, playlists and artists
    /// are contexts.
    pub fn for_uri(uri: &str) -> Self {
        if uri.contains(":track:") {
            Self {
                context_uri: None,
                uris: Some(vec![uri.to_string()]),
            }
        } else {
            Self {
                context_uri: Some(uri.to_string()),
                uris: None,
            }
        }
    }
}

/// Réponse de `/api/token`
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Converts the response into a stored token.
    ///
    /// `previous_refresh` is kept when the response carries no new refresh
    /// token, which is how refresh grants usually answer.
    pub fn into_token(self, previous_refresh: Option<&str>, now: DateTime<Utc>) -> Option<AuthToken> {
        let refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string))?;
        Some(AuthToken {
            access_token: self.access_token,
            refresh_token,
            expires_at: now + Duration::seconds(self.expires_in),
        })
    }
}
