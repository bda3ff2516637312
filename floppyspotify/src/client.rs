//! Client Spotify de haut niveau branché sur l'orchestrateur

use crate::api::{Credentials, SpotifyApi};
use crate::config_ext::SpotifyConfigExt;
use crate::error::{Result, SpotifyError};
use crate::models::SpotifyDevice;
use async_trait::async_trait;
use floppyconfig::Config;
use floppycontrol::{AuthToken, BackendError, CloudPlayback, DeviceInfo};
use tracing::{debug, warn};

/// Client Spotify implémentant [`CloudPlayback`]
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    api: SpotifyApi,
}

impl SpotifyClient {
    pub fn new(api: SpotifyApi) -> Self {
        Self { api }
    }

    /// Construit le client depuis la section `spotify` de la configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let credentials = Credentials {
            client_id: config.get_spotify_client_id()?,
            client_secret: config.get_spotify_client_secret()?,
            redirect_uri: config.get_spotify_redirect_uri(),
        };
        let api = SpotifyApi::with_base_urls(
            credentials,
            config.get_spotify_request_timeout(),
            &config.get_spotify_api_url(),
            &config.get_spotify_accounts_url(),
        )?;
        Ok(Self::new(api))
    }

    pub fn api(&self) -> &SpotifyApi {
        &self.api
    }

    /// Liste complète des devices Connect, y compris ceux sans id
    pub async fn devices(&self, token: &AuthToken) -> Result<Vec<SpotifyDevice>> {
        self.api.devices(&token.access_token).await
    }
}

#[async_trait]
impl CloudPlayback for SpotifyClient {
    async fn list_active_devices(&self, token: &AuthToken) -> std::result::Result<Vec<DeviceInfo>, BackendError> {
        let devices = self.devices(token).await?;
        Ok(devices
            .iter()
            .filter_map(|device| {
                let info = device.to_device_info();
                if info.is_none() {
                    debug!(name=%device.name, "Skipping Connect device without id");
                }
                info
            })
            .collect())
    }

    async fn play(&self, device_id: &str, uri: &str, token: &AuthToken) -> std::result::Result<(), BackendError> {
        self.api
            .play(&token.access_token, device_id, uri)
            .await
            .map_err(|err| device_error(device_id, err))
    }

    async fn pause(&self, device_id: &str, token: &AuthToken) -> std::result::Result<(), BackendError> {
        self.api
            .pause(&token.access_token, device_id)
            .await
            .map_err(|err| device_error(device_id, err))
    }

    async fn resume(&self, device_id: &str, token: &AuthToken) -> std::result::Result<(), BackendError> {
        self.api
            .resume(&token.access_token, device_id)
            .await
            .map_err(|err| device_error(device_id, err))
    }

    async fn set_shuffle(
        &self,
        device_id: &str,
        shuffle: bool,
        token: &AuthToken,
    ) -> std::result::Result<(), BackendError> {
        self.api
            .shuffle(&token.access_token, device_id, shuffle)
            .await
            .map_err(|err| device_error(device_id, err))
    }

    fn authorize_url(&self, state: &str) -> String {
        self.api.authorize_url(state)
    }

    async fn exchange_code(&self, code: &str) -> std::result::Result<AuthToken, BackendError> {
        Ok(self.api.exchange_code(code).await?)
    }

    async fn refresh(&self, refresh_token: &str) -> std::result::Result<AuthToken, BackendError> {
        Ok(self.api.refresh_token(refresh_token).await?)
    }
}

/// A 404 on a player endpoint means the device id is stale.
fn device_error(device_id: &str, err: SpotifyError) -> BackendError {
    match err {
        SpotifyError::NotFound(message) => {
            warn!(device_id, %message, "Spotify does not know this device");
            BackendError::device_not_found(device_id)
        }
        other => other.into(),
    }
}
