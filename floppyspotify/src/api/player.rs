//! Endpoints du lecteur : devices Connect, lecture, pause et mode aléatoire

use super::SpotifyApi;
use crate::error::Result;
use crate::models::{DevicesResponse, PlayRequest, SpotifyDevice};
use tracing::debug;

impl SpotifyApi {
    /// `GET /v1/me/player/devices`
    pub async fn devices(&self, access_token: &str) -> Result<Vec<SpotifyDevice>> {
        let request = self
            .client
            .get(self.api_url("/v1/me/player/devices"))
            .bearer_auth(access_token);
        let response: DevicesResponse = self.send_json(request).await?;
        debug!("{} Connect devices listed", response.devices.len());
        Ok(response.devices)
    }

    /// `PUT /v1/me/player/play?device_id=...`
    pub async fn play(&self, access_token: &str, device_id: &str, uri: &str) -> Result<()> {
        let body = PlayRequest::for_uri(uri);
        debug!(device_id, uri, "Starting playback");
        let request = self
            .client
            .put(self.api_url("/v1/me/player/play"))
            .query(&[("device_id", device_id)])
            .bearer_auth(access_token)
            .json(&body);
        self.send_empty(request).await
    }

    /// `PUT /v1/me/player/pause?device_id=...`
    pub async fn pause(&self, access_token: &str, device_id: &str) -> Result<()> {
        debug!(device_id, "Pausing playback");
        let request = self
            .client
            .put(self.api_url("/v1/me/player/pause"))
            .query(&[("device_id", device_id)])
            .bearer_auth(access_token);
        self.send_empty(request).await
    }

    /// `PUT /v1/me/player/play?device_id=...` without a body resumes the
    /// current context where it stopped.
    pub async fn resume(&self, access_token: &str, device_id: &str) -> Result<()> {
        debug!(device_id, "Resuming playback");
        let request = self
            .client
            .put(self.api_url("/v1/me/player/play"))
            .query(&[("device_id", device_id)])
            .bearer_auth(access_token);
        self.send_empty(request).await
    }

    /// `PUT /v1/me/player/shuffle?state=...&device_id=...`
    pub async fn shuffle(&self, access_token: &str, device_id: &str, state: bool) -> Result<()> {
        let state = if state { "true" } else { "false" };
        debug!(device_id, state, "Setting shuffle");
        let request = self
            .client
            .put(self.api_url("/v1/me/player/shuffle"))
            .query(&[("state", state), ("device_id", device_id)])
            .bearer_auth(access_token);
        self.send_empty(request).await
    }
}
