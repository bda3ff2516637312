use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::BackendError;
use crate::model::{AuthToken, DeviceInfo};

/// Cloud playback collaborator used by the orchestrator.
///
/// Everything else about the streaming service stays behind the
/// implementation.
#[async_trait]
pub trait CloudPlayback: Send + Sync {
    /// Devices currently reachable through the cloud service.
    async fn list_active_devices(&self, token: &AuthToken) -> Result<Vec<DeviceInfo>, BackendError>;

    /// Starts playback of `uri` on `device_id`.
    async fn play(&self, device_id: &str, uri: &str, token: &AuthToken) -> Result<(), BackendError>;

    async fn pause(&self, device_id: &str, token: &AuthToken) -> Result<(), BackendError>;

    /// Continues the paused playback where it stopped.
    async fn resume(&self, device_id: &str, token: &AuthToken) -> Result<(), BackendError>;

    /// Turns random order on or off for what `device_id` is playing.
    async fn set_shuffle(&self, device_id: &str, shuffle: bool, token: &AuthToken) -> Result<(), BackendError>;

    /// URL the operator opens to grant access; `state` comes back in the redirect.
    fn authorize_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<AuthToken, BackendError>;

    async fn refresh(&self, refresh_token: &str) -> Result<AuthToken, BackendError>;
}

#[async_trait]
impl<T: CloudPlayback + ?Sized> CloudPlayback for Arc<T> {
    async fn list_active_devices(&self, token: &AuthToken) -> Result<Vec<DeviceInfo>, BackendError> {
        (**self).list_active_devices(token).await
    }

    async fn play(&self, device_id: &str, uri: &str, token: &AuthToken) -> Result<(), BackendError> {
        (**self).play(device_id, uri, token).await
    }

    async fn pause(&self, device_id: &str, token: &AuthToken) -> Result<(), BackendError> {
        (**self).pause(device_id, token).await
    }

    async fn resume(&self, device_id: &str, token: &AuthToken) -> Result<(), BackendError> {
        (**self).resume(device_id, token).await
    }

    async fn set_shuffle(&self, device_id: &str, shuffle: bool, token: &AuthToken) -> Result<(), BackendError> {
        (**self).set_shuffle(device_id, shuffle, token).await
    }

    fn authorize_url(&self, state: &str) -> String {
        (**self).authorize_url(state)
    }

    async fn exchange_code(&self, code: &str) -> Result<AuthToken, BackendError> {
        (**self).exchange_code(code).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthToken, BackendError> {
        (**self).refresh(refresh_token).await
    }
}
