use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::info;

use crate::avtransport::AvTransportRenderer;
use crate::backend::CloudPlayback;
use crate::errors::BackendError;
use crate::model::{AuthToken, DeviceInfo};

/// Sends plain HTTP URLs to a UPnP renderer and everything else to the cloud.
///
/// The cloud service cannot play a file hosted on the LAN, so when a renderer
/// is configured, `http(s)://` URIs are handed to it directly. Device listing
/// and authorization always go to the cloud backend. Pause, resume and
/// shuffle follow the route of the last `play`.
pub struct RoutedPlayback {
    cloud: Arc<dyn CloudPlayback>,
    renderer: Option<AvTransportRenderer>,
    on_renderer: AtomicBool,
}

impl RoutedPlayback {
    pub fn new(cloud: Arc<dyn CloudPlayback>, renderer: Option<AvTransportRenderer>) -> Self {
        Self {
            cloud,
            renderer,
            on_renderer: AtomicBool::new(false),
        }
    }

    /// Renderer holding the current playback, if the last `play` went there.
    fn active_renderer(&self) -> Option<&AvTransportRenderer> {
        self.renderer
            .as_ref()
            .filter(|_| self.on_renderer.load(Ordering::SeqCst))
    }
}

fn is_http(uri: &str) -> bool {
    let lower = uri.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[async_trait]
impl CloudPlayback for RoutedPlayback {
    async fn list_active_devices(&self, token: &AuthToken) -> Result<Vec<DeviceInfo>, BackendError> {
        self.cloud.list_active_devices(token).await
    }

    async fn play(&self, device_id: &str, uri: &str, token: &AuthToken) -> Result<(), BackendError> {
        match &self.renderer {
            Some(renderer) if is_http(uri) => {
                info!(renderer = renderer.control_url(), uri, "Sending local file to the renderer");
                renderer.play_uri(uri).await?;
                self.on_renderer.store(true, Ordering::SeqCst);
                Ok(())
            }
            _ => {
                self.cloud.play(device_id, uri, token).await?;
                self.on_renderer.store(false, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    async fn pause(&self, device_id: &str, token: &AuthToken) -> Result<(), BackendError> {
        match self.active_renderer() {
            Some(renderer) => renderer.pause().await,
            None => self.cloud.pause(device_id, token).await,
        }
    }

    async fn resume(&self, device_id: &str, token: &AuthToken) -> Result<(), BackendError> {
        match self.active_renderer() {
            Some(renderer) => renderer.resume().await,
            None => self.cloud.resume(device_id, token).await,
        }
    }

    async fn set_shuffle(&self, device_id: &str, shuffle: bool, token: &AuthToken) -> Result<(), BackendError> {
        match self.active_renderer() {
            Some(renderer) => renderer.set_shuffle(shuffle).await,
            None => self.cloud.set_shuffle(device_id, shuffle, token).await,
        }
    }

    fn authorize_url(&self, state: &str) -> String {
        self.cloud.authorize_url(state)
    }

    async fn exchange_code(&self, code: &str) -> Result<AuthToken, BackendError> {
        self.cloud.exchange_code(code).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthToken, BackendError> {
        self.cloud.refresh(refresh_token).await
    }
}
