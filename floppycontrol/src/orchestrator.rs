//! Playback Orchestrator: one scanned tag, one play command.
//!
//! The orchestrator also remembers what the last successful scan started, so
//! that removing the tag pauses it and putting the same tag back resumes it
//! instead of starting over.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use floppymedia::LocalMediaServer;
use tracing::{debug, info, warn};

use crate::auth::AuthSessionManager;
use crate::backend::CloudPlayback;
use crate::device_cache::DeviceCache;
use crate::errors::{BackendError, ControlError, Result};
use crate::model::{AuthToken, DeviceInfo, PlaybackRequest, TagMapping, TargetKind};
use crate::registry::TagRegistry;

const DEFAULT_NETWORK_RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Speaker name as listed by the cloud service
    pub device_name: String,
    /// Pause before the single retry of a call that failed on the network
    pub network_retry_backoff: Duration,
}

impl OrchestratorOptions {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            network_retry_backoff: DEFAULT_NETWORK_RETRY_BACKOFF,
        }
    }
}

/// How a scan ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The tag is not registered; nothing was played.
    Ignored { tag_uid: String },
    Played(PlaybackRequest),
    /// The tag came back while its playback was paused.
    Resumed { tag_uid: String, device_id: String },
}

/// Lecture lancée par le dernier scan réussi
#[derive(Debug, Clone)]
struct Session {
    tag_uid: String,
    device_id: String,
    paused: bool,
}

pub struct PlaybackOrchestrator {
    registry: TagRegistry,
    cache: DeviceCache,
    auth: AuthSessionManager,
    media: Arc<LocalMediaServer>,
    backend: Arc<dyn CloudPlayback>,
    options: OrchestratorOptions,
    session: Option<Session>,
}

impl PlaybackOrchestrator {
    pub fn new(
        registry: TagRegistry,
        cache: DeviceCache,
        auth: AuthSessionManager,
        media: Arc<LocalMediaServer>,
        backend: Arc<dyn CloudPlayback>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            registry,
            cache,
            auth,
            media,
            backend,
            options,
            session: None,
        }
    }

    pub fn device_name(&self) -> &str {
        &self.options.device_name
    }

    /// Re-reads the tag mappings after they were edited.
    pub fn reload_tags(&mut self) -> Result<usize> {
        self.registry.reload()
    }

    /// Handles one scan event.
    ///
    /// A cached device id is tried first. When the backend no longer knows
    /// it, the configured name is looked up in the active device list and the
    /// play command is retried exactly once with the fresh id.
    pub async fn on_tag_scanned(&mut self, tag_uid: &str) -> Result<ScanOutcome> {
        let mapping = match self.registry.lookup(tag_uid) {
            Ok(mapping) => mapping,
            Err(ControlError::TagNotRegistered(uid)) => {
                info!(tag = %uid, "Unregistered tag, ignoring");
                return Ok(ScanOutcome::Ignored { tag_uid: uid });
            }
            Err(e) => return Err(e),
        };
        if self.options.device_name.trim().is_empty() {
            return Err(ControlError::device_unavailable(
                "",
                "no speaker configured (speaker.device_name)",
            ));
        }

        if let Some(session) = self.paused_session(&mapping.tag_uid) {
            match self.resume(session).await {
                Ok(outcome) => return Ok(outcome),
                Err(e @ ControlError::AuthRequired(_)) => return Err(e),
                Err(e) => info!(tag = %mapping.tag_uid, "Cannot resume, starting over: {}", e),
            }
        }

        let uri = self.resolve_uri(&mapping);
        info!(tag = %mapping.tag_uid, name = ?mapping.name, uri = %uri, "Tag scanned");

        let token = self.auth.ensure_valid_token().await?;
        let entry = self.cache.get(&self.options.device_name);

        if let Some(cached_id) = entry.device_id.as_deref() {
            let attempted_at = Utc::now();
            match self.play_on(cached_id, &uri, &token).await {
                Ok(()) => {
                    return Ok(self.played(&mapping, uri, cached_id, &token, attempted_at).await);
                }
                Err(e) if e.is_device_not_found() => {
                    info!(device = %self.options.device_name, id = cached_id, "Cached device id is stale, rediscovering");
                }
                Err(e) if e.is_unauthorized() => return Err(self.token_refused(e)),
                Err(e) => {
                    warn!(device = %self.options.device_name, "Playback failed: {}", e);
                    return Err(ControlError::playback_failed(e.to_string()));
                }
            }
        }

        let device_id = match self.discover(&token).await {
            Ok(device_id) => device_id,
            Err(e) => {
                // un jeton refusé ne dit rien du device en cache
                if entry.device_id.is_some() && !matches!(e, ControlError::AuthRequired(_)) {
                    self.invalidate();
                }
                return Err(e);
            }
        };
        if let Err(e) = self.cache.put(&self.options.device_name, &device_id) {
            warn!("Cannot persist the device id: {}", e);
        }

        let attempted_at = Utc::now();
        match self.play_on(&device_id, &uri, &token).await {
            Ok(()) => Ok(self.played(&mapping, uri, &device_id, &token, attempted_at).await),
            Err(e) if e.is_unauthorized() => Err(self.token_refused(e)),
            Err(e) => {
                self.invalidate();
                warn!(device = %self.options.device_name, id = %device_id, "Playback failed after rediscovery: {}", e);
                if e.is_device_not_found() {
                    Err(ControlError::device_unavailable(
                        &self.options.device_name,
                        format!("device id {} rejected right after discovery", device_id),
                    ))
                } else {
                    Err(ControlError::playback_failed(e.to_string()))
                }
            }
        }
    }

    /// Pauses the playback `tag_uid` started, once the tag left the reader.
    ///
    /// Returns `false` when that tag is not what is playing. The operator is
    /// never prompted here: without a usable token this is `AuthRequired`.
    pub async fn on_tag_removed(&mut self, tag_uid: &str) -> Result<bool> {
        let tag_uid = tag_uid.trim();
        let device_id = match &self.session {
            Some(session) if session.tag_uid == tag_uid && !session.paused => session.device_id.clone(),
            _ => {
                debug!(tag = tag_uid, "Removed tag is not playing, nothing to pause");
                return Ok(false);
            }
        };

        let token = self.auth.stored_token().await?;
        let result = self
            .retry_once("Pause command", || self.backend.pause(&device_id, &token))
            .await;
        if let Some(session) = self.session.as_mut() {
            session.paused = true;
        }

        match result {
            Ok(()) => {
                info!(tag = tag_uid, device = %self.options.device_name, "Playback paused");
                Ok(true)
            }
            Err(e) if e.is_unauthorized() => Err(self.token_refused(e)),
            Err(e) => {
                warn!(tag = tag_uid, "Pause failed: {}", e);
                Err(ControlError::playback_failed(format!("pause failed: {}", e)))
            }
        }
    }

    fn paused_session(&self, tag_uid: &str) -> Option<Session> {
        self.session
            .as_ref()
            .filter(|session| session.paused && session.tag_uid == tag_uid)
            .cloned()
    }

    async fn resume(&mut self, session: Session) -> Result<ScanOutcome> {
        let token = self.auth.ensure_valid_token().await?;
        let result = self
            .retry_once("Resume command", || self.backend.resume(&session.device_id, &token))
            .await;

        match result {
            Ok(()) => {
                info!(tag = %session.tag_uid, device = %self.options.device_name, "Playback resumed");
                let outcome = ScanOutcome::Resumed {
                    tag_uid: session.tag_uid.clone(),
                    device_id: session.device_id.clone(),
                };
                self.session = Some(Session {
                    paused: false,
                    ..session
                });
                Ok(outcome)
            }
            Err(e) if e.is_unauthorized() => Err(self.token_refused(e)),
            Err(e) => {
                self.session = None;
                Err(ControlError::playback_failed(format!("resume failed: {}", e)))
            }
        }
    }

    fn resolve_uri(&self, mapping: &TagMapping) -> String {
        match mapping.target_kind {
            TargetKind::StreamUri => mapping.target_value.clone(),
            TargetKind::LocalFile => self.media.build_uri(&mapping.target_value),
        }
    }

    /// Finds the id of the configured speaker among the active devices.
    async fn discover(&mut self, token: &AuthToken) -> Result<String> {
        let name = self.options.device_name.clone();
        let listed = match self.backend.list_active_devices(token).await {
            Err(e) if e.is_network() => {
                warn!("Listing devices failed, retrying once: {}", e);
                tokio::time::sleep(self.options.network_retry_backoff).await;
                self.backend.list_active_devices(token).await
            }
            other => other,
        };
        let devices = match listed {
            Ok(devices) => devices,
            Err(e) if e.is_unauthorized() => return Err(self.token_refused(e)),
            Err(e) => {
                return Err(ControlError::device_unavailable(
                    &name,
                    format!("cannot list devices: {}", e),
                ));
            }
        };

        let device_id = match_device(&devices, &name)?;
        debug!(device = %name, id = %device_id, "Device resolved");
        Ok(device_id)
    }

    async fn play_on(
        &self,
        device_id: &str,
        uri: &str,
        token: &AuthToken,
    ) -> std::result::Result<(), BackendError> {
        self.retry_once("Play command", || self.backend.play(device_id, uri, token))
            .await
    }

    /// Runs `call`, and once more after the backoff if it failed on the network.
    async fn retry_once<F, Fut>(&self, action: &str, call: F) -> std::result::Result<(), BackendError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<(), BackendError>>,
    {
        match call().await {
            Err(e) if e.is_network() => {
                warn!("{} failed, retrying once: {}", action, e);
                tokio::time::sleep(self.options.network_retry_backoff).await;
                call().await
            }
            other => other,
        }
    }

    async fn played(
        &mut self,
        mapping: &TagMapping,
        uri: String,
        device_id: &str,
        token: &AuthToken,
        attempted_at: chrono::DateTime<Utc>,
    ) -> ScanOutcome {
        if let Err(e) = self.backend.set_shuffle(device_id, mapping.shuffle, token).await {
            warn!(tag = %mapping.tag_uid, shuffle = mapping.shuffle, "Cannot set the shuffle mode: {}", e);
        }
        info!(tag = %mapping.tag_uid, device = %self.options.device_name, uri = %uri, "Playback started");

        self.session = Some(Session {
            tag_uid: mapping.tag_uid.clone(),
            device_id: device_id.to_string(),
            paused: false,
        });
        ScanOutcome::Played(PlaybackRequest {
            tag_uid: mapping.tag_uid.clone(),
            resolved_uri: uri,
            resolved_device_id: device_id.to_string(),
            attempted_at,
        })
    }

    /// The backend refused the token: drop it, keep the device cache.
    fn token_refused(&mut self, err: BackendError) -> ControlError {
        self.auth.invalidate_token();
        ControlError::auth_required(format!("access token refused: {}", err))
    }

    fn invalidate(&mut self) {
        if let Err(e) = self.cache.invalidate(&self.options.device_name) {
            warn!("Cannot invalidate the cached device id: {}", e);
        }
    }
}

/// Case-insensitive exact match on the device name.
fn match_device(devices: &[DeviceInfo], name: &str) -> Result<String> {
    let wanted = name.trim().to_lowercase();
    let matches: Vec<&DeviceInfo> = devices
        .iter()
        .filter(|d| d.name.trim().to_lowercase() == wanted)
        .collect();

    match matches.as_slice() {
        [device] => Ok(device.id.clone()),
        [] => {
            let available: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
            Err(ControlError::device_unavailable(
                name,
                format!("not in the active device list {:?}", available),
            ))
        }
        several => Err(ControlError::AmbiguousDevice {
            device: name.to_string(),
            ids: several.iter().map(|d| d.id.clone()).collect(),
        }),
    }
}
