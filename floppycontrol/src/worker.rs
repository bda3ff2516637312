//! Scan worker: the single task that owns the orchestrator.
//!
//! Events are handled one at a time in arrival order. While the orchestrator
//! waits for the operator during authorization, new scans stay queued in the
//! channel.
//!
//! A removed tag only pauses playback once it has stayed away for the
//! removal debounce; putting the same tag back within that delay is a no-op.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::errors::ControlError;
use crate::model::TagEvent;
use crate::orchestrator::{PlaybackOrchestrator, ScanOutcome};

pub const DEFAULT_REMOVAL_DEBOUNCE: Duration = Duration::from_millis(1500);

/// Résumé du dernier événement traité
#[derive(Debug, Clone, Serialize)]
pub struct LastScan {
    pub tag_uid: String,
    pub handled_at: DateTime<Utc>,
    pub result: String,
}

pub struct ScanWorker {
    handle: JoinHandle<()>,
    last_scan: watch::Receiver<Option<LastScan>>,
}

impl ScanWorker {
    pub fn last_scan(&self) -> watch::Receiver<Option<LastScan>> {
        self.last_scan.clone()
    }

    /// Waits until every sender is dropped and the queue is drained.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            error!("Scan worker stopped abnormally: {}", e);
        }
    }
}

pub fn spawn_worker(
    mut orchestrator: PlaybackOrchestrator,
    mut receiver: mpsc::Receiver<TagEvent>,
    removal_debounce: Duration,
) -> ScanWorker {
    let (last_tx, last_scan) = watch::channel(None);

    let handle = tokio::spawn(async move {
        info!(device = %orchestrator.device_name(), "Scan worker started");
        let mut pending_removal: Option<(String, Instant)> = None;

        loop {
            let deadline = pending_removal.as_ref().map(|(_, deadline)| *deadline);
            let event = match deadline {
                Some(deadline) => tokio::select! {
                    event = receiver.recv() => event,
                    _ = tokio::time::sleep_until(deadline) => {
                        if let Some((tag_uid, _)) = pending_removal.take() {
                            let result = pause(&mut orchestrator, &tag_uid).await;
                            publish(&last_tx, tag_uid, result);
                        }
                        continue;
                    }
                },
                None => receiver.recv().await,
            };
            let Some(event) = event else {
                break;
            };

            match event {
                TagEvent::Scanned(tag_uid) => {
                    if let Some((removed, _)) = pending_removal.take() {
                        if removed == tag_uid.trim() {
                            debug!(tag = %removed, "Tag back before the debounce, still playing");
                            continue;
                        }
                    }
                    let result = scan(&mut orchestrator, &tag_uid).await;
                    publish(&last_tx, tag_uid, result);
                }
                TagEvent::Removed(tag_uid) => {
                    debug!(tag = %tag_uid, "Tag removed, waiting {:?} before pausing", removal_debounce);
                    pending_removal = Some((tag_uid.trim().to_string(), Instant::now() + removal_debounce));
                }
                TagEvent::TagsChanged => match orchestrator.reload_tags() {
                    Ok(count) => info!(count, "Tag mappings reloaded"),
                    Err(e) => error!("Cannot reload the tag mappings: {}", e),
                },
            }
        }
        info!("Scan worker stopped");
    });

    ScanWorker { handle, last_scan }
}

async fn scan(orchestrator: &mut PlaybackOrchestrator, tag_uid: &str) -> String {
    match orchestrator.on_tag_scanned(tag_uid).await {
        Ok(ScanOutcome::Ignored { .. }) => "ignored: tag not registered".to_string(),
        Ok(ScanOutcome::Played(request)) => {
            format!("played {} on {}", request.resolved_uri, request.resolved_device_id)
        }
        Ok(ScanOutcome::Resumed { device_id, .. }) => format!("resumed on {}", device_id),
        Err(e) => {
            log_failure(tag_uid, &e);
            e.to_string()
        }
    }
}

async fn pause(orchestrator: &mut PlaybackOrchestrator, tag_uid: &str) -> String {
    match orchestrator.on_tag_removed(tag_uid).await {
        Ok(true) => "paused".to_string(),
        Ok(false) => "removed: nothing to pause".to_string(),
        Err(e) => {
            log_failure(tag_uid, &e);
            e.to_string()
        }
    }
}

fn publish(last_tx: &watch::Sender<Option<LastScan>>, tag_uid: String, result: String) {
    last_tx.send_replace(Some(LastScan {
        tag_uid,
        handled_at: Utc::now(),
        result,
    }));
}

fn log_failure(tag_uid: &str, err: &ControlError) {
    match err {
        ControlError::AuthRequired(_) | ControlError::NetworkError(_) => {
            warn!(tag = tag_uid, "Scan not played: {}", err)
        }
        e if e.is_configuration() => error!(tag = tag_uid, "Configuration error: {}", e),
        _ => error!(tag = tag_uid, "Scan failed: {}", err),
    }
}
