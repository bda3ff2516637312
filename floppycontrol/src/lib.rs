//! # floppycontrol - du tag NFC au haut-parleur
//!
//! This crate turns a scanned tag into sounding audio:
//!
//! - [`TagRegistry`] maps tag uids to a stream URI or a local file
//! - [`DeviceCache`] remembers the cloud-side id of the configured speaker
//! - [`AuthSessionManager`] keeps a valid cloud token, running the headless
//!   authorization handshake through an [`AuthPrompt`] when needed
//! - [`PlaybackOrchestrator`] composes them with a [`CloudPlayback`] backend
//! - [`spawn_worker`] feeds the orchestrator one [`TagEvent`] at a time and
//!   pauses playback when a tag stays away from the reader
//!
//! Local files are served by `floppymedia`; [`RoutedPlayback`] can send their
//! URLs straight to a UPnP renderer instead of the cloud backend.
//!
//! With the `floppyserver` feature, [`OperatorApiExt`] exposes the operator
//! HTTP API (status, manual scans, tag mappings, authorization handshake).

pub mod auth;
pub mod avtransport;
pub mod backend;
pub mod config_ext;
pub mod device_cache;
pub mod errors;
pub mod model;
pub mod operator;
pub mod orchestrator;
pub mod registry;
pub mod routing;
pub mod worker;

// floppyserver extension (optional)
#[cfg(feature = "floppyserver")]
pub mod openapi;
#[cfg(feature = "floppyserver")]
pub mod server_ext;

pub use auth::{AuthSessionManager, AuthState};
pub use avtransport::AvTransportRenderer;
pub use backend::CloudPlayback;
pub use config_ext::ControlConfigExt;
pub use device_cache::DeviceCache;
pub use errors::{BackendError, ControlError, Result};
pub use model::{
    AuthToken, DeviceCacheEntry, DeviceInfo, PlaybackRequest, TagEvent, TagMapping, TargetKind,
};
pub use operator::{AuthPrompt, OperatorChannel};
pub use orchestrator::{OrchestratorOptions, PlaybackOrchestrator, ScanOutcome};
pub use registry::TagRegistry;
pub use routing::RoutedPlayback;
pub use worker::{DEFAULT_REMOVAL_DEBOUNCE, LastScan, ScanWorker, spawn_worker};

#[cfg(feature = "floppyserver")]
pub use server_ext::{OperatorApiExt, OperatorApiState};
