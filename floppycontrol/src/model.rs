use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// What a tag points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "floppyserver", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Opaque cloud-catalog identifier, e.g. `spotify:album:...`
    StreamUri,
    /// Filename under the local media root
    LocalFile,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::StreamUri => write!(f, "stream_uri"),
            TargetKind::LocalFile => write!(f, "local_file"),
        }
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "stream_uri" | "stream" | "spotify" => Ok(TargetKind::StreamUri),
            "local_file" | "local" | "file" => Ok(TargetKind::LocalFile),
            other => Err(format!(
                "unknown target kind '{}' (expected stream_uri or local_file)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagMapping {
    pub tag_uid: String,
    /// Label shown to the operator, never used for routing
    pub name: Option<String>,
    pub target_kind: TargetKind,
    pub target_value: String,
    /// Play the album or playlist in random order
    pub shuffle: bool,
}

impl TagMapping {
    pub fn new(tag_uid: impl Into<String>, target_kind: TargetKind, target_value: impl Into<String>) -> Self {
        Self {
            tag_uid: tag_uid.into(),
            name: None,
            target_kind,
            target_value: target_value.into(),
            shuffle: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }
}

/// Last known cloud id of a speaker. `device_id == None` means "rediscover".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCacheEntry {
    pub device_name: String,
    pub device_id: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl DeviceCacheEntry {
    pub fn unverified(device_name: &str) -> Self {
        Self {
            device_name: device_name.to_string(),
            device_id: None,
            verified_at: None,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// True when the token expires in `margin` or less.
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= margin
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// One play command, as issued for a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackRequest {
    pub tag_uid: String,
    pub resolved_uri: String,
    pub resolved_device_id: String,
    pub attempted_at: DateTime<Utc>,
}

/// A device as listed by the cloud backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub id: String,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// What the scan worker receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    /// A tag was placed on the reader
    Scanned(String),
    /// The tag left the reader; playback pauses once the debounce elapses
    Removed(String),
    /// The `tags` section was edited; the registry is re-read
    TagsChanged,
}
