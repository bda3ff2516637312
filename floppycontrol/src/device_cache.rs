//! Device Cache: last known cloud id of each speaker, by name.
//!
//! Stored under `state.devices` in the settings file. Every change is
//! written immediately with an atomic replace of the file.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use floppyconfig::SettingsFile;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{ControlError, Result};
use crate::model::DeviceCacheEntry;

const DEVICES_PATH: [&str; 2] = ["state", "devices"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredDevice {
    device_id: Option<String>,
    verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct DeviceCache {
    settings: SettingsFile,
    entries: BTreeMap<String, StoredDevice>,
}

impl DeviceCache {
    /// Loads the cache. An unreadable cache is logged and starts empty:
    /// losing it only costs one rediscovery.
    pub fn load(settings: SettingsFile) -> Self {
        let entries = match settings.read_path(&DEVICES_PATH) {
            Ok(Some(value)) => serde_yaml::from_value(value).unwrap_or_else(|e| {
                warn!("Ignoring unreadable device cache: {}", e);
                BTreeMap::new()
            }),
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!("Cannot read device cache: {:#}", e);
                BTreeMap::new()
            }
        };
        Self { settings, entries }
    }

    /// Never fails: an unknown name yields an unverified entry.
    pub fn get(&self, device_name: &str) -> DeviceCacheEntry {
        match self.entries.get(device_name) {
            Some(stored) => DeviceCacheEntry {
                device_name: device_name.to_string(),
                device_id: stored.device_id.clone(),
                verified_at: stored.verified_at,
            },
            None => DeviceCacheEntry::unverified(device_name),
        }
    }

    pub fn put(&mut self, device_name: &str, device_id: &str) -> Result<()> {
        self.entries.insert(
            device_name.to_string(),
            StoredDevice {
                device_id: Some(device_id.to_string()),
                verified_at: Some(Utc::now()),
            },
        );
        debug!(device = device_name, id = device_id, "Device id cached");
        self.persist()
    }

    /// Forgets the id but keeps the entry.
    pub fn invalidate(&mut self, device_name: &str) -> Result<()> {
        let entry = self.entries.entry(device_name.to_string()).or_default();
        entry.device_id = None;
        debug!(device = device_name, "Device id invalidated");
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let value = serde_yaml::to_value(&self.entries)
            .map_err(|e| ControlError::Storage(e.to_string()))?;
        self.settings.write_path(&DEVICES_PATH, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> (tempfile::TempDir, SettingsFile, DeviceCache) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "tags: {}\n").unwrap();
        let settings = SettingsFile::new(path);
        let cache = DeviceCache::load(settings.clone());
        (dir, settings, cache)
    }

    #[test]
    fn absent_entry_is_unverified() {
        let (_dir, _settings, cache) = cache();
        let entry = cache.get("Wohnzimmer TV");
        assert_eq!(entry.device_name, "Wohnzimmer TV");
        assert_eq!(entry.device_id, None);
        assert_eq!(entry.verified_at, None);
    }

    #[test]
    fn put_get_invalidate_round_trip() {
        let (_dir, settings, mut cache) = cache();

        cache.put("Wohnzimmer TV", "abc123").unwrap();
        let entry = cache.get("Wohnzimmer TV");
        assert_eq!(entry.device_id.as_deref(), Some("abc123"));
        assert!(entry.verified_at.is_some());

        cache.invalidate("Wohnzimmer TV").unwrap();
        assert_eq!(cache.get("Wohnzimmer TV").device_id, None);

        // l'entrée invalidée survit au rechargement, sans id
        let reloaded = DeviceCache::load(settings);
        let entry = reloaded.get("Wohnzimmer TV");
        assert_eq!(entry.device_id, None);
        assert!(entry.verified_at.is_some());
    }

    #[test]
    fn put_persists_across_restarts() {
        let (_dir, settings, mut cache) = cache();
        cache.put("Kitchen", "k-1").unwrap();
        cache.put("Kitchen", "k-2").unwrap();

        let reloaded = DeviceCache::load(settings);
        assert_eq!(reloaded.get("Kitchen").device_id.as_deref(), Some("k-2"));
    }
}
