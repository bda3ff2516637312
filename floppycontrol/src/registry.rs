//! Tag Registry: tag uid → what to play.
//!
//! Mappings live in the `tags` section of the settings file. The registry
//! reads them once; the running orchestrator never writes them.

use std::collections::BTreeMap;

use floppyconfig::SettingsFile;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::{info, warn};

use crate::errors::{ControlError, Result};
use crate::model::{TagMapping, TargetKind};

const TAGS_SECTION: &str = "tags";

/// Forme stockée d'un tag dans le fichier de réglages
#[derive(Debug, Serialize, Deserialize)]
struct StoredTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    kind: TargetKind,
    value: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    shuffle: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    settings: Option<SettingsFile>,
    mappings: BTreeMap<String, TagMapping>,
}

impl TagRegistry {
    /// Loads the `tags` section of `settings`.
    ///
    /// Malformed entries are skipped with a warning so that one typo does
    /// not disable every other tag.
    pub fn load(settings: SettingsFile) -> Result<Self> {
        let mut registry = Self {
            settings: Some(settings),
            mappings: BTreeMap::new(),
        };
        registry.reload()?;
        Ok(registry)
    }

    /// Registry not backed by a file.
    pub fn from_mappings(mappings: impl IntoIterator<Item = TagMapping>) -> Self {
        Self {
            settings: None,
            mappings: mappings
                .into_iter()
                .map(|m| (m.tag_uid.clone(), m))
                .collect(),
        }
    }

    pub fn lookup(&self, tag_uid: &str) -> Result<TagMapping> {
        self.mappings
            .get(tag_uid.trim())
            .cloned()
            .ok_or_else(|| ControlError::TagNotRegistered(tag_uid.to_string()))
    }

    pub fn mappings(&self) -> impl Iterator<Item = &TagMapping> {
        self.mappings.values()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Re-reads the settings file. Returns the number of mappings loaded.
    pub fn reload(&mut self) -> Result<usize> {
        let Some(settings) = &self.settings else {
            return Ok(self.mappings.len());
        };

        let section = settings.read_path(&[TAGS_SECTION])?;
        self.mappings = parse_section(section.unwrap_or(Value::Null));
        info!(count = self.mappings.len(), "Tag registry loaded");
        Ok(self.mappings.len())
    }

    /// Adds or replaces a mapping, rewriting only its entry in the file.
    pub fn save_mapping(&mut self, mapping: TagMapping) -> Result<()> {
        if let Some(settings) = &self.settings {
            let stored = StoredTag {
                name: mapping.name.clone(),
                kind: mapping.target_kind,
                value: mapping.target_value.clone(),
                shuffle: mapping.shuffle,
            };
            let value = serde_yaml::to_value(&stored)
                .map_err(|e| ControlError::Storage(e.to_string()))?;
            settings.write_path(&[TAGS_SECTION, &mapping.tag_uid], value)?;
        }
        self.mappings.insert(mapping.tag_uid.clone(), mapping);
        Ok(())
    }

    /// Removes a mapping. Returns `false` when the uid was not registered.
    pub fn remove_mapping(&mut self, tag_uid: &str) -> Result<bool> {
        let tag_uid = tag_uid.trim();
        let in_file = match &self.settings {
            Some(settings) => settings.remove_path(&[TAGS_SECTION, tag_uid])?,
            None => false,
        };
        let in_memory = self.mappings.remove(tag_uid).is_some();
        Ok(in_file || in_memory)
    }
}

fn parse_section(section: Value) -> BTreeMap<String, TagMapping> {
    let Value::Mapping(entries) = section else {
        if !section.is_null() {
            warn!("The tags section is not a mapping, no tag registered");
        }
        return BTreeMap::new();
    };

    let mut mappings = BTreeMap::new();
    for (key, value) in entries {
        // Un uid purement numérique est lu comme un nombre YAML
        let tag_uid = match key {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                warn!(key = ?other, "Ignoring tag with an unusable uid");
                continue;
            }
        };
        let tag_uid = tag_uid.trim().to_string();

        match serde_yaml::from_value::<StoredTag>(value) {
            Ok(stored) => {
                mappings.insert(
                    tag_uid.clone(),
                    TagMapping {
                        tag_uid,
                        name: stored.name,
                        target_kind: stored.kind,
                        target_value: stored.value,
                        shuffle: stored.shuffle,
                    },
                );
            }
            Err(e) => warn!(tag = %tag_uid, "Ignoring malformed tag mapping: {}", e),
        }
    }
    mappings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(content: &str) -> (tempfile::TempDir, SettingsFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, content).unwrap();
        (dir, SettingsFile::new(path))
    }

    #[test]
    fn lookup_is_idempotent() {
        let (_dir, settings) = settings_with(
            "tags:\n  TAG001:\n    kind: stream_uri\n    value: spotify:track:XYZ\n",
        );
        let registry = TagRegistry::load(settings).unwrap();

        let first = registry.lookup("TAG001").unwrap();
        let second = registry.lookup("TAG001").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.target_kind, TargetKind::StreamUri);
        assert_eq!(first.target_value, "spotify:track:XYZ");
    }

    #[test]
    fn unknown_uid_is_not_registered() {
        let registry = TagRegistry::from_mappings([]);
        assert!(matches!(
            registry.lookup("nope"),
            Err(ControlError::TagNotRegistered(uid)) if uid == "nope"
        ));
    }

    #[test]
    fn numeric_uids_and_bad_entries() {
        let (_dir, settings) = settings_with(
            "tags:\n  1234:\n    kind: local_file\n    value: a.mp3\n  BAD:\n    kind: playlist\n    value: x\n",
        );
        let registry = TagRegistry::load(settings).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("1234").unwrap().target_kind, TargetKind::LocalFile);
    }

    #[test]
    fn save_and_remove_touch_only_the_tag_entry() {
        let (_dir, settings) = settings_with(
            "speaker:\n  device_name: Wohnzimmer TV\ntags:\n  OLD:\n    kind: local_file\n    value: old.mp3\n",
        );
        let mut registry = TagRegistry::load(settings.clone()).unwrap();

        registry
            .save_mapping(
                TagMapping::new("04:a3", TargetKind::StreamUri, "spotify:album:1").with_name("Album"),
            )
            .unwrap();
        assert!(registry.remove_mapping("OLD").unwrap());
        assert!(!registry.remove_mapping("OLD").unwrap());

        let reloaded = TagRegistry::load(settings.clone()).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.lookup("04:a3").unwrap().name.as_deref(), Some("Album"));
        assert!(!reloaded.lookup("04:a3").unwrap().shuffle);
        assert_eq!(
            settings.read_path(&["speaker", "device_name"]).unwrap(),
            Some(Value::String("Wohnzimmer TV".into()))
        );
    }

    #[test]
    fn shuffle_flag_round_trips_through_the_file() {
        let (_dir, settings) = settings_with(
            "tags:\n  MIX:\n    kind: stream_uri\n    value: spotify:playlist:1\n    shuffle: true\n",
        );
        let mut registry = TagRegistry::load(settings.clone()).unwrap();
        assert!(registry.lookup("MIX").unwrap().shuffle);

        registry
            .save_mapping(TagMapping::new("MIX", TargetKind::StreamUri, "spotify:playlist:1"))
            .unwrap();
        assert_eq!(settings.read_path(&["tags", "MIX", "shuffle"]).unwrap(), None);
    }

    #[test]
    fn remove_trims_the_uid() {
        let (_dir, settings) = settings_with("tags:\n  OLD:\n    kind: local_file\n    value: old.mp3\n");
        let mut registry = TagRegistry::load(settings.clone()).unwrap();

        assert!(registry.remove_mapping("  OLD \n").unwrap());
        assert!(TagRegistry::load(settings).unwrap().is_empty());
    }
}
