//! Extension de `floppyconfig::Config` pour le serveur de médias local

use std::path::PathBuf;

use floppyconfig::Config;

const DEFAULT_MEDIA_ROOT: &str = "music";

/// Trait d'extension pour la section `media` de la configuration
pub trait MediaConfigExt {
    /// Répertoire racine des fichiers servis (`media.root`).
    ///
    /// A relative path is taken from the directory of the settings file.
    fn get_media_root(&self) -> PathBuf;
}

impl MediaConfigExt for Config {
    fn get_media_root(&self) -> PathBuf {
        self.resolve_dir(&["media", "root"], DEFAULT_MEDIA_ROOT)
    }
}
