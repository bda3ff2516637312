//! Extension de `floppyconfig::Config` pour l'orchestrateur

use std::time::Duration;

use floppyconfig::Config;

const DEFAULT_AUTH_MARGIN_SECS: u64 = 60;
const DEFAULT_NETWORK_RETRY_BACKOFF_MS: u64 = 500;
const DEFAULT_REMOVAL_DEBOUNCE_MS: u64 = 1500;

/// Trait d'extension pour les sections `speaker` et `orchestrator`
pub trait ControlConfigExt {
    /// Nom du haut-parleur tel que listé par le service cloud
    fn get_speaker_device_name(&self) -> Option<String>;

    /// URL de contrôle AVTransport du haut-parleur, si configurée
    fn get_renderer_control_url(&self) -> Option<String>;

    /// A token is refreshed when it expires within this margin.
    fn get_auth_margin(&self) -> Duration;

    fn get_network_retry_backoff(&self) -> Duration;

    /// How long a removed tag must stay away before playback pauses.
    fn get_removal_debounce(&self) -> Duration;
}

impl ControlConfigExt for Config {
    fn get_speaker_device_name(&self) -> Option<String> {
        self.get_string(&["speaker", "device_name"])
    }

    fn get_renderer_control_url(&self) -> Option<String> {
        self.get_string(&["speaker", "renderer_control_url"])
    }

    fn get_auth_margin(&self) -> Duration {
        Duration::from_secs(self.get_u64(
            &["orchestrator", "auth_margin_secs"],
            DEFAULT_AUTH_MARGIN_SECS,
        ))
    }

    fn get_network_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.get_u64(
            &["orchestrator", "network_retry_backoff_ms"],
            DEFAULT_NETWORK_RETRY_BACKOFF_MS,
        ))
    }

    fn get_removal_debounce(&self) -> Duration {
        Duration::from_millis(self.get_u64(
            &["orchestrator", "removal_debounce_ms"],
            DEFAULT_REMOVAL_DEBOUNCE_MS,
        ))
    }
}
