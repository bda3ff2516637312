//! # Floppyfy configuration
//!
//! This crate loads the Floppyfy settings file and exposes typed getters for
//! the configuration part of it:
//! - the YAML file is merged over an embedded default,
//! - keys of configuration sections are lower-cased,
//! - `FLOPPYFY_CONFIG__SECTION__KEY=value` environment variables override
//!   individual values (the value is parsed as YAML),
//! - getters fall back to documented defaults and log when they do.
//!
//! The configuration snapshot is read-only once loaded. Tag mappings and
//! runtime state live in the same file but are read and written through
//! [`SettingsFile`], never through [`Config`], so neither can clobber the other.
//!
//! ## Usage
//!
//! ```no_run
//! use floppyconfig::Config;
//!
//! let config = Config::load("/home/pi/.floppyfy/settings.yaml")?;
//! let port = config.get_http_port();
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Domain crates add their own getters through extension traits
//! (`MediaConfigExt`, `ControlConfigExt`, `SpotifyConfigExt`).

use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde_yaml::{Mapping, Value};
use std::{env, path::Path, path::PathBuf};
use tracing::{info, warn};

mod settings;

pub use settings::SettingsFile;

// Configuration par défaut intégrée
pub(crate) const DEFAULT_CONFIG: &str = include_str!("floppyfy.yaml");

const ENV_PREFIX: &str = "FLOPPYFY_CONFIG__";

/// Sections that are not configuration: their keys are data (tag uids,
/// speaker names) and must keep their case.
const DATA_SECTIONS: [&str; 2] = ["tags", "state"];

const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_LOG_BUFFER_CAPACITY: usize = 1000;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Macro to generate a getter for usize values with default
macro_rules! impl_usize_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> usize {
            match self.get_value($path) {
                Ok(Value::Number(n)) if n.is_u64() => n.as_u64().map(|v| v as usize).unwrap_or($default),
                _ => $default,
            }
        }
    };
}

/// Macro to generate a getter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> bool {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => b,
                _ => $default,
            }
        }
    };
}

/// Loaded configuration snapshot.
///
/// # Examples
///
/// ```no_run
/// use floppyconfig::Config;
///
/// let config = Config::load(Config::default_settings_path())?;
/// println!("HTTP port: {}", config.get_http_port());
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    settings: SettingsFile,
    data: Value,
}

impl Config {
    /// Default settings location: `~/.floppyfy/settings.yaml`, or
    /// `.floppyfy/settings.yaml` when no home directory is known.
    pub fn default_settings_path() -> PathBuf {
        let base = home_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join(".floppyfy").join("settings.yaml")
    }

    /// Loads the settings file at `path`.
    ///
    /// A missing or unparsable file is an error: the caller treats it as a
    /// fatal startup condition.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings = SettingsFile::new(path.as_ref());
        if !settings.exists() {
            return Err(anyhow!(
                "Settings file {} not found (run `floppyfy init` to create one)",
                settings.path().display()
            ));
        }

        let external = settings.read_document()?;
        let config = Self::from_document(settings, external, env::vars())?;
        info!(settings=%config.settings.path().display(), "Loaded settings file");
        Ok(config)
    }

    /// Builds a configuration from an already parsed document and a set of
    /// environment variables.
    pub fn from_document<I>(settings: SettingsFile, external: Value, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        merge_yaml(&mut default_value, &external);
        let mut data = lower_config_keys(default_value);
        apply_env_overrides(&mut data, vars);

        Ok(Self { settings, data })
    }

    /// The settings file this configuration was read from.
    pub fn settings(&self) -> &SettingsFile {
        &self.settings
    }

    /// Gets a configuration value at the specified path
    ///
    /// Keys are matched case-insensitively.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let mut current = &self.data;
        for (i, key) in path.iter().enumerate() {
            match current {
                Value::Mapping(map) => {
                    current = map
                        .get(Value::String(key.to_lowercase()))
                        .ok_or_else(|| anyhow!("Path {} does not exist", path[..=i].join(".")))?;
                }
                _ => return Err(anyhow!("Path {} is not a mapping", path[..i].join("."))),
            }
        }
        Ok(current.clone())
    }

    /// Non-empty string at `path`, `None` when absent, empty or not a string.
    pub fn get_string(&self, path: &[&str]) -> Option<String> {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    /// Unsigned integer at `path`, accepting numbers and numeric strings.
    pub fn get_u64(&self, path: &[&str], default: u64) -> u64 {
        match self.get_value(path) {
            Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap_or(default),
            Ok(Value::String(s)) => match s.trim().parse::<u64>() {
                Ok(v) => v,
                Err(_) => {
                    warn!(path=%path.join("."), value=%s, default, "Invalid number, using default");
                    default
                }
            },
            Ok(Value::Null) | Err(_) => default,
            Ok(other) => {
                warn!(path=%path.join("."), ?other, default, "Not a number, using default");
                default
            }
        }
    }

    /// Resolves a directory setting: absolute, or relative to the settings
    /// file's directory. The directory is not created.
    pub fn resolve_dir(&self, path: &[&str], default: &str) -> PathBuf {
        let configured = self.get_string(path).unwrap_or_else(|| default.to_string());
        let dir = Path::new(&configured);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.settings.dir().join(dir)
        }
    }

    /// Gets the host other machines use to reach this process.
    ///
    /// Returns the configured `host.base_url`, or attempts to guess the local
    /// IP address if not configured.
    pub fn get_base_url(&self) -> String {
        match self.get_string(&["host", "base_url"]) {
            Some(host) => host,
            None => {
                let guessed = floppyutils::guess_local_ip();
                info!(host=%guessed, "host.base_url not configured, using guessed local address");
                guessed
            }
        }
    }

    /// Gets the HTTP port from configuration
    ///
    /// Returns the configured HTTP port, or the default port (8080) if not
    /// configured or invalid.
    pub fn get_http_port(&self) -> u16 {
        let port = self.get_u64(&["host", "http_port"], DEFAULT_HTTP_PORT as u64);
        match u16::try_from(port) {
            Ok(port) if port != 0 => port,
            _ => {
                warn!(port, "Invalid HTTP port, using default {}", DEFAULT_HTTP_PORT);
                DEFAULT_HTTP_PORT
            }
        }
    }

    impl_usize_config!(
        get_log_buffer_capacity,
        &["host", "logger", "buffer_capacity"],
        DEFAULT_LOG_BUFFER_CAPACITY
    );

    impl_bool_config!(
        get_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    /// Récupère le niveau de log minimum depuis la configuration
    pub fn get_log_min_level(&self) -> String {
        self.get_string(&["host", "logger", "min_level"])
            .unwrap_or_else(|| DEFAULT_LOG_MIN_LEVEL.to_string())
    }
}

/// Merges external YAML configuration into default configuration
///
/// - For mappings, keys from external are merged into default
/// - For scalars and sequences, external values replace default values
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

fn lower_config_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                match k {
                    Value::String(s) if DATA_SECTIONS.contains(&s.as_str()) => {
                        new_map.insert(Value::String(s), v);
                    }
                    Value::String(s) => {
                        new_map.insert(Value::String(s.to_lowercase()), lower_keys(v));
                    }
                    other => {
                        new_map.insert(other, lower_keys(v));
                    }
                }
            }
            Value::Mapping(new_map)
        }
        other => other,
    }
}

fn lower_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                new_map.insert(key, lower_keys(v));
            }
            Value::Mapping(new_map)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys).collect()),
        other => other,
    }
}

fn apply_env_overrides<I>(config: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let lowered = rest.to_lowercase();
        let key_path: Vec<&str> = lowered.split("__").filter(|k| !k.is_empty()).collect();
        if key_path.is_empty() || DATA_SECTIONS.contains(&key_path[0]) {
            continue;
        }
        let yaml_value = serde_yaml::from_str::<Value>(&value)
            .unwrap_or_else(|_| Value::String(value.clone()));
        if let Err(err) = settings::set_path(config, &key_path, yaml_value) {
            warn!(env_var=%key, error=%err, "Ignoring environment override");
        }
    }
}
