//! Commandes ponctuelles de la CLI

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use floppyconfig::{Config, SettingsFile};
use floppycontrol::{AuthSessionManager, ControlConfigExt, TagMapping, TagRegistry, TargetKind};
use floppyserver::{LoggingOptions, init_logging};
use floppyspotify::SpotifyClient;
use tracing::info;

use crate::cli::TagsCommand;
use crate::console::{ConsolePrompt, stdin_lines};

pub fn init(path: &Path) -> Result<()> {
    let settings = SettingsFile::new(path);
    settings.create_default()?;
    println!("Wrote {}", settings.path().display());
    println!("Fill in the spotify and speaker sections, then run `floppyfy auth`.");
    Ok(())
}

fn init_console_logging(config: &Config) {
    init_logging(LoggingOptions::from_config(config));
}

fn console_auth(config: &Config, client: Arc<SpotifyClient>) -> AuthSessionManager {
    AuthSessionManager::new(
        client,
        Arc::new(ConsolePrompt::new(stdin_lines())),
        config.settings().clone(),
        config.get_auth_margin(),
    )
}

/// Runs the authorization exchange when no usable token is stored.
pub async fn auth(config: Config) -> Result<()> {
    init_console_logging(&config);
    let client = Arc::new(SpotifyClient::from_config(&config)?);
    let mut auth = console_auth(&config, client);

    let token = auth.ensure_valid_token().await?;
    info!(expires_at=%token.expires_at, "Spotify access token stored");
    println!("Authorized, token valid until {}", token.expires_at.to_rfc3339());
    Ok(())
}

pub async fn devices(config: Config) -> Result<()> {
    init_console_logging(&config);
    let client = Arc::new(SpotifyClient::from_config(&config)?);
    let mut auth = console_auth(&config, client.clone());
    let token = auth.ensure_valid_token().await?;

    let devices = client.devices(&token).await?;
    if devices.is_empty() {
        println!("No active Spotify devices found.");
        println!("Start playing something on the speaker so Spotify lists it.");
        return Ok(());
    }

    let configured = config.get_speaker_device_name().unwrap_or_default();
    println!("{:<30} | {:<12} | ID", "DEVICE NAME", "TYPE");
    println!("{}", "-".repeat(80));
    for device in devices {
        let mut flags = Vec::new();
        if device.is_active {
            flags.push("[ACTIVE]");
        }
        if device.name.trim().eq_ignore_ascii_case(configured.trim()) {
            flags.push("[CONFIGURED]");
        }
        println!(
            "{:<30} | {:<12} | {} {}",
            device.name,
            device.device_type,
            device.id.as_deref().unwrap_or("-"),
            flags.join(" ")
        );
    }
    Ok(())
}

pub fn tags(config: Config, command: TagsCommand) -> Result<()> {
    let mut registry = TagRegistry::load(config.settings().clone())?;

    match command {
        TagsCommand::List => {
            if registry.is_empty() {
                println!("No tag registered.");
            }
            for mapping in registry.mappings() {
                println!(
                    "{:<20} {:<10} {}{}{}",
                    mapping.tag_uid,
                    mapping.target_kind,
                    mapping.target_value,
                    if mapping.shuffle { "  [shuffle]" } else { "" },
                    mapping
                        .name
                        .as_deref()
                        .map(|n| format!("  ({})", n))
                        .unwrap_or_default()
                );
            }
        }
        TagsCommand::Add {
            uid,
            kind,
            value,
            name,
            shuffle,
        } => {
            let kind: TargetKind = kind.parse().map_err(|e: String| anyhow!(e))?;
            let mut mapping = TagMapping::new(uid.trim(), kind, value.trim()).with_shuffle(shuffle);
            if let Some(name) = name {
                mapping = mapping.with_name(name);
            }
            registry
                .save_mapping(mapping)
                .context("Cannot save the tag")?;
            println!("Tag {} saved", uid.trim());
        }
        TagsCommand::Remove { uid } => {
            let uid = uid.trim();
            if registry.remove_mapping(uid)? {
                println!("Tag {} removed", uid);
            } else {
                println!("Tag {} was not registered", uid);
            }
        }
    }
    Ok(())
}
