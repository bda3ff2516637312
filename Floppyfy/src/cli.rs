use std::path::PathBuf;

use clap::{Parser, Subcommand};
use floppyconfig::Config;

#[derive(Parser, Debug)]
#[command(
    name = "floppyfy",
    version,
    about = "Plays music when an NFC tag is scanned"
)]
pub struct Cli {
    /// Settings file
    #[arg(
        long,
        global = true,
        env = "FLOPPYFY_SETTINGS",
        default_value_os_t = Config::default_settings_path()
    )]
    pub settings: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve media and the operator API, and play scanned tags (default)
    Run,
    /// Write the default settings file
    Init,
    /// List the Spotify Connect devices visible to the account
    Devices,
    /// Authorize Spotify access from the console and store the token
    Auth,
    /// Edit the tag mappings
    #[command(subcommand)]
    Tags(TagsCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TagsCommand {
    /// Show every registered tag
    List,
    /// Register or replace a tag
    Add {
        /// Tag uid as reported by the reader
        uid: String,
        /// stream_uri or local_file
        #[arg(long, default_value = "stream_uri")]
        kind: String,
        /// Catalog URI or filename under the media root
        value: String,
        /// Label for humans
        #[arg(long)]
        name: Option<String>,
        /// Play the album or playlist in random order
        #[arg(long)]
        shuffle: bool,
    },
    /// Forget a tag
    Remove { uid: String },
}
