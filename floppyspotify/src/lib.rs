//! # floppyspotify - Client de l'API Web Spotify pour Floppyfy
//!
//! Cette crate fournit l'implémentation Spotify Connect du trait
//! [`floppycontrol::CloudPlayback`] : liste des devices, lancement de la
//! lecture et flux OAuth « authorization code » avec renouvellement du jeton.
//!
//! ## Exemple
//!
//! ```rust,no_run
//! use floppyconfig::Config;
//! use floppyspotify::SpotifyClient;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::load(Config::default_settings_path())?;
//! let client = SpotifyClient::from_config(&config)?;
//! println!("{}", client.api().authorize_url("some-state"));
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config_ext;
pub mod error;
pub mod models;

pub use api::{Credentials, SpotifyApi};
pub use client::SpotifyClient;
pub use config_ext::SpotifyConfigExt;
pub use error::{Result, SpotifyError};
pub use models::{PlayRequest, SpotifyDevice, TokenResponse};
