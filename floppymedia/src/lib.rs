//! # floppymedia - Local Media Server
//!
//! Serves audio files from a single root directory so that a networked
//! speaker can fetch them, and builds the URLs handed to the speaker.
//!
//! - [`LocalMediaServer::build_uri`] : `http://<host>:<port>/<filename>`
//! - [`LocalMediaServer::serve`] : resolves a filename under the root and
//!   opens it as a byte stream; anything outside the root is rejected
//! - [`MediaServerExt`] : mounts `GET /<filename>` on a [`floppyserver::Server`]
//!
//! The server is stateless: existence is checked at request time, never
//! cached, and requests are independent of each other.
//!
//! ```rust,no_run
//! use floppymedia::LocalMediaServer;
//!
//! let media = LocalMediaServer::new("/home/pi/music", "192.168.1.10", 8080)?;
//! assert_eq!(media.build_uri("track.mp3"), "http://192.168.1.10:8080/track.mp3");
//! # Ok::<(), floppymedia::MediaError>(())
//! ```

mod config_ext;
mod error;
mod media;
mod server_ext;

pub use config_ext::MediaConfigExt;
pub use error::{MediaError, Result};
pub use media::{LocalMediaServer, MediaStream, content_type_for};
pub use server_ext::{MediaServerExt, create_media_router};
