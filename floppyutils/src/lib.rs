//! Small helpers shared by the Floppyfy crates.
//!
//! - [`guess_local_ip`] : the address other machines on the LAN use to reach us,
//!   needed to build media URLs the speaker can fetch
//! - [`list_ipv4_addresses`] : every non-loopback IPv4 address, per interface
//! - [`write_atomic`] : crash-safe replacement of a file's content
//!
//! # Examples
//!
//! ```
//! use floppyutils::guess_local_ip;
//!
//! let ip = guess_local_ip();
//! println!("Local IP: {}", ip);
//! ```
mod atomic;
mod ip_utils;

pub use atomic::write_atomic;
pub use ip_utils::{guess_local_ip, list_ipv4_addresses};
