//! # floppyserver - HTTP server and logging for Floppyfy
//!
//! A thin layer over Axum shared by the media server and the operator API:
//!
//! - [`server`] : the [`Server`]; routes are registered by
//!   the other crates through extension traits before [`Server::start`]
//! - [`logs`] : tracing initialisation with a reloadable level filter, an
//!   in-memory ring buffer of recent log lines and a small log API
//!
//! ## Example
//!
//! ```rust,no_run
//! use floppyserver::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = Server::new("Floppyfy", "192.168.1.10", 8080);
//!     server
//!         .add_route("/info", || async { serde_json::json!({"status": "ok"}) })
//!         .await;
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{LogState, LoggingOptions, init_logging};
pub use server::{Server, ServerInfo};
