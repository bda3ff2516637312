//! Operator side of the headless authorization handshake.
//!
//! The process cannot receive the OAuth callback itself, so a human opens the
//! authorization URL somewhere else and pastes the redirect URL back. The
//! prompt is a request/response pair: [`AuthPrompt::request_redirect`]
//! publishes the URL and waits; any front end (console, HTTP API) answers it
//! through [`OperatorChannel::submit`].

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};
use tracing::{info, warn};

use crate::errors::{ControlError, Result};

#[async_trait]
pub trait AuthPrompt: Send + Sync {
    /// Shows `authorize_url` to the operator and waits for the redirect URL.
    async fn request_redirect(&self, authorize_url: &str) -> Result<String>;
}

/// Rendez-vous entre le worker en attente et les front ends opérateur.
///
/// Holds at most one pending challenge. A new request replaces the previous
/// one, whose waiter then fails with `AuthRequired`.
#[derive(Debug)]
pub struct OperatorChannel {
    pending_url: watch::Sender<Option<String>>,
    reply: Mutex<Option<oneshot::Sender<String>>>,
}

impl Default for OperatorChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorChannel {
    pub fn new() -> Self {
        let (pending_url, _) = watch::channel(None);
        Self {
            pending_url,
            reply: Mutex::new(None),
        }
    }

    /// Authorization URL waiting for an answer, if any.
    pub fn pending_url(&self) -> Option<String> {
        self.pending_url.borrow().clone()
    }

    /// Notified whenever a challenge appears or is answered.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.pending_url.subscribe()
    }

    /// Answers the pending challenge with the URL the browser was sent to.
    pub fn submit(&self, redirect_url: impl Into<String>) -> Result<()> {
        let sender = self
            .reply
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
            .ok_or_else(|| ControlError::auth_required("no authorization is pending"))?;
        self.pending_url.send_replace(None);

        sender
            .send(redirect_url.into())
            .map_err(|_| ControlError::auth_required("the authorization request was abandoned"))
    }
}

#[async_trait]
impl AuthPrompt for OperatorChannel {
    async fn request_redirect(&self, authorize_url: &str) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        *self.reply.lock().unwrap_or_else(|p| p.into_inner()) = Some(tx);
        self.pending_url.send_replace(Some(authorize_url.to_string()));

        warn!(
            url = authorize_url,
            "Authorization required: open the URL, log in, then paste the redirect URL"
        );

        match rx.await {
            Ok(redirect) => {
                info!("Redirect URL received");
                Ok(redirect)
            }
            Err(_) => Err(ControlError::auth_required("authorization prompt cancelled")),
        }
    }
}
