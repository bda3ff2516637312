//! Console opérateur : lecture des tags sur stdin et réponse aux demandes
//! d'autorisation

use std::io::BufRead;
use std::sync::Arc;

use async_trait::async_trait;
use floppycontrol::{AuthPrompt, ControlError, OperatorChannel, TagEvent};
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

/// Lines read from stdin by a detached thread.
///
/// A blocking read in the runtime's blocking pool would keep the runtime
/// from shutting down; a plain thread does not. The channel closes at EOF.
pub fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(8);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Cannot read the console: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// What a console line means, given whether a challenge is pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Skip,
    Redirect(String),
    Scan(String),
    /// `-<uid>`: the tag left the reader
    Removal(String),
}

pub fn classify_line(line: &str, challenge_pending: bool) -> ConsoleInput {
    let line = line.trim();
    if line.is_empty() {
        ConsoleInput::Skip
    } else if challenge_pending {
        ConsoleInput::Redirect(line.to_string())
    } else if let Some(uid) = line.strip_prefix('-') {
        match uid.trim() {
            "" => ConsoleInput::Skip,
            uid => ConsoleInput::Removal(uid.to_string()),
        }
    } else {
        ConsoleInput::Scan(line.to_string())
    }
}

fn print_challenge(url: &str) {
    println!();
    println!("Spotify authorization required. Open this URL in a browser:");
    println!();
    println!("    {}", url);
    println!();
    println!("then paste the address you were redirected to and press Enter.");
}

/// Lit la console jusqu'à sa fermeture.
///
/// Each line is a tag uid placed on the reader, or `-<uid>` for a tag taken
/// off it. While an authorization challenge is pending, the line is the
/// redirect URL answering it instead.
pub async fn run_console(
    mut lines: mpsc::Receiver<String>,
    channel: Arc<OperatorChannel>,
    scans: mpsc::Sender<TagEvent>,
) {
    let mut pending = channel.subscribe();

    loop {
        tokio::select! {
            changed = pending.changed() => {
                if changed.is_err() {
                    break;
                }
                let url = pending.borrow_and_update().clone();
                if let Some(url) = url {
                    print_challenge(&url);
                }
            }
            line = lines.recv() => match line {
                Some(line) => match classify_line(&line, channel.pending_url().is_some()) {
                    ConsoleInput::Skip => {}
                    ConsoleInput::Redirect(url) => {
                        if let Err(e) = channel.submit(url) {
                            warn!("Redirect not accepted: {}", e);
                        }
                    }
                    ConsoleInput::Scan(uid) => {
                        if scans.send(TagEvent::Scanned(uid)).await.is_err() {
                            warn!("Scan worker is gone, console stops");
                            break;
                        }
                    }
                    ConsoleInput::Removal(uid) => {
                        if scans.send(TagEvent::Removed(uid)).await.is_err() {
                            warn!("Scan worker is gone, console stops");
                            break;
                        }
                    }
                },
                None => {
                    info!("Console input closed");
                    break;
                }
            }
        }
    }
}

/// Invite d'autorisation pour les commandes ponctuelles (`auth`, `devices`)
pub struct ConsolePrompt {
    lines: Mutex<mpsc::Receiver<String>>,
}

impl ConsolePrompt {
    pub fn new(lines: mpsc::Receiver<String>) -> Self {
        Self {
            lines: Mutex::new(lines),
        }
    }
}

#[async_trait]
impl AuthPrompt for ConsolePrompt {
    async fn request_redirect(&self, authorize_url: &str) -> floppycontrol::Result<String> {
        print_challenge(authorize_url);
        let mut lines = self.lines.lock().await;
        while let Some(line) = lines.recv().await {
            if let ConsoleInput::Redirect(url) = classify_line(&line, true) {
                return Ok(url);
            }
        }
        Err(ControlError::auth_required("console closed"))
    }
}
