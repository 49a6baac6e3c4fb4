//! Session and credential store.
//!
//! Holds the wallet, its address, the registered username, and a pending
//! room invite to resume after registration. The store is file-backed (or
//! in-memory for tests) and every mutation is written through immediately.
//!
//! Lifecycle:
//! 1. `open()` loads whatever is on disk.
//! 2. `init_wallet()` creates the credential on first use; it is never
//!    rotated afterwards.
//! 3. `logout()` clears everything and removes the file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::invite::RoomInvite;
use crate::wallet::Wallet;

/// On-disk contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<Wallet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_join: Option<RoomInvite>,
}

/// Owned session store.
#[derive(Debug)]
pub struct SessionStore {
    path: Option<PathBuf>,
    state: SessionState,
}

impl SessionStore {
    /// Store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: SessionState::default(),
        }
    }

    /// Opens the store at `path`; a missing file is an empty session.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("parse session {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SessionState::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("read session {}", path.display()));
            }
        };
        debug!(path = %path.display(), "Session opened");
        Ok(Self {
            path: Some(path),
            state,
        })
    }

    fn persist(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw = serde_json::to_string_pretty(&self.state).context("serialize session")?;
        std::fs::write(path, raw).with_context(|| format!("write session {}", path.display()))
    }

    /// Returns the stored wallet, generating and persisting one if absent.
    /// The boolean is `true` when a new wallet was created.
    pub fn init_wallet(&mut self) -> anyhow::Result<(Wallet, bool)> {
        if let Some(wallet) = &self.state.wallet {
            let wallet = wallet.clone();
            if self.state.address.is_none() {
                self.state.address = Some(wallet.address());
                self.persist()?;
            }
            debug!(address = %wallet.address(), "Wallet found in session");
            return Ok((wallet, false));
        }

        let wallet = Wallet::generate();
        self.state.address = Some(wallet.address());
        self.state.wallet = Some(wallet.clone());
        self.persist()?;
        info!(address = %wallet.address(), "Wallet generated for new session");
        Ok((wallet, true))
    }

    pub fn wallet(&self) -> Option<&Wallet> {
        self.state.wallet.as_ref()
    }

    pub fn address(&self) -> Option<&str> {
        self.state.address.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.state.username.as_deref()
    }

    pub fn set_username(&mut self, username: &str) -> anyhow::Result<()> {
        self.state.username = Some(username.to_string());
        self.persist()
    }

    /// Forgets the username, e.g. when the process has no registration
    /// for this wallet.
    pub fn clear_username(&mut self) -> anyhow::Result<()> {
        if self.state.username.take().is_some() {
            self.persist()?;
        }
        Ok(())
    }

    /// Remembers an invite to resume once a username exists.
    pub fn set_pending_join(&mut self, invite: RoomInvite) -> anyhow::Result<()> {
        self.state.pending_join = Some(invite);
        self.persist()
    }

    pub fn pending_join(&self) -> Option<&RoomInvite> {
        self.state.pending_join.as_ref()
    }

    /// Removes and returns the pending invite.
    pub fn take_pending_join(&mut self) -> anyhow::Result<Option<RoomInvite>> {
        let pending = self.state.pending_join.take();
        if pending.is_some() {
            self.persist()?;
        }
        Ok(pending)
    }

    /// Clears the session, including the credential.
    pub fn logout(&mut self) -> anyhow::Result<()> {
        self.state = SessionState::default();
        if let Some(path) = &self.path {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("remove session {}", path.display()));
                }
            }
        }
        info!("Session cleared");
        Ok(())
    }
}
