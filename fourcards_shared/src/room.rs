//! Room model kept on the client.
//!
//! None of this is authoritative. Every poll replaces the snapshot
//! wholesale; the only state carried between polls is the roster's
//! already-resolved display names.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::reply::{GameStage, TurnInfo};

/// Seats per room. A room leaves `LOOKING FOR MEMBERS` once full.
pub const MAX_PLAYERS: usize = 4;

/// Display name used when a participant's profile cannot be resolved.
pub const UNKNOWN_PLAYER: &str = "Unknown";

/// One seated participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub address: String,
    pub username: String,
}

/// Participants in seat order with their display names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn name_of(&self, address: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.address == address)
            .map(|e| e.username.as_str())
    }

    /// Builds the roster for `addresses`.
    ///
    /// Names already known are reused; only unseen addresses go through
    /// `resolve`, one at a time. A failed or empty resolution becomes
    /// [`UNKNOWN_PLAYER`]. Addresses no longer listed are dropped.
    pub async fn rebuild<F, Fut>(&self, addresses: &[String], mut resolve: F) -> Roster
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = anyhow::Result<Option<String>>>,
    {
        let mut entries: Vec<RosterEntry> = Vec::with_capacity(addresses.len());
        for address in addresses {
            if entries.iter().any(|e| &e.address == address) {
                continue;
            }
            let username = match self.name_of(address) {
                Some(known) => known.to_string(),
                None => match resolve(address.clone()).await {
                    Ok(Some(name)) if !name.trim().is_empty() => name,
                    Ok(_) => UNKNOWN_PLAYER.to_string(),
                    Err(e) => {
                        warn!(%address, error = %e, "Failed to resolve player name");
                        UNKNOWN_PLAYER.to_string()
                    }
                },
            };
            entries.push(RosterEntry {
                address: address.clone(),
                username,
            });
        }
        Roster { entries }
    }
}

/// What the room screen should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomView {
    /// Still gathering players.
    WaitingForPlayers { joined: usize },
    /// Every seat is taken; the process has not started the game yet.
    StartingSoon,
    InProgress,
    Finished,
    /// The process reported a stage this client does not know.
    Unknown,
}

impl RoomView {
    pub fn derive(stage: &GameStage, roster: &Roster) -> Self {
        Self::for_count(stage, roster.len())
    }

    /// View for a room with `joined` participants.
    pub fn for_count(stage: &GameStage, joined: usize) -> Self {
        match stage {
            GameStage::LookingForMembers if joined >= MAX_PLAYERS => RoomView::StartingSoon,
            GameStage::LookingForMembers => RoomView::WaitingForPlayers { joined },
            GameStage::OnGoing => RoomView::InProgress,
            GameStage::Completed => RoomView::Finished,
            GameStage::Other(_) => RoomView::Unknown,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            RoomView::WaitingForPlayers { joined } => {
                format!("Waiting for players... ({joined}/{MAX_PLAYERS} joined)")
            }
            RoomView::StartingSoon => "Game will begin soon".to_string(),
            RoomView::InProgress => "Game in progress".to_string(),
            RoomView::Finished => "Game finished".to_string(),
            RoomView::Unknown => "Unknown room state".to_string(),
        }
    }
}

/// Latest reconciled view of a room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub game_id: String,
    pub stage: GameStage,
    pub roster: Roster,
    pub current_turn: Option<TurnInfo>,
    pub my_cards: Option<Vec<u8>>,
    pub fetched_at: DateTime<Utc>,
}

impl RoomSnapshot {
    /// Snapshot for a room that has not been polled yet.
    pub fn pending(game_id: &str, stage: GameStage) -> Self {
        Self {
            game_id: game_id.to_string(),
            stage,
            roster: Roster::default(),
            current_turn: None,
            my_cards: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn view(&self) -> RoomView {
        RoomView::derive(&self.stage, &self.roster)
    }
}
