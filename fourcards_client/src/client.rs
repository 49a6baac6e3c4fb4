//! Client implementation.
//!
//! The client owns:
//! - The session store (wallet, username, pending invite)
//! - A [`ProcessClient`] for typed calls against the game process
//! - At most one active room with its sync loop
//!
//! Flows mirror the two screens of the game: the landing flow (wallet,
//! registration, room creation) and the room flow (enter, join, poll).

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use fourcards_shared::{
    config::ClientConfig,
    error::GameError,
    invite::RoomInvite,
    lenient::parse_lenient_as,
    net::{Action, TagSet},
    reply::{CreatedRoom, JoinReply, JoinOutcome, RegisterOutcome, RoomStatus},
    room::RoomView,
    session::SessionStore,
    wallet::Wallet,
};
use tracing::{debug, info, warn};

use crate::{
    process::ProcessClient,
    rpc::{HttpRpc, ProcessRpc},
    sync::{RoomSync, SyncHandle},
};

/// What the landing screen should offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LandingState {
    /// Room actions stay disabled until a username is registered.
    NeedsUsername { address: String, new_wallet: bool },
    Ready { address: String, username: String },
}

/// Successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub outcome: RegisterOutcome,
    pub username: String,
    /// Invite saved before registration, to be entered next.
    pub resume: Option<RoomInvite>,
}

/// A room this client just created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoom {
    pub room: CreatedRoom,
    pub invite: RoomInvite,
}

/// How the caller ended up in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinAttempt {
    /// The caller is the room's first participant; no join was sent.
    Creator,
    Joined(JoinOutcome),
    /// The process refused the join; the room can still be watched.
    Rejected(String),
}

/// Result of entering a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEntry {
    /// No username yet. The invite was saved for after registration.
    RedirectToLanding { invite: RoomInvite },
    Entered {
        invite: RoomInvite,
        status: RoomStatus,
        join: JoinAttempt,
    },
}

/// A room the client is currently watching.
pub struct ActiveRoom {
    pub invite: RoomInvite,
    pub is_creator: bool,
    pub sync: SyncHandle,
}

/// High-level game client.
pub struct GameClient {
    cfg: Arc<ClientConfig>,
    session: SessionStore,
    process: ProcessClient,
    room: Option<ActiveRoom>,
}

impl GameClient {
    pub fn new(cfg: ClientConfig, session: SessionStore, rpc: Arc<dyn ProcessRpc>) -> Self {
        let cfg = Arc::new(cfg);
        let process = ProcessClient::new(rpc, Arc::clone(&cfg));
        Self {
            cfg,
            session,
            process,
            room: None,
        }
    }

    /// Opens the configured session file and talks to the configured units
    /// over HTTP.
    pub fn connect(cfg: ClientConfig) -> anyhow::Result<Self> {
        let session = SessionStore::open(Path::new(&cfg.session_path)).context("open session")?;
        let rpc = HttpRpc::new(&cfg.cu_url, &cfg.mu_url, cfg.request_timeout())?;
        info!(process = %cfg.process_id, cu = %cfg.cu_url, mu = %cfg.mu_url, "Client ready");
        Ok(Self::new(cfg, session, Arc::new(rpc)))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.cfg
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn process(&self) -> &ProcessClient {
        &self.process
    }

    pub fn active_room(&self) -> Option<&ActiveRoom> {
        self.room.as_ref()
    }

    fn wallet(&self) -> Result<Wallet, GameError> {
        self.session.wallet().cloned().ok_or(GameError::MissingWallet)
    }

    fn address(&self) -> Result<String, GameError> {
        self.wallet().map(|w| w.address())
    }

    /// Landing flow: make sure a wallet exists, then look up the username
    /// registered for it.
    pub async fn init_landing(&mut self) -> anyhow::Result<LandingState> {
        let (wallet, new_wallet) = self.session.init_wallet()?;
        let address = wallet.address();

        // The stored name only stands in when the lookup fails.
        let username = match self.process.user_info(&address).await {
            Ok(Some(info)) => match info.name() {
                Some(name) => {
                    if self.session.username() != Some(name) {
                        self.session.set_username(name)?;
                    }
                    Some(name.to_string())
                }
                None => {
                    if self.session.username().is_some() {
                        info!(%address, "Process has no username for this wallet, clearing local name");
                        self.session.clear_username()?;
                    }
                    None
                }
            },
            Ok(None) => {
                warn!("Unreadable user info, using stored username");
                self.session.username().map(str::to_string)
            }
            Err(e) => {
                warn!(error = %e, "Failed to look up username, using stored username");
                self.session.username().map(str::to_string)
            }
        };

        Ok(match username {
            Some(username) => LandingState::Ready { address, username },
            None => LandingState::NeedsUsername {
                address,
                new_wallet,
            },
        })
    }

    /// Registers (or renames) the player.
    pub async fn register_player(&mut self, username: &str) -> anyhow::Result<Registration> {
        let username = username.trim();
        if username.is_empty() {
            return Err(GameError::EmptyUsername.into());
        }
        let wallet = self.wallet()?;

        info!(%username, "Registering player");
        let reply = self
            .process
            .submit(&wallet, TagSet::action(Action::RegisterPlayer).username(username))
            .await?;
        let outcome = RegisterOutcome::from_reply(&reply);
        match &outcome {
            RegisterOutcome::Taken => {
                return Err(GameError::Rejected("Username already taken".into()).into())
            }
            RegisterOutcome::Unexpected(text) => {
                return Err(GameError::InvalidResponse(text.clone()).into())
            }
            RegisterOutcome::Registered | RegisterOutcome::Updated => {}
        }

        self.session.set_username(username)?;
        let resume = self.session.take_pending_join()?;
        if let Some(invite) = &resume {
            info!(%invite, "Resuming room join after registration");
        }
        Ok(Registration {
            outcome,
            username: username.to_string(),
            resume,
        })
    }

    pub async fn create_room(&mut self) -> anyhow::Result<NewRoom> {
        let wallet = self.wallet()?;
        info!("Creating room");
        let reply = self
            .process
            .submit(&wallet, TagSet::action(Action::CreateGameRoom))
            .await?;
        let room: CreatedRoom = parse_lenient_as(&reply)
            .ok_or_else(|| GameError::InvalidResponse("Invalid response from create room".into()))?;
        let invite = RoomInvite::new(room.game_id.clone(), room.password.clone());
        info!(game_id = %room.game_id, message = %room.message, "Room created");
        Ok(NewRoom { room, invite })
    }

    pub async fn join_room(&mut self, invite: &RoomInvite) -> anyhow::Result<JoinOutcome> {
        let wallet = self.wallet()?;
        let reply = self
            .process
            .submit(
                &wallet,
                TagSet::action(Action::JoinRoom)
                    .game_id(&invite.game_id)
                    .password(&invite.code),
            )
            .await?;
        let parsed: JoinReply = parse_lenient_as(&reply)
            .ok_or_else(|| GameError::InvalidResponse("Invalid response from join room".into()))?;
        Ok(parsed.into_outcome()?)
    }

    /// Room flow: decide whether the caller created the room or must join.
    pub async fn enter_room(&mut self, invite: &RoomInvite) -> anyhow::Result<RoomEntry> {
        if self.session.username().is_none() {
            info!(%invite, "No username yet, redirecting to landing");
            self.session.set_pending_join(invite.clone())?;
            return Ok(RoomEntry::RedirectToLanding {
                invite: invite.clone(),
            });
        }
        let address = self.address()?;

        match self.process.user_info(&address).await {
            Ok(Some(info)) => {
                if let Some(name) = info.name() {
                    if self.session.username() != Some(name) {
                        self.session.set_username(name)?;
                    }
                }
            }
            Ok(None) => debug!("No user info for own address"),
            Err(e) => warn!(error = %e, "Failed to refresh own username"),
        }

        let status = self
            .process
            .room_status(&invite.game_id)
            .await?
            .ok_or_else(|| GameError::InvalidResponse("Invalid room status".into()))?;

        let join = if status.creator() == Some(address.as_str()) {
            JoinAttempt::Creator
        } else {
            match self.join_room(invite).await {
                Ok(outcome) => {
                    info!(game_id = %invite.game_id, ?outcome, "Successfully joined room");
                    JoinAttempt::Joined(outcome)
                }
                Err(e) => match e.downcast::<GameError>() {
                    Ok(GameError::Rejected(msg)) => {
                        warn!(game_id = %invite.game_id, reason = %msg, "Join refused");
                        JoinAttempt::Rejected(msg)
                    }
                    Ok(other) => return Err(other.into()),
                    Err(e) => return Err(e),
                },
            }
        };

        Ok(RoomEntry::Entered {
            invite: invite.clone(),
            status,
            join,
        })
    }

    /// Builds a sync loop for a room without starting it.
    pub fn room_sync(&self, invite: &RoomInvite, status: &RoomStatus) -> anyhow::Result<RoomSync> {
        Ok(RoomSync::new(
            self.process.clone(),
            self.wallet()?,
            status,
            &invite.game_id,
            self.cfg.poll_interval(),
        ))
    }

    /// Enters a room and starts watching it. Replaces any active room.
    pub async fn open_room(&mut self, invite: &RoomInvite) -> anyhow::Result<RoomEntry> {
        let entry = self.enter_room(invite).await?;
        if let RoomEntry::Entered { status, join, .. } = &entry {
            self.leave_room().await;
            let sync = Arc::new(self.room_sync(invite, status)?);
            self.room = Some(ActiveRoom {
                invite: invite.clone(),
                is_creator: *join == JoinAttempt::Creator,
                sync: sync.spawn(),
            });
        }
        Ok(entry)
    }

    /// Stops watching the active room, if any.
    pub async fn leave_room(&mut self) {
        if let Some(room) = self.room.take() {
            info!(game_id = %room.invite.game_id, "Leaving room");
            room.sync.stop().await;
        }
    }

    /// Leaves any room and clears the session.
    pub async fn logout(&mut self) -> anyhow::Result<()> {
        self.leave_room().await;
        self.session.logout()
    }

    /// Executes a console command.
    pub async fn exec_console(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let line = line.trim();
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        match tokens[0] {
            "status" => {
                let mut out = Vec::new();
                out.push(format!("Process: {}", self.cfg.process_id));
                out.push(format!(
                    "Address: {}",
                    self.session.address().unwrap_or("<none>")
                ));
                out.push(format!(
                    "Username: {}",
                    self.session.username().unwrap_or("<unregistered>")
                ));
                if let Some(pending) = self.session.pending_join() {
                    out.push(format!("Pending join: {pending}"));
                }
                if let Some(room) = &self.room {
                    out.push(format!(
                        "Room: {}{}",
                        room.invite.game_id,
                        if room.is_creator { " (creator)" } else { "" }
                    ));
                }
                Ok(out)
            }
            "register" => {
                if tokens.len() < 2 {
                    return Ok(vec!["Usage: register <username>".to_string()]);
                }
                let name = tokens[1..].join(" ");
                let reg = self.register_player(&name).await?;
                let mut out = vec![format!("Username '{}' registered", reg.username)];
                if let Some(invite) = reg.resume {
                    let entry = self.open_room(&invite).await?;
                    out.extend(Self::describe_entry(entry));
                }
                Ok(out)
            }
            "create" => {
                if self.session.username().is_none() {
                    return Err(GameError::UsernameRequired.into());
                }
                let created = self.create_room().await?;
                let link = created.invite.link(&self.cfg.app_origin);
                let mut out = vec![
                    created.room.message.clone(),
                    format!("Share this link with your friends: {link}"),
                ];
                let entry = self.open_room(&created.invite).await?;
                out.extend(Self::describe_entry(entry));
                Ok(out)
            }
            "join" => {
                if tokens.len() < 2 {
                    return Ok(vec!["Usage: join <link> | join <game_id> <code>".to_string()]);
                }
                let invite = RoomInvite::parse(&tokens[1..].join(" "))?;
                let entry = self.open_room(&invite).await?;
                Ok(Self::describe_entry(entry))
            }
            "room" => match &self.room {
                Some(room) => {
                    let snap = room.sync.latest();
                    let mut out = vec![
                        format!("Room {} [{}]", snap.game_id, snap.stage),
                        snap.view().describe(),
                    ];
                    for entry in snap.roster.entries() {
                        out.push(format!("  {} ({})", entry.username, entry.address));
                    }
                    if let Some(turn) = &snap.current_turn {
                        out.push(format!("Turn: {}", serde_json::to_string(&turn.details)?));
                    }
                    if let Some(cards) = &snap.my_cards {
                        out.push(format!("Your cards: {cards:?}"));
                    }
                    Ok(out)
                }
                None => Ok(vec!["Not in a room".to_string()]),
            },
            "leave" => {
                self.leave_room().await;
                Ok(vec!["Left room".to_string()])
            }
            "logout" => {
                self.logout().await?;
                Ok(vec!["Logged out; session cleared".to_string()])
            }
            other => Ok(vec![format!("Unknown command '{other}'")]),
        }
    }

    fn describe_entry(entry: RoomEntry) -> Vec<String> {
        match entry {
            RoomEntry::RedirectToLanding { invite } => vec![format!(
                "Register a username first; {invite} will be joined afterwards"
            )],
            RoomEntry::Entered { invite, status, join } => {
                let headline = match join {
                    JoinAttempt::Creator => "Room Created!".to_string(),
                    JoinAttempt::Joined(JoinOutcome::Joined) => "Joined Room!".to_string(),
                    JoinAttempt::Joined(JoinOutcome::AlreadyJoined) => {
                        "You are already in this game".to_string()
                    }
                    JoinAttempt::Rejected(msg) => format!("Could not join: {msg}"),
                };
                let view = RoomView::for_count(&status.game_state, status.participants().len());
                vec![
                    headline,
                    format!("{} [{}]", invite, status.game_state),
                    view.describe(),
                ]
            }
        }
    }
}
