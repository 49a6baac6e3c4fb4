//! In-memory game process for integration tests.
//!
//! [`MockProcess`] implements [`ProcessRpc`] with just enough bookkeeping to
//! drive the client flows: player registration, rooms with join codes, and
//! canned turn/card replies. Replies use single quotes like the deployed
//! process. Submitted messages are built and signed as real data items and
//! verified before they are handled.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use fourcards_client::{rpc::ProcessRpc, GameClient};
use fourcards_shared::{
    config::{ClientConfig, ReadbackStrategy},
    dataitem::{decode_id, random_anchor, DataItem},
    net::{Action, ResultEdge, ResultSet, ResultsPage, TagSet},
    session::SessionStore,
    wallet::Wallet,
};
use tracing::debug;

/// Process id the mock answers to.
pub const MOCK_PROCESS_ID: &str = "4T8COHVsKeuOa7zgMN8Jy9LhdZxr0MRMPMhP4Ml_JZY";

#[derive(Debug, Clone)]
struct Room {
    password: String,
    players: Vec<String>,
    state: String,
    turn: usize,
}

#[derive(Default)]
struct State {
    users: HashMap<String, String>,
    rooms: BTreeMap<u64, Room>,
    next_room: u64,
    cards: HashMap<String, Vec<u8>>,
    results: HashMap<String, ResultSet>,
    log: Vec<(String, ResultSet)>,
    dry_runs: HashMap<Action, usize>,
    messages: HashMap<Action, usize>,
    user_lookups: HashMap<String, usize>,
    failing_users: HashSet<String>,
    failing: HashSet<Action>,
    refused: HashSet<Action>,
    garbage_status: bool,
    latency: Duration,
}

/// Fake game process.
#[derive(Default)]
pub struct MockProcess {
    state: Mutex<State>,
    status_in_flight: AtomicUsize,
    status_max_in_flight: AtomicUsize,
}

fn quote(s: &str) -> String {
    format!("'{s}'")
}

impl MockProcess {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock means a test already panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ─── Test setup ───

    pub fn register(&self, address: &str, username: &str) {
        self.lock()
            .users
            .insert(address.to_string(), username.to_string());
    }

    /// Creates a room owned by `owner`. Returns `(game_id, password)`.
    pub fn create_room_for(&self, owner: &str) -> (String, String) {
        insert_room(&mut self.lock(), owner)
    }

    /// Seats `address` without going through `JoinRoom`.
    pub fn seat(&self, game_id: &str, address: &str) {
        if let Some(room) = self.room_mut(&mut self.lock(), game_id) {
            room.players.push(address.to_string());
        }
    }

    pub fn unseat(&self, game_id: &str, address: &str) {
        if let Some(room) = self.room_mut(&mut self.lock(), game_id) {
            room.players.retain(|p| p != address);
        }
    }

    /// Moves the turn to the next seat.
    pub fn advance_turn(&self, game_id: &str) {
        if let Some(room) = self.room_mut(&mut self.lock(), game_id) {
            room.turn += 1;
        }
    }

    pub fn start_game(&self, game_id: &str) {
        if let Some(room) = self.room_mut(&mut self.lock(), game_id) {
            room.state = "ON-GOING".to_string();
        }
    }

    pub fn set_cards(&self, address: &str, cards: Vec<u8>) {
        self.lock().cards.insert(address.to_string(), cards);
    }

    /// Delay applied to every dry-run.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Makes user lookups for `address` fail at the transport level.
    pub fn fail_user_info(&self, address: &str) {
        self.lock().failing_users.insert(address.to_string());
    }

    /// Makes every call for `action` fail at the transport level.
    pub fn fail_action(&self, action: Action, on: bool) {
        let mut st = self.lock();
        if on {
            st.failing.insert(action);
        } else {
            st.failing.remove(&action);
        }
    }

    /// Makes the process answer `action` with an `error` status.
    pub fn refuse_action(&self, action: Action, on: bool) {
        let mut st = self.lock();
        if on {
            st.refused.insert(action);
        } else {
            st.refused.remove(&action);
        }
    }

    /// Makes room status replies unparseable.
    pub fn set_garbage_status(&self, on: bool) {
        self.lock().garbage_status = on;
    }

    // ─── Inspection ───

    pub fn players(&self, game_id: &str) -> Vec<String> {
        let mut st = self.lock();
        self.room_mut(&mut st, game_id)
            .map(|r| r.players.clone())
            .unwrap_or_default()
    }

    pub fn dry_run_count(&self, action: Action) -> usize {
        self.lock().dry_runs.get(&action).copied().unwrap_or(0)
    }

    pub fn message_count(&self, action: Action) -> usize {
        self.lock().messages.get(&action).copied().unwrap_or(0)
    }

    pub fn user_lookups(&self, address: &str) -> usize {
        self.lock().user_lookups.get(address).copied().unwrap_or(0)
    }

    /// Highest number of room status queries seen in flight at once.
    pub fn max_concurrent_status(&self) -> usize {
        self.status_max_in_flight.load(Ordering::SeqCst)
    }

    // ─── Process logic ───

    fn room_mut<'a>(&self, st: &'a mut State, game_id: &str) -> Option<&'a mut Room> {
        let id: u64 = game_id.parse().ok()?;
        st.rooms.get_mut(&id)
    }

    fn room_status_reply(&self, st: &mut State, game_id: &str) -> String {
        if st.garbage_status {
            return "room status unavailable".to_string();
        }
        match self.room_mut(st, game_id) {
            Some(room) => format!(
                "{{'gameID':{},'gameState':{},'players':{}}}",
                quote(game_id),
                quote(&room.state),
                quote(&room.players.join(","))
            ),
            None => "{'status':'error','message':'Room not found'}".to_string(),
        }
    }

    fn handle_query(&self, st: &mut State, tags: &TagSet) -> anyhow::Result<String> {
        let action = tags.action_tag().context("missing Action tag")?;
        debug!(%action, "Mock dry-run");
        *st.dry_runs.entry(action).or_default() += 1;
        if st.failing.contains(&action) {
            bail!("compute unit unavailable");
        }
        let game_id = tags.get("gameID").unwrap_or_default().to_string();
        match action {
            Action::GetRoomStatus => Ok(self.room_status_reply(st, &game_id)),
            Action::GetUserInfo => {
                let address = tags.get("address").unwrap_or_default().to_string();
                *st.user_lookups.entry(address.clone()).or_default() += 1;
                if st.failing_users.contains(&address) {
                    bail!("compute unit unavailable");
                }
                Ok(match st.users.get(&address) {
                    Some(name) => format!("{{'username':{}}}", quote(name)),
                    None => "{'status':'error','message':'User not found'}".to_string(),
                })
            }
            Action::GetCurrentTurn if st.refused.contains(&action) => {
                Ok("{'status':'error','message':'Refused'}".to_string())
            }
            Action::GetCurrentTurn => Ok(match self.room_mut(st, &game_id) {
                Some(room) if room.state == "ON-GOING" && !room.players.is_empty() => {
                    let current = &room.players[room.turn % room.players.len()];
                    format!("{{'status':'success','currentTurn':{}}}", quote(current))
                }
                _ => "{'status':'error','message':'Game not started'}".to_string(),
            }),
            other => bail!("{other} is not a query"),
        }
    }

    fn handle_message(&self, st: &mut State, owner: &str, tags: &TagSet) -> anyhow::Result<String> {
        let action = tags.action_tag().context("missing Action tag")?;
        debug!(%action, %owner, "Mock message");
        *st.messages.entry(action).or_default() += 1;
        if st.failing.contains(&action) {
            bail!("messenger unavailable");
        }
        let game_id = tags.get("gameID").unwrap_or_default().to_string();
        Ok(match action {
            Action::RegisterPlayer => {
                let name = tags.get("username").unwrap_or_default().to_string();
                let taken = st
                    .users
                    .iter()
                    .any(|(addr, existing)| existing == &name && addr != owner);
                if taken {
                    "Username already taken".to_string()
                } else if st.users.insert(owner.to_string(), name).is_some() {
                    "Username updated successfully".to_string()
                } else {
                    "Successfully registered player".to_string()
                }
            }
            Action::CreateGameRoom => {
                let (id, password) = insert_room(st, owner);
                format!(
                    "{{'message':'Game room created','gameID':{},'password':{}}}",
                    quote(&id),
                    quote(&password)
                )
            }
            Action::JoinRoom => {
                let password = tags.get("password").unwrap_or_default().to_string();
                match self.room_mut(st, &game_id) {
                    None => "{'status':'error','message':'Room not found'}".to_string(),
                    Some(room) if room.password != password => {
                        "{'status':'error','message':'Invalid password'}".to_string()
                    }
                    Some(room) if room.players.iter().any(|p| p == owner) => {
                        "{'status':'You are already in this game'}".to_string()
                    }
                    Some(room) if room.players.len() >= 4 => {
                        "{'status':'error','message':'Room is full'}".to_string()
                    }
                    Some(room) => {
                        room.players.push(owner.to_string());
                        "{'status':'success','message':'Joined room'}".to_string()
                    }
                }
            }
            Action::GetMyCards if st.refused.contains(&action) => {
                "{'status':'error','message':'Refused'}".to_string()
            }
            Action::GetMyCards => {
                let seated = self
                    .room_mut(st, &game_id)
                    .is_some_and(|r| r.players.iter().any(|p| p == owner));
                if seated {
                    let cards = st
                        .cards
                        .get(owner)
                        .cloned()
                        .unwrap_or_else(|| vec![1, 2, 3, 4]);
                    let list: Vec<String> = cards.iter().map(u8::to_string).collect();
                    format!("{{'status':'success','cards':[{}]}}", list.join(","))
                } else {
                    "{'status':'error','message':'Not in this game'}".to_string()
                }
            }
            other => return Err(anyhow!("{other} must be sent as a dry-run")),
        })
    }

    async fn latency(&self) {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

fn insert_room(st: &mut State, owner: &str) -> (String, String) {
    st.next_room += 1;
    let id = st.next_room;
    let password = format!("pw{id}");
    st.rooms.insert(
        id,
        Room {
            password: password.clone(),
            players: vec![owner.to_string()],
            state: "LOOKING FOR MEMBERS".to_string(),
            turn: 0,
        },
    );
    (id.to_string(), password)
}

/// Counts in-flight room status queries.
struct StatusInFlight<'a>(&'a MockProcess);

impl<'a> StatusInFlight<'a> {
    fn enter(mock: &'a MockProcess) -> Self {
        let now = mock.status_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        mock.status_max_in_flight.fetch_max(now, Ordering::SeqCst);
        StatusInFlight(mock)
    }
}

impl Drop for StatusInFlight<'_> {
    fn drop(&mut self) {
        self.0.status_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProcessRpc for MockProcess {
    async fn send_message(
        &self,
        wallet: &Wallet,
        process_id: &str,
        tags: TagSet,
        data: &str,
    ) -> anyhow::Result<String> {
        let mut item = DataItem::new(
            wallet,
            Some(decode_id(process_id)?),
            Some(random_anchor()),
            tags.clone().into_wire(),
            data.as_bytes().to_vec(),
        );
        item.sign(wallet)?;
        item.verify()?;
        let id = item.id()?;

        let mut st = self.lock();
        let reply = self.handle_message(&mut st, &wallet.address(), &tags)?;
        let rs = ResultSet::reply(reply);
        st.results.insert(id.clone(), rs.clone());
        st.log.push((id.clone(), rs));
        Ok(id)
    }

    async fn result(&self, _process_id: &str, message_id: &str) -> anyhow::Result<ResultSet> {
        self.lock()
            .results
            .get(message_id)
            .cloned()
            .with_context(|| format!("no result for {message_id}"))
    }

    async fn latest_results(&self, _process_id: &str, limit: u32) -> anyhow::Result<ResultsPage> {
        let st = self.lock();
        let edges = st
            .log
            .iter()
            .rev()
            .take(limit as usize)
            .map(|(id, rs)| ResultEdge {
                cursor: id.clone(),
                node: rs.clone(),
            })
            .collect();
        Ok(ResultsPage { edges })
    }

    async fn dry_run(
        &self,
        _process_id: &str,
        tags: TagSet,
        _data: &str,
    ) -> anyhow::Result<ResultSet> {
        let _in_flight = (tags.action_tag() == Some(Action::GetRoomStatus))
            .then(|| StatusInFlight::enter(self));
        self.latency().await;
        let mut st = self.lock();
        let reply = self.handle_query(&mut st, &tags)?;
        Ok(ResultSet::reply(reply))
    }
}

/// Config with short timings for tests.
pub fn test_config() -> ClientConfig {
    ClientConfig {
        process_id: MOCK_PROCESS_ID.to_string(),
        poll_interval_ms: 100,
        readback: ReadbackStrategy::Confirmed,
        readback_delay_ms: 10,
        confirm_timeout_ms: 1_000,
        ..ClientConfig::default()
    }
}

/// Client wired to `mock` with an in-memory session.
pub fn client_for(mock: &Arc<MockProcess>) -> GameClient {
    client_with(mock, test_config(), SessionStore::in_memory())
}

pub fn client_with(mock: &Arc<MockProcess>, cfg: ClientConfig, session: SessionStore) -> GameClient {
    let rpc: Arc<dyn ProcessRpc> = mock.clone();
    GameClient::new(cfg, session, rpc)
}

/// Client that has landed and registered `username`.
pub async fn registered_client(
    mock: &Arc<MockProcess>,
    username: &str,
) -> anyhow::Result<GameClient> {
    let mut client = client_for(mock);
    client.init_landing().await?;
    client.register_player(username).await?;
    Ok(client)
}

/// Installs a test-friendly tracing subscriber once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}
