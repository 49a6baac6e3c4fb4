//! Room synchronization.
//!
//! The process owns room state; the client polls it. Each cycle:
//! 1. fetches the room status,
//! 2. rebuilds the roster, resolving only participants not seen before,
//! 3. while the game is on, fetches the current turn and the caller's hand
//!    concurrently.
//!
//! Cycles never overlap: a trigger that arrives while one is in flight is
//! dropped. Failures are logged and the loop keeps going after the usual
//! delay. Stopping the loop cancels the pending sleep and any in-flight
//! requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fourcards_shared::{
    reply::{GameStage, RoomStatus},
    room::RoomSnapshot,
    wallet::Wallet,
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

use crate::process::ProcessClient;

/// How a single cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was already running.
    Skipped,
    /// A new snapshot was published.
    Synced,
    /// The room status was missing or unreadable; nothing changed.
    NoStatus,
    /// A request failed; nothing changed.
    Failed,
}

/// Resets the running flag when a cycle ends, including on cancellation.
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Polls one room and publishes [`RoomSnapshot`]s.
pub struct RoomSync {
    process: ProcessClient,
    wallet: Wallet,
    game_id: String,
    poll_interval: Duration,
    running: AtomicBool,
    snapshot: watch::Sender<RoomSnapshot>,
}

impl RoomSync {
    pub fn new(
        process: ProcessClient,
        wallet: Wallet,
        status: &RoomStatus,
        game_id: &str,
        poll_interval: Duration,
    ) -> Self {
        let (snapshot, _) = watch::channel(RoomSnapshot::pending(
            game_id,
            status.game_state.clone(),
        ));
        Self {
            process,
            wallet,
            game_id: game_id.to_string(),
            poll_interval,
            running: AtomicBool::new(false),
            snapshot,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RoomSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn latest(&self) -> RoomSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs one reconciliation cycle unless one is already in flight.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(_guard) = CycleGuard::acquire(&self.running) else {
            debug!(game_id = %self.game_id, "Sync cycle already running, skipping");
            return CycleOutcome::Skipped;
        };
        match self.reconcile().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(game_id = %self.game_id, error = %e, "Error in game flow");
                CycleOutcome::Failed
            }
        }
    }

    async fn resolve_name(&self, address: String) -> anyhow::Result<Option<String>> {
        Ok(self
            .process
            .user_info(&address)
            .await?
            .and_then(|info| info.name().map(str::to_string)))
    }

    async fn reconcile(&self) -> anyhow::Result<CycleOutcome> {
        let Some(status) = self.process.room_status(&self.game_id).await? else {
            warn!(game_id = %self.game_id, "Invalid room status");
            return Ok(CycleOutcome::NoStatus);
        };

        let previous = self.latest();
        let participants = status.participants();
        let roster = previous
            .roster
            .rebuild(&participants, |address| self.resolve_name(address))
            .await;

        let mut current_turn = previous.current_turn;
        let mut my_cards = previous.my_cards;
        if status.game_state == GameStage::OnGoing {
            let (turn, cards) = tokio::join!(
                self.process.current_turn(&self.game_id),
                self.process.my_cards(&self.wallet, &self.game_id),
            );
            match turn {
                Ok(Some(turn)) if turn.is_success() => current_turn = Some(turn),
                Ok(other) => debug!(?other, "Current turn not available"),
                Err(e) => warn!(error = %e, "Failed to fetch current turn"),
            }
            match cards {
                Ok(Some(cards)) if cards.is_success() => my_cards = Some(cards.cards),
                Ok(other) => debug!(?other, "Cards not available"),
                Err(e) => warn!(error = %e, "Failed to fetch own cards"),
            }
        }

        debug!(
            game_id = %self.game_id,
            stage = %status.game_state,
            players = roster.len(),
            "Room synced"
        );
        self.snapshot.send_replace(RoomSnapshot {
            game_id: self.game_id.clone(),
            stage: status.game_state,
            roster,
            current_turn,
            my_cards,
            fetched_at: Utc::now(),
        });
        Ok(CycleOutcome::Synced)
    }

    /// Starts the polling loop: run a cycle, wait, repeat.
    pub fn spawn(self: Arc<Self>) -> SyncHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let sync = Arc::clone(&self);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    outcome = sync.run_cycle() => {
                        debug!(game_id = %sync.game_id, ?outcome, "Sync cycle finished");
                    }
                }
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = tokio::time::sleep(sync.poll_interval) => {}
                }
            }
            debug!(game_id = %sync.game_id, "Room sync stopped");
        });
        SyncHandle {
            sync: self,
            stop_tx,
            task: Some(task),
        }
    }
}

/// Owner of a running sync loop. Dropping it stops the loop.
pub struct SyncHandle {
    sync: Arc<RoomSync>,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn sync(&self) -> &Arc<RoomSync> {
        &self.sync
    }

    pub fn subscribe(&self) -> watch::Receiver<RoomSnapshot> {
        self.sync.subscribe()
    }

    pub fn latest(&self) -> RoomSnapshot {
        self.sync.latest()
    }

    /// Stops the loop and waits for it to exit.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
