//! Typed calls against the game process.
//!
//! Queries go through dry-runs and decode the lenient JSON replies.
//! Submissions are signed messages whose reply is read back according to
//! the configured [`ReadbackStrategy`].

use std::sync::Arc;

use fourcards_shared::{
    config::{ClientConfig, ReadbackStrategy},
    error::GameError,
    lenient::parse_lenient_as,
    net::{Action, TagSet},
    reply::{CardsInfo, RoomStatus, TurnInfo, UserInfo},
    wallet::Wallet,
};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::rpc::ProcessRpc;

/// Handle to the game process. Cheap to clone.
#[derive(Clone)]
pub struct ProcessClient {
    rpc: Arc<dyn ProcessRpc>,
    cfg: Arc<ClientConfig>,
}

impl ProcessClient {
    pub fn new(rpc: Arc<dyn ProcessRpc>, cfg: Arc<ClientConfig>) -> Self {
        Self { rpc, cfg }
    }

    pub fn process_id(&self) -> &str {
        &self.cfg.process_id
    }

    /// Dry-runs `tags` and returns the first reply's data.
    pub async fn query(&self, tags: TagSet) -> anyhow::Result<String> {
        let rs = self.rpc.dry_run(self.process_id(), tags, "").await?;
        Ok(rs.first_data()?.to_string())
    }

    pub async fn room_status(&self, game_id: &str) -> anyhow::Result<Option<RoomStatus>> {
        let raw = self
            .query(TagSet::action(Action::GetRoomStatus).game_id(game_id))
            .await?;
        Ok(parse_lenient_as(&raw))
    }

    pub async fn user_info(&self, address: &str) -> anyhow::Result<Option<UserInfo>> {
        let raw = self
            .query(TagSet::action(Action::GetUserInfo).address(address))
            .await?;
        Ok(parse_lenient_as(&raw))
    }

    pub async fn current_turn(&self, game_id: &str) -> anyhow::Result<Option<TurnInfo>> {
        let raw = self
            .query(TagSet::action(Action::GetCurrentTurn).game_id(game_id))
            .await?;
        Ok(parse_lenient_as(&raw))
    }

    /// The caller's own hand. Needs a signed message because the process
    /// identifies the caller by the message owner.
    pub async fn my_cards(&self, wallet: &Wallet, game_id: &str) -> anyhow::Result<Option<CardsInfo>> {
        let id = self
            .rpc
            .send_message(
                wallet,
                self.process_id(),
                TagSet::action(Action::GetMyCards).game_id(game_id),
                "",
            )
            .await?;
        let raw = self.confirm(&id).await?;
        Ok(parse_lenient_as(&raw))
    }

    /// Submits a signed message and returns the reply data.
    pub async fn submit(&self, wallet: &Wallet, tags: TagSet) -> anyhow::Result<String> {
        let action = tags.action_tag();
        let id = self
            .rpc
            .send_message(wallet, self.process_id(), tags, "")
            .await?;
        debug!(message_id = %id, ?action, strategy = ?self.cfg.readback, "Reading back reply");
        match self.cfg.readback {
            ReadbackStrategy::Confirmed => self.confirm(&id).await,
            ReadbackStrategy::LatestAfterDelay => {
                sleep(self.cfg.readback_delay()).await;
                let page = self.rpc.latest_results(self.process_id(), 1).await?;
                Ok(page.latest_data()?.to_string())
            }
        }
    }

    /// Waits until message `id` has a result carrying a reply.
    pub async fn confirm(&self, id: &str) -> anyhow::Result<String> {
        let deadline = Instant::now() + self.cfg.confirm_timeout();
        loop {
            match self.rpc.result(self.process_id(), id).await {
                Ok(rs) => match rs.first_data() {
                    Ok(data) => return Ok(data.to_string()),
                    Err(_) => debug!(message_id = %id, "Result has no reply yet"),
                },
                Err(e) => debug!(message_id = %id, error = %e, "Result not available yet"),
            }
            if Instant::now() >= deadline {
                warn!(message_id = %id, "Gave up waiting for message result");
                return Err(GameError::ConfirmTimeout(id.to_string()).into());
            }
            sleep(self.cfg.readback_delay()).await;
        }
    }
}
