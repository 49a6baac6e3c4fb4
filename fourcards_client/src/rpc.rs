//! Process RPC surface.
//!
//! [`ProcessRpc`] is the seam between the game flows and the network: the
//! HTTP implementation talks to the AO messenger and compute units, and the
//! test harness plugs in an in-memory process.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use fourcards_shared::{
    dataitem::{decode_id, random_anchor, DataItem},
    net::{DryRunRequest, ResultSet, ResultsPage, SubmitReceipt, TagSet},
    wallet::Wallet,
};
use tracing::{debug, warn};

/// Calls against a single remote process.
#[async_trait]
pub trait ProcessRpc: Send + Sync {
    /// Signs and submits a message. Returns the message id.
    async fn send_message(
        &self,
        wallet: &Wallet,
        process_id: &str,
        tags: TagSet,
        data: &str,
    ) -> anyhow::Result<String>;

    /// Result of evaluating one submitted message.
    async fn result(&self, process_id: &str, message_id: &str) -> anyhow::Result<ResultSet>;

    /// Newest-first results listing.
    async fn latest_results(&self, process_id: &str, limit: u32) -> anyhow::Result<ResultsPage>;

    /// Read-only evaluation; nothing is recorded on chain.
    async fn dry_run(&self, process_id: &str, tags: TagSet, data: &str)
        -> anyhow::Result<ResultSet>;
}

/// [`ProcessRpc`] over HTTP.
pub struct HttpRpc {
    http: reqwest::Client,
    cu_url: String,
    mu_url: String,
}

impl HttpRpc {
    pub fn new(cu_url: &str, mu_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            cu_url: cu_url.trim_end_matches('/').to_string(),
            mu_url: mu_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ProcessRpc for HttpRpc {
    async fn send_message(
        &self,
        wallet: &Wallet,
        process_id: &str,
        tags: TagSet,
        data: &str,
    ) -> anyhow::Result<String> {
        let action = tags.action_tag();
        let target = decode_id(process_id).context("process id")?;
        let mut item = DataItem::new(
            wallet,
            Some(target),
            Some(random_anchor()),
            tags.into_wire(),
            data.as_bytes().to_vec(),
        );
        item.sign(wallet)?;
        let id = item.id()?;
        let body = item.to_bytes()?;

        let receipt: SubmitReceipt = self
            .http
            .post(format!("{}/", self.mu_url))
            .header("Content-Type", "application/octet-stream")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await
            .context("submit message")?
            .error_for_status()
            .context("messenger rejected message")?
            .json()
            .await
            .context("decode submit receipt")?;

        if receipt.id != id {
            warn!(local = %id, remote = %receipt.id, "Messenger returned a different message id");
        }
        debug!(message_id = %id, ?action, "Message submitted");
        Ok(id)
    }

    async fn result(&self, process_id: &str, message_id: &str) -> anyhow::Result<ResultSet> {
        self.http
            .get(format!("{}/result/{}", self.cu_url, message_id))
            .query(&[("process-id", process_id)])
            .send()
            .await
            .context("fetch result")?
            .error_for_status()
            .context("compute unit rejected result query")?
            .json()
            .await
            .context("decode result")
    }

    async fn latest_results(&self, process_id: &str, limit: u32) -> anyhow::Result<ResultsPage> {
        self.http
            .get(format!("{}/results/{}", self.cu_url, process_id))
            .query(&[("sort", "DESC".to_string()), ("limit", limit.to_string())])
            .send()
            .await
            .context("fetch results")?
            .error_for_status()
            .context("compute unit rejected results query")?
            .json()
            .await
            .context("decode results")
    }

    async fn dry_run(
        &self,
        process_id: &str,
        tags: TagSet,
        data: &str,
    ) -> anyhow::Result<ResultSet> {
        let action = tags.action_tag();
        let body = DryRunRequest::new(process_id, tags, data);
        debug!(?action, "Dry-run");
        self.http
            .post(format!("{}/dry-run", self.cu_url))
            .query(&[("process-id", process_id)])
            .json(&body)
            .send()
            .await
            .context("dry-run")?
            .error_for_status()
            .context("compute unit rejected dry-run")?
            .json()
            .await
            .context("decode dry-run result")
    }
}
