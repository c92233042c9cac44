//! High-level marketplace operations
//!
//! Composes the envelope builder, signer gateway, submission pipeline,
//! Horizon reads, and the local task cache into the operations the CLI
//! exposes: post, claim, submit work, pick a winner, pay, and the read-only
//! board and activity feed.

use crate::amount::Stroops;
use crate::cache::{NewTask, TaskCache};
use crate::config::Config;
use crate::error::Result;
use crate::rpc::{FundingOutcome, HorizonClient, LedgerRpc, SorobanRpcClient};
use crate::task::{Category, Task, TaskStatus, TxReceipt, WorkSubmission};
use crate::telemetry::OperationContext;
use crate::tx::scval::{addr_val, decode_gigs, scval_to_json, str_val, u64_val, ChainGig};
use crate::tx::{simulate_call, submit_and_confirm, EnvelopeBuilder, OperationSpec, SubmissionConfig};
use crate::wallet::{LocalSigner, Signer};
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use stellar_xdr::curr::{Limits, ReadXdr, ScVal};
use tracing::{debug, warn};

/// One entry in the contract activity feed.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEvent {
    pub id: String,
    pub ledger: u32,
    pub ledger_closed_at: String,
    /// First event topic, usually the event name.
    pub topic: serde_json::Value,
    pub data: serde_json::Value,
}

/// The marketplace client.
pub struct Marketplace {
    rpc: Arc<dyn LedgerRpc>,
    horizon: HorizonClient,
    signer: Arc<dyn Signer>,
    cache: TaskCache,
    builder: EnvelopeBuilder,
    contract_id: String,
    submission: SubmissionConfig,
    network_passphrase: String,
    event_lookback: u32,
    /// Session-scoped board cache; `fetch_gigs(false)` serves from here.
    board: RwLock<Option<Vec<Task>>>,
}

impl Marketplace {
    /// Wire up a marketplace from explicit parts. Tests use this with a
    /// scripted ledger.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rpc: Arc<dyn LedgerRpc>,
        horizon: HorizonClient,
        signer: Arc<dyn Signer>,
        cache: TaskCache,
        builder: EnvelopeBuilder,
        contract_id: String,
        submission: SubmissionConfig,
        network_passphrase: String,
        event_lookback: u32,
    ) -> Self {
        Self {
            rpc,
            horizon,
            signer,
            cache,
            builder,
            contract_id,
            submission,
            network_passphrase,
            event_lookback,
            board: RwLock::new(None),
        }
    }

    /// Construct production clients from configuration.
    pub fn from_config(config: &Config, signer: Arc<dyn Signer>) -> Result<Self> {
        let rpc = SorobanRpcClient::new(config.network.rpc_url.clone(), config.request_timeout())?;
        let horizon = HorizonClient::new(
            config.network.horizon_url.clone(),
            config.network.friendbot_url.clone(),
            config.request_timeout(),
        )?;
        let cache = TaskCache::open(&config.cache.path)?;
        let builder = EnvelopeBuilder::new(config.network.base_fee, config.network.tx_timeout_secs);
        Ok(Self::new(
            Arc::new(rpc),
            horizon,
            signer,
            cache,
            builder,
            config.contract.contract_id.clone(),
            config.submission_config(),
            config.network.network_passphrase.clone(),
            config.confirmation.event_lookback_ledgers,
        ))
    }

    /// Address of the acting account.
    pub fn address(&self) -> String {
        self.signer.address()
    }

    /// Post a new gig: invoke `post_gig` on the registry, then mirror the
    /// task into the local cache.
    pub async fn post_gig(
        &self,
        title: &str,
        description: &str,
        category: Category,
        reward_lumens: f64,
        deadline: Option<u64>,
    ) -> Result<(Task, TxReceipt)> {
        let poster = self.signer.address();
        let args = vec![
            str_val(title)?,
            str_val(description)?,
            u64_val(Stroops::from_lumens(reward_lumens).as_u64()),
            addr_val(&poster)?,
        ];
        let receipt = self.invoke("post_gig", args).await?;

        let task = self.cache.add(NewTask {
            title: title.to_string(),
            description: description.to_string(),
            category,
            reward: reward_lumens,
            poster_address: poster,
            deadline,
        })?;
        Ok((task, receipt))
    }

    /// Claim an open gig as the acting account.
    pub async fn claim_gig(&self, gig_id: u64) -> Result<TxReceipt> {
        let worker = self.signer.address();
        let args = vec![u64_val(gig_id), addr_val(&worker)?];
        let receipt = self.invoke("claim_gig", args).await?;

        self.try_cache_update(gig_id, |cache, id| cache.assign(id, &worker).map(|_| ()));
        Ok(receipt)
    }

    /// Submit a link to finished work for a gig.
    pub async fn submit_work(&self, gig_id: u64, link: &str) -> Result<TxReceipt> {
        let worker = self.signer.address();
        let args = vec![u64_val(gig_id), addr_val(&worker)?, str_val(link)?];
        let receipt = self.invoke("submit_work", args).await?;

        self.try_cache_update(gig_id, |cache, id| {
            cache.record_submission(id, &worker, link).map(|_| ())
        });
        Ok(receipt)
    }

    /// Record the winner and the settlement hash on the registry.
    pub async fn pick_winner(
        &self,
        gig_id: u64,
        winner: &str,
        payment_hash: &str,
    ) -> Result<TxReceipt> {
        let args = vec![u64_val(gig_id), addr_val(winner)?, str_val(payment_hash)?];
        let receipt = self.invoke("pick_winner", args).await?;

        self.try_cache_update(gig_id, |cache, id| {
            cache.complete(id, payment_hash).map(|_| ())
        });
        Ok(receipt)
    }

    /// Send a native payment from the acting account.
    pub async fn send_payment(&self, destination: &str, amount_lumens: f64) -> Result<TxReceipt> {
        let source = self.signer.address();
        let sequence = self.horizon.sequence(&source).await?;
        let envelope = self.builder.build(
            &source,
            sequence,
            OperationSpec::Payment {
                destination: destination.to_string(),
                amount: Stroops::from_lumens(amount_lumens),
            },
        )?;

        let ctx = OperationContext::new("send_payment");
        submit_and_confirm(
            self.rpc.as_ref(),
            self.signer.as_ref(),
            envelope,
            false,
            &self.submission,
            &ctx,
        )
        .await
    }

    /// Pay the winner, then record the payment hash via `pick_winner`.
    pub async fn pay_and_pick_winner(
        &self,
        gig_id: u64,
        winner: &str,
        amount_lumens: f64,
    ) -> Result<TxReceipt> {
        let payment = self.send_payment(winner, amount_lumens).await?;
        self.pick_winner(gig_id, winner, &payment.hash).await?;
        Ok(payment)
    }

    /// The task board. Serves the session cache unless `force_refresh`;
    /// otherwise runs a read-only `get_gigs` simulation and replaces both
    /// caches with the authoritative result.
    pub async fn fetch_gigs(&self, force_refresh: bool) -> Result<Vec<Task>> {
        if !force_refresh {
            if let Some(board) = self.board.read().as_ref() {
                debug!("serving board from session cache");
                return Ok(board.clone());
            }
        }

        // Read-only simulation; any funded-or-not account works as source.
        let probe = LocalSigner::random(&self.network_passphrase);
        let envelope = self.builder.build(
            &probe.address(),
            0,
            OperationSpec::InvokeContract {
                contract_id: self.contract_id.clone(),
                function: "get_gigs".to_string(),
                args: vec![],
            },
        )?;

        let retval = simulate_call(self.rpc.as_ref(), &envelope).await?;
        let gigs = decode_gigs(&retval)?;
        let tasks: Vec<Task> = gigs.into_iter().map(chain_gig_to_task).collect();

        self.cache.replace_all(&tasks)?;
        *self.board.write() = Some(tasks.clone());
        Ok(tasks)
    }

    /// Locally cached tasks, without touching the network.
    pub fn cached_tasks(&self) -> Result<Vec<Task>> {
        self.cache.load_all()
    }

    /// Recent contract events mapped into a readable feed.
    pub async fn activity_feed(&self) -> Result<Vec<ActivityEvent>> {
        let latest = self.rpc.latest_ledger().await?;
        let start = latest.saturating_sub(self.event_lookback).max(1);
        let response = self.rpc.events(start, &self.contract_id).await?;

        Ok(response
            .events
            .into_iter()
            .map(|event| ActivityEvent {
                id: event.id,
                ledger: event.ledger,
                ledger_closed_at: event.ledger_closed_at,
                topic: event
                    .topic
                    .first()
                    .map(|t| decode_scval_lossy(t))
                    .unwrap_or(serde_json::Value::Null),
                data: decode_scval_lossy(&event.value),
            })
            .collect())
    }

    /// Native balance of `account` (defaults to the acting account).
    pub async fn balance(&self, account: Option<&str>) -> Result<String> {
        let address = account.map(str::to_string).unwrap_or_else(|| self.address());
        let record = self.horizon.account(&address).await?;
        Ok(record.native_balance())
    }

    /// Fund a testnet account via friendbot.
    pub async fn fund(&self, account: Option<&str>) -> Result<FundingOutcome> {
        let address = account.map(str::to_string).unwrap_or_else(|| self.address());
        Ok(self.horizon.fund(&address).await?)
    }

    /// Invoke a registry function as the acting account and wait for a
    /// terminal status.
    async fn invoke(&self, function: &str, args: Vec<ScVal>) -> Result<TxReceipt> {
        let source = self.signer.address();
        let sequence = self.horizon.sequence(&source).await?;
        let envelope = self.builder.build(
            &source,
            sequence,
            OperationSpec::InvokeContract {
                contract_id: self.contract_id.clone(),
                function: function.to_string(),
                args,
            },
        )?;

        let ctx = OperationContext::new(function);
        let receipt = submit_and_confirm(
            self.rpc.as_ref(),
            self.signer.as_ref(),
            envelope,
            true,
            &self.submission,
            &ctx,
        )
        .await?;
        self.invalidate_board();
        Ok(receipt)
    }

    /// Mirror an on-chain state change into the cache when the gig is known
    /// locally. A miss is fine; the next board refresh brings it in.
    fn try_cache_update(&self, gig_id: u64, update: impl Fn(&TaskCache, &str) -> Result<()>) {
        let id = gig_id.to_string();
        match self.cache.get(&id) {
            Ok(Some(_)) => {
                if let Err(e) = update(&self.cache, &id) {
                    warn!(gig_id, error = %e, "cache update failed");
                }
            }
            Ok(None) => debug!(gig_id, "gig not in local cache, skipping mirror"),
            Err(e) => warn!(gig_id, error = %e, "cache lookup failed"),
        }
    }

    fn invalidate_board(&self) {
        *self.board.write() = None;
    }
}

fn chain_gig_to_task(gig: ChainGig) -> Task {
    Task {
        id: gig.id.to_string(),
        title: gig.title,
        description: gig.description,
        category: Category::Other,
        reward: Stroops(gig.reward).to_lumens(),
        poster_address: gig.poster,
        worker_address: gig.worker,
        deadline: None,
        status: TaskStatus::from_code(gig.status),
        created_at: Utc::now(),
        transaction_hash: gig.payment_hash,
        submissions: gig
            .submissions
            .into_iter()
            .map(|s| WorkSubmission {
                worker: s.worker,
                link: s.link,
            })
            .collect(),
    }
}

fn decode_scval_lossy(xdr_base64: &str) -> serde_json::Value {
    match ScVal::from_xdr_base64(xdr_base64, Limits::none()) {
        Ok(val) => scval_to_json(&val),
        // Leave undecodable payloads as their raw base64 form.
        Err(_) => serde_json::Value::String(xdr_base64.to_string()),
    }
}
