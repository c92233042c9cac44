//! Error taxonomy for the MicroGig client
//!
//! Every failure a marketplace operation can surface falls into one of a
//! small set of categories, each of which maps to a one-line notification
//! for the caller:
//! - envelope construction failures (bad addresses, oversized payloads)
//! - the signer declining or failing to sign
//! - the ledger rejecting the envelope at submission time
//! - an accepted transaction failing on-chain
//! - the confirmation poller exhausting its attempt budget

use crate::rpc::RpcError;
use thiserror::Error;

/// Errors produced by marketplace operations.
#[derive(Debug, Error)]
pub enum MarketplaceError {
    /// Envelope construction failed before anything touched the network.
    #[error("failed to build transaction: {0}")]
    Build(String),

    /// The signer refused or was unable to produce a signature.
    #[error("signer declined: {0}")]
    SignerDeclined(String),

    /// The ledger rejected the envelope at submission time.
    ///
    /// `payload` carries the remote error body (error result XDR or the raw
    /// response) for diagnostics.
    #[error("transaction rejected on submission (status={status}): {payload}")]
    SubmissionRejected { status: String, payload: String },

    /// The transaction was accepted but failed during ledger application.
    #[error("transaction {hash} failed on-chain")]
    OnChainFailed {
        hash: String,
        result_xdr: Option<String>,
    },

    /// The poll budget ran out before the transaction reached a terminal
    /// state. The transaction may still land later.
    #[error("no terminal status for {hash} after {attempts} polls")]
    PollTimeout { hash: String, attempts: u32 },

    /// Transport or RPC-level failure.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// XDR encode/decode failure.
    #[error("xdr error: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),

    /// The simulation return value did not decode into the expected shape.
    #[error("failed to decode ledger value: {0}")]
    Decode(String),

    /// A task status change that would move backwards.
    #[error("invalid task transition: {0}")]
    InvalidTransition(String),

    /// Unknown task id.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// Local cache failure.
    #[error("cache error: {0}")]
    Cache(#[from] sled::Error),

    /// Configuration problem detected at use time.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MarketplaceError {
    /// Whether retrying the whole operation might succeed.
    ///
    /// Submission rejections and on-chain failures are decisions the ledger
    /// already made; replaying the same envelope cannot change them. A poll
    /// timeout is deliberately non-retryable as well: the transaction may
    /// still land, and resubmitting would risk a duplicate.
    pub fn is_retryable(&self) -> bool {
        match self {
            MarketplaceError::Rpc(e) => e.is_retryable(),
            MarketplaceError::SignerDeclined(_) => true,
            MarketplaceError::Build(_)
            | MarketplaceError::SubmissionRejected { .. }
            | MarketplaceError::OnChainFailed { .. }
            | MarketplaceError::PollTimeout { .. }
            | MarketplaceError::Xdr(_)
            | MarketplaceError::Decode(_)
            | MarketplaceError::InvalidTransition(_)
            | MarketplaceError::TaskNotFound(_)
            | MarketplaceError::Cache(_)
            | MarketplaceError::Config(_) => false,
        }
    }

    /// Short label used when surfacing the failure as a notification.
    pub fn notification(&self) -> &'static str {
        match self {
            MarketplaceError::Build(_) => "Could not build the transaction",
            MarketplaceError::SignerDeclined(_) => "Signing was declined",
            MarketplaceError::SubmissionRejected { .. } => "The network rejected the transaction",
            MarketplaceError::OnChainFailed { .. } => "The transaction failed on-chain",
            MarketplaceError::PollTimeout { .. } => "Timed out waiting for confirmation",
            MarketplaceError::Rpc(_) => "Network error",
            MarketplaceError::Xdr(_) | MarketplaceError::Decode(_) => "Unexpected ledger response",
            MarketplaceError::InvalidTransition(_) | MarketplaceError::TaskNotFound(_) => {
                "Task update failed"
            }
            MarketplaceError::Cache(_) => "Local cache error",
            MarketplaceError::Config(_) => "Configuration error",
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketplaceError>;
