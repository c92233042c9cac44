//! Common types used throughout the application

use crate::error::MarketplaceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a task.
///
/// Status only moves forward: `Open -> Assigned -> Completed`. The on-chain
/// registry only distinguishes open (0) and completed (1); `Assigned` exists
/// client-side so the board can show claimed gigs before a winner is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Open,
    Assigned,
    Completed,
    /// Status code the client does not recognize.
    Unknown,
}

impl TaskStatus {
    /// Map an on-chain status code to a label. Total over all inputs.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => TaskStatus::Open,
            1 => TaskStatus::Completed,
            _ => TaskStatus::Unknown,
        }
    }

    /// Ordering rank used to enforce forward-only advancement.
    fn rank(self) -> u8 {
        match self {
            TaskStatus::Open => 0,
            TaskStatus::Assigned => 1,
            TaskStatus::Completed => 2,
            TaskStatus::Unknown => u8::MAX,
        }
    }

    /// Check that `next` does not move the lifecycle backwards.
    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        next != TaskStatus::Unknown && next.rank() >= self.rank()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::Open => "open",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Completed => "completed",
            TaskStatus::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Task category shown on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Design,
    Translation,
    Testing,
    Writing,
    Development,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Design,
        Category::Translation,
        Category::Testing,
        Category::Writing,
        Category::Development,
        Category::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Design => "Design",
            Category::Translation => "Translation",
            Category::Testing => "Testing",
            Category::Writing => "Writing",
            Category::Development => "Development",
            Category::Other => "Other",
        }
    }

    /// Lenient parse; anything unrecognized lands in `Other`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "design" => Category::Design,
            "translation" => Category::Translation,
            "testing" => Category::Testing,
            "writing" => Category::Writing,
            "development" => Category::Development,
            _ => Category::Other,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single piece of submitted work. Append-only per task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSubmission {
    /// Address of the worker who submitted.
    pub worker: String,

    /// Opaque link to the delivered work.
    pub link: String,
}

/// A bounty task as mirrored in the local cache.
///
/// Owned by the cache until superseded by an authoritative chain read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Local identifier (UUID for locally created tasks, the on-chain gig id
    /// for tasks read back from the ledger).
    pub id: String,

    pub title: String,

    pub description: String,

    pub category: Category,

    /// Reward in whole lumens. Fixed at creation.
    pub reward: f64,

    /// Address of the poster.
    pub poster_address: String,

    /// Assigned worker, once claimed.
    pub worker_address: Option<String>,

    /// Optional deadline (unix seconds).
    pub deadline: Option<u64>,

    pub status: TaskStatus,

    pub created_at: DateTime<Utc>,

    /// Settlement transaction hash, recorded on completion.
    pub transaction_hash: Option<String>,

    /// Submitted work, in submission order.
    #[serde(default)]
    pub submissions: Vec<WorkSubmission>,
}

impl Task {
    /// Advance the lifecycle, rejecting backwards moves.
    pub fn advance(&mut self, next: TaskStatus) -> Result<(), MarketplaceError> {
        if !self.status.can_advance_to(next) {
            return Err(MarketplaceError::InvalidTransition(format!(
                "task {} cannot move {} -> {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}

/// Terminal status of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Success,
    Failed,
    Unknown,
}

/// Receipt for a transaction that reached (or never reached) a terminal
/// state on the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Submission hash, hex-encoded.
    pub hash: String,

    pub status: ReceiptStatus,

    /// Ledger sequence the transaction was applied in, when known.
    pub ledger: Option<u32>,
}

/// Shorten an address for display: `GABC...WXYZ`.
pub fn truncate_address(address: &str) -> String {
    if address.len() <= 8 {
        return address.to_string();
    }
    format!("{}...{}", &address[..4], &address[address.len() - 4..])
}
