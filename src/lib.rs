//! MicroGig - Soroban bounty marketplace client
//!
//! Client library for a small-bounty marketplace settled on the Stellar
//! test network. Gigs are posted, claimed, worked, and paid through a gig
//! registry contract; this crate owns the client side of that exchange:
//! envelope construction, signing, the submit/confirm protocol against the
//! Soroban RPC, and an optimistic local mirror of the task board.

pub mod amount;
pub mod cache;
pub mod config;
pub mod deploy;
pub mod error;
pub mod marketplace;
pub mod rpc;
pub mod task;
pub mod telemetry;
pub mod tx;
pub mod wallet;

pub mod test_utils;

// Re-export the types most callers need
pub use amount::Stroops;
pub use config::Config;
pub use error::MarketplaceError;
pub use marketplace::Marketplace;
pub use task::{Task, TaskStatus, TxReceipt};
pub use wallet::{LocalSigner, Signer};
