//! Lumen / stroop amount conversion
//!
//! Rewards are quoted in whole lumens at the edge and settled on-chain in
//! stroops. The multiplier is fixed by the network: 1 XLM = 10^7 stroops.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stroops per lumen.
pub const STROOPS_PER_LUMEN: u64 = 10_000_000;

/// An amount expressed in stroops, the atomic unit of the settlement asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stroops(pub u64);

impl Stroops {
    /// Convert a whole-lumen amount into stroops.
    ///
    /// Fractional lumens are supported down to stroop precision; anything
    /// below one stroop is truncated.
    pub fn from_lumens(lumens: f64) -> Self {
        Stroops((lumens * STROOPS_PER_LUMEN as f64).round() as u64)
    }

    /// Convert back to whole lumens.
    pub fn to_lumens(self) -> f64 {
        self.0 as f64 / STROOPS_PER_LUMEN as f64
    }

    /// Exact conversion for integral lumen amounts.
    pub fn from_whole_lumens(lumens: u64) -> Self {
        Stroops(lumens * STROOPS_PER_LUMEN)
    }

    /// The raw stroop count.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Stroop count as the signed value classic payment operations carry.
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }
}

impl fmt::Display for Stroops {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.7} XLM", self.to_lumens())
    }
}
