//! RPC error classification and retry policy

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the ledger transport layer.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Transport-level failure (connection refused, DNS, TLS).
    #[error("transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// The request timed out.
    #[error("timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// The JSON-RPC server answered with an error object.
    #[error("rpc error {code}: {message}")]
    JsonRpc { code: i64, message: String },

    /// Horizon answered with a non-success HTTP status.
    #[error("horizon error {status}: {body}")]
    Horizon { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl RpcError {
    /// Whether the same request can reasonably be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport { .. } => true,
            RpcError::Timeout { .. } => true,
            // Server-side errors may clear; client errors will not.
            RpcError::JsonRpc { code, .. } => (-32099..=-32000).contains(code),
            RpcError::Horizon { status, .. } => *status >= 500 || *status == 429,
            RpcError::MalformedResponse(_) => false,
        }
    }

    pub fn from_reqwest(err: reqwest::Error, endpoint: &str) -> Self {
        if err.is_timeout() {
            RpcError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms: 0,
            }
        } else {
            RpcError::Transport {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Bounded-retry policy for read calls.
///
/// Exponential backoff with jitter. Submission itself is never retried
/// through this policy; only idempotent reads are.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,

    /// Base delay in milliseconds.
    pub base_delay_ms: u64,

    /// Delay ceiling in milliseconds.
    pub max_delay_ms: u64,

    /// Jitter factor (0.0 - 1.0).
    pub jitter_factor: f64,

    /// Exponential multiplier.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            jitter_factor: 0.1,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after `attempt` failures, or `None` once the
    /// budget is exhausted.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }

        let delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let delay_ms = delay_ms.min(self.max_delay_ms as f64);

        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * self.jitter_factor;
        let jittered = (delay_ms * (1.0 + jitter)).max(0.0) as u64;

        Some(Duration::from_millis(jittered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_timeout_are_retryable() {
        assert!(RpcError::Transport {
            endpoint: "x".to_string(),
            message: "refused".to_string(),
        }
        .is_retryable());
        assert!(RpcError::Timeout {
            endpoint: "x".to_string(),
            timeout_ms: 5_000,
        }
        .is_retryable());
    }

    #[test]
    fn client_side_json_rpc_errors_are_not_retryable() {
        assert!(!RpcError::JsonRpc {
            code: -32602,
            message: "invalid params".to_string(),
        }
        .is_retryable());
        assert!(RpcError::JsonRpc {
            code: -32003,
            message: "server busy".to_string(),
        }
        .is_retryable());
    }

    #[test]
    fn horizon_classification_follows_http_status() {
        assert!(RpcError::Horizon {
            status: 503,
            body: String::new(),
        }
        .is_retryable());
        assert!(RpcError::Horizon {
            status: 429,
            body: String::new(),
        }
        .is_retryable());
        assert!(!RpcError::Horizon {
            status: 404,
            body: String::new(),
        }
        .is_retryable());
    }

    #[test]
    fn retry_policy_exhausts_after_max_attempts() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        };

        let d0 = policy.delay_after(0).expect("first retry allowed");
        let d1 = policy.delay_after(1).expect("second retry allowed");
        assert!(d1 >= d0);
        assert!(policy.delay_after(2).is_none());
    }

    #[test]
    fn retry_delay_respects_ceiling() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 1_000,
            max_delay_ms: 2_000,
            jitter_factor: 0.0,
            multiplier: 10.0,
        };
        let d = policy.delay_after(5).unwrap();
        assert!(d <= Duration::from_millis(2_000));
    }
}
