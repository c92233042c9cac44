//! Structured logging context for submission pipelines

use uuid::Uuid;

/// Correlation context threaded through one submit/confirm sequence.
///
/// Every log line emitted while an operation is in flight carries the same
/// correlation id, so a single gig posting can be followed across build,
/// sign, submit, and poll events.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Operation name, e.g. `post_gig`.
    pub operation: String,

    /// Unique id for this submission sequence.
    pub correlation_id: String,
}

impl OperationContext {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn log_submitting(&self) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            "submitting transaction"
        );
    }

    pub fn log_accepted(&self, hash: &str) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            hash = %hash,
            "transaction accepted, awaiting confirmation"
        );
    }

    pub fn log_poll(&self, hash: &str, attempt: u32, status: &str) {
        tracing::debug!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            hash = %hash,
            attempt = %attempt,
            status = %status,
            "poll tick"
        );
    }

    pub fn log_confirmed(&self, hash: &str, ledger: Option<u32>) {
        tracing::info!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            hash = %hash,
            ledger = ?ledger,
            "transaction confirmed"
        );
    }

    pub fn log_failed(&self, error: &str) {
        tracing::warn!(
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            error = %error,
            "operation failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_get_unique_correlation_ids() {
        let a = OperationContext::new("post_gig");
        let b = OperationContext::new("post_gig");
        assert_ne!(a.correlation_id, b.correlation_id);
        assert_eq!(a.operation, "post_gig");
    }
}
