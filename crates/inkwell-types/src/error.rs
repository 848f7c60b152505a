use thiserror::Error;

use crate::chat::AdmissionSnapshot;

/// Errors from the chat orchestration pipeline.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("message too long: {length} chars (limit {limit})")]
    MessageTooLong { length: usize, limit: usize },

    #[error("combined input too long even after history compression")]
    InputTooLong,

    #[error("unsupported model: '{0}'")]
    UnsupportedModel(String),

    #[error("daily quota exceeded: {used} of {limit} units used")]
    QuotaExceeded { used: u64, limit: u64 },

    #[error("server busy: {snapshot}")]
    ServerBusy { snapshot: AdmissionSnapshot },

    #[error("generation stopped by user")]
    StoppedByUser,

    #[error("upstream provider error: {0}")]
    UpstreamProvider(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Errors from the admission controller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("wait queue is full")]
    QueueFull,

    #[error("timed out waiting for a concurrency slot")]
    Timeout,

    #[error("request stopped while waiting for a slot")]
    Stopped,
}

/// Errors from the expiring key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::MessageTooLong {
            length: 12_000,
            limit: 10_000,
        };
        assert!(err.to_string().contains("12000"));
        assert!(err.to_string().contains("10000"));
    }

    #[test]
    fn test_server_busy_display() {
        let err = ChatError::ServerBusy {
            snapshot: AdmissionSnapshot {
                active: 15,
                queued: 100,
                max_concurrent: 15,
                queue_capacity: 100,
            },
        };
        assert!(err.to_string().contains("15/15 active"));
        assert!(err.to_string().contains("100/100 queued"));
    }

    #[test]
    fn test_store_error_converts_into_chat_error() {
        let err: ChatError = StoreError::Unavailable("connection refused".into()).into();
        assert!(err.to_string().contains("connection refused"));
    }
}
