//! Error types shared by every stage of the pipeline.
//!
//! [`RemoteError`] is what a single call against the content store or the
//! image host reports. The retry layer classifies it and, once it gives up,
//! lifts it into a terminal [`SyncError`] labelled with the operation context.

/// Fault codes treated as transient network failures.
const TRANSIENT_FAULTS: [&str; 7] = [
    "ECONNRESET",
    "ETIMEDOUT",
    "ECONNREFUSED",
    "EHOSTUNREACH",
    "ENOTFOUND",
    "EAI_AGAIN",
    "fetch failed",
];

/// Failure reported by one remote call.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Transport-level failure (connection, DNS, timeout).
    #[error("network error ({}): {message}", code.as_deref().unwrap_or("unknown"))]
    Network {
        code: Option<String>,
        message: String,
    },
    /// The remote answered with a non-success status.
    #[error("remote returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// The response could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn network(code: impl Into<String>, message: impl Into<String>) -> Self {
        RemoteError::Network {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Transient faults and 5xx statuses are worth another attempt; everything else is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Network { code, message } => {
                let message = message.to_lowercase();
                let code = code.as_deref().map(str::to_lowercase);
                TRANSIENT_FAULTS.iter().any(|fault| {
                    let fault = fault.to_lowercase();
                    message.contains(&fault) || code.as_deref() == Some(fault.as_str())
                })
            }
            RemoteError::Status { status, .. } => (500..600).contains(status),
            RemoteError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return RemoteError::Decode(e.to_string());
        }
        let code = if e.is_timeout() {
            "ETIMEDOUT"
        } else if e.is_connect() {
            "ECONNREFUSED"
        } else {
            "fetch failed"
        };
        RemoteError::network(code, e.to_string())
    }
}

/// Terminal failure of a pipeline operation.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{context} failed after {attempts} attempt(s): {source}")]
    NetworkTransient {
        context: String,
        attempts: u32,
        #[source]
        source: RemoteError,
    },
    #[error("{context} failed: {source}")]
    NetworkPermanent {
        context: String,
        #[source]
        source: RemoteError,
    },
    #[error("content validation failed: {0}")]
    ContentValidation(String),
    #[error("no usable path in upload response: {0}")]
    UploadResponseParse(String),
    #[error("failed to render {block_type} block {block_id}: {reason}")]
    BlockRender {
        block_type: String,
        block_id: String,
        reason: String,
    },
    #[error("invalid document record: {0}")]
    InvalidDocument(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for SyncError {
    fn from(e: serde_yaml::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}
