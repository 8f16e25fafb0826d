//! Boundary to the remote task API.
//!
//! The store only ever talks to a [`SyncGateway`]. Implementations are
//! stateless request/response relays: every call is independent and no
//! ordering is promised between calls that are in flight at the same time.

use std::fmt;
use std::future::Future;

use planner_shared::Task;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("remote API answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("remote API rejected {operation}: {messages}")]
    Rejected {
        operation: &'static str,
        messages: String,
    },

    #[error("failed to encode {operation} request: {source}")]
    Encode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation} response carried no data")]
    MissingData { operation: &'static str },
}

/// The four remote operations the task store depends on.
///
/// Acknowledgments carry no payload the store inspects; a call either
/// completes or fails.
pub trait SyncGateway: Send + Sync {
    fn list_tasks(&self) -> impl Future<Output = Result<Vec<Task>, GatewayError>> + Send;

    fn create_task(&self, task: &Task) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Full-record replace, never a partial patch.
    fn update_task(&self, task: &Task) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn delete_task(&self, id: &str) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Remote write kinds issued by the store after a local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    Create,
    Update,
    Delete,
}

impl fmt::Display for SyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("createTask"),
            Self::Update => f.write_str("updateTask"),
            Self::Delete => f.write_str("deleteTask"),
        }
    }
}
