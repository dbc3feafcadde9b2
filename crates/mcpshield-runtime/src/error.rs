//! Runtime error types.

use thiserror::Error;

/// Errors that can occur while managing or talking to a workload.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Workload creation failed
    #[error("failed to create workload {0}: {1}")]
    CreateFailed(String, String),

    /// Workload deletion failed
    #[error("failed to delete workload {0}: {1}")]
    DeleteFailed(String, String),

    /// Workload never reached ready-replica parity
    #[error("timeout waiting for workload {0}")]
    ReadyTimeout(String),

    /// Workload was still present after the deletion window
    #[error("timeout waiting for workload {0} to be deleted")]
    DeleteTimeout(String),

    /// No instances backing the workload
    #[error("no instances found for workload {0}")]
    NoInstances(String),

    /// Instance never became ready
    #[error("timeout waiting for instance {0}")]
    InstanceTimeout(String),

    /// Instance reached a terminal failure phase
    #[error("instance {0} failed: {1}")]
    InstanceFailed(String, String),

    /// Exec stream failed or the command exited non-zero
    #[error("exec error: {message}, stderr: {stderr}")]
    ExecFailed {
        /// Stream or exit failure description
        message: String,
        /// Captured stderr of the command
        stderr: String,
    },

    /// Lookup or API call against the orchestrator failed
    #[error("orchestrator error: {0}")]
    Orchestrator(String),

    /// The cancellation token fired mid-operation
    #[error("operation cancelled")]
    Cancelled,
}
