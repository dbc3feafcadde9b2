//! # mcpshield-runtime
//!
//! Workload lifecycle for upstream MCP servers. Each upstream runs as a
//! single-replica container workload in an orchestrator namespace; a request
//! is bridged into the container by piping one JSON-RPC frame through a
//! short-lived exec stream and reading one frame back from stdout.
//!
//! The orchestrator itself sits behind the narrow [`OrchestratorClient`]
//! capability, so everything above it (and every test) is
//! orchestrator-agnostic. [`KubernetesOrchestrator`] is the production
//! backend.

mod client;
mod error;
pub mod kubernetes;
mod upstream;

pub use client::{ExecOutput, OrchestratorClient, WorkloadSpec};
pub use error::RuntimeError;
pub use kubernetes::KubernetesOrchestrator;
pub use upstream::UpstreamRuntime;
