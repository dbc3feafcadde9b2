//! Kubernetes orchestrator backend.
//!
//! One upstream maps to one single-replica `Deployment` labelled
//! `app=mcp-bridge`; the exec bridge goes through the pod `exec`
//! subresource. The container keeps stdin and a tty open so the stdio MCP
//! entrypoint stays attached between requests.

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{AttachParams, DeleteParams, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::time::{interval, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{ExecOutput, OrchestratorClient, WorkloadSpec};
use crate::error::RuntimeError;

const WORKLOAD_POLL_INTERVAL: Duration = Duration::from_secs(2);
const WORKLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const INSTANCE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const INSTANCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Race an API call against the cancellation token.
async fn with_cancel<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = Result<T, RuntimeError>>,
) -> Result<T, RuntimeError> {
    tokio::select! {
        () = cancel.cancelled() => Err(RuntimeError::Cancelled),
        res = fut => res,
    }
}

/// [`OrchestratorClient`] backed by a Kubernetes namespace.
#[derive(Clone)]
pub struct KubernetesOrchestrator {
    client: Client,
    namespace: String,
}

fn deployment_manifest(namespace: &str, spec: &WorkloadSpec) -> Result<Deployment, RuntimeError> {
    let env: Vec<Value> = spec
        .env
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();

    serde_json::from_value(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": spec.name,
            "namespace": namespace,
            "labels": {
                "app": "mcp-bridge",
                "runtime": "kubernetes",
            },
        },
        "spec": {
            "replicas": 1,
            "selector": {
                "matchLabels": {
                    "app": "mcp-bridge",
                    "deployment": spec.name,
                },
            },
            "template": {
                "metadata": {
                    "labels": {
                        "app": "mcp-bridge",
                        "deployment": spec.name,
                    },
                },
                "spec": {
                    "restartPolicy": "Always",
                    "containers": [{
                        "name": "mcp-server",
                        "image": spec.image,
                        "command": [spec.command],
                        "args": spec.args,
                        "env": env,
                        "stdin": true,
                        "tty": true,
                    }],
                },
            },
        },
    }))
    .map_err(|e| RuntimeError::CreateFailed(spec.name.clone(), e.to_string()))
}

impl KubernetesOrchestrator {
    /// Wrap an existing client.
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// Build a client from the ambient environment (in-cluster config or
    /// `~/.kube/config`).
    ///
    /// # Errors
    /// Returns an error if no usable client configuration is found.
    pub async fn try_default(namespace: impl Into<String>) -> Result<Self, RuntimeError> {
        let client = Client::try_default().await.map_err(|e| {
            RuntimeError::Orchestrator(format!("failed to create Kubernetes client: {e}"))
        })?;
        Ok(Self::new(client, namespace))
    }

    /// Build a client from an explicit kubeconfig path.
    ///
    /// # Errors
    /// Returns an error if the kubeconfig cannot be read or produces no
    /// usable client.
    pub async fn from_kubeconfig(
        path: &str,
        namespace: impl Into<String>,
    ) -> Result<Self, RuntimeError> {
        let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
            RuntimeError::Orchestrator(format!("failed to read kubeconfig {path}: {e}"))
        })?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| RuntimeError::Orchestrator(format!("failed to build config: {e}")))?;
        let client = Client::try_from(config).map_err(|e| {
            RuntimeError::Orchestrator(format!("failed to create Kubernetes client: {e}"))
        })?;
        Ok(Self::new(client, namespace))
    }

    fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    async fn exec_inner(
        &self,
        instance: &str,
        command: &[String],
    ) -> Result<ExecOutput, RuntimeError> {
        let stream_err = |message: String, stderr: String| RuntimeError::ExecFailed {
            message,
            stderr,
        };

        let mut attached = self
            .pods()
            .exec(instance, command.to_vec(), &AttachParams::default())
            .await
            .map_err(|e| stream_err(e.to_string(), String::new()))?;

        let mut stdout_reader = attached
            .stdout()
            .ok_or_else(|| stream_err("exec stream has no stdout".to_string(), String::new()))?;
        let mut stderr_reader = attached
            .stderr()
            .ok_or_else(|| stream_err("exec stream has no stderr".to_string(), String::new()))?;
        let status = attached.take_status();

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let (out_res, err_res) = tokio::join!(
            async { stdout_reader.read_to_end(&mut stdout).await },
            async { stderr_reader.read_to_end(&mut stderr).await },
        );
        let stderr_text = String::from_utf8_lossy(&stderr).into_owned();
        out_res.map_err(|e| stream_err(e.to_string(), stderr_text.clone()))?;
        err_res.map_err(|e| stream_err(e.to_string(), stderr_text.clone()))?;

        if let Some(status) = status {
            if let Some(status) = status.await {
                if status.status.as_deref() == Some("Failure") {
                    return Err(stream_err(
                        status.message.unwrap_or_else(|| "command failed".to_string()),
                        stderr_text,
                    ));
                }
            }
        }
        attached
            .join()
            .await
            .map_err(|e| stream_err(e.to_string(), stderr_text.clone()))?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: stderr_text,
        })
    }
}

#[async_trait]
impl OrchestratorClient for KubernetesOrchestrator {
    async fn create_workload(
        &self,
        spec: &WorkloadSpec,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        debug!(workload = %spec.name, image = %spec.image, "creating deployment");
        let manifest = deployment_manifest(&self.namespace, spec)?;
        with_cancel(cancel, async {
            self.deployments()
                .create(&PostParams::default(), &manifest)
                .await
                .map_err(|e| RuntimeError::CreateFailed(spec.name.clone(), e.to_string()))
        })
        .await?;
        Ok(())
    }

    async fn workload_exists(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, RuntimeError> {
        let existing = with_cancel(cancel, async {
            self.deployments()
                .get_opt(name)
                .await
                .map_err(|e| RuntimeError::Orchestrator(e.to_string()))
        })
        .await?;
        Ok(existing.is_some())
    }

    async fn wait_ready(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        let deadline = Instant::now() + WORKLOAD_TIMEOUT;
        let mut ticker = interval(WORKLOAD_POLL_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => return Err(RuntimeError::Cancelled),
                _ = ticker.tick() => {
                    if self.is_ready(name).await {
                        return Ok(());
                    }
                    if Instant::now() >= deadline {
                        return Err(RuntimeError::ReadyTimeout(name.to_string()));
                    }
                }
            }
        }
    }

    async fn is_ready(&self, name: &str) -> bool {
        let Ok(Some(deployment)) = self.deployments().get_opt(name).await else {
            return false;
        };
        let want = deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1);
        let ready = deployment
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);
        ready >= want
    }

    async fn delete_workload(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        debug!(workload = %name, "deleting deployment");
        with_cancel(cancel, async {
            self.deployments()
                .delete(name, &DeleteParams::foreground())
                .await
                .map(|_| ())
                .map_err(|e| RuntimeError::DeleteFailed(name.to_string(), e.to_string()))
        })
        .await
    }

    async fn wait_gone(&self, name: &str, cancel: &CancellationToken) -> Result<(), RuntimeError> {
        let deadline = Instant::now() + WORKLOAD_TIMEOUT;
        let mut ticker = interval(WORKLOAD_POLL_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => return Err(RuntimeError::Cancelled),
                _ = ticker.tick() => {
                    match self.deployments().get_opt(name).await {
                        Ok(None) => return Ok(()),
                        Ok(Some(_)) | Err(_) => {}
                    }
                    if Instant::now() >= deadline {
                        return Err(RuntimeError::DeleteTimeout(name.to_string()));
                    }
                }
            }
        }
    }

    async fn resolve_instance(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<String, RuntimeError> {
        let selector = format!("app=mcp-bridge,deployment={name}");
        let pods = with_cancel(cancel, async {
            self.pods()
                .list(&ListParams::default().labels(&selector))
                .await
                .map_err(|e| RuntimeError::Orchestrator(e.to_string()))
        })
        .await?;

        if pods.items.is_empty() {
            return Err(RuntimeError::NoInstances(name.to_string()));
        }

        let pod = pods
            .items
            .iter()
            .find(|p| {
                p.status
                    .as_ref()
                    .and_then(|s| s.phase.as_deref())
                    .is_some_and(|phase| phase == "Running")
            })
            .unwrap_or(&pods.items[0]);

        pod.metadata
            .name
            .clone()
            .ok_or_else(|| RuntimeError::NoInstances(name.to_string()))
    }

    async fn wait_instance_ready(
        &self,
        instance: &str,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        let deadline = Instant::now() + INSTANCE_TIMEOUT;
        let mut ticker = interval(INSTANCE_POLL_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => return Err(RuntimeError::Cancelled),
                _ = ticker.tick() => {
                    if let Ok(Some(pod)) = self.pods().get_opt(instance).await {
                        let status = pod.status.as_ref();
                        match status.and_then(|s| s.phase.as_deref()) {
                            Some("Running") => {
                                let container_ready = status
                                    .and_then(|s| s.container_statuses.as_ref())
                                    .is_some_and(|cs| cs.iter().any(|c| c.ready));
                                if container_ready {
                                    return Ok(());
                                }
                            }
                            Some("Failed") => {
                                let message = status
                                    .and_then(|s| s.message.clone())
                                    .unwrap_or_default();
                                return Err(RuntimeError::InstanceFailed(
                                    instance.to_string(),
                                    message,
                                ));
                            }
                            _ => {}
                        }
                    }
                    if Instant::now() >= deadline {
                        return Err(RuntimeError::InstanceTimeout(instance.to_string()));
                    }
                }
            }
        }
    }

    async fn exec(
        &self,
        instance: &str,
        command: &[String],
        cancel: &CancellationToken,
    ) -> Result<ExecOutput, RuntimeError> {
        with_cancel(cancel, self.exec_inner(instance, command)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn spec() -> WorkloadSpec {
        WorkloadSpec {
            name: "mcp-a-1".to_string(),
            image: "a:1".to_string(),
            command: "run-a".to_string(),
            args: vec!["--stdio".to_string()],
            env: HashMap::from([("TOKEN".to_string(), "tok".to_string())]),
        }
    }

    #[test]
    fn manifest_shape() {
        let manifest = deployment_manifest("mcp", &spec()).unwrap();
        let value = serde_json::to_value(&manifest).unwrap();

        assert_eq!(value["metadata"]["labels"]["app"], "mcp-bridge");
        assert_eq!(value["spec"]["replicas"], 1);
        assert_eq!(
            value["spec"]["selector"]["matchLabels"]["deployment"],
            "mcp-a-1"
        );
        let container = &value["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["stdin"], true);
        assert_eq!(container["tty"], true);
        assert_eq!(container["command"][0], "run-a");
        assert_eq!(container["args"][0], "--stdio");
        assert_eq!(container["env"][0]["name"], "TOKEN");
        assert_eq!(container["env"][0]["value"], "tok");
        assert_eq!(value["spec"]["template"]["spec"]["restartPolicy"], "Always");
    }
}
