//! Proxy configuration.
//!
//! Loaded from a YAML file with two halves: the serving surface (`server`,
//! `log`, `runtime`) and the upstream fleet (`mcp-servers`). Upstream names
//! double as routing keys inside public tool names, so they are validated
//! against the `[a-z0-9-]+` grammar at load time.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Main proxy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(rename = "mcp-servers", default)]
    pub mcp_servers: Vec<UpstreamSpec>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Orchestrator runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes: Option<KubernetesConfig>,
}

/// Kubernetes-specific runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Explicit kubeconfig path; falls back to the ambient environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// One upstream MCP server: a stdio JSON-RPC program packaged in a container
/// image. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSpec {
    pub name: String,
    pub image: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

impl UpstreamSpec {
    /// Environment map with `${VAR}` references expanded against the host
    /// environment.
    pub fn expanded_env(&self) -> HashMap<String, String> {
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), expand_env(v)))
            .collect()
    }
}

impl Config {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid YAML, or an
    /// upstream name violates the naming grammar.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    /// Returns an error on malformed YAML or an invalid upstream name.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate upstream names: the public tool-name decoder splits on the
    /// first underscore after the `ms_` prefix, so names are restricted to
    /// lowercase alphanumerics and hyphens.
    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = Vec::with_capacity(self.mcp_servers.len());
        for spec in &self.mcp_servers {
            if !valid_server_name(&spec.name) {
                return Err(ConfigError::InvalidServerName {
                    name: spec.name.clone(),
                });
            }
            if seen.contains(&spec.name.as_str()) {
                return Err(ConfigError::DuplicateServerName {
                    name: spec.name.clone(),
                });
            }
            seen.push(&spec.name);
        }
        Ok(())
    }

    /// Target namespace for orchestrator workloads.
    pub fn kubernetes_namespace(&self) -> &str {
        self.runtime
            .kubernetes
            .as_ref()
            .map_or("default", |k| k.namespace.as_str())
    }

    /// Whether a Kubernetes runtime section is present.
    pub fn has_kubernetes_runtime(&self) -> bool {
        self.runtime.kubernetes.is_some()
    }

    /// Explicit kubeconfig path, if configured.
    pub fn kubeconfig(&self) -> Option<&str> {
        self.runtime
            .kubernetes
            .as_ref()
            .and_then(|k| k.kubeconfig.as_deref())
    }

    /// Bind address for the HTTP server.
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Configured log level.
    pub fn log_level(&self) -> &str {
        &self.log.level
    }
}

fn valid_server_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Expand `$VAR` and `${VAR}` references against the host environment.
/// Undefined variables expand to the empty string.
pub fn expand_env(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if closed {
                    out.push_str(&std::env::var(&name).unwrap_or_default());
                } else {
                    // Unterminated reference, keep the literal text.
                    out.push_str("${");
                    out.push_str(&name);
                }
            }
            Some(c) if c.is_ascii_alphanumeric() || *c == '_' => {
                let mut name = String::new();
                while let Some(c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || *c == '_' {
                        name.push(*c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(&std::env::var(&name).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
server:
  host: 127.0.0.1
  port: 9090
log:
  level: debug
runtime:
  kubernetes:
    namespace: mcp
mcp-servers:
  - name: alpha
    image: a:1
    command: run-a
  - name: beta
    image: b:1
    command: run-b
    args: ["--stdio"]
    env:
      TOKEN: "${MCP_TEST_TOKEN}"
"#;

    #[test]
    fn parse_sample_config() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.server_address(), "127.0.0.1:9090");
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.kubernetes_namespace(), "mcp");
        assert!(config.has_kubernetes_runtime());
        assert_eq!(config.mcp_servers.len(), 2);
        assert_eq!(config.mcp_servers[1].args, vec!["--stdio"]);
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_yaml("mcp-servers: []").unwrap();
        assert_eq!(config.server_address(), "0.0.0.0:8080");
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.kubernetes_namespace(), "default");
        assert!(!config.has_kubernetes_runtime());
    }

    #[test]
    fn underscore_in_server_name_rejected() {
        let yaml = r#"
mcp-servers:
  - name: bad_name
    image: a:1
    command: run
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidServerName { name } if name == "bad_name"));
    }

    #[test]
    fn uppercase_server_name_rejected() {
        let yaml = r#"
mcp-servers:
  - name: Alpha
    image: a:1
    command: run
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::InvalidServerName { .. })
        ));
    }

    #[test]
    fn duplicate_server_name_rejected() {
        let yaml = r#"
mcp-servers:
  - name: alpha
    image: a:1
    command: run
  - name: alpha
    image: a:2
    command: run
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::DuplicateServerName { .. })
        ));
    }

    #[test]
    fn expand_env_braced_and_bare() {
        std::env::set_var("MCPSHIELD_CONFIG_TEST", "secret");
        assert_eq!(expand_env("${MCPSHIELD_CONFIG_TEST}"), "secret");
        assert_eq!(expand_env("x-$MCPSHIELD_CONFIG_TEST-y"), "x-secret-y");
        assert_eq!(expand_env("no refs"), "no refs");
        assert_eq!(expand_env("${MCPSHIELD_UNSET_VAR}"), "");
        std::env::remove_var("MCPSHIELD_CONFIG_TEST");
    }

    #[test]
    fn expanded_env_on_spec() {
        std::env::set_var("MCPSHIELD_SPEC_TEST", "tok");
        let spec = UpstreamSpec {
            name: "alpha".into(),
            image: "a:1".into(),
            command: "run".into(),
            args: vec![],
            env: HashMap::from([("TOKEN".to_string(), "${MCPSHIELD_SPEC_TEST}".to_string())]),
        };
        assert_eq!(spec.expanded_env().get("TOKEN").unwrap(), "tok");
        std::env::remove_var("MCPSHIELD_SPEC_TEST");
    }
}
