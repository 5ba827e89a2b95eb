//! # k3d Cluster Manager
//!
//! Drives the `k3d` binary for the cluster lifecycle: create, delete, list,
//! status, type detection and kubeconfig export. Everything goes through the
//! [`CommandExecutor`], so the manager is fully testable with a mock.
//!
//! ## Create
//!
//! A temporary `k3d.io/v1alpha5` `Simple` config is rendered with `serde_yaml`
//! (servers, agents, image, API endpoint, k3s arguments, load balancer ports),
//! handed to `k3d cluster create --config`, and removed when the guard drops.
//! The kubectl context is switched to `k3d-<name>` afterwards.
//!
//! ## Parsing
//!
//! `k3d cluster list --output json` is parsed as a whole: a parse failure
//! returns an error and never a partial list.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use serde::Serialize;

use crate::cli::type_enums::ClusterType;
use crate::libs::executor::{CommandExecutor, ExecError, ExecutorExt};
use crate::libs::utilities::ports::{self, ClusterPorts};
use crate::log_debug;
use crate::schemas::cluster::{ClusterConfig, ClusterInfo, K3dCluster};

pub const DEFAULT_K3S_IMAGE: &str = "rancher/k3s:v1.31.5-k3s1";
pub const DEFAULT_CREATE_TIMEOUT: &str = "300s";

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("invalid {field}: {message}")]
    InvalidConfig { field: &'static str, message: String },

    #[error("no provider available for cluster type '{0}'")]
    ProviderNotFound(ClusterType),

    #[error("cluster {0} not found")]
    NotFound(String),

    #[error("failed to create config file: {0}")]
    ConfigFile(#[source] std::io::Error),

    #[error("failed to allocate available ports: {0}")]
    Ports(String),

    #[error("failed to parse cluster list JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{action}: {source}")]
    Command {
        action: String,
        #[source]
        source: ExecError,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl ClusterError {
    /// Wraps an executor failure, keeping cancellation undecorated.
    fn command(action: String, source: ExecError) -> Self {
        if source.is_cancelled() {
            ClusterError::Cancelled
        } else {
            ClusterError::Command { action, source }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClusterError::Cancelled)
    }
}

pub struct K3dManager {
    executor: Arc<dyn CommandExecutor>,
    verbose: bool,
    timeout: String,
    port_check: fn(u16) -> bool,
}

impl K3dManager {
    pub fn new(executor: Arc<dyn CommandExecutor>, verbose: bool) -> Self {
        Self {
            executor,
            verbose,
            timeout: DEFAULT_CREATE_TIMEOUT.to_string(),
            port_check: ports::is_port_bindable,
        }
    }

    pub fn with_timeout(mut self, timeout: &str) -> Self {
        self.timeout = timeout.to_string();
        self
    }

    /// Replaces the local bind check used during port selection.
    pub fn with_port_check(mut self, check: fn(u16) -> bool) -> Self {
        self.port_check = check;
        self
    }

    pub fn create_cluster(&self, config: &ClusterConfig) -> Result<(), ClusterError> {
        validate_config(config)?;
        if config.cluster_type != ClusterType::K3d {
            return Err(ClusterError::ProviderNotFound(config.cluster_type));
        }

        let ports = self.allocate_ports()?;
        let rendered = render_config(config, ports).map_err(|e| {
            ClusterError::ConfigFile(std::io::Error::other(e.to_string()))
        })?;
        log_debug!("[k3d] config for {}:\n{}", config.name, rendered);

        let mut config_file = tempfile::Builder::new()
            .prefix("k3d-config-")
            .suffix(".yaml")
            .tempfile()
            .map_err(ClusterError::ConfigFile)?;
        config_file
            .write_all(rendered.as_bytes())
            .map_err(ClusterError::ConfigFile)?;
        let config_path = config_file.path().to_string_lossy().into_owned();

        let mut args = vec![
            "cluster",
            "create",
            "--config",
            config_path.as_str(),
            "--timeout",
            self.timeout.as_str(),
        ];
        if self.verbose {
            args.push("--verbose");
        }
        self.executor
            .execute("k3d", &args)
            .map_err(|e| ClusterError::command(format!("failed to create cluster {}", config.name), e))?;

        let context = format!("k3d-{}", config.name);
        self.executor
            .execute("kubectl", &["config", "use-context", &context])
            .map_err(|e| {
                ClusterError::command(format!("failed to switch kubectl context to {}", context), e)
            })?;
        Ok(())
    }

    pub fn delete_cluster(&self, name: &str, cluster_type: ClusterType) -> Result<(), ClusterError> {
        require_name(name)?;
        if cluster_type != ClusterType::K3d {
            return Err(ClusterError::ProviderNotFound(cluster_type));
        }
        let mut args = vec!["cluster", "delete", name];
        if self.verbose {
            args.push("--verbose");
        }
        self.executor
            .execute("k3d", &args)
            .map_err(|e| ClusterError::command(format!("failed to delete cluster {}", name), e))?;
        Ok(())
    }

    /// Raw k3d view of every cluster. Empty output (dry-run) is an empty list.
    pub fn list_k3d_clusters(&self) -> Result<Vec<K3dCluster>, ClusterError> {
        let result = self
            .executor
            .execute("k3d", &["cluster", "list", "--output", "json"])
            .map_err(|e| ClusterError::command("failed to list clusters".to_string(), e))?;
        if result.stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&result.stdout)?)
    }

    pub fn list_clusters(&self) -> Result<Vec<ClusterInfo>, ClusterError> {
        Ok(self
            .list_k3d_clusters()?
            .into_iter()
            .map(K3dCluster::into_info)
            .collect())
    }

    pub fn get_cluster_status(&self, name: &str) -> Result<ClusterInfo, ClusterError> {
        require_name(name)?;
        self.list_clusters()?
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ClusterError::NotFound(name.to_string()))
    }

    pub fn detect_cluster_type(&self, name: &str) -> Result<ClusterType, ClusterError> {
        require_name(name)?;
        match self.executor.execute("k3d", &["cluster", "get", name]) {
            Ok(_) => Ok(ClusterType::K3d),
            Err(e) if e.is_cancelled() => Err(ClusterError::Cancelled),
            Err(_) => Err(ClusterError::NotFound(name.to_string())),
        }
    }

    pub fn get_kubeconfig(&self, name: &str, cluster_type: ClusterType) -> Result<String, ClusterError> {
        if cluster_type != ClusterType::K3d {
            return Err(ClusterError::ProviderNotFound(cluster_type));
        }
        let result = self
            .executor
            .execute("k3d", &["kubeconfig", "get", name])
            .map_err(|e| {
                ClusterError::command(format!("failed to get kubeconfig for cluster {}", name), e)
            })?;
        Ok(result.stdout)
    }

    /// Ports published by existing clusters. Listing failures mean "none known";
    /// the bind check still protects against collisions.
    fn used_ports(&self) -> HashSet<u16> {
        match self.list_k3d_clusters() {
            Ok(clusters) => clusters.iter().flat_map(K3dCluster::used_host_ports).collect(),
            Err(e) => {
                log_debug!("[k3d] could not read ports of existing clusters: {}", e);
                HashSet::new()
            }
        }
    }

    fn allocate_ports(&self) -> Result<ClusterPorts, ClusterError> {
        let used = self.used_ports();
        ports::find_available_ports(&used, self.port_check).map_err(ClusterError::Ports)
    }
}

fn require_name(name: &str) -> Result<(), ClusterError> {
    if name.is_empty() {
        return Err(ClusterError::InvalidConfig {
            field: "name",
            message: "cluster name cannot be empty".to_string(),
        });
    }
    Ok(())
}

fn validate_config(config: &ClusterConfig) -> Result<(), ClusterError> {
    require_name(&config.name)?;
    if config.node_count < 1 {
        return Err(ClusterError::InvalidConfig {
            field: "nodeCount",
            message: "node count must be at least 1".to_string(),
        });
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SimpleConfig {
    api_version: &'static str,
    kind: &'static str,
    metadata: Metadata,
    servers: u32,
    agents: u32,
    image: String,
    #[serde(rename = "kubeAPI")]
    kube_api: KubeApi,
    options: Options,
    ports: Vec<PortSpec>,
}

#[derive(Serialize)]
struct Metadata {
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KubeApi {
    host: String,
    #[serde(rename = "hostIP")]
    host_ip: String,
    host_port: String,
}

#[derive(Serialize)]
struct Options {
    k3s: K3sOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct K3sOptions {
    extra_args: Vec<ArgSpec>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArgSpec {
    arg: &'static str,
    node_filters: Vec<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PortSpec {
    port: String,
    node_filters: Vec<&'static str>,
}

/// Renders the k3d `Simple` config for `config` on the given host ports.
pub fn render_config(config: &ClusterConfig, ports: ClusterPorts) -> Result<String, serde_yaml::Error> {
    let image = if config.k8s_version.is_empty() {
        DEFAULT_K3S_IMAGE.to_string()
    } else {
        format!("rancher/k3s:{}", config.k8s_version)
    };

    let simple = SimpleConfig {
        api_version: "k3d.io/v1alpha5",
        kind: "Simple",
        metadata: Metadata {
            name: config.name.clone(),
        },
        servers: 1,
        agents: config.node_count.max(1),
        image,
        kube_api: KubeApi {
            host: "127.0.0.1".to_string(),
            host_ip: "127.0.0.1".to_string(),
            host_port: ports.api.to_string(),
        },
        options: Options {
            k3s: K3sOptions {
                extra_args: vec![
                    ArgSpec {
                        arg: "--disable=traefik",
                        node_filters: vec!["server:*"],
                    },
                    ArgSpec {
                        arg: "--kubelet-arg=eviction-hard=",
                        node_filters: vec!["all"],
                    },
                    ArgSpec {
                        arg: "--kubelet-arg=eviction-soft=",
                        node_filters: vec!["all"],
                    },
                ],
            },
        },
        ports: vec![
            PortSpec {
                port: format!("{}:80", ports.http),
                node_filters: vec!["loadbalancer"],
            },
            PortSpec {
                port: format!("{}:443", ports.https),
                node_filters: vec!["loadbalancer"],
            },
        ],
    };
    serde_yaml::to_string(&simple)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::executor::{CommandResult, MockCommandExecutor};

    fn ok(stdout: &str) -> Result<CommandResult, ExecError> {
        Ok(CommandResult {
            stdout: stdout.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn config_renders_cluster_shape() {
        let config = ClusterConfig {
            name: "dev".into(),
            node_count: 2,
            k8s_version: "v1.30.0-k3s1".into(),
            ..Default::default()
        };
        let yaml = render_config(&config, ClusterPorts { api: 6551, http: 81, https: 444 }).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(value["apiVersion"].as_str(), Some("k3d.io/v1alpha5"));
        assert_eq!(value["metadata"]["name"].as_str(), Some("dev"));
        assert_eq!(value["agents"].as_u64(), Some(2));
        assert_eq!(value["image"].as_str(), Some("rancher/k3s:v1.30.0-k3s1"));
        assert_eq!(value["kubeAPI"]["hostPort"].as_str(), Some("6551"));
        assert_eq!(value["ports"][0]["port"].as_str(), Some("81:80"));
        assert_eq!(
            value["options"]["k3s"]["extraArgs"][0]["nodeFilters"][0].as_str(),
            Some("server:*")
        );
    }

    #[test]
    fn create_runs_k3d_then_switches_context() {
        let mut executor = MockCommandExecutor::new();
        let mut seq = mockall::Sequence::new();
        executor
            .expect_execute_with_options()
            .withf(|o| o.command == "k3d" && o.args[1] == "list")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| ok("[]"));
        executor
            .expect_execute_with_options()
            .withf(|o| {
                o.command == "k3d"
                    && o.args[..3] == ["cluster", "create", "--config"]
                    && o.args[4..] == ["--timeout", "300s"]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| ok(""));
        executor
            .expect_execute_with_options()
            .withf(|o| o.command == "kubectl" && o.args == ["config", "use-context", "k3d-dev"])
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| ok(""));

        let manager = K3dManager::new(Arc::new(executor), false).with_port_check(|_| true);
        let config = ClusterConfig {
            name: "dev".into(),
            ..Default::default()
        };
        manager.create_cluster(&config).unwrap();
    }

    #[test]
    fn gke_has_no_provider() {
        let manager = K3dManager::new(Arc::new(MockCommandExecutor::new()), false);
        let config = ClusterConfig {
            cluster_type: ClusterType::Gke,
            ..Default::default()
        };
        let err = manager.create_cluster(&config).unwrap_err();
        assert!(matches!(err, ClusterError::ProviderNotFound(ClusterType::Gke)));
    }

    #[test]
    fn zero_nodes_is_rejected_before_any_command() {
        let manager = K3dManager::new(Arc::new(MockCommandExecutor::new()), false);
        let config = ClusterConfig {
            node_count: 0,
            ..Default::default()
        };
        let err = manager.create_cluster(&config).unwrap_err();
        assert_eq!(err.to_string(), "invalid nodeCount: node count must be at least 1");
    }

    #[test]
    fn malformed_list_is_an_error_not_a_partial_list() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute_with_options()
            .returning(|_| ok(r#"[{"name": "a"}, {"nam"#));
        let manager = K3dManager::new(Arc::new(executor), false);
        assert!(matches!(manager.list_clusters(), Err(ClusterError::Parse(_))));
    }

    #[test]
    fn status_of_unknown_cluster() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute_with_options()
            .returning(|_| ok(r#"[{"name": "other", "serversCount": 1, "serversRunning": 1}]"#));
        let manager = K3dManager::new(Arc::new(executor), false);
        let err = manager.get_cluster_status("dev").unwrap_err();
        assert_eq!(err.to_string(), "cluster dev not found");
    }

    #[test]
    fn detect_maps_failure_to_not_found() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().returning(|o| {
            Err(ExecError::Failed {
                command: o.command_line(),
                result: CommandResult {
                    exit_code: 1,
                    ..Default::default()
                },
            })
        });
        let manager = K3dManager::new(Arc::new(executor), false);
        assert!(matches!(
            manager.detect_cluster_type("ghost"),
            Err(ClusterError::NotFound(_))
        ));
    }
}
