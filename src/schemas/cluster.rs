// Data models for the cluster subsystem: user intent (`ClusterConfig`),
// observed state (`ClusterInfo`) and the raw JSON shapes `k3d` prints.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::cli::type_enums::ClusterType;

pub const DEFAULT_CLUSTER_NAME: &str = "openframe-dev";
pub const DEFAULT_NODE_COUNT: u32 = 3;
pub const MAX_CLUSTER_NAME_LEN: usize = 63;

/// What the user asked for. Input to `create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub name: String,
    pub cluster_type: ClusterType,
    pub node_count: u32,
    /// k3s image tag, e.g. `v1.31.5-k3s1`. Empty means the default image.
    pub k8s_version: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_CLUSTER_NAME.to_string(),
            cluster_type: ClusterType::K3d,
            node_count: DEFAULT_NODE_COUNT,
            k8s_version: String::new(),
        }
    }
}

/// What the cluster tool reports. Rebuilt on every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub name: String,
    pub cluster_type: ClusterType,
    /// `"<running>/<total>"` server nodes.
    pub status: String,
    pub node_count: u32,
    pub k8s_version: String,
    pub created_at: Option<DateTime<Utc>>,
    pub nodes: Vec<NodeInfo>,
}

impl ClusterInfo {
    /// True when the status reads `n/n` with n > 0.
    pub fn is_ready(&self) -> bool {
        match self.status.split_once('/') {
            Some((running, total)) => running == total && running != "0",
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub status: String,
    pub role: String,
}

/// Validates a cluster name after trimming surrounding whitespace.
///
/// Rules: non-empty, at most 63 characters, letters, digits and hyphens only,
/// starting and ending with a letter or digit.
pub fn validate_cluster_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("cluster name cannot be empty or contain only whitespace".to_string());
    }
    let length = trimmed.chars().count();
    if length > MAX_CLUSTER_NAME_LEN {
        return Err(format!(
            "cluster name is too long: {} characters (max {})",
            length, MAX_CLUSTER_NAME_LEN
        ));
    }

    let alnum = |c: char| c.is_ascii_alphanumeric();
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() == 1 {
        if !alnum(chars[0]) {
            return Err(format!(
                "cluster name '{}' is invalid: must be an alphanumeric character",
                trimmed
            ));
        }
        return Ok(());
    }

    let first_last_ok = alnum(chars[0]) && alnum(chars[chars.len() - 1]);
    let body_ok = chars.iter().all(|&c| alnum(c) || c == '-');
    if !first_last_ok || !body_ok {
        return Err(format!(
            "cluster name '{}' is invalid: must contain only letters, numbers, and hyphens, and must start and end with an alphanumeric character",
            trimmed
        ));
    }
    Ok(())
}

/// One entry of `k3d cluster list --output json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct K3dCluster {
    pub name: String,
    #[serde(default)]
    pub servers_count: u32,
    #[serde(default)]
    pub servers_running: u32,
    #[serde(default)]
    pub agents_count: u32,
    #[serde(default)]
    pub agents_running: u32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub nodes: Vec<K3dNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct K3dNode {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, rename = "State")]
    pub state: Option<K3dNodeState>,
    #[serde(default)]
    pub runtime_labels: HashMap<String, String>,
    #[serde(default)]
    pub port_mappings: HashMap<String, Vec<K3dPortMapping>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct K3dNodeState {
    #[serde(default, rename = "Running")]
    pub running: bool,
    #[serde(default, rename = "Status")]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct K3dPortMapping {
    #[serde(default, rename = "HostIp")]
    pub host_ip: String,
    #[serde(default, rename = "HostPort")]
    pub host_port: String,
}

impl K3dCluster {
    /// Earliest server node creation time.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.nodes
            .iter()
            .filter(|n| n.role == "server")
            .filter_map(|n| n.created)
            .min()
    }

    pub fn into_info(self) -> ClusterInfo {
        let created_at = self.created_at();
        let nodes = self
            .nodes
            .iter()
            .map(|n| NodeInfo {
                name: n.name.clone(),
                status: match &n.state {
                    Some(state) if state.running => "running".to_string(),
                    Some(state) if !state.status.is_empty() => state.status.clone(),
                    _ => "unknown".to_string(),
                },
                role: n.role.clone(),
            })
            .collect();
        ClusterInfo {
            status: format!("{}/{}", self.servers_running, self.servers_count),
            node_count: self.servers_count + self.agents_count,
            k8s_version: self.image.unwrap_or_default(),
            name: self.name,
            cluster_type: ClusterType::K3d,
            created_at,
            nodes,
        }
    }

    /// Host ports this cluster publishes (API port label and node port mappings).
    pub fn used_host_ports(&self) -> Vec<u16> {
        let mut ports = Vec::new();
        for node in self
            .nodes
            .iter()
            .filter(|n| n.role == "server" || n.role == "loadbalancer")
        {
            if let Some(port) = node
                .runtime_labels
                .get("k3d.server.api.port")
                .and_then(|p| p.parse().ok())
            {
                ports.push(port);
            }
            for mapping in node.port_mappings.values().flatten() {
                if let Ok(port) = mapping.host_port.parse() {
                    ports.push(port);
                }
            }
        }
        ports
    }
}
