// Data models for the developer workflows: intercept and scaffold flags,
// the Kubernetes service view shown in the intercept wizard, and the raw
// `kubectl get services -o json` / `telepresence status` shapes.
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_INTERCEPT_PORT: u16 = 8080;
pub const DEFAULT_NAMESPACE: &str = "default";

/// Flags accepted by `dev intercept`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptFlags {
    /// Local port traffic is forwarded to.
    pub port: u32,
    pub namespace: String,
    pub mount: Option<String>,
    pub env_file: Option<String>,
    pub global: bool,
    /// `key=value` HTTP header filters.
    pub header: Vec<String>,
    pub replace: bool,
    /// Remote service port (number or name). Defaults to the local port.
    pub remote_port: Option<String>,
}

impl Default for InterceptFlags {
    fn default() -> Self {
        Self {
            port: DEFAULT_INTERCEPT_PORT as u32,
            namespace: DEFAULT_NAMESPACE.to_string(),
            mount: None,
            env_file: None,
            global: false,
            header: Vec::new(),
            replace: false,
            remote_port: None,
        }
    }
}

impl InterceptFlags {
    /// Checks the flags for `service`, normalizing an empty namespace to
    /// `default`.
    pub fn validate(&mut self, service: &str) -> Result<(), String> {
        if service.trim().is_empty() {
            return Err("service name cannot be empty".to_string());
        }
        if self.port == 0 || self.port > u16::MAX as u32 {
            return Err(format!(
                "invalid port: {} (must be between 1-65535)",
                self.port
            ));
        }
        if self.namespace.trim().is_empty() {
            self.namespace = DEFAULT_NAMESPACE.to_string();
        }
        if let Some(env_file) = self.env_file.as_deref().filter(|f| !f.is_empty()) {
            if !Path::new(env_file).exists() {
                return Err(format!("environment file not found: {}", env_file));
            }
        }
        if let Some(header) = self.header.iter().find(|h| !h.contains('=')) {
            return Err(format!(
                "invalid header format: {} (expected key=value)",
                header
            ));
        }
        Ok(())
    }

    /// `<local>:<remote>` as telepresence expects it.
    pub fn port_mapping(&self) -> String {
        let remote = self
            .remote_port
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.port.to_string());
        format!("{}:{}", self.port, remote)
    }
}

/// Flags accepted by `dev scaffold`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScaffoldFlags {
    pub port: Option<u16>,
    pub namespace: Option<String>,
    pub image: Option<String>,
    pub sync_local: Option<String>,
    pub sync_remote: Option<String>,
    pub skip_bootstrap: bool,
    /// Values file used when charts are reinstalled before the session.
    pub helm_values: Option<String>,
}

/// A Kubernetes service as the intercept wizard presents it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub namespace: String,
    pub service_type: String,
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePort {
    /// Port name, or the port number when the port is unnamed.
    pub name: String,
    pub port: u16,
    pub target_port: String,
    pub protocol: String,
}

impl ServicePort {
    /// `8080 (http)`, or just `8080` when the name is the number itself.
    pub fn label(&self) -> String {
        if self.name.is_empty() || self.name == self.port.to_string() {
            self.port.to_string()
        } else {
            format!("{} ({})", self.port, self.name)
        }
    }
}

/// `kubectl get services -o json`.
#[derive(Debug, Deserialize)]
pub struct KubeServiceList {
    #[serde(default)]
    pub items: Vec<KubeService>,
}

#[derive(Debug, Deserialize)]
pub struct KubeService {
    pub metadata: KubeMetadata,
    #[serde(default)]
    pub spec: KubeServiceSpec,
}

#[derive(Debug, Deserialize)]
pub struct KubeMetadata {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct KubeServiceSpec {
    #[serde(default, rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub ports: Vec<KubeServicePort>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeServicePort {
    #[serde(default)]
    pub name: String,
    pub port: u16,
    /// Either a number or a named container port.
    #[serde(default)]
    pub target_port: Option<serde_json::Value>,
    #[serde(default)]
    pub protocol: String,
}

impl From<KubeService> for ServiceInfo {
    fn from(service: KubeService) -> Self {
        let ports = service
            .spec
            .ports
            .into_iter()
            .map(|p| ServicePort {
                name: if p.name.is_empty() {
                    p.port.to_string()
                } else {
                    p.name
                },
                port: p.port,
                target_port: match p.target_port {
                    Some(serde_json::Value::String(s)) => s,
                    Some(serde_json::Value::Number(n)) => n.to_string(),
                    _ => p.port.to_string(),
                },
                protocol: if p.protocol.is_empty() {
                    "TCP".to_string()
                } else {
                    p.protocol
                },
            })
            .collect();
        ServiceInfo {
            name: service.metadata.name,
            namespace: service.metadata.namespace,
            service_type: service.spec.service_type,
            ports,
        }
    }
}

/// The part of `telepresence status --output json` we read.
#[derive(Debug, Default, Deserialize)]
pub struct TelepresenceStatus {
    #[serde(default)]
    pub user_daemon: Option<TelepresenceDaemon>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TelepresenceDaemon {
    #[serde(default)]
    pub namespace: Option<String>,
}

/// A discovered `skaffold.yaml` and the service it builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkaffoldService {
    pub service_name: String,
    pub file_path: PathBuf,
}

impl SkaffoldService {
    /// Directory skaffold has to run in.
    pub fn directory(&self) -> PathBuf {
        self.file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Parses a user supplied port, with the message the wizard shows.
pub fn parse_port(input: &str) -> Result<u16, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("port cannot be empty".to_string());
    }
    let port: u32 = input
        .parse()
        .map_err(|_| "port must be a number".to_string())?;
    if !(1..=65535).contains(&port) {
        return Err("port must be between 1 and 65535".to_string());
    }
    Ok(port as u16)
}
