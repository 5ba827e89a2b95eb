use std::fmt;
use std::str::FromStr;

/// The cluster backends openframe knows about.
/// Only `k3d` has a provider; `gke` is accepted so the error can say so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterType {
    #[default]
    K3d, // local k3s-in-docker clusters
    Gke, // Google Kubernetes Engine (no provider yet)
}

impl ClusterType {
    pub const ALL: [ClusterType; 2] = [ClusterType::K3d, ClusterType::Gke];
}

/// Implementation of string parsing for ClusterType.
/// Used by clap for `--type` and by the create wizard.
impl FromStr for ClusterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "k3d" => Ok(ClusterType::K3d),
            "gke" => Ok(ClusterType::Gke),
            _ => Err(format!("Invalid cluster type '{s}'. Must be one of: k3d, gke")),
        }
    }
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClusterType::K3d => write!(f, "k3d"),
            ClusterType::Gke => write!(f, "gke"),
        }
    }
}

/// Defines how OpenFrame is deployed onto the cluster.
/// Each variant selects a chart repository and a set of required values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    OssTenant,  // open source single tenant
    SaasTenant, // SaaS tenant, needs registry and config credentials
    SaasShared, // SaaS shared services, pulled from the private shared repository
}

impl DeploymentMode {
    pub const ALL: [DeploymentMode; 3] = [
        DeploymentMode::OssTenant,
        DeploymentMode::SaasTenant,
        DeploymentMode::SaasShared,
    ];

    pub fn is_saas(self) -> bool {
        self != DeploymentMode::OssTenant
    }

    /// One-line explanation shown next to the mode in the wizard.
    pub fn description(self) -> &'static str {
        match self {
            DeploymentMode::OssTenant => "OSS Tenant - open source deployment",
            DeploymentMode::SaasTenant => "SaaS Tenant - hosted tenant deployment",
            DeploymentMode::SaasShared => "SaaS Shared - shared SaaS services",
        }
    }
}

/// Implementation of string parsing for DeploymentMode.
/// Parsing is exact: the CLI and helm-values files use the dashed names.
impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oss-tenant" => Ok(DeploymentMode::OssTenant),
            "saas-tenant" => Ok(DeploymentMode::SaasTenant),
            "saas-shared" => Ok(DeploymentMode::SaasShared),
            _ => Err(format!(
                "invalid deployment mode: {s}. Valid options: oss-tenant, saas-tenant, saas-shared"
            )),
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeploymentMode::OssTenant => write!(f, "oss-tenant"),
            DeploymentMode::SaasTenant => write!(f, "saas-tenant"),
            DeploymentMode::SaasShared => write!(f, "saas-shared"),
        }
    }
}
