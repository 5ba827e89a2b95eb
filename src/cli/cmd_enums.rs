use crate::cli::type_enums::ClusterType;
use crate::schemas::chart::{DEFAULT_GITHUB_BRANCH, DEFAULT_GITHUB_REPO};
use crate::schemas::dev::DEFAULT_NAMESPACE;
use clap::{Args, Parser, Subcommand};

/// Defines the command-line interface (CLI) for 'openframe'.
/// `#[derive(Parser)]` automatically generates argument parsing code via `clap`.
#[derive(Parser)]
#[command(name = "openframe", version)]
#[command(about = "Local OpenFrame environments: k3d clusters, ArgoCD charts and dev workflows")]
pub struct Cli {
    /// Enable verbose output, including debug logs and command lines.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except warnings and errors.
    #[arg(long, global = true)]
    pub silent: bool,

    /// Directory for the log file (defaults to ~/.openframe/logs).
    #[arg(long, global = true, env = "OPENFRAME_LOG_DIR")]
    pub log_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Enumerates all top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Bootstrap complete OpenFrame environment.
    /// Creates a k3d cluster and installs ArgoCD with the app-of-apps chart on it.
    Bootstrap {
        /// Cluster name (defaults to openframe-dev).
        cluster_name: Option<String>,
        /// Deployment mode: oss-tenant, saas-tenant, saas-shared (skips deployment selection).
        #[arg(long)]
        deployment_mode: Option<String>,
        /// Skip all prompts, use existing helm-values.yaml.
        #[arg(long)]
        non_interactive: bool,
    },
    /// Manage Kubernetes clusters.
    #[command(alias = "k")]
    Cluster {
        #[command(subcommand)]
        action: ClusterCommands,
    },
    /// Manage Helm charts and ArgoCD applications.
    Chart {
        #[command(subcommand)]
        action: ChartCommands,
    },
    /// Development tools for local workflows.
    Dev {
        #[command(subcommand)]
        action: DevCommands,
    },
}

#[derive(Subcommand)]
pub enum ClusterCommands {
    /// Create a new Kubernetes cluster.
    Create {
        /// Cluster name. Prompted for by the wizard when omitted.
        name: Option<String>,
        /// Cluster type (k3d, gke).
        #[arg(short = 't', long = "type")]
        cluster_type: Option<ClusterType>,
        /// Number of worker nodes (default 3).
        #[arg(short = 'n', long, allow_negative_numbers = true)]
        nodes: Option<i64>,
        /// Kubernetes version (k3s image tag).
        #[arg(long = "version")]
        k8s_version: Option<String>,
        /// Skip interactive wizard.
        #[arg(long)]
        skip_wizard: bool,
    },
    /// List all Kubernetes clusters.
    List {
        /// Only show cluster names.
        #[arg(short, long)]
        quiet: bool,
    },
    /// Show detailed cluster status and information.
    Status {
        name: Option<String>,
        /// Show detailed resource information.
        #[arg(short, long)]
        detailed: bool,
        /// Skip application status checking.
        #[arg(long)]
        no_apps: bool,
    },
    /// Delete a Kubernetes cluster.
    Delete {
        name: Option<String>,
        /// Skip confirmation prompt.
        #[arg(short, long)]
        force: bool,
    },
    /// Clean up unused cluster resources.
    #[command(alias = "c")]
    Cleanup {
        name: Option<String>,
        /// Enable aggressive cleanup (remove all images, volumes, networks).
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum ChartCommands {
    /// Install ArgoCD and app-of-apps.
    Install(ChartInstallArgs),
}

/// Flags of `chart install`. Kept as a struct so the defaults can be checked
/// against [`crate::schemas::chart::InstallFlags`].
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ChartInstallArgs {
    /// Target cluster. Selected interactively when omitted.
    pub cluster_name: Option<String>,
    /// Force installation even if charts already exist.
    #[arg(short, long)]
    pub force: bool,
    /// Show what would be installed without executing.
    #[arg(long)]
    pub dry_run: bool,
    /// GitHub repository URL.
    #[arg(long, default_value = DEFAULT_GITHUB_REPO)]
    pub github_repo: String,
    /// GitHub repository branch.
    #[arg(long, default_value = DEFAULT_GITHUB_BRANCH)]
    pub github_branch: String,
    /// Certificate directory (auto-detected if not provided).
    #[arg(long, default_value = "")]
    pub cert_dir: String,
    /// Deployment mode: oss-tenant, saas-tenant, saas-shared.
    #[arg(long)]
    pub deployment_mode: Option<String>,
    /// Skip all prompts, use existing helm-values.yaml.
    #[arg(long)]
    pub non_interactive: bool,
}

#[derive(Subcommand)]
pub enum DevCommands {
    /// Intercept cluster traffic to local development environment.
    Intercept(InterceptArgs),
    /// Deploy development versions of services with live reloading.
    #[command(alias = "skaffold")]
    Scaffold(ScaffoldArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InterceptArgs {
    /// Service to intercept. Chosen interactively when omitted.
    pub service_name: Option<String>,
    /// Local port to forward traffic to.
    #[arg(long, default_value_t = 8080)]
    pub port: u32,
    /// Kubernetes namespace of the service.
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,
    /// Mount remote volumes to local path.
    #[arg(long)]
    pub mount: Option<String>,
    /// Load environment variables from file.
    #[arg(long)]
    pub env_file: Option<String>,
    /// Intercept all traffic (not just from specific headers).
    #[arg(long)]
    pub global: bool,
    /// Only intercept traffic with these headers (format: key=value).
    #[arg(long, value_delimiter = ',')]
    pub header: Vec<String>,
    /// Replace existing intercept if it exists.
    #[arg(long)]
    pub replace: bool,
    /// Remote port name for intercept (defaults to port number).
    #[arg(long)]
    pub remote_port: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ScaffoldArgs {
    /// Target cluster. Selected interactively when omitted.
    pub cluster_name: Option<String>,
    /// Local development port.
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    /// Kubernetes namespace to deploy to.
    #[arg(long)]
    pub namespace: Option<String>,
    /// Docker image to use for the service.
    #[arg(long)]
    pub image: Option<String>,
    /// Local directory to sync to the container.
    #[arg(long)]
    pub sync_local: Option<String>,
    /// Remote directory to sync files to.
    #[arg(long)]
    pub sync_remote: Option<String>,
    /// Skip bootstrapping cluster.
    #[arg(long)]
    pub skip_bootstrap: bool,
    /// Custom Helm values file for bootstrap.
    #[arg(long)]
    pub helm_values: Option<String>,
}
