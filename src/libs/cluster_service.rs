//! # Cluster Service
//!
//! User-facing cluster operations on top of [`K3dManager`]: the "already
//! exists" guard on create, summaries and next-step hints, status and list
//! rendering, the deep cleanup of a running cluster and the shared
//! cluster-selection helper used by `chart` and `dev`.
//!
//! Output respects the [`RunMode`]: boxes and hints are drawn only when the
//! mode shows chrome, and prompts only happen in interactive mode.

use std::sync::Arc;

use chrono::Utc;
use colored::Colorize;

use crate::cli::type_enums::ClusterType;
use crate::libs::argocd::ArgoCd;
use crate::libs::display::{format_age, print_box, table};
use crate::libs::executor::{CommandExecutor, ExecutorExt};
use crate::libs::k3d_manager::{ClusterError, K3dManager};
use crate::libs::prerequisites::cluster::ensure_cluster_prerequisites;
use crate::libs::prompts::{self, PromptError};
use crate::libs::run_mode::RunMode;
use crate::schemas::cluster::{ClusterConfig, ClusterInfo, DEFAULT_CLUSTER_NAME};
use crate::{log_debug, log_error, log_info, log_warn};

pub const NO_CLUSTERS_MESSAGE: &str = "No clusters found. Create a cluster first with: openframe cluster create";

/// Namespaces removed by `cleanup`; `kube-system` only with `--force`.
const CLEANUP_NAMESPACES: &[&str] = &["argocd", "openframe"];
/// `docker <args>` run inside every node by `cleanup`.
const NODE_PRUNES: &[&[&str]] = &[
    &["image", "prune", "-f", "--all"],
    &["container", "prune", "-f"],
    &["volume", "prune", "-f"],
    &["network", "prune", "-f"],
    &["system", "prune", "-f"],
];
const FORCE_NODE_PRUNES: &[&[&str]] = &[&["builder", "prune", "-f", "--all"]];

pub struct ClusterService {
    manager: K3dManager,
    executor: Arc<dyn CommandExecutor>,
    mode: RunMode,
    verbose: bool,
}

impl ClusterService {
    pub fn new(executor: Arc<dyn CommandExecutor>, mode: RunMode, verbose: bool) -> Self {
        Self {
            manager: K3dManager::new(executor.clone(), verbose),
            executor,
            mode,
            verbose,
        }
    }

    pub fn with_manager(mut self, manager: K3dManager) -> Self {
        self.manager = manager;
        self
    }

    /// Creates the cluster unless one with the same name already exists, in
    /// which case a warning is shown and the call succeeds.
    pub fn create_cluster(&self, config: &ClusterConfig) -> Result<(), ClusterError> {
        if let Ok(existing) = self.manager.get_cluster_status(&config.name) {
            log_warn!("Cluster '{}' already exists!", config.name.cyan());
            print_box(
                self.mode,
                "Cluster Already Running",
                &summary_lines(&existing, "Running"),
            );
            if self.mode.shows_chrome() {
                log_info!("What would you like to do?");
                eprintln!("  - Check status: openframe cluster status {}", config.name);
                eprintln!("  - Delete first: openframe cluster delete {}", config.name);
                eprintln!("  - Use different name: openframe cluster create my-new-cluster");
            }
            return Ok(());
        }

        log_info!(
            "Creating {} cluster '{}'...",
            config.cluster_type,
            config.name
        );
        if let Err(e) = self.manager.create_cluster(config) {
            log_error!("Failed to create cluster '{}'", config.name);
            return Err(e);
        }
        log_info!("Cluster '{}' created successfully", config.name);

        if let Ok(info) = self.manager.get_cluster_status(&config.name) {
            print_box(self.mode, "Cluster Created", &summary_lines(&info, "Ready"));
        }
        self.show_next_steps(&config.name);
        Ok(())
    }

    pub fn delete_cluster(&self, name: &str, cluster_type: ClusterType) -> Result<(), ClusterError> {
        log_info!("Deleting {} cluster '{}'...", cluster_type, name);
        self.manager.delete_cluster(name, cluster_type)?;
        log_info!("Cluster '{}' deleted successfully", name);
        Ok(())
    }

    pub fn list_clusters(&self) -> Result<Vec<ClusterInfo>, ClusterError> {
        self.manager.list_clusters()
    }

    pub fn get_cluster_status(&self, name: &str) -> Result<ClusterInfo, ClusterError> {
        self.manager.get_cluster_status(name)
    }

    pub fn detect_cluster_type(&self, name: &str) -> Result<ClusterType, ClusterError> {
        self.manager.detect_cluster_type(name)
    }

    /// Removes workloads and reclaims disk space inside a running cluster.
    /// Every step is best effort; failures are logged as warnings.
    pub fn cleanup_cluster(
        &self,
        name: &str,
        cluster_type: ClusterType,
        force: bool,
    ) -> Result<(), ClusterError> {
        if cluster_type != ClusterType::K3d {
            return Err(ClusterError::ProviderNotFound(cluster_type));
        }
        log_debug!("[Cleanup] starting cleanup of cluster {}", name);
        self.cleanup_helm_releases(force);
        self.cleanup_namespaces(force);
        self.cleanup_node_resources(name, force);
        log_info!("Cluster '{}' cleanup completed", name);
        Ok(())
    }

    fn cleanup_helm_releases(&self, force: bool) {
        let releases = match self
            .executor
            .execute("helm", &["list", "--all-namespaces", "--output", "json"])
        {
            Ok(result) => parse_helm_releases(&result.stdout),
            Err(e) => {
                log_warn!("Failed to list Helm releases: {}", e);
                return;
            }
        };
        if releases.is_empty() {
            log_debug!("[Cleanup] no Helm releases found");
            return;
        }
        for (release, namespace) in releases {
            log_debug!("[Cleanup] uninstalling Helm release {} from {}", release, namespace);
            let mut args = vec![
                "uninstall",
                release.as_str(),
                "--namespace",
                namespace.as_str(),
                "--no-hooks",
                "--wait",
            ];
            if force {
                args.push("--ignore-not-found");
            }
            if let Err(e) = self.executor.execute("helm", &args) {
                log_warn!("Failed to uninstall release {}: {}", release, e);
            }
        }
    }

    fn cleanup_namespaces(&self, force: bool) {
        let extra: &[&str] = if force { &["kube-system"] } else { &[] };
        for namespace in CLEANUP_NAMESPACES.iter().chain(extra.iter()).copied() {
            if self
                .executor
                .execute("kubectl", &["get", "namespace", namespace])
                .is_err()
            {
                continue;
            }
            log_debug!("[Cleanup] deleting namespace {}", namespace);
            if let Err(e) = self.executor.execute(
                "kubectl",
                &["delete", "namespace", namespace, "--ignore-not-found=true"],
            ) {
                log_warn!("Failed to delete namespace {}: {}", namespace, e);
            }
        }
    }

    fn cleanup_node_resources(&self, cluster: &str, force: bool) {
        let label = format!("label=k3d.cluster={}", cluster);
        let nodes = match self.executor.execute(
            "docker",
            &[
                "ps",
                "--filter",
                &label,
                "--filter",
                "status=running",
                "--format",
                "{{.Names}}",
            ],
        ) {
            Ok(result) => filter_k3d_nodes(&result.stdout, cluster),
            Err(e) => {
                log_warn!("Failed to discover cluster nodes: {}", e);
                return;
            }
        };
        if nodes.is_empty() {
            log_debug!("[Cleanup] no running k3d nodes for {}", cluster);
            return;
        }

        let extra: &[&[&str]] = if force { FORCE_NODE_PRUNES } else { &[] };
        for node in &nodes {
            log_debug!("[Cleanup] pruning docker resources in {}", node);
            for prune in NODE_PRUNES.iter().chain(extra.iter()) {
                let mut args = vec!["exec", node.as_str(), "docker"];
                args.extend_from_slice(prune);
                if let Err(e) = self.executor.execute("docker", &args) {
                    log_warn!("Failed to run 'docker {}' in node {}: {}", prune.join(" "), node, e);
                }
            }
        }
    }

    /// Prints the status box of one cluster. A missing cluster lists the
    /// available ones before returning the not-found error.
    pub fn show_cluster_status(&self, name: &str, detailed: bool, skip_apps: bool) -> Result<(), ClusterError> {
        let info = match self.manager.get_cluster_status(name) {
            Ok(info) => info,
            Err(ClusterError::NotFound(_)) => {
                let mut lines = vec![format!("Cluster '{}' not found", name), String::new()];
                match self.manager.list_clusters() {
                    Ok(clusters) if !clusters.is_empty() => {
                        lines.push("Available clusters:".to_string());
                        lines.extend(clusters.iter().map(|c| format!("  {}", c.name)));
                    }
                    _ => {
                        lines.push("No clusters available".to_string());
                        lines.push("Create one: openframe cluster create".to_string());
                    }
                }
                print_box(self.mode, "Cluster Not Found", &lines);
                return Err(ClusterError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e),
        };

        let mut lines = summary_lines(&info, &status_label(&info));
        lines.push(format!("AGE:      {}", age_label(&info)));
        print_box(self.mode, "Cluster Status", &lines);

        if detailed && !info.nodes.is_empty() {
            let rows = info
                .nodes
                .iter()
                .map(|n| vec![n.name.clone(), n.role.clone(), n.status.clone()])
                .collect();
            table(&["NODE", "ROLE", "STATUS"], rows).printstd();
        }

        if !skip_apps {
            self.show_application_summary();
        }

        if self.mode.shows_chrome() {
            log_info!("Management Commands:");
            eprintln!("  Delete cluster:      openframe cluster delete {}", info.name);
            eprintln!("  Access with kubectl: kubectl get nodes");
            eprintln!("  View pods:           kubectl get pods -A");
            eprintln!("  Get cluster info:    kubectl cluster-info");
        }
        Ok(())
    }

    fn show_application_summary(&self) {
        let apps = ArgoCd::new(self.executor.clone(), self.verbose).parse_applications();
        if apps.is_empty() {
            log_debug!("[Status] no ArgoCD applications found");
            return;
        }
        let healthy = apps.iter().filter(|a| a.is_healthy()).count();
        let synced = apps.iter().filter(|a| a.is_synced()).count();
        log_info!(
            "ArgoCD applications: {} total, {} healthy, {} synced",
            apps.len(),
            healthy,
            synced
        );
        if self.verbose {
            let rows = apps
                .iter()
                .map(|a| vec![a.name.clone(), a.health.clone(), a.sync.clone()])
                .collect();
            table(&["APPLICATION", "HEALTH", "SYNC"], rows).printstd();
        }
    }

    pub fn display_cluster_list(&self, clusters: &[ClusterInfo], quiet: bool) {
        if clusters.is_empty() {
            if !quiet {
                log_info!("No clusters found. Create one with: openframe cluster create");
            }
            return;
        }
        if quiet {
            for cluster in clusters {
                println!("{}", cluster.name);
            }
            return;
        }
        let rows = clusters
            .iter()
            .map(|c| {
                vec![
                    c.name.clone(),
                    c.cluster_type.to_string(),
                    status_label(c),
                    c.node_count.to_string(),
                    age_label(c),
                ]
            })
            .collect();
        table(&["NAME", "TYPE", "STATUS", "NODES", "AGE"], rows).printstd();
        if self.verbose {
            log_info!("Use 'openframe cluster status <name>' for detailed cluster information");
        }
    }

    fn show_next_steps(&self, name: &str) {
        if !self.mode.shows_chrome() || self.mode.is_non_interactive() {
            return;
        }
        log_info!("Next Steps:");
        eprintln!("  1. Bootstrap platform:   openframe bootstrap");
        eprintln!("  2. Check cluster nodes:  kubectl get nodes");
        eprintln!("  3. View cluster status:  openframe cluster status {}", name);
        eprintln!("  4. View running pods:    kubectl get pods -A");
    }
}

fn summary_lines(info: &ClusterInfo, status: &str) -> Vec<String> {
    vec![
        format!("NAME:     {}", info.name),
        format!("TYPE:     {}", info.cluster_type.to_string().to_uppercase()),
        format!("STATUS:   {}", status),
        format!("NODES:    {}", info.node_count),
        format!("NETWORK:  k3d-{}", info.name),
        "API:      https://0.0.0.0:6550".to_string(),
    ]
}

/// `Ready (1/1)` when every server runs, `Partial (x/y)` otherwise.
pub fn status_label(info: &ClusterInfo) -> String {
    if info.is_ready() {
        format!("Ready ({})", info.status)
    } else {
        format!("Partial ({})", info.status)
    }
}

fn age_label(info: &ClusterInfo) -> String {
    info.created_at
        .map(|created| format_age(Utc::now() - created))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// `(release, namespace)` pairs from `helm list --output json`.
pub fn parse_helm_releases(json: &str) -> Vec<(String, String)> {
    #[derive(serde::Deserialize)]
    struct Release {
        name: String,
        #[serde(default)]
        namespace: String,
    }
    serde_json::from_str::<Vec<Release>>(json)
        .unwrap_or_default()
        .into_iter()
        .filter(|r| !r.name.is_empty() && !r.namespace.is_empty())
        .map(|r| (r.name, r.namespace))
        .collect()
}

/// Keeps only `k3d-<cluster>-server-*` and `k3d-<cluster>-agent-*` names.
pub fn filter_k3d_nodes(output: &str, cluster: &str) -> Vec<String> {
    let prefix = format!("k3d-{}-", cluster);
    output
        .lines()
        .map(str::trim)
        .filter(|name| {
            name.strip_prefix(&prefix)
                .is_some_and(|rest| rest.starts_with("server-") || rest.starts_with("agent-"))
        })
        .map(str::to_string)
        .collect()
}

/// Checks the cluster prerequisites, then creates a default-shaped cluster.
/// Used by `bootstrap`, where UI chrome is suppressed in non-interactive runs.
pub fn create_cluster_with_prerequisites(
    executor: Arc<dyn CommandExecutor>,
    name: &str,
    mode: RunMode,
    verbose: bool,
) -> anyhow::Result<()> {
    ensure_cluster_prerequisites(executor.clone(), mode)?;
    let config = ClusterConfig {
        name: if name.is_empty() {
            DEFAULT_CLUSTER_NAME.to_string()
        } else {
            name.to_string()
        },
        ..Default::default()
    };
    ClusterService::new(executor, mode, verbose).create_cluster(&config)?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Resolves the cluster an operation targets.
///
/// An explicit argument wins. Otherwise the clusters are listed: none prints
/// the no-cluster message and yields `None`; one is used directly; more are
/// offered in a select prompt (the first one in non-interactive mode).
pub fn select_cluster(
    service: &ClusterService,
    argument: Option<&str>,
    operation: &str,
) -> Result<Option<String>, SelectError> {
    if let Some(name) = argument.map(str::trim).filter(|n| !n.is_empty()) {
        return Ok(Some(name.to_string()));
    }

    let clusters = match service.list_clusters() {
        Ok(clusters) => clusters,
        Err(e) if e.is_cancelled() => return Err(e.into()),
        Err(e) => {
            log_debug!("[Select] listing clusters failed: {}", e);
            Vec::new()
        }
    };
    match clusters.len() {
        0 => {
            log_error!("{}", NO_CLUSTERS_MESSAGE);
            Ok(None)
        }
        1 => {
            log_info!("Using cluster: {}", clusters[0].name);
            Ok(Some(clusters[0].name.clone()))
        }
        _ => {
            let items: Vec<String> = clusters
                .iter()
                .map(|c| format!("{} ({})", c.name, status_label(c)))
                .collect();
            let index = prompts::select(
                service.mode,
                &format!("Select cluster for {}", operation),
                &items,
                0,
            )?;
            Ok(Some(clusters[index].name.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::executor::{CommandResult, ExecError, MockCommandExecutor};

    fn ok(stdout: &str) -> Result<CommandResult, ExecError> {
        Ok(CommandResult {
            stdout: stdout.to_string(),
            ..Default::default()
        })
    }

    const TWO_CLUSTERS: &str = r#"[
        {"name": "alpha", "serversCount": 1, "serversRunning": 1, "agentsCount": 2},
        {"name": "beta", "serversCount": 1, "serversRunning": 0, "agentsCount": 1}
    ]"#;

    #[test]
    fn node_filter_keeps_servers_and_agents_of_the_cluster() {
        let output = "k3d-dev-server-0\nk3d-dev-agent-1\nk3d-dev-serverlb\nk3d-other-server-0\n\n";
        assert_eq!(
            filter_k3d_nodes(output, "dev"),
            vec!["k3d-dev-server-0", "k3d-dev-agent-1"]
        );
    }

    #[test]
    fn helm_releases_need_a_namespace() {
        let json = r#"[{"name": "argo-cd", "namespace": "argocd"}, {"name": "orphan"}]"#;
        assert_eq!(
            parse_helm_releases(json),
            vec![("argo-cd".to_string(), "argocd".to_string())]
        );
        assert!(parse_helm_releases("not json").is_empty());
    }

    #[test]
    fn existing_cluster_is_not_recreated() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute_with_options()
            .withf(|o| o.command == "k3d" && o.args[..2] == ["cluster", "list"])
            .returning(|_| ok(TWO_CLUSTERS));
        executor
            .expect_execute_with_options()
            .withf(|o| o.args.iter().any(|a| a == "create"))
            .never();

        let service = ClusterService::new(Arc::new(executor), RunMode::Test, false);
        let config = ClusterConfig {
            name: "alpha".into(),
            ..Default::default()
        };
        assert!(service.create_cluster(&config).is_ok());
    }

    #[test]
    fn selection_prefers_argument() {
        let service = ClusterService::new(Arc::new(MockCommandExecutor::new()), RunMode::Test, false);
        let picked = select_cluster(&service, Some("  given  "), "chart install").unwrap();
        assert_eq!(picked.as_deref(), Some("given"));
    }

    #[test]
    fn selection_with_no_clusters_is_none() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().returning(|_| ok("[]"));
        let service = ClusterService::new(Arc::new(executor), RunMode::Test, false);
        assert_eq!(select_cluster(&service, None, "chart install").unwrap(), None);
    }

    #[test]
    fn selection_defaults_to_first_when_not_interactive() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().returning(|_| ok(TWO_CLUSTERS));
        let service = ClusterService::new(Arc::new(executor), RunMode::Test, false);
        let picked = select_cluster(&service, None, "chart install").unwrap();
        assert_eq!(picked.as_deref(), Some("alpha"));
    }

    #[test]
    fn cleanup_warns_but_succeeds_when_everything_fails() {
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
        let service = ClusterService::new(Arc::new(executor), RunMode::Test, false);
        assert!(service.cleanup_cluster("dev", ClusterType::K3d, true).is_ok());
    }

    #[test]
    fn status_labels() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().returning(|_| ok(TWO_CLUSTERS));
        let service = ClusterService::new(Arc::new(executor), RunMode::Test, false);
        let clusters = service.list_clusters().unwrap();
        assert_eq!(status_label(&clusters[0]), "Ready (1/1)");
        assert_eq!(status_label(&clusters[1]), "Partial (0/1)");
    }
}
