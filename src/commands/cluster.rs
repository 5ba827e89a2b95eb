// This file contains the entry points for `openframe cluster ...`.
// Every subcommand that targets an existing cluster resolves it through the
// shared selection helper: explicit name, the only cluster, or a prompt.

use anyhow::{Context, bail};

use crate::cli::cmd_enums::ClusterCommands;
use crate::cli::type_enums::ClusterType;
use crate::commands::GlobalOptions;
use crate::libs::cluster_service::{ClusterService, select_cluster};
use crate::libs::cluster_wizard;
use crate::libs::display::table;
use crate::libs::prerequisites::cluster::ensure_cluster_prerequisites;
use crate::libs::prompts;
use crate::libs::run_mode::RunMode;
use crate::schemas::cluster::{ClusterConfig, DEFAULT_NODE_COUNT, validate_cluster_name};
use crate::{log_debug, log_info};

pub fn run(action: ClusterCommands, global: &GlobalOptions) -> anyhow::Result<()> {
    let mode = RunMode::from_flags(false);
    let executor = global.executor(false);
    let service = ClusterService::new(executor.clone(), mode, global.verbose);

    match action {
        ClusterCommands::Create {
            name,
            cluster_type,
            nodes,
            k8s_version,
            skip_wizard,
        } => {
            let flags_are_final = skip_wizard || !mode.is_interactive();
            let config = create_config(name, cluster_type, nodes, k8s_version, flags_are_final)?;
            let config = if flags_are_final {
                if skip_wizard || global.verbose {
                    print_configuration(&config);
                }
                config
            } else {
                cluster_wizard::run(mode, config)?
            };
            ensure_cluster_prerequisites(executor, mode)?;
            service
                .create_cluster(&config)
                .with_context(|| format!("failed to create cluster {}", config.name))?;
        }
        ClusterCommands::List { quiet } => {
            let clusters = service.list_clusters().context("failed to list clusters")?;
            service.display_cluster_list(&clusters, quiet);
        }
        ClusterCommands::Status {
            name,
            detailed,
            no_apps,
        } => {
            if let Some(name) = select_cluster(&service, name.as_deref(), "check status")? {
                service.show_cluster_status(&name, detailed, no_apps)?;
            }
        }
        ClusterCommands::Delete { name, force } => {
            let Some(name) = select_cluster(&service, name.as_deref(), "delete")? else {
                return Ok(());
            };
            if !force {
                let confirmed = prompts::confirm(
                    mode,
                    &format!("Are you sure you want to delete cluster '{}'? This action cannot be undone.", name),
                    false,
                )?;
                if !confirmed {
                    log_info!("Deletion cancelled.");
                    return Ok(());
                }
            }
            let cluster_type = service
                .detect_cluster_type(&name)
                .context("failed to detect cluster type")?;
            service.delete_cluster(&name, cluster_type)?;
        }
        ClusterCommands::Cleanup { name, force } => {
            let Some(name) = select_cluster(&service, name.as_deref(), "cleanup")? else {
                return Ok(());
            };
            let cluster_type = service
                .detect_cluster_type(&name)
                .context("failed to detect cluster type")?;
            service.cleanup_cluster(&name, cluster_type, force)?;
        }
    }
    Ok(())
}

/// Builds the create configuration from arguments and flags.
///
/// An explicit `--nodes` below 1 is rejected when the flags are final
/// (`--skip-wizard` or no terminal); the wizard validates its own answer.
pub fn create_config(
    name: Option<String>,
    cluster_type: Option<ClusterType>,
    nodes: Option<i64>,
    k8s_version: Option<String>,
    flags_are_final: bool,
) -> anyhow::Result<ClusterConfig> {
    let mut config = ClusterConfig::default();
    if let Some(name) = name {
        let name = name.trim().to_string();
        validate_cluster_name(&name).map_err(anyhow::Error::msg)?;
        config.name = name;
    }
    if let Some(cluster_type) = cluster_type {
        config.cluster_type = cluster_type;
    }
    match nodes {
        Some(n) if n <= 0 && flags_are_final => bail!("node count must be at least 1: {}", n),
        Some(n) if n > 0 => config.node_count = u32::try_from(n).unwrap_or(DEFAULT_NODE_COUNT),
        _ => {}
    }
    if let Some(version) = k8s_version {
        config.k8s_version = version.trim().to_string();
    }
    log_debug!("[Cluster] create configuration: {:?}", config);
    Ok(config)
}

fn print_configuration(config: &ClusterConfig) {
    log_info!("Configuration Summary");
    let version = if config.k8s_version.is_empty() {
        "latest".to_string()
    } else {
        config.k8s_version.clone()
    };
    table(
        &["Setting", "Value"],
        vec![
            vec!["Cluster Name".into(), config.name.clone()],
            vec!["Cluster Type".into(), config.cluster_type.to_string()],
            vec!["Node Count".into(), config.node_count.to_string()],
            vec!["Kubernetes Version".into(), version],
        ],
    )
    .printstd();
}
