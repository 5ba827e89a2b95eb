// Interactive `cluster create` wizard: name, type, node count, Kubernetes
// version, then a summary table and a confirmation. Declining the summary
// restarts the questions with the previous answers as defaults.

use crate::cli::type_enums::ClusterType;
use crate::libs::display::table;
use crate::libs::prompts::{self, PromptError};
use crate::libs::run_mode::RunMode;
use crate::log_info;
use crate::schemas::cluster::{ClusterConfig, validate_cluster_name};

/// Choices offered for the k3s image. `latest` keeps the default image.
pub const K8S_VERSIONS: &[&str] = &["latest", "v1.31.5-k3s1", "v1.30.9-k3s1"];
const MAX_WIZARD_NODES: u32 = 10;

pub fn run(mode: RunMode, defaults: ClusterConfig) -> Result<ClusterConfig, PromptError> {
    let mut config = defaults;
    loop {
        config.name = prompts::input(mode, "Cluster Name", &config.name, validate_cluster_name)?;

        let types = vec![
            "k3d (Recommended for local development)".to_string(),
            "gke (Google Kubernetes Engine - Coming Soon)".to_string(),
        ];
        let default_type = ClusterType::ALL
            .iter()
            .position(|t| *t == config.cluster_type)
            .unwrap_or(0);
        config.cluster_type = ClusterType::ALL[prompts::select(mode, "Cluster Type", &types, default_type)?];

        let nodes = prompts::input(
            mode,
            "Number of Worker Nodes",
            &config.node_count.to_string(),
            validate_node_count,
        )?;
        config.node_count = nodes.parse().unwrap_or(config.node_count);

        let versions: Vec<String> = K8S_VERSIONS.iter().map(|v| v.to_string()).collect();
        let default_version = K8S_VERSIONS
            .iter()
            .position(|v| *v == config.k8s_version)
            .unwrap_or(0);
        let picked = K8S_VERSIONS[prompts::select(mode, "Kubernetes Version", &versions, default_version)?];
        config.k8s_version = if picked == "latest" {
            String::new()
        } else {
            picked.to_string()
        };

        if confirm_configuration(mode, &config)? {
            return Ok(config);
        }
    }
}

fn validate_node_count(input: &str) -> Result<(), String> {
    match input.parse::<u32>() {
        Ok(n) if (1..=MAX_WIZARD_NODES).contains(&n) => Ok(()),
        _ => Err(format!("node count must be between 1 and {}", MAX_WIZARD_NODES)),
    }
}

fn confirm_configuration(mode: RunMode, config: &ClusterConfig) -> Result<bool, PromptError> {
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

    let choices = vec![
        "Yes, create the cluster".to_string(),
        "No, go back and modify".to_string(),
    ];
    Ok(prompts::select(mode, "Create cluster with this configuration?", &choices, 0)? == 0)
}
