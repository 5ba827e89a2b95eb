// `bootstrap`: `cluster create` followed by `chart install` on the cluster
// that was just created. Validation happens before anything touches Docker
// or Helm.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;

use crate::cli::type_enums::DeploymentMode;
use crate::libs::cancellation::CancelToken;
use crate::libs::chart_installer::{ChartInstaller, InstallRequest};
use crate::libs::cluster_service::create_cluster_with_prerequisites;
use crate::libs::executor::CommandExecutor;
use crate::libs::helm_values::ConfigError;
use crate::libs::run_mode::RunMode;
use crate::log_debug;
use crate::schemas::chart::InstallFlags;
use crate::schemas::cluster::DEFAULT_CLUSTER_NAME;

#[derive(Debug, Clone, Default)]
pub struct BootstrapRequest {
    pub cluster_name: Option<String>,
    /// Raw `--deployment-mode` value, validated by [`BootstrapRequest::validate`].
    pub deployment_mode: Option<String>,
    pub non_interactive: bool,
    pub verbose: bool,
}

impl BootstrapRequest {
    /// Parses the deployment mode and enforces `--non-interactive` needing one.
    pub fn validate(&self) -> anyhow::Result<Option<DeploymentMode>> {
        let mode = self
            .deployment_mode
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(DeploymentMode::from_str)
            .transpose()
            .map_err(anyhow::Error::msg)?;
        if self.non_interactive && mode.is_none() {
            return Err(ConfigError::ModeRequired.into());
        }
        Ok(mode)
    }

    /// Trimmed cluster name, `openframe-dev` when none was given.
    pub fn cluster_name(&self) -> String {
        self.cluster_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_CLUSTER_NAME)
            .to_string()
    }
}

pub struct BootstrapService {
    executor: Arc<dyn CommandExecutor>,
    mode: RunMode,
    cancel: CancelToken,
}

impl BootstrapService {
    pub fn new(executor: Arc<dyn CommandExecutor>, mode: RunMode, cancel: CancelToken) -> Self {
        Self { executor, mode, cancel }
    }

    pub fn run(&self, request: &BootstrapRequest) -> anyhow::Result<()> {
        let deployment_mode = request.validate()?;
        let cluster = request.cluster_name();
        log_debug!("[Bootstrap] cluster '{}', mode {:?}", cluster, deployment_mode);

        create_cluster_with_prerequisites(self.executor.clone(), &cluster, self.mode, request.verbose)
            .context("failed to create cluster")?;

        println!();
        println!();

        let install = InstallRequest {
            cluster: Some(cluster),
            flags: InstallFlags::default(),
            deployment_mode,
            non_interactive: request.non_interactive,
            verbose: request.verbose,
            silent: false,
        };
        ChartInstaller::new(self.executor.clone(), self.mode, request.verbose, self.cancel.clone())
            .install(&install)
            .context("failed to install charts")?;
        Ok(())
    }
}
