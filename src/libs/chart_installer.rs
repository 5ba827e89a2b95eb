//! # Chart Installer
//!
//! The `chart install` workflow:
//!
//! 1. chart prerequisites (Git, Helm, memory, certificates)
//! 2. Helm values: dry-run uses the file as is, non-interactive applies the
//!    `--deployment-mode` and validates, otherwise the wizard runs
//! 3. cluster selection and, interactively, confirmation
//! 4. certificate refresh (interactive only)
//! 5. ArgoCD, then app-of-apps from a shallow clone, then the sync wait
//!
//! Step 5 runs on a worker under a 60 minute deadline and is retried once
//! when the failure looks transient. Temporary files (values, clone) are
//! owned by guards and disappear whatever the outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::type_enums::DeploymentMode;
use crate::libs::argocd::ArgoCd;
use crate::libs::cancellation::{CancelToken, DeadlineOutcome, run_with_deadline};
use crate::libs::chart_wizard::ChartWizard;
use crate::libs::cluster_service::{ClusterService, SelectError, select_cluster};
use crate::libs::display::print_box;
use crate::libs::executor::{CommandExecutor, ExecError};
use crate::libs::git_repository::{GitError, GitRepository};
use crate::libs::helm_manager::{APP_OF_APPS_RELEASE, ARGOCD_RELEASE, HelmManager};
use crate::libs::helm_values::{ConfigError, HelmValues, PreparedValues};
use crate::libs::paths::{self, cert_files};
use crate::libs::prerequisites::PrerequisiteError;
use crate::libs::prerequisites::chart::{chart_prerequisites, regenerate_certificates};
use crate::libs::prompts::{self, PromptError};
use crate::libs::run_mode::RunMode;
use crate::schemas::chart::{
    ARGOCD_NAMESPACE, AppOfAppsConfig, ChartInstallConfig, DEFAULT_GITHUB_BRANCH, DEFAULT_GITHUB_REPO,
    InstallFlags, repository_url, with_token,
};
use crate::{log_debug, log_info, log_warn};

pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const MAX_ATTEMPTS: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("{action}: {source}{}", helm_output(.source))]
    Helm {
        action: &'static str,
        #[source]
        source: ExecError,
    },

    #[error("app-of-apps configuration is required")]
    MissingAppOfApps,

    #[error("chart path is required for app-of-apps installation")]
    MissingChartPath,

    #[error("failed to create temporary values file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error(transparent)]
    Git(GitError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Prerequisite(#[from] PrerequisiteError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Select(#[from] SelectError),

    #[error("no cluster available for chart installation")]
    NoCluster,

    #[error("installation cancelled by user")]
    Declined,

    #[error("timed out waiting for ArgoCD applications after {}m", .0.as_secs() / 60)]
    WaitTimedOut(Duration),

    #[error("chart installation timed out after {}m", .0.as_secs() / 60)]
    TimedOut(Duration),
}

fn helm_output(source: &ExecError) -> String {
    let stderr = source.stderr().trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\nHelm output: {}", crate::libs::executor::redact_sensitive(stderr))
    }
}

impl From<GitError> for ChartError {
    fn from(e: GitError) -> Self {
        match e {
            GitError::Cancelled => ChartError::Cancelled,
            other => ChartError::Git(other),
        }
    }
}

impl ChartError {
    /// Wraps a failed Helm call; cancellation stays undecorated.
    pub fn helm(action: &'static str, source: ExecError) -> Self {
        if source.is_cancelled() {
            ChartError::Cancelled
        } else {
            ChartError::Helm { action, source }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChartError::Cancelled)
    }

    /// Failures worth one more attempt: timeouts and an API server that
    /// is still coming up.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ChartError::WaitTimedOut(_) => true,
            ChartError::Helm { source, .. } => {
                let stderr = source.stderr();
                matches!(source, ExecError::TimedOut { .. })
                    || stderr.contains("timed out")
                    || stderr.contains("context deadline exceeded")
                    || stderr.contains("connection refused")
            }
            _ => false,
        }
    }
}

/// One `chart install` invocation, flags already parsed.
#[derive(Debug, Clone, Default)]
pub struct InstallRequest {
    pub cluster: Option<String>,
    pub flags: InstallFlags,
    pub deployment_mode: Option<DeploymentMode>,
    pub non_interactive: bool,
    pub verbose: bool,
    pub silent: bool,
}

pub struct ChartInstaller {
    executor: Arc<dyn CommandExecutor>,
    cluster_executor: Arc<dyn CommandExecutor>,
    mode: RunMode,
    verbose: bool,
    cancel: CancelToken,
    timeout: Duration,
    values_source: PathBuf,
}

impl ChartInstaller {
    pub fn new(executor: Arc<dyn CommandExecutor>, mode: RunMode, verbose: bool, cancel: CancelToken) -> Self {
        Self {
            cluster_executor: executor.clone(),
            executor,
            mode,
            verbose,
            cancel,
            timeout: INSTALL_TIMEOUT,
            values_source: paths::helm_values_path(),
        }
    }

    /// Cluster listing must see real clusters even when the chart executor
    /// is in dry-run.
    pub fn with_cluster_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.cluster_executor = executor;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_values_source(mut self, path: PathBuf) -> Self {
        self.values_source = path;
        self
    }

    pub fn install(&self, request: &InstallRequest) -> Result<(), ChartError> {
        if request.non_interactive && !request.flags.dry_run && request.deployment_mode.is_none() {
            return Err(ConfigError::ModeRequired.into());
        }
        if self.cancel.is_cancelled() {
            return Err(ChartError::Cancelled);
        }

        let cert_dir = paths::cert_dir(Some(request.flags.cert_dir.as_str()));
        chart_prerequisites(self.executor.clone(), self.mode, cert_dir.clone()).ensure()?;

        let prepared = self.prepare_values(request)?;

        let service = ClusterService::new(self.cluster_executor.clone(), self.mode, self.verbose);
        let Some(cluster) = select_cluster(&service, request.cluster.as_deref(), "chart installation")? else {
            return Err(ChartError::NoCluster);
        };

        if self.mode.is_interactive() && !request.non_interactive {
            let question = format!("Install charts on cluster '{}'?", cluster);
            if !prompts::confirm(self.mode, &question, true)? {
                log_info!("Installation cancelled.");
                return Err(ChartError::Declined);
            }
            regenerate_certificates(self.executor.clone(), cert_dir.clone());
        } else {
            log_warn!("Skipping certificate regeneration (non-interactive mode)");
        }

        let config = build_install_config(request, &cluster, &prepared, cert_dir);
        if !config.force && !config.dry_run && self.already_installed() {
            log_info!(
                "Charts are already installed on cluster '{}'. Use --force to reinstall.",
                cluster
            );
            return Ok(());
        }

        self.install_with_retry(&config)?;
        self.show_summary(&config);
        Ok(())
    }

    /// Resolves the Helm values for this run and writes them to a temp file.
    pub fn prepare_values(&self, request: &InstallRequest) -> Result<PreparedValues, ChartError> {
        let base = HelmValues::load_or_default(&self.values_source)?;

        if request.flags.dry_run {
            log_info!("Using existing configuration (dry-run mode)");
            return Ok(PreparedValues::new(request.deployment_mode, base)?);
        }

        if request.non_interactive {
            let mode = request.deployment_mode.ok_or(ConfigError::ModeRequired)?;
            log_warn!("Running in non-interactive mode with {} deployment", mode);
            let mut values = base;
            values.apply_deployment_mode(mode);
            values.validate(mode)?;
            return Ok(PreparedValues::new(Some(mode), values)?);
        }

        if let Some(mode) = request.deployment_mode {
            log_warn!("Deployment mode pre-selected: {}", mode);
        }
        let (mode, values) = ChartWizard::new(self.mode).configure(request.deployment_mode, base)?;
        Ok(PreparedValues::new(Some(mode), values)?)
    }

    fn already_installed(&self) -> bool {
        let helm = HelmManager::new(self.executor.clone(), false);
        let installed = |release: &str| helm.is_chart_installed(release, ARGOCD_NAMESPACE).unwrap_or(false);
        installed(ARGOCD_RELEASE) && installed(APP_OF_APPS_RELEASE)
    }

    /// Runs the install job under the overall deadline, once more after a
    /// recoverable failure if time is left.
    pub fn install_with_retry(&self, config: &ChartInstallConfig) -> Result<(), ChartError> {
        let started = Instant::now();
        let mut attempt = 1;
        loop {
            let remaining = self.timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(ChartError::TimedOut(self.timeout));
            }

            let executor = self.executor.clone();
            let job = config.clone();
            let outcome = run_with_deadline(remaining, &self.cancel, move |token| {
                install_charts(executor, &job, &token)
            });

            match outcome {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) if e.is_recoverable() && attempt < MAX_ATTEMPTS => {
                    log_warn!("Chart installation failed: {}", e);
                    log_info!("Retrying in {}s (attempt {}/{})...", RETRY_DELAY.as_secs(), attempt + 1, MAX_ATTEMPTS);
                    if !self.cancel.sleep(RETRY_DELAY) {
                        return Err(ChartError::Cancelled);
                    }
                    attempt += 1;
                }
                Ok(Err(e)) => return Err(e),
                Err(DeadlineOutcome::TimedOut) => return Err(ChartError::TimedOut(self.timeout)),
                Err(DeadlineOutcome::Cancelled) => return Err(ChartError::Cancelled),
            }
        }
    }

    fn show_summary(&self, config: &ChartInstallConfig) {
        let mut lines = vec![format!("Cluster: {}", config.cluster_name)];
        if let Some(app) = &config.app_of_apps {
            lines.push(format!("Repository: {}", app.github_repo_display()));
            lines.push(format!("Branch: {}", app.github_branch));
        }
        if config.dry_run {
            lines.push("Dry run: nothing was changed".to_string());
        }
        print_box(self.mode, "Charts Installed", &lines);
    }
}

/// ArgoCD, then the app-of-apps and the sync wait when a repository is set.
fn install_charts(
    executor: Arc<dyn CommandExecutor>,
    config: &ChartInstallConfig,
    cancel: &CancelToken,
) -> Result<(), ChartError> {
    let helm = HelmManager::new(executor.clone(), config.verbose);
    helm.install_argocd(config, cancel)?;

    let app = match &config.app_of_apps {
        Some(app) if config.has_app_of_apps() => app,
        _ => {
            log_debug!("[Chart] no app-of-apps repository configured");
            return Ok(());
        }
    };

    let cloned = GitRepository::new(executor.clone()).clone_chart_repository(app, config.dry_run, cancel)?;
    let mut resolved = config.clone();
    if let Some(target) = resolved.app_of_apps.as_mut() {
        target.chart_path = cloned.chart_path.display().to_string();
    }

    let (cert, key) = cert_files(&app.cert_dir);
    helm.install_app_of_apps(&resolved, &cert, &key, cancel)?;
    ArgoCd::new(executor, config.verbose).wait_for_applications(&resolved, cancel)
}

/// Turns flags plus prepared values into the install configuration.
///
/// The repository follows the deployment mode unless `--github-repo` was
/// changed from its default; saas-shared authenticates with the SaaS
/// repository token. The branch comes from the values file unless
/// `--github-branch` was changed from its default.
pub fn build_install_config(
    request: &InstallRequest,
    cluster: &str,
    prepared: &PreparedValues,
    cert_dir: PathBuf,
) -> ChartInstallConfig {
    let flags = &request.flags;

    let repo = match prepared.mode {
        Some(mode) if flags.github_repo == DEFAULT_GITHUB_REPO => {
            let url = repository_url(mode);
            match prepared.repository_token() {
                Some(token) if mode == DeploymentMode::SaasShared => with_token(url, token),
                _ => url.to_string(),
            }
        }
        _ => flags.github_repo.clone(),
    };

    let branch = if flags.github_branch != DEFAULT_GITHUB_BRANCH {
        flags.github_branch.clone()
    } else if let Some(branch) = prepared.values.branch_for_mode(prepared.mode) {
        if request.verbose {
            log_info!("Using branch '{}' from Helm values", branch);
        }
        branch
    } else {
        if request.verbose {
            log_info!("Using default branch '{}'", flags.github_branch);
        }
        flags.github_branch.clone()
    };

    let app_of_apps = (!repo.is_empty())
        .then(|| AppOfAppsConfig::new(&repo, &branch, cert_dir, prepared.path().to_path_buf()));

    ChartInstallConfig {
        cluster_name: cluster.to_string(),
        force: flags.force,
        dry_run: flags.dry_run,
        verbose: request.verbose,
        silent: request.silent || request.non_interactive,
        non_interactive: request.non_interactive,
        app_of_apps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::executor::{CommandResult, MockCommandExecutor};
    use crate::schemas::chart::SAAS_SHARED_GITHUB_REPO;

    fn prepared(mode: Option<DeploymentMode>, yaml: &str) -> PreparedValues {
        PreparedValues::new(mode, HelmValues::from_yaml(yaml).unwrap()).unwrap()
    }

    #[test]
    fn non_interactive_without_mode_fails_before_any_command() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().never();
        let installer = ChartInstaller::new(Arc::new(executor), RunMode::NonInteractive, false, CancelToken::new());
        let request = InstallRequest {
            non_interactive: true,
            ..Default::default()
        };
        let err = installer.install(&request).unwrap_err();
        assert_eq!(
            err.to_string(),
            "--deployment-mode is required when using --non-interactive"
        );
    }

    #[test]
    fn saas_shared_clones_with_token_and_saas_branch() {
        let values = prepared(
            Some(DeploymentMode::SaasShared),
            "deployment:\n  saas:\n    repository:\n      password: ghp_abc\n      branch: release\n",
        );
        let config = build_install_config(&InstallRequest::default(), "dev", &values, PathBuf::from("/certs"));
        let app = config.app_of_apps.unwrap();
        assert_eq!(app.github_repo, with_token(SAAS_SHARED_GITHUB_REPO, "ghp_abc"));
        assert_eq!(app.github_branch, "release");
        assert_eq!(app.values_file, values.path());
    }

    #[test]
    fn explicit_branch_flag_wins_over_values() {
        let values = prepared(None, "deployment:\n  oss:\n    repository:\n      branch: develop\n");
        let mut request = InstallRequest::default();
        assert_eq!(
            build_install_config(&request, "dev", &values, PathBuf::from("/c"))
                .app_of_apps
                .unwrap()
                .github_branch,
            "develop"
        );
        request.flags.github_branch = "hotfix".into();
        assert_eq!(
            build_install_config(&request, "dev", &values, PathBuf::from("/c"))
                .app_of_apps
                .unwrap()
                .github_branch,
            "hotfix"
        );
    }

    #[test]
    fn non_interactive_values_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("helm-values.yaml");
        std::fs::write(&source, "deployment:\n  saas:\n    enabled: true\n").unwrap();

        let installer = ChartInstaller::new(Arc::new(MockCommandExecutor::new()), RunMode::Test, false, CancelToken::new())
            .with_values_source(source);
        let request = InstallRequest {
            non_interactive: true,
            deployment_mode: Some(DeploymentMode::SaasTenant),
            ..Default::default()
        };
        let err = installer.prepare_values(&request).unwrap_err();
        assert!(err.to_string().contains("SaaS repository password"));

        let request = InstallRequest {
            deployment_mode: Some(DeploymentMode::OssTenant),
            ..request
        };
        let prepared = installer.prepare_values(&request).unwrap();
        assert!(prepared.values.get_bool(&["deployment", "oss", "enabled"]));
        assert!(!prepared.values.get_bool(&["deployment", "saas", "enabled"]));
    }

    #[test]
    fn fatal_failure_is_not_retried() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().times(1).returning(|_| {
            Err(ExecError::Failed {
                command: "helm repo add".into(),
                result: CommandResult {
                    exit_code: 1,
                    stderr: "Error: invalid chart repository".into(),
                    ..Default::default()
                },
            })
        });
        let installer = ChartInstaller::new(Arc::new(executor), RunMode::Test, false, CancelToken::new());
        let err = installer
            .install_with_retry(&ChartInstallConfig::default())
            .unwrap_err();
        assert!(err.to_string().starts_with("failed to add ArgoCD repository"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn cancelled_root_token_stops_the_job() {
        let token = CancelToken::new();
        token.cancel();
        let installer = ChartInstaller::new(Arc::new(MockCommandExecutor::new()), RunMode::Test, false, token);
        let err = installer.install(&InstallRequest::default()).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn timeouts_are_recoverable() {
        let err = ChartError::helm(
            "failed to install ArgoCD",
            ExecError::Failed {
                command: "helm upgrade".into(),
                result: CommandResult {
                    exit_code: 1,
                    stderr: "Error: context deadline exceeded".into(),
                    ..Default::default()
                },
            },
        );
        assert!(err.is_recoverable());
        assert!(ChartError::WaitTimedOut(INSTALL_TIMEOUT).is_recoverable());
        assert!(!ChartError::Declined.is_recoverable());
    }
}
