// Data models for chart installation: the flags a user passes, the resolved
// install configuration, app-of-apps settings and the ArgoCD application
// status rows we poll for.
use std::path::PathBuf;

use crate::cli::type_enums::DeploymentMode;
use crate::libs::executor::redact_sensitive;

/// Public OpenFrame tenant repository, the default app-of-apps source.
pub const DEFAULT_GITHUB_REPO: &str = "https://github.com/flamingo-stack/openframe-oss-tenant";
/// Private repository holding the shared SaaS app-of-apps chart.
pub const SAAS_SHARED_GITHUB_REPO: &str = "https://github.com/flamingo-stack/openframe-saas-shared";
pub const DEFAULT_GITHUB_BRANCH: &str = "main";
pub const DEFAULT_CHART_PATH: &str = "manifests/app-of-apps";
pub const ARGOCD_NAMESPACE: &str = "argocd";
pub const DEFAULT_APP_OF_APPS_TIMEOUT: &str = "60m";

/// Repository the app-of-apps chart is cloned from for a deployment mode.
pub fn repository_url(mode: DeploymentMode) -> &'static str {
    match mode {
        DeploymentMode::SaasShared => SAAS_SHARED_GITHUB_REPO,
        DeploymentMode::OssTenant | DeploymentMode::SaasTenant => DEFAULT_GITHUB_REPO,
    }
}

/// Puts a token into the userinfo part of an `https://` URL.
pub fn with_token(url: &str, token: &str) -> String {
    match url.strip_prefix("https://") {
        Some(rest) if !token.is_empty() => format!("https://{}@{}", token, rest),
        _ => url.to_string(),
    }
}

/// Flags accepted by `chart install`, after clap applied its defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallFlags {
    pub force: bool,
    pub dry_run: bool,
    pub github_repo: String,
    pub github_branch: String,
    /// Empty means `~/.openframe/certs`.
    pub cert_dir: String,
}

impl Default for InstallFlags {
    fn default() -> Self {
        Self {
            force: false,
            dry_run: false,
            github_repo: DEFAULT_GITHUB_REPO.to_string(),
            github_branch: DEFAULT_GITHUB_BRANCH.to_string(),
            cert_dir: String::new(),
        }
    }
}

/// Where and how the app-of-apps chart is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppOfAppsConfig {
    pub github_repo: String,
    pub github_branch: String,
    /// Relative to the repository root until the repository is cloned, then absolute.
    pub chart_path: String,
    pub namespace: String,
    pub timeout: String,
    pub values_file: PathBuf,
    pub cert_dir: PathBuf,
}

impl AppOfAppsConfig {
    pub fn new(github_repo: &str, github_branch: &str, cert_dir: PathBuf, values_file: PathBuf) -> Self {
        Self {
            github_repo: github_repo.to_string(),
            github_branch: github_branch.to_string(),
            chart_path: DEFAULT_CHART_PATH.to_string(),
            namespace: ARGOCD_NAMESPACE.to_string(),
            timeout: DEFAULT_APP_OF_APPS_TIMEOUT.to_string(),
            values_file,
            cert_dir,
        }
    }

    /// The repository URL with any embedded token masked, for logs.
    pub fn github_repo_display(&self) -> String {
        redact_sensitive(&self.github_repo)
    }
}

/// Everything one `chart install` run needs. Built once per invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartInstallConfig {
    pub cluster_name: String,
    pub force: bool,
    pub dry_run: bool,
    pub verbose: bool,
    pub silent: bool,
    pub non_interactive: bool,
    pub app_of_apps: Option<AppOfAppsConfig>,
}

impl ChartInstallConfig {
    pub fn has_app_of_apps(&self) -> bool {
        self.app_of_apps
            .as_ref()
            .is_some_and(|a| !a.github_repo.is_empty())
    }
}

/// One ArgoCD Application as seen in a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub name: String,
    pub health: String,
    pub sync: String,
}

impl Application {
    pub fn is_healthy(&self) -> bool {
        self.health == "Healthy"
    }

    pub fn is_synced(&self) -> bool {
        self.sync == "Synced"
    }
}

/// Credentials and branches a SaaS deployment needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaasConfig {
    pub repository_password: String,
    pub config_repository_password: String,
    pub saas_branch: String,
    pub oss_branch: String,
}

/// Container registry login written into the values file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl Default for RegistryCredentials {
    fn default() -> Self {
        Self {
            username: "default".to_string(),
            password: "****".to_string(),
            email: "default@example.com".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saas_shared_uses_its_own_repository() {
        assert_eq!(repository_url(DeploymentMode::SaasShared), SAAS_SHARED_GITHUB_REPO);
        assert_eq!(repository_url(DeploymentMode::SaasTenant), DEFAULT_GITHUB_REPO);
    }

    #[test]
    fn token_goes_into_userinfo() {
        assert_eq!(
            with_token(SAAS_SHARED_GITHUB_REPO, "ghp_x"),
            "https://ghp_x@github.com/flamingo-stack/openframe-saas-shared"
        );
        assert_eq!(with_token(DEFAULT_GITHUB_REPO, ""), DEFAULT_GITHUB_REPO);
    }

    #[test]
    fn app_of_apps_requires_a_repository() {
        let mut config = ChartInstallConfig::default();
        assert!(!config.has_app_of_apps());
        config.app_of_apps = Some(AppOfAppsConfig::new(
            DEFAULT_GITHUB_REPO,
            "main",
            PathBuf::from("/certs"),
            PathBuf::from("values.yaml"),
        ));
        assert!(config.has_app_of_apps());
        let app = config.app_of_apps.unwrap();
        assert_eq!(app.chart_path, "manifests/app-of-apps");
        assert_eq!(app.namespace, "argocd");
        assert_eq!(app.timeout, "60m");
    }
}
