// Helm operations behind `chart install`: the ArgoCD release and the
// app-of-apps umbrella release. Every call carries the job's cancel token so a
// deadline or Ctrl-C kills a running `helm --wait`.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::libs::argocd::ARGOCD_VALUES;
use crate::libs::cancellation::CancelToken;
use crate::libs::chart_installer::ChartError;
use crate::libs::executor::{CommandExecutor, CommandResult, ExecError, ExecOptions};
use crate::schemas::chart::{ARGOCD_NAMESPACE, ChartInstallConfig};
use crate::{log_debug, log_info};

pub const ARGO_REPO_NAME: &str = "argo";
pub const ARGO_REPO_URL: &str = "https://argoproj.github.io/argo-helm";
pub const ARGOCD_RELEASE: &str = "argo-cd";
pub const ARGOCD_CHART: &str = "argo/argo-cd";
pub const ARGOCD_CHART_VERSION: &str = "8.2.7";
pub const ARGOCD_INSTALL_TIMEOUT: &str = "5m";
pub const APP_OF_APPS_RELEASE: &str = "app-of-apps";
const TLS_CERT_KEY: &str = "deployment.oss.ingress.localhost.tls.cert";
const TLS_KEY_KEY: &str = "deployment.oss.ingress.localhost.tls.key";

pub struct HelmManager {
    executor: Arc<dyn CommandExecutor>,
    verbose: bool,
}

impl HelmManager {
    pub fn new(executor: Arc<dyn CommandExecutor>, verbose: bool) -> Self {
        Self { executor, verbose }
    }

    fn helm(&self, args: &[&str], cancel: &CancelToken) -> Result<CommandResult, ExecError> {
        let options = ExecOptions::new("helm", args.iter().copied()).cancel(cancel);
        self.executor.execute_with_options(&options)
    }

    /// True when `release` shows up in `helm list` for `namespace`.
    pub fn is_chart_installed(&self, release: &str, namespace: &str) -> Result<bool, ChartError> {
        let mut args = vec!["list", "-q", "-n", namespace];
        if !release.is_empty() {
            args.extend(["-f", release]);
        }
        let result = self
            .executor
            .execute_with_options(&ExecOptions::new("helm", args))
            .map_err(|e| ChartError::helm("failed to list Helm releases", e))?;
        Ok(result.stdout.lines().any(|line| line.trim() == release))
    }

    /// Adds the Argo repository, refreshes the index and upgrade-installs the
    /// ArgoCD chart with the bundled values. The values file lives in a temp
    /// file removed when this returns.
    pub fn install_argocd(&self, config: &ChartInstallConfig, cancel: &CancelToken) -> Result<(), ChartError> {
        log_info!("Installing ArgoCD...");

        if let Err(e) = self.helm(&["repo", "add", ARGO_REPO_NAME, ARGO_REPO_URL], cancel) {
            if e.is_cancelled() || !e.stderr().contains("already exists") {
                return Err(ChartError::helm("failed to add ArgoCD repository", e));
            }
            log_debug!("[Helm] repository '{}' already present", ARGO_REPO_NAME);
        }
        self.helm(&["repo", "update"], cancel)
            .map_err(|e| ChartError::helm("failed to update Helm repositories", e))?;

        let mut values = tempfile::Builder::new()
            .prefix("argocd-values-")
            .suffix(".yaml")
            .tempfile()
            .map_err(ChartError::TempFile)?;
        values
            .write_all(ARGOCD_VALUES.as_bytes())
            .and_then(|_| values.flush())
            .map_err(ChartError::TempFile)?;
        let values_path = values.path().display().to_string();

        if self.verbose {
            log_info!("   Version: {}", ARGOCD_CHART_VERSION);
            log_info!("   Namespace: {}", ARGOCD_NAMESPACE);
            log_info!("   Values file: {}", values_path);
        }

        let version = format!("--version={}", ARGOCD_CHART_VERSION);
        let mut args = vec![
            "upgrade",
            "--install",
            ARGOCD_RELEASE,
            ARGOCD_CHART,
            version.as_str(),
            "--namespace",
            ARGOCD_NAMESPACE,
            "--create-namespace",
            "--wait",
            "--timeout",
            ARGOCD_INSTALL_TIMEOUT,
            "-f",
            values_path.as_str(),
        ];
        if config.dry_run {
            args.push("--dry-run");
        }

        self.helm(&args, cancel)
            .map_err(|e| ChartError::helm("failed to install ArgoCD", e))?;
        log_info!("ArgoCD installed");
        Ok(())
    }

    /// Upgrade-installs the app-of-apps chart from an already cloned
    /// repository. The TLS pair is passed with `--set-file` so the key never
    /// appears on the command line.
    pub fn install_app_of_apps(
        &self,
        config: &ChartInstallConfig,
        cert_file: &Path,
        key_file: &Path,
        cancel: &CancelToken,
    ) -> Result<(), ChartError> {
        let app = config.app_of_apps.as_ref().ok_or(ChartError::MissingAppOfApps)?;
        if app.chart_path.trim().is_empty() {
            return Err(ChartError::MissingChartPath);
        }

        log_info!("Installing app-of-apps from {} ({})", app.github_repo_display(), app.github_branch);
        let values = app.values_file.display().to_string();
        let cert = format!("{}={}", TLS_CERT_KEY, cert_file.display());
        let key = format!("{}={}", TLS_KEY_KEY, key_file.display());
        let mut args = vec![
            "upgrade",
            "--install",
            APP_OF_APPS_RELEASE,
            app.chart_path.as_str(),
            "--namespace",
            app.namespace.as_str(),
            "--wait",
            "--timeout",
            app.timeout.as_str(),
            "-f",
            values.as_str(),
            "--set-file",
            cert.as_str(),
            "--set-file",
            key.as_str(),
        ];
        if config.dry_run {
            args.push("--dry-run");
        }

        self.helm(&args, cancel)
            .map_err(|e| ChartError::helm("failed to install app-of-apps", e))?;
        log_info!("App-of-apps installed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::libs::executor::MockCommandExecutor;
    use crate::schemas::chart::AppOfAppsConfig;

    fn ok(stdout: &str) -> Result<CommandResult, ExecError> {
        Ok(CommandResult {
            stdout: stdout.to_string(),
            ..Default::default()
        })
    }

    fn failed(stderr: &str) -> Result<CommandResult, ExecError> {
        Err(ExecError::Failed {
            command: "helm".into(),
            result: CommandResult {
                exit_code: 1,
                stderr: stderr.to_string(),
                ..Default::default()
            },
        })
    }

    #[test]
    fn release_lookup_matches_exact_names() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute_with_options()
            .withf(|o| o.args == ["list", "-q", "-n", "argocd", "-f", "argo-cd"])
            .returning(|_| ok("argo-cd\nargo-cd-extra\n"));
        let helm = HelmManager::new(Arc::new(executor), false);
        assert!(helm.is_chart_installed("argo-cd", "argocd").unwrap());
    }

    #[test]
    fn existing_repository_is_tolerated_and_dry_run_flag_added() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().returning(|o| {
            if o.args.first().map(String::as_str) == Some("repo") && o.args[1] == "add" {
                return failed("Error: repository name (argo) already exists");
            }
            if o.args.first().map(String::as_str) == Some("upgrade") {
                assert!(o.args.contains(&"--version=8.2.7".to_string()));
                assert_eq!(o.args.last().map(String::as_str), Some("--dry-run"));
            }
            ok("")
        });
        let helm = HelmManager::new(Arc::new(executor), false);
        let config = ChartInstallConfig {
            dry_run: true,
            ..Default::default()
        };
        helm.install_argocd(&config, &CancelToken::new()).unwrap();
    }

    #[test]
    fn install_failure_carries_helm_output() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().returning(|o| {
            if o.args.first().map(String::as_str) == Some("upgrade") {
                failed("context deadline exceeded")
            } else {
                ok("")
            }
        });
        let helm = HelmManager::new(Arc::new(executor), false);
        let err = helm
            .install_argocd(&ChartInstallConfig::default(), &CancelToken::new())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("failed to install ArgoCD"));
        assert!(message.contains("Helm output: context deadline exceeded"));
    }

    #[test]
    fn cancellation_is_not_decorated() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute_with_options()
            .returning(|_| Err(ExecError::Cancelled));
        let helm = HelmManager::new(Arc::new(executor), false);
        let err = helm
            .install_argocd(&ChartInstallConfig::default(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, ChartError::Cancelled));
    }

    #[test]
    fn app_of_apps_requires_configuration() {
        let helm = HelmManager::new(Arc::new(MockCommandExecutor::new()), false);
        let err = helm
            .install_app_of_apps(
                &ChartInstallConfig::default(),
                Path::new("c.pem"),
                Path::new("k.pem"),
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ChartError::MissingAppOfApps));
    }

    #[test]
    fn app_of_apps_passes_tls_as_files() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute_with_options()
            .times(1)
            .withf(|o| {
                o.args.contains(&"deployment.oss.ingress.localhost.tls.key=/certs/localhost-key.pem".to_string())
                    && o.args.contains(&"/tmp/repo/manifests/app-of-apps".to_string())
                    && o.args.contains(&"60m".to_string())
            })
            .returning(|_| ok(""));
        let helm = HelmManager::new(Arc::new(executor), false);

        let mut app = AppOfAppsConfig::new(
            "https://github.com/flamingo-stack/openframe-oss-tenant",
            "main",
            PathBuf::from("/certs"),
            PathBuf::from("/tmp/values.yaml"),
        );
        app.chart_path = "/tmp/repo/manifests/app-of-apps".into();
        let config = ChartInstallConfig {
            app_of_apps: Some(app),
            ..Default::default()
        };
        helm.install_app_of_apps(
            &config,
            Path::new("/certs/localhost.pem"),
            Path::new("/certs/localhost-key.pem"),
            &CancelToken::new(),
        )
        .unwrap();
    }
}
