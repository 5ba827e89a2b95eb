//! # Scaffold
//!
//! `dev scaffold`: pick a service by its `skaffold.yaml`, reinstall the
//! charts with ArgoCD auto-sync disabled so Skaffold owns the deployment,
//! then run `skaffold dev` in the service directory.
//!
//! The chart reinstall is bounded to 2m30s. When it is still running after
//! that, Skaffold starts anyway: the ArgoCD applications keep syncing in the
//! background and Skaffold only needs the release to exist.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use walkdir::WalkDir;

use crate::libs::cancellation::{CancelToken, DeadlineOutcome, run_with_deadline};
use crate::libs::chart_installer::{ChartError, ChartInstaller, InstallRequest};
use crate::libs::cluster_service::{ClusterService, select_cluster};
use crate::libs::executor::{CommandExecutor, ExecOptions};
use crate::libs::helm_values::{ConfigError, HelmValues};
use crate::libs::intercept::DevError;
use crate::libs::kubectl::Kubectl;
use crate::libs::paths;
use crate::libs::prerequisites::dev::ensure_scaffold_prerequisites;
use crate::libs::prompts;
use crate::libs::run_mode::RunMode;
use crate::schemas::chart::InstallFlags;
use crate::schemas::dev::{DEFAULT_NAMESPACE, ScaffoldFlags, SkaffoldService};
use crate::{log_debug, log_error, log_info, log_warn};

pub const CHART_REINSTALL_TIMEOUT: Duration = Duration::from_secs(150);
pub const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(3);
/// The reinstall worker can outlive its deadline, so it must never read stdin.
const REINSTALL_MODE: RunMode = RunMode::NonInteractive;
const SKAFFOLD_FILES: [&str; 2] = ["skaffold.yaml", "skaffold.yml"];
const SKIPPED_DIRS: [&str; 3] = [".git", "node_modules", "target"];

/// Files under these paths map to fixed service names.
const INTEGRATED_TOOL_NAMES: [(&str, &str); 6] = [
    ("authentik/postgresql", "authentik-postgres"),
    ("fleetmdm/skaffold.yaml", "fleetmdm-server"),
    ("meshcentral/server", "meshcentral-server"),
    ("tactical-rmm/tactical-base", "tactical-base"),
    ("tactical-rmm/tactical-frontend", "tactical-frontend"),
    ("tactical-rmm/tactical-nginx", "tactical-nginx"),
];

pub struct ScaffoldService {
    executor: Arc<dyn CommandExecutor>,
    mode: RunMode,
    verbose: bool,
    cancel: CancelToken,
    search_root: PathBuf,
    retry_delay: Duration,
    running: Arc<AtomicBool>,
}

impl ScaffoldService {
    pub fn new(executor: Arc<dyn CommandExecutor>, mode: RunMode, verbose: bool, cancel: CancelToken) -> Self {
        Self {
            executor,
            mode,
            verbose,
            cancel,
            search_root: PathBuf::from(".."),
            retry_delay: RETRY_DELAY,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Directory searched for skaffold files (the parent directory by default).
    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_root = root.into();
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// True while a `skaffold dev` session is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn run(&self, cluster: Option<&str>, flags: &ScaffoldFlags) -> Result<(), DevError> {
        if let Some(values) = flags.helm_values.as_deref().filter(|v| !v.is_empty()) {
            let path = paths::expand_tilde(values);
            if !path.exists() {
                return Err(DevError::HelmValuesNotFound(path));
            }
        }
        ensure_scaffold_prerequisites(self.executor.clone(), self.mode)?;

        let selected = self.select_service()?;
        log_info!("Using skaffold configuration: {}", selected.file_path.display());

        let clusters = ClusterService::new(self.executor.clone(), self.mode, self.verbose);
        let Some(cluster) = select_cluster(&clusters, cluster, "scaffold")? else {
            return Ok(());
        };

        if flags.skip_bootstrap {
            log_info!(
                "Skipping chart install for cluster '{}' (--skip-bootstrap flag provided)",
                cluster
            );
        } else {
            self.reinstall_charts_bounded(&cluster, flags.helm_values.as_deref())?;
        }

        self.run_skaffold_dev(&selected, flags)
    }

    fn select_service(&self) -> Result<SkaffoldService, DevError> {
        let services = discover_skaffold_files(&self.search_root);
        if services.is_empty() {
            log_warn!("No skaffold.yaml files found in project directory");
            log_info!("Create a skaffold.yaml file in your service directory to get started.");
            log_info!("Examples: https://skaffold.dev/docs/references/yaml/");
            return Err(DevError::NoSkaffoldFiles);
        }
        log_info!("Found {} skaffold configuration file(s)", services.len());

        let names: Vec<String> = services.iter().map(|s| s.service_name.clone()).collect();
        let index = prompts::select(self.mode, "Which service would you like to use", &names, 0)?;
        Ok(services[index].clone())
    }

    fn reinstall_charts_bounded(&self, cluster: &str, helm_values: Option<&str>) -> Result<(), DevError> {
        log_warn!("OpenFrame chart needs to be reinstalled to disable autoSync for Skaffold usage...");

        let executor = self.executor.clone();
        let verbose = self.verbose;
        let cluster_name = cluster.to_string();
        let extra = helm_values.filter(|v| !v.is_empty()).map(paths::expand_tilde);

        let outcome = run_with_deadline(CHART_REINSTALL_TIMEOUT, &self.cancel, move |token| {
            reinstall_charts(executor, REINSTALL_MODE, verbose, &cluster_name, extra.as_deref(), token)
        });
        reinstall_outcome(outcome)
    }

    /// `skaffold dev` in the service directory, up to three attempts. A failed
    /// session is reported but not returned: Skaffold already printed why.
    pub fn run_skaffold_dev(&self, selected: &SkaffoldService, flags: &ScaffoldFlags) -> Result<(), DevError> {
        let namespace = self.determine_namespace(&selected.service_name, flags);
        let directory = std::path::absolute(selected.directory()).unwrap_or_else(|_| selected.directory());

        println!();
        log_info!(
            "Running Skaffold commands (service: {}, namespace: {})...",
            selected.service_name,
            namespace
        );

        let options = ExecOptions::new("skaffold", skaffold_args(&namespace, self.verbose))
            .dir(directory)
            .inherit_stdio()
            .cancel(&self.cancel);

        self.running.store(true, Ordering::SeqCst);
        let outcome = self.attempt_sessions(&options);
        self.running.store(false, Ordering::SeqCst);
        outcome
    }

    fn attempt_sessions(&self, options: &ExecOptions) -> Result<(), DevError> {
        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                log_warn!(
                    "Skaffold attempt {}/{} (retrying after error)...",
                    attempt,
                    MAX_ATTEMPTS
                );
                if !self.cancel.sleep(self.retry_delay) {
                    log_info!("Received interrupt signal, stopping Skaffold...");
                    return Ok(());
                }
            }

            match self.executor.execute_with_options(options) {
                Ok(_) => {
                    log_warn!("If you encounter issues after Skaffold command: delete and rebootstrap the cluster");
                    log_info!("Skaffold development session completed");
                    return Ok(());
                }
                Err(e) if e.is_cancelled() || self.cancel.is_cancelled() => {
                    log_info!("Received interrupt signal, stopping Skaffold...");
                    return Ok(());
                }
                Err(e) if attempt == MAX_ATTEMPTS => {
                    log_error!("Skaffold failed after {} attempts: {}", MAX_ATTEMPTS, e);
                }
                Err(e) => log_warn!("Skaffold attempt {} failed: {}", attempt, e),
            }
        }
        Ok(())
    }

    /// `--namespace`, else where a deployment named like the service runs,
    /// else `default`.
    fn determine_namespace(&self, service: &str, flags: &ScaffoldFlags) -> String {
        if let Some(namespace) = flags.namespace.as_deref().filter(|n| !n.is_empty()) {
            return namespace.to_string();
        }
        Kubectl::new(self.executor.clone(), self.verbose)
            .find_resource_namespace(service)
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
    }
}

/// Maps the bounded reinstall to the dev loop's result. An overrun is not an
/// error: Skaffold starts while ArgoCD keeps syncing.
fn reinstall_outcome(outcome: Result<Result<(), ChartError>, DeadlineOutcome>) -> Result<(), DevError> {
    match outcome {
        Ok(Ok(())) => {
            log_info!("ArgoCD Applications reinstalled");
            Ok(())
        }
        Ok(Err(e)) if e.is_cancelled() => Err(DevError::Cancelled),
        Ok(Err(e)) => Err(DevError::ChartInstall(e)),
        Err(DeadlineOutcome::TimedOut) => {
            log_warn!(
                "Chart installation still running after {}s, starting Skaffold",
                CHART_REINSTALL_TIMEOUT.as_secs()
            );
            Ok(())
        }
        Err(DeadlineOutcome::Cancelled) => Err(DevError::Cancelled),
    }
}

/// Chart install for the dev loop: `helm-values.yaml` plus the optional
/// `--helm-values` file, auto-sync off, no prompts, forced reinstall.
fn reinstall_charts(
    executor: Arc<dyn CommandExecutor>,
    mode: RunMode,
    verbose: bool,
    cluster: &str,
    extra_values: Option<&Path>,
    cancel: CancelToken,
) -> Result<(), ChartError> {
    let values = dev_values(&paths::helm_values_path(), extra_values)?;
    let deployment_mode = values.detect_deployment_mode();
    let source = values.write_temp()?;
    if verbose {
        log_info!("AutoSync is disabled for Skaffold development workflow");
    }

    let request = InstallRequest {
        cluster: Some(cluster.to_string()),
        flags: InstallFlags {
            force: true,
            ..Default::default()
        },
        deployment_mode: Some(deployment_mode),
        non_interactive: true,
        verbose,
        silent: false,
    };
    ChartInstaller::new(executor, mode, verbose, cancel)
        .with_values_source(source.to_path_buf())
        .install(&request)
}

/// Base values with the extra file merged over them and `global.autoSync`
/// switched off.
pub fn dev_values(base: &Path, extra: Option<&Path>) -> Result<HelmValues, ConfigError> {
    let mut values = HelmValues::load_or_default(base).unwrap_or_else(|e| {
        log_warn!("Ignoring {}: {}", base.display(), e);
        HelmValues::new()
    });
    if let Some(extra) = extra.filter(|p| *p != base) {
        let extra = std::path::absolute(extra).unwrap_or_else(|_| extra.to_path_buf());
        if !extra.exists() {
            return Err(ConfigError::NotFound(extra));
        }
        log_debug!("[Scaffold] merging {}", extra.display());
        values.merge(HelmValues::load(&extra)?);
    }
    values.set(&["global", "autoSync"], false);
    Ok(values)
}

pub fn skaffold_args(namespace: &str, verbose: bool) -> Vec<String> {
    let mut args = vec![
        "dev".to_string(),
        "--cache-artifacts=false".to_string(),
        "-n".to_string(),
        namespace.to_string(),
    ];
    if verbose {
        args.extend(["--verbosity".to_string(), "info".to_string()]);
    }
    args
}

/// Every `skaffold.yaml` / `skaffold.yml` below `root`, sorted by service name.
pub fn discover_skaffold_files(root: &Path) -> Vec<SkaffoldService> {
    let mut services: Vec<SkaffoldService> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && SKIPPED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref()))
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log_debug!("[Scaffold] skipping unreadable path: {}", e);
                None
            }
        })
        .filter(|entry| {
            entry.file_type().is_file()
                && SKAFFOLD_FILES.contains(&entry.file_name().to_string_lossy().as_ref())
        })
        .map(|entry| {
            let path = entry.into_path();
            SkaffoldService {
                service_name: service_name_for(&path),
                file_path: path,
            }
        })
        .collect();
    services.sort_by(|a, b| a.service_name.cmp(&b.service_name));
    services
}

/// Service name for a skaffold file: the directory holding it, except for
/// integrated tools whose layout needs a fixed name.
pub fn service_name_for(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    if normalized.contains("integrated-tools") {
        if let Some((_, name)) = INTEGRATED_TOOL_NAMES
            .iter()
            .find(|(marker, _)| normalized.contains(marker))
        {
            return name.to_string();
        }
    }
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| normalized.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;

    use crate::libs::executor::{CommandResult, ExecError, MockCommandExecutor};

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "apiVersion: skaffold/v4beta6\n").unwrap();
    }

    #[test]
    fn discovery_names_and_sorts_services() {
        let root = tempfile::tempdir().unwrap();
        touch(root.path(), "openframe/services/openframe-api/skaffold.yaml");
        touch(root.path(), "integrated-tools/authentik/postgresql/skaffold.yaml");
        touch(root.path(), "integrated-tools/tactical-rmm/tactical-nginx/skaffold.yml");
        touch(root.path(), "clients/ui/skaffold.yaml");
        touch(root.path(), "clients/ui/node_modules/dep/skaffold.yaml");
        touch(root.path(), "clients/ui/README.md");

        let names: Vec<String> = discover_skaffold_files(root.path())
            .into_iter()
            .map(|s| s.service_name)
            .collect();
        assert_eq!(
            names,
            vec!["authentik-postgres", "openframe-api", "tactical-nginx", "ui"]
        );
    }

    #[test]
    fn fleetmdm_gets_its_server_name() {
        assert_eq!(
            service_name_for(Path::new("../integrated-tools/fleetmdm/skaffold.yaml")),
            "fleetmdm-server"
        );
        assert_eq!(
            service_name_for(Path::new("../integrated-tools/redis/skaffold.yaml")),
            "redis"
        );
    }

    #[test]
    fn dev_values_disable_auto_sync() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("helm-values.yaml");
        fs::write(&base, "global:\n  repoBranch: main\ncustom: 1\n").unwrap();
        let extra = dir.path().join("dev.yaml");
        fs::write(&extra, "custom: 2\n").unwrap();

        let values = dev_values(&base, Some(&extra)).unwrap();
        assert_eq!(values.get(&["custom"]).and_then(|v| v.as_u64()), Some(2));
        assert_eq!(values.get(&["global", "autoSync"]).and_then(|v| v.as_bool()), Some(false));
        assert_eq!(values.get_str(&["global", "repoBranch"]), Some("main"));

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(dev_values(&base, Some(&missing)), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn malformed_base_values_start_empty() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("helm-values.yaml");
        fs::write(&base, "global: [unclosed\n  : :\n").unwrap();

        let values = dev_values(&base, None).unwrap();
        assert_eq!(values.get(&["global", "autoSync"]).and_then(|v| v.as_bool()), Some(false));
        assert_eq!(values.get_str(&["global", "repoBranch"]), None);
    }

    #[test]
    fn overrunning_reinstall_still_starts_skaffold() {
        assert!(reinstall_outcome(Err(DeadlineOutcome::TimedOut)).is_ok());
        assert!(reinstall_outcome(Ok(Ok(()))).is_ok());
    }

    #[test]
    fn cancelled_reinstall_stops_the_dev_loop() {
        assert!(matches!(
            reinstall_outcome(Err(DeadlineOutcome::Cancelled)),
            Err(DevError::Cancelled)
        ));
        assert!(matches!(
            reinstall_outcome(Ok(Err(ChartError::Cancelled))),
            Err(DevError::Cancelled)
        ));
        assert!(matches!(
            reinstall_outcome(Ok(Err(ChartError::from(ConfigError::ModeRequired)))),
            Err(DevError::ChartInstall(_))
        ));
    }

    #[test]
    fn interrupt_before_reinstall_returns_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let service = ScaffoldService::new(Arc::new(MockCommandExecutor::new()), RunMode::Interactive, false, token);
        assert!(matches!(
            service.reinstall_charts_bounded("openframe-dev", None),
            Err(DevError::Cancelled)
        ));
    }

    #[test]
    fn reinstall_worker_never_prompts() {
        assert!(REINSTALL_MODE.is_non_interactive());
    }

    #[test]
    fn skaffold_command_line() {
        assert_eq!(skaffold_args("openframe", false).join(" "), "dev --cache-artifacts=false -n openframe");
        assert!(skaffold_args("default", true).ends_with(&["--verbosity".to_string(), "info".to_string()]));
    }

    #[test]
    fn skaffold_is_retried_three_times_then_reported() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().returning(move |o| {
            recorded.lock().unwrap().push((o.command.clone(), o.inherit_stdio));
            Err(ExecError::Failed {
                command: o.command_line(),
                result: CommandResult {
                    exit_code: 1,
                    ..Default::default()
                },
            })
        });

        let service = ScaffoldService::new(Arc::new(executor), RunMode::Test, false, CancelToken::new())
            .with_retry_delay(Duration::from_millis(1));
        let selected = SkaffoldService {
            service_name: "api".into(),
            file_path: PathBuf::from("services/api/skaffold.yaml"),
        };
        let flags = ScaffoldFlags {
            namespace: Some("openframe".into()),
            ..Default::default()
        };
        service.run_skaffold_dev(&selected, &flags).unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|(command, inherit)| command == "skaffold" && *inherit));
        assert!(!service.is_running());
    }

    #[test]
    fn namespace_falls_back_to_deployment_then_default() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().returning(|_| {
            Ok(CommandResult {
                stdout: "openframe\topenframe-api\n".into(),
                ..Default::default()
            })
        });
        let service = ScaffoldService::new(Arc::new(executor), RunMode::Test, false, CancelToken::new());
        let flags = ScaffoldFlags::default();
        assert_eq!(service.determine_namespace("openframe-api", &flags), "openframe");
        assert_eq!(service.determine_namespace("unknown", &flags), "default");
    }

    #[test]
    fn missing_skaffold_files_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let service = ScaffoldService::new(Arc::new(MockCommandExecutor::new()), RunMode::Test, false, CancelToken::new())
            .with_search_root(root.path());
        assert!(matches!(service.select_service(), Err(DevError::NoSkaffoldFiles)));
    }
}
