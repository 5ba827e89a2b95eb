//! # Intercept
//!
//! `dev intercept`: route a service's cluster traffic to a local process with
//! Telepresence. The session is:
//!
//! 1. validate flags and check the kubectl context
//! 2. reconnect Telepresence to the service namespace if needed
//! 3. `telepresence intercept ...`
//! 4. wait for Ctrl-C
//! 5. leave the intercept, quit and reconnect to the original namespace
//!
//! Teardown never fails the command; every step only warns.
//!
//! Without a service argument the interactive setup picks cluster,
//! namespace, service and ports first.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::libs::cancellation::CancelToken;
use crate::libs::chart_installer::ChartError;
use crate::libs::cluster_service::{ClusterService, SelectError, select_cluster};
use crate::libs::executor::{CommandExecutor, ExecError, ExecOptions};
use crate::libs::helm_values::ConfigError;
use crate::libs::kubectl::Kubectl;
use crate::libs::prerequisites::PrerequisiteError;
use crate::libs::prompts::{self, PromptError};
use crate::libs::run_mode::RunMode;
use crate::schemas::dev::{DEFAULT_NAMESPACE, InterceptFlags, TelepresenceStatus, parse_port};
use crate::{log_debug, log_info, log_warn};

const NAMESPACE_SWITCH_TIMEOUT: Duration = Duration::from_secs(30);
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(30);
const SETTLE_DELAY: Duration = Duration::from_secs(1);
const WAIT_SLICE: Duration = Duration::from_millis(500);

/// Errors of the dev workflows (intercept and scaffold).
#[derive(Debug, thiserror::Error)]
pub enum DevError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("kubectl not available")]
    KubectlNotFound,

    #[error("no active kubectl context")]
    NoContext,

    #[error("failed to get kubectl context: {source}")]
    Context { source: ExecError },

    #[error("cluster connection failed: {source}")]
    ClusterUnreachable { source: ExecError },

    #[error("failed to switch kubectl context to {context}: {source}")]
    SwitchContext { context: String, source: ExecError },

    #[error("failed to list namespaces: {source}")]
    Namespaces { source: ExecError },

    #[error("failed to get services in namespace {namespace}: {source}")]
    Services { namespace: String, source: ExecError },

    #[error("failed to parse kubectl output: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("no services found in namespace '{0}'")]
    NoServices(String),

    #[error("service has no ports available")]
    NoPorts,

    #[error("failed to connect to namespace {namespace}: {source}")]
    Connect { namespace: String, source: ExecError },

    #[error("failed to create intercept: {source}")]
    Intercept { source: ExecError },

    #[error("{source}")]
    Command { source: ExecError },

    #[error("no skaffold.yaml files found in project directory")]
    NoSkaffoldFiles,

    #[error("helm values file not found: {}", .0.display())]
    HelmValuesNotFound(PathBuf),

    #[error("chart install failed: {0}")]
    ChartInstall(#[source] ChartError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Prerequisite(#[from] PrerequisiteError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Select(#[from] SelectError),
}

impl DevError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DevError::Cancelled)
            || matches!(self, DevError::ChartInstall(e) if e.is_cancelled())
    }
}

impl From<ExecError> for DevError {
    fn from(e: ExecError) -> Self {
        if e.is_cancelled() {
            DevError::Cancelled
        } else {
            DevError::Command { source: e }
        }
    }
}

/// The intercept that teardown has to undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveIntercept {
    pub service: String,
    pub namespace: String,
    pub original_namespace: String,
}

pub struct InterceptService {
    executor: Arc<dyn CommandExecutor>,
    verbose: bool,
    cancel: CancelToken,
    settle: Duration,
}

impl InterceptService {
    pub fn new(executor: Arc<dyn CommandExecutor>, verbose: bool, cancel: CancelToken) -> Self {
        Self {
            executor,
            verbose,
            cancel,
            settle: SETTLE_DELAY,
        }
    }

    /// Pause after reconnecting, giving the Telepresence daemon time to settle.
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Runs a whole intercept session and blocks until Ctrl-C.
    pub fn start(&self, service: &str, flags: &InterceptFlags) -> Result<(), DevError> {
        let mut flags = flags.clone();
        flags.validate(service).map_err(DevError::Validation)?;

        Kubectl::new(self.executor.clone(), self.verbose).ensure_context()?;
        log_info!("Setting up intercept...");

        let original_namespace = self.ensure_namespace(&flags.namespace)?;
        let active = ActiveIntercept {
            service: service.to_string(),
            namespace: flags.namespace.clone(),
            original_namespace,
        };
        if !self.cancel.sleep(self.settle) {
            self.teardown(&active);
            return Err(DevError::Cancelled);
        }

        let args = intercept_args(service, &flags);
        if let Err(e) = self.telepresence(args.as_slice(), &self.cancel, None) {
            if e.is_cancelled() {
                self.teardown(&active);
                return Err(DevError::Cancelled);
            }
            return Err(DevError::Intercept { source: e });
        }

        log_info!("Intercepting {}. Press Ctrl+C to stop...", service);
        while self.cancel.sleep(WAIT_SLICE) {}

        self.teardown(&active);
        Ok(())
    }

    /// Namespace Telepresence is connected to, `default` when unknown.
    pub fn current_namespace(&self) -> String {
        let status = self.telepresence(
            &["status", "--output", "json"],
            &self.cancel,
            Some(NAMESPACE_SWITCH_TIMEOUT),
        );
        match status {
            Ok(result) => namespace_from_status(&result.stdout),
            Err(e) => {
                if self.verbose {
                    log_warn!("Could not get current namespace, assuming default: {}", e);
                }
                DEFAULT_NAMESPACE.to_string()
            }
        }
    }

    /// Reconnects Telepresence to `target` when it points elsewhere.
    /// Returns the namespace it was connected to before.
    pub fn ensure_namespace(&self, target: &str) -> Result<String, DevError> {
        let current = self.current_namespace();
        if self.verbose {
            log_info!("Current namespace: {}, target: {}", current, target);
        }

        if current == target {
            if self.verbose {
                log_info!("Telepresence already connected to {}", target);
            }
            return Ok(current);
        }

        if self.verbose {
            log_info!("Switching Telepresence from {} to {}", current, target);
        }
        if let Err(e) = self.telepresence(&["quit"], &self.cancel, Some(NAMESPACE_SWITCH_TIMEOUT)) {
            log_debug!("[Intercept] telepresence quit failed: {}", e);
        }
        self.telepresence(
            &["connect", "--namespace", target],
            &self.cancel,
            Some(NAMESPACE_SWITCH_TIMEOUT),
        )
        .map_err(|e| {
            if e.is_cancelled() {
                DevError::Cancelled
            } else {
                DevError::Connect {
                    namespace: target.to_string(),
                    source: e,
                }
            }
        })?;
        Ok(current)
    }

    /// Leaves the intercept and restores the original connection. Runs on
    /// its own token because the session token is already cancelled here.
    pub fn teardown(&self, active: &ActiveIntercept) {
        log_info!("Stopping intercept for {}...", active.service);
        let token = CancelToken::new();

        if let Err(e) = self.telepresence(&["leave", active.service.as_str()], &token, Some(TEARDOWN_TIMEOUT)) {
            log_warn!("Failed to leave intercept: {}", e);
        }
        if let Err(e) = self.telepresence(&["quit"], &token, Some(TEARDOWN_TIMEOUT)) {
            log_warn!("Failed to quit telepresence: {}", e);
        }
        if !active.original_namespace.is_empty() && active.original_namespace != active.namespace {
            let restore = self.telepresence(
                &["connect", "--namespace", active.original_namespace.as_str()],
                &token,
                Some(TEARDOWN_TIMEOUT),
            );
            if let Err(e) = restore {
                log_warn!(
                    "Failed to reconnect to namespace {}: {}",
                    active.original_namespace,
                    e
                );
            }
        }
        log_info!("Intercept stopped");
    }

    fn telepresence<S: AsRef<str>>(
        &self,
        args: &[S],
        cancel: &CancelToken,
        timeout: Option<Duration>,
    ) -> Result<crate::libs::executor::CommandResult, ExecError> {
        let mut options = ExecOptions::new("telepresence", args.iter().map(|a| a.as_ref().to_string())).cancel(cancel);
        if let Some(timeout) = timeout {
            options = options.timeout(timeout);
        }
        self.executor.execute_with_options(&options)
    }
}

/// `telepresence intercept` arguments for `service`.
pub fn intercept_args(service: &str, flags: &InterceptFlags) -> Vec<String> {
    let mut args = vec![
        "intercept".to_string(),
        service.to_string(),
        "--port".to_string(),
        flags.port_mapping(),
        "--mount=false".to_string(),
    ];
    if let Some(env_file) = flags.env_file.as_deref().filter(|f| !f.is_empty()) {
        args.extend(["--env-file".to_string(), env_file.to_string()]);
    }
    if flags.global {
        args.push("--global".to_string());
    }
    for header in &flags.header {
        args.extend(["--http-header".to_string(), header.clone()]);
    }
    if flags.replace {
        args.push("--replace".to_string());
    }
    args
}

/// Reads `user_daemon.namespace` from `telepresence status --output json`.
pub fn namespace_from_status(json: &str) -> String {
    serde_json::from_str::<TelepresenceStatus>(json)
        .ok()
        .and_then(|status| status.user_daemon)
        .and_then(|daemon| daemon.namespace)
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty() && ns != "null")
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}

/// Interactive intercept setup: cluster, kubectl context, namespace, service,
/// remote port and local port. `None` when there is no cluster to use.
pub fn interactive_setup(
    executor: Arc<dyn CommandExecutor>,
    mode: RunMode,
    verbose: bool,
) -> Result<Option<(String, InterceptFlags)>, DevError> {
    let clusters = ClusterService::new(executor.clone(), mode, verbose);
    let Some(cluster) = select_cluster(&clusters, None, "intercept")? else {
        return Ok(None);
    };

    let kubectl = Kubectl::new(executor, verbose);
    kubectl.use_context(&format!("k3d-{}", cluster))?;
    kubectl.ensure_context()?;

    let namespaces = kubectl.namespaces()?;
    let default_index = namespaces.iter().position(|n| n == DEFAULT_NAMESPACE).unwrap_or(0);
    let namespace = namespaces[prompts::select(mode, "Select namespace", &namespaces, default_index)?].clone();

    let services = kubectl.services(&namespace)?;
    if services.is_empty() {
        return Err(DevError::NoServices(namespace));
    }
    let names: Vec<String> = services.iter().map(|s| s.name.clone()).collect();
    let service = &services[prompts::select(mode, "Select service to intercept", &names, 0)?];
    log_info!("Service '{}' found in namespace '{}'", service.name, namespace);

    let port = match service.ports.as_slice() {
        [] => return Err(DevError::NoPorts),
        [only] => {
            log_info!("Using Kubernetes port: {}", only.label());
            only
        }
        ports => {
            let labels: Vec<String> = ports.iter().map(|p| p.label()).collect();
            &ports[prompts::select(mode, "Select Kubernetes port to intercept", &labels, 0)?]
        }
    };

    let local = prompts::input(
        mode,
        "Enter local target port to forward traffic",
        &port.port.to_string(),
        |value| parse_port(value).map(|_| ()),
    )?;
    let local = parse_port(&local).map_err(DevError::Validation)?;

    let flags = InterceptFlags {
        port: local as u32,
        namespace,
        remote_port: Some(port.name.clone()),
        ..Default::default()
    };
    Ok(Some((service.name.clone(), flags)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::libs::executor::{CommandResult, MockCommandExecutor};

    fn recording(log: Arc<Mutex<Vec<String>>>, status: &'static str) -> MockCommandExecutor {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().returning(move |o| {
            log.lock().unwrap().push(o.command_line());
            let stdout = if o.args.first().map(String::as_str) == Some("status") {
                status.to_string()
            } else if o.args.iter().any(|a| a == "current-context") {
                "k3d-dev".to_string()
            } else {
                String::new()
            };
            Ok(CommandResult {
                stdout,
                ..Default::default()
            })
        });
        executor
    }

    #[test]
    fn intercept_command_line() {
        let flags = InterceptFlags {
            port: 3000,
            env_file: Some(".env".into()),
            global: true,
            header: vec!["x-dev=me".into()],
            replace: true,
            remote_port: Some("http".into()),
            ..Default::default()
        };
        assert_eq!(
            intercept_args("api", &flags).join(" "),
            "intercept api --port 3000:http --mount=false --env-file .env --global --http-header x-dev=me --replace"
        );
    }

    #[test]
    fn status_namespace_falls_back_to_default() {
        assert_eq!(namespace_from_status(r#"{"user_daemon":{"namespace":"prod"}}"#), "prod");
        assert_eq!(namespace_from_status(r#"{"user_daemon":{"namespace":""}}"#), "default");
        assert_eq!(namespace_from_status(r#"{"user_daemon":{"namespace":"null"}}"#), "default");
        assert_eq!(namespace_from_status("not json"), "default");
    }

    #[test]
    fn switching_namespace_quits_and_reconnects() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let executor = recording(log.clone(), r#"{"user_daemon":{"namespace":"default"}}"#);
        let service = InterceptService::new(Arc::new(executor), false, CancelToken::new());
        assert_eq!(service.ensure_namespace("openframe").unwrap(), "default");
        let calls = log.lock().unwrap();
        assert_eq!(calls[1], "telepresence quit");
        assert_eq!(calls[2], "telepresence connect --namespace openframe");
    }

    #[test]
    fn teardown_restores_and_ignores_failures() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = log.clone();
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().returning(move |o| {
            calls.lock().unwrap().push(o.command_line());
            Err(ExecError::Failed {
                command: o.command_line(),
                result: CommandResult {
                    exit_code: 1,
                    ..Default::default()
                },
            })
        });
        let service = InterceptService::new(Arc::new(executor), false, CancelToken::new());
        service.teardown(&ActiveIntercept {
            service: "api".into(),
            namespace: "openframe".into(),
            original_namespace: "default".into(),
        });
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "telepresence leave api",
                "telepresence quit",
                "telepresence connect --namespace default"
            ]
        );
    }

    #[test]
    fn cancelled_session_tears_down() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let executor = recording(log.clone(), r#"{"user_daemon":{"namespace":"default"}}"#);
        let token = CancelToken::new();
        let service = InterceptService::new(Arc::new(executor), false, token.clone())
            .with_settle_delay(Duration::from_millis(10));

        let canceller = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            canceller.cancel();
        });
        service.start("api", &InterceptFlags::default()).unwrap();

        let calls = log.lock().unwrap();
        assert!(calls.iter().any(|c| c.starts_with("telepresence intercept api --port 8080:8080")));
        assert_eq!(calls.last().map(String::as_str), Some("telepresence quit"));
        assert!(calls.contains(&"telepresence leave api".to_string()));
    }

    #[test]
    fn invalid_flags_fail_before_any_command() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().never();
        let service = InterceptService::new(Arc::new(executor), false, CancelToken::new());
        let flags = InterceptFlags {
            port: 0,
            ..Default::default()
        };
        let err = service.start("api", &flags).unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation failed: invalid port: 0 (must be between 1-65535)"
        );
    }
}
