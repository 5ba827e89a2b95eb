//! # ArgoCD
//!
//! Reads ArgoCD `Application` resources through `kubectl` and waits for the
//! app-of-apps rollout to settle.
//!
//! ArgoCD does not publish how many applications an app-of-apps will
//! eventually produce (sync waves create them over time), so the expected
//! count is estimated through a cascade of increasingly rough methods. The
//! first method that yields a non-zero count wins; `0` means "unknown, keep
//! discovering while polling".

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::libs::cancellation::CancelToken;
use crate::libs::chart_installer::ChartError;
use crate::libs::executor::{CommandExecutor, CommandResult, ExecError, ExecOptions};
use crate::schemas::chart::{ARGOCD_NAMESPACE, Application, ChartInstallConfig};
use crate::{log_debug, log_info, log_warn};

/// Values handed to the `argo/argo-cd` chart for local clusters.
pub const ARGOCD_VALUES: &str = r#"fullnameOverride: argocd

configs:
  params:
    server.insecure: true
  cm:
    timeout.reconciliation: 60s
    resource.exclusions: |
      - apiGroups:
          - cilium.io
        kinds:
          - CiliumIdentity
        clusters:
          - "*"

controller:
  resources:
    requests:
      cpu: 250m
      memory: 512Mi

repoServer:
  resources:
    requests:
      cpu: 100m
      memory: 256Mi

server:
  service:
    type: ClusterIP

dex:
  enabled: false

notifications:
  enabled: false
"#;

const APPLICATIONS: &str = "applications.argoproj.io";
const APPLICATION_SETS: &str = "applicationsets.argoproj.io";
const APP_OF_APPS: &str = "app-of-apps";
const STATUS_JSONPATH: &str =
    "jsonpath={range .items[*]}{.metadata.name}{\"\\t\"}{.status.health.status}{\"\\t\"}{.status.sync.status}{\"\\n\"}{end}";
const NAMES_JSONPATH: &str = "jsonpath={range .items[*]}{.metadata.name}{\"\\n\"}{end}";

/// Applications generated per ApplicationSet when nothing better is known.
/// A rough guess kept for compatibility with the existing install flow.
const APPS_PER_APPLICATION_SET: usize = 7;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_WAIT_BUDGET: Duration = Duration::from_secs(60 * 60);
/// Polls between two attempts at estimating the expected count while it is unknown.
const ESTIMATE_EVERY: u32 = 10;

pub struct ArgoCd {
    executor: Arc<dyn CommandExecutor>,
    verbose: bool,
    poll_interval: Duration,
    budget: Duration,
}

impl ArgoCd {
    pub fn new(executor: Arc<dyn CommandExecutor>, verbose: bool) -> Self {
        Self {
            executor,
            verbose,
            poll_interval: DEFAULT_POLL_INTERVAL,
            budget: DEFAULT_WAIT_BUDGET,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    fn kubectl(&self, args: &[&str], cancel: Option<&CancelToken>) -> Result<CommandResult, ExecError> {
        let mut full = vec!["-n", ARGOCD_NAMESPACE];
        full.extend_from_slice(args);
        let mut options = ExecOptions::new("kubectl", full);
        if let Some(token) = cancel {
            options = options.cancel(token);
        }
        self.executor.execute_with_options(&options)
    }

    /// Current applications with their health and sync status.
    ///
    /// Never fails: when `kubectl` can't answer (CRD not installed yet,
    /// cluster unreachable) the list is empty.
    pub fn parse_applications(&self) -> Vec<Application> {
        self.applications(None)
    }

    fn applications(&self, cancel: Option<&CancelToken>) -> Vec<Application> {
        match self.kubectl(&["get", APPLICATIONS, "-o", STATUS_JSONPATH], cancel) {
            Ok(result) => parse_application_lines(&result.stdout),
            Err(e) => {
                if self.verbose {
                    log_warn!("kubectl jsonpath failed: {}", e);
                }
                Vec::new()
            }
        }
    }

    /// Best-effort estimate of how many applications the app-of-apps will
    /// create. Returns `0` when every method comes up empty.
    pub fn get_total_expected_applications(&self, cancel: &CancelToken) -> usize {
        let stdout = |args: &[&str]| -> Option<String> {
            self.kubectl(args, Some(cancel))
                .ok()
                .map(|r| r.stdout)
                .filter(|s| !s.trim().is_empty())
        };

        // 1. Application names listed in the umbrella's status.
        if let Some(out) = stdout(&[
            "get",
            APPLICATIONS,
            APP_OF_APPS,
            "-o",
            "jsonpath={.status.resources[?(@.kind=='Application')].name}",
        ]) {
            let count = out.split_whitespace().count();
            if count > 0 {
                log_debug!("[ArgoCD] {} applications planned by app-of-apps", count);
                return count;
            }
        }

        if let Some(source) = stdout(&["get", APPLICATIONS, APP_OF_APPS, "-o", "jsonpath={.spec.source}"]) {
            log_debug!("[ArgoCD] app-of-apps source: {}", source.trim());
        }

        // 2. Every `kind:name` resource line of the umbrella's status.
        if let Some(out) = stdout(&[
            "get",
            APPLICATIONS,
            APP_OF_APPS,
            "-o",
            "jsonpath={range .status.resources[*]}{.kind}{\":\"}{.name}{\"\\n\"}{end}",
        ]) {
            let count = count_application_resources(&out);
            if count > 0 {
                log_debug!("[ArgoCD] {} Application resources in app-of-apps status", count);
                return count;
            }
        }

        // 3. The argocd CLI inside the server pod.
        if let Some(pod) = stdout(&[
            "get",
            "pod",
            "-l",
            "app.kubernetes.io/name=argocd-server",
            "-o",
            "jsonpath={.items[0].metadata.name}",
        ]) {
            let pod = pod.trim().to_string();
            if let Some(out) = stdout(&["exec", pod.as_str(), "--", "argocd", "app", "list", "-o", "name"]) {
                let count = count_names(&out, Some(APP_OF_APPS));
                if count > 0 {
                    log_debug!("[ArgoCD] {} applications via argocd CLI", count);
                    return count;
                }
            }
        }

        // 4. Whatever Applications exist right now.
        if let Some(out) = stdout(&["get", APPLICATIONS, "-o", NAMES_JSONPATH]) {
            let count = count_names(&out, None);
            if count > 0 {
                log_debug!("[ArgoCD] {} ArgoCD applications exist", count);
                return count;
            }
        }

        // 5. Pattern count over the umbrella release's values.
        let values = self
            .executor
            .execute_with_options(
                &ExecOptions::new("helm", ["get", "values", APP_OF_APPS, "-n", ARGOCD_NAMESPACE]).cancel(cancel),
            )
            .ok()
            .map(|r| r.stdout)
            .unwrap_or_default();
        let count = estimate_from_values(&values);
        if count > 0 {
            log_debug!("[ArgoCD] estimated {} applications from helm values", count);
            return count;
        }

        // 6. ApplicationSets times a fixed guess.
        if let Some(out) = stdout(&["get", APPLICATION_SETS, "-o", NAMES_JSONPATH]) {
            let sets = count_names(&out, None);
            if sets > 0 {
                let estimate = sets * APPS_PER_APPLICATION_SET;
                log_debug!("[ArgoCD] estimated {} applications from {} ApplicationSets", estimate, sets);
                return estimate;
            }
        }

        log_debug!("[ArgoCD] expected application count unknown, discovering while polling");
        0
    }

    /// Polls until every application is Healthy and Synced and at least the
    /// expected number exists.
    ///
    /// Dry-run returns at once without touching the cluster. Cancellation
    /// ends the wait promptly with [`ChartError::Cancelled`]; running out of
    /// budget is [`ChartError::WaitTimedOut`].
    pub fn wait_for_applications(
        &self,
        config: &ChartInstallConfig,
        cancel: &CancelToken,
    ) -> Result<(), ChartError> {
        if config.dry_run {
            log_debug!("[ArgoCD] dry-run, not waiting for applications");
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(ChartError::Cancelled);
        }

        log_info!("Waiting for ArgoCD applications to become Healthy and Synced...");
        let started = Instant::now();
        let mut expected = self.get_total_expected_applications(cancel);
        let mut last_progress = String::new();
        let mut polls: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ChartError::Cancelled);
            }

            let apps = self.applications(Some(cancel));
            if expected == 0 && polls % ESTIMATE_EVERY == ESTIMATE_EVERY - 1 {
                expected = self.get_total_expected_applications(cancel);
            }

            let healthy = apps.iter().filter(|a| a.is_healthy()).count();
            let synced = apps.iter().filter(|a| a.is_synced()).count();
            let total = expected.max(apps.len());
            let progress = format!("{}/{}/{}", healthy, synced, total);
            if progress != last_progress {
                log_info!("Applications healthy/synced/expected: {}", progress);
                if self.verbose {
                    for app in apps.iter().filter(|a| !a.is_healthy() || !a.is_synced()) {
                        log_debug!("[ArgoCD] waiting on {} ({}, {})", app.name, app.health, app.sync);
                    }
                }
                last_progress = progress;
            }

            if rollout_complete(&apps, expected) {
                log_info!("All {} ArgoCD applications are Healthy and Synced", apps.len());
                return Ok(());
            }

            if started.elapsed() >= self.budget {
                return Err(ChartError::WaitTimedOut(self.budget));
            }
            if !cancel.sleep(self.poll_interval) {
                return Err(ChartError::Cancelled);
            }
            polls = polls.wrapping_add(1);
        }
    }
}

/// Parses `name\thealth\tsync` lines. Lines with fewer than three fields are
/// skipped; blank health or sync becomes `Unknown`.
pub fn parse_application_lines(stdout: &str) -> Vec<Application> {
    let unknown = |s: &str| {
        let s = s.trim();
        if s.is_empty() { "Unknown".to_string() } else { s.to_string() }
    };
    stdout
        .trim()
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 3 {
                return None;
            }
            Some(Application {
                name: parts[0].trim().to_string(),
                health: unknown(parts[1]),
                sync: unknown(parts[2]),
            })
        })
        .collect()
}

/// Done once something exists, all of it is Healthy and Synced, and nothing
/// expected is still missing.
pub fn rollout_complete(apps: &[Application], expected: usize) -> bool {
    !apps.is_empty()
        && apps.len() >= expected
        && apps.iter().all(|a| a.is_healthy() && a.is_synced())
}

fn count_application_resources(lines: &str) -> usize {
    lines
        .trim()
        .lines()
        .filter(|l| l.starts_with("Application:"))
        .count()
}

fn count_names(lines: &str, exclude: Option<&str>) -> usize {
    lines
        .lines()
        .map(str::trim)
        .filter(|n| !n.is_empty() && Some(*n) != exclude)
        .count()
}

/// Largest count among `repoURL:`, `targetRevision:` and `- name:`.
pub fn estimate_from_values(values: &str) -> usize {
    ["repoURL:", "targetRevision:", "- name:"]
        .iter()
        .map(|pattern| values.matches(pattern).count())
        .max()
        .unwrap_or(0)
}
