// kubectl queries used by the dev workflows: context checks, namespace and
// service discovery, and the namespace lookup behind `dev scaffold`.

use std::sync::Arc;

use crate::libs::executor::{CommandExecutor, ExecutorExt};
use crate::libs::intercept::DevError;
use crate::schemas::dev::{KubeServiceList, ServiceInfo};
use crate::{log_debug, log_error, log_info};

const NAMESPACES_JSONPATH: &str = "jsonpath={.items[*].metadata.name}";
const DEPLOYMENTS_JSONPATH: &str =
    "jsonpath={range .items[*]}{.metadata.namespace}{\"\\t\"}{.metadata.name}{\"\\n\"}{end}";

pub struct Kubectl {
    executor: Arc<dyn CommandExecutor>,
    verbose: bool,
}

impl Kubectl {
    pub fn new(executor: Arc<dyn CommandExecutor>, verbose: bool) -> Self {
        Self { executor, verbose }
    }

    /// The active context. Missing binaries and unset contexts get their own
    /// errors so the user sees what to fix.
    pub fn current_context(&self) -> Result<String, DevError> {
        let result = self
            .executor
            .execute("kubectl", &["config", "current-context"])
            .map_err(|e| {
                if e.is_not_found() {
                    log_error!("kubectl not found. Please install kubectl to use intercept functionality.");
                    return DevError::KubectlNotFound;
                }
                let stderr = e.stderr();
                if stderr.contains("current-context is not set") || stderr.contains("no current context") {
                    log_error!("{}", NO_CONTEXT_HINT);
                    return DevError::NoContext;
                }
                DevError::Context { source: e }
            })?;

        let context = result.stdout.trim().to_string();
        if context.is_empty() {
            log_error!("{}", NO_CONTEXT_HINT);
            return Err(DevError::NoContext);
        }
        if self.verbose {
            log_info!("Using kubectl context: {}", context);
        }
        Ok(context)
    }

    /// `kubectl cluster-info` against the current context.
    pub fn check_connection(&self, context: &str) -> Result<(), DevError> {
        self.executor
            .execute("kubectl", &["cluster-info"])
            .map_err(|source| {
                log_error!(
                    "Cannot connect to Kubernetes cluster '{}'. Please check your cluster connection.",
                    context
                );
                DevError::ClusterUnreachable { source }
            })?;
        Ok(())
    }

    /// Current context plus a reachability check.
    pub fn ensure_context(&self) -> Result<String, DevError> {
        let context = self.current_context()?;
        self.check_connection(&context)?;
        Ok(context)
    }

    pub fn use_context(&self, context: &str) -> Result<(), DevError> {
        if self.verbose {
            log_info!("Setting kubectl context to: {}", context);
        }
        self.executor
            .execute("kubectl", &["config", "use-context", context])
            .map_err(|source| DevError::SwitchContext {
                context: context.to_string(),
                source,
            })?;
        Ok(())
    }

    pub fn namespaces(&self) -> Result<Vec<String>, DevError> {
        let result = self
            .executor
            .execute("kubectl", &["get", "namespaces", "-o", NAMESPACES_JSONPATH])
            .map_err(|source| DevError::Namespaces { source })?;
        let mut namespaces: Vec<String> = result.stdout.split_whitespace().map(str::to_string).collect();
        namespaces.sort();
        Ok(namespaces)
    }

    /// Services of `namespace` from `kubectl get services -o json`.
    pub fn services(&self, namespace: &str) -> Result<Vec<ServiceInfo>, DevError> {
        let result = self
            .executor
            .execute("kubectl", &["get", "services", "-n", namespace, "-o", "json"])
            .map_err(|source| DevError::Services {
                namespace: namespace.to_string(),
                source,
            })?;
        parse_services(&result.stdout, namespace)
    }

    /// Namespace of the deployment called `name`, if any.
    pub fn find_resource_namespace(&self, name: &str) -> Option<String> {
        let result = match self
            .executor
            .execute("kubectl", &["get", "deployments", "-A", "-o", DEPLOYMENTS_JSONPATH])
        {
            Ok(result) => result,
            Err(e) => {
                log_debug!("[Kubectl] deployment lookup failed: {}", e);
                return None;
            }
        };
        find_namespace_for(&result.stdout, name)
    }
}

const NO_CONTEXT_HINT: &str =
    "No active kubectl context found. Please set a context with: kubectl config use-context <context-name>";

/// Parses a service list, filling the namespace in when kubectl omits it.
pub fn parse_services(json: &str, namespace: &str) -> Result<Vec<ServiceInfo>, DevError> {
    let list: KubeServiceList = serde_json::from_str(json).map_err(DevError::Parse)?;
    Ok(list
        .items
        .into_iter()
        .map(|item| {
            let mut info = ServiceInfo::from(item);
            if info.namespace.is_empty() {
                info.namespace = namespace.to_string();
            }
            info
        })
        .collect())
}

/// Picks the namespace from `namespace<TAB>name` lines: an exact name match
/// first, then a deployment whose name starts with `name`.
pub fn find_namespace_for(lines: &str, name: &str) -> Option<String> {
    let entries: Vec<(&str, &str)> = lines
        .lines()
        .filter_map(|line| line.trim().split_once('\t'))
        .collect();
    entries
        .iter()
        .find(|(_, deployment)| *deployment == name)
        .or_else(|| entries.iter().find(|(_, deployment)| deployment.starts_with(name)))
        .map(|(namespace, _)| namespace.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::executor::{CommandResult, MockCommandExecutor};

    const SERVICES: &str = r#"{"items":[
        {"metadata":{"name":"openframe-api","namespace":"openframe"},
         "spec":{"type":"ClusterIP","ports":[{"name":"http","port":8080,"targetPort":"http","protocol":"TCP"},{"port":9090,"targetPort":9090}]}},
        {"metadata":{"name":"bare"},"spec":{}}
    ]}"#;

    #[test]
    fn services_are_parsed_with_port_labels() {
        let services = parse_services(SERVICES, "openframe").unwrap();
        assert_eq!(services.len(), 2);
        let labels: Vec<String> = services[0].ports.iter().map(|p| p.label()).collect();
        assert_eq!(labels, vec!["8080 (http)", "9090"]);
        assert_eq!(services[0].ports[1].protocol, "TCP");
        assert_eq!(services[1].namespace, "openframe");
        assert!(services[1].ports.is_empty());
    }

    #[test]
    fn garbage_service_json_is_a_parse_error() {
        assert!(matches!(parse_services("nope", "default"), Err(DevError::Parse(_))));
    }

    #[test]
    fn namespace_lookup_prefers_exact_match() {
        let lines = "tools\topenframe-api-worker\nopenframe\topenframe-api\n";
        assert_eq!(find_namespace_for(lines, "openframe-api").as_deref(), Some("openframe"));
        assert_eq!(find_namespace_for(lines, "openframe").as_deref(), Some("tools"));
        assert_eq!(find_namespace_for(lines, "missing"), None);
    }

    #[test]
    fn empty_context_is_reported() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute_with_options()
            .returning(|_| Ok(CommandResult::default()));
        let err = Kubectl::new(Arc::new(executor), false).current_context().unwrap_err();
        assert_eq!(err.to_string(), "no active kubectl context");
    }

    #[test]
    fn namespaces_are_sorted() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute_with_options()
            .withf(|o| o.args[..2] == ["get", "namespaces"])
            .returning(|_| {
                Ok(CommandResult {
                    stdout: "openframe default argocd".into(),
                    ..Default::default()
                })
            });
        let namespaces = Kubectl::new(Arc::new(executor), false).namespaces().unwrap();
        assert_eq!(namespaces, vec!["argocd", "default", "openframe"]);
    }
}
