// Checkers for the Kubernetes command line tools the cluster and chart
// workflows shell out to: kubectl, k3d and Helm.

use std::sync::Arc;

use super::package_manager::{binary_download, brew, choco, script};
use super::{CliTool, InstallStep};
use crate::libs::executor::CommandExecutor;
use crate::libs::utilities::platform::{Os, download_arch};

pub fn kubectl(executor: Arc<dyn CommandExecutor>) -> CliTool {
    CliTool::new(
        "kubectl",
        "kubectl",
        &["version", "--client"],
        kubectl_help,
        kubectl_plan,
        executor,
    )
}

pub fn k3d(executor: Arc<dyn CommandExecutor>) -> CliTool {
    CliTool::new("k3d", "k3d", &["version"], k3d_help, k3d_plan, executor)
}

pub fn helm(executor: Arc<dyn CommandExecutor>) -> CliTool {
    CliTool::new("Helm", "helm", &["version"], helm_help, helm_plan, executor)
}

fn kubectl_help(os: Os) -> String {
    match os {
        Os::MacOs => "kubectl: Run 'brew install kubectl' or see https://kubernetes.io/docs/tasks/tools/install-kubectl-macos/".into(),
        Os::Linux => "kubectl: Download from https://dl.k8s.io/release/stable.txt or see https://kubernetes.io/docs/tasks/tools/install-kubectl-linux/".into(),
        Os::Windows => "kubectl: Run 'choco install kubernetes-cli' or see https://kubernetes.io/docs/tasks/tools/install-kubectl-windows/".into(),
        Os::Other => "kubectl: See https://kubernetes.io/docs/tasks/tools/".into(),
    }
}

fn kubectl_plan(os: Os) -> Option<Vec<InstallStep>> {
    match os {
        Os::MacOs => Some(vec![brew("kubectl")]),
        Os::Linux => {
            let url = format!(
                "https://dl.k8s.io/release/$(curl -fsSL https://dl.k8s.io/release/stable.txt)/bin/linux/{}/kubectl",
                download_arch()
            );
            Some(vec![binary_download("kubectl", &url)])
        }
        Os::Windows => Some(vec![choco("kubernetes-cli")]),
        Os::Other => None,
    }
}

fn k3d_help(os: Os) -> String {
    match os {
        Os::MacOs => "k3d: Run 'brew install k3d' or see https://k3d.io/#installation".into(),
        Os::Windows => "k3d: Run 'choco install k3d' or see https://k3d.io/#installation".into(),
        _ => "k3d: Run 'curl -s https://raw.githubusercontent.com/k3d-io/k3d/main/install.sh | bash' or see https://k3d.io/#installation".into(),
    }
}

fn k3d_plan(os: Os) -> Option<Vec<InstallStep>> {
    match os {
        Os::MacOs => Some(vec![brew("k3d")]),
        Os::Windows => Some(vec![choco("k3d")]),
        Os::Linux | Os::Other => Some(vec![script(
            "k3d install script",
            "https://raw.githubusercontent.com/k3d-io/k3d/main/install.sh",
        )]),
    }
}

fn helm_help(os: Os) -> String {
    match os {
        Os::MacOs => "Helm: Run 'brew install helm' or see https://helm.sh/docs/intro/install/".into(),
        Os::Linux => "Helm: Run 'curl https://raw.githubusercontent.com/helm/helm/main/scripts/get-helm-3 | bash' or see https://helm.sh/docs/intro/install/".into(),
        Os::Windows => "Helm: Run 'choco install kubernetes-helm' or see https://helm.sh/docs/intro/install/".into(),
        Os::Other => "Helm: See https://helm.sh/docs/intro/install/".into(),
    }
}

fn helm_plan(os: Os) -> Option<Vec<InstallStep>> {
    match os {
        Os::MacOs => Some(vec![brew("helm")]),
        Os::Linux => Some(vec![script(
            "helm install script",
            "https://raw.githubusercontent.com/helm/helm/main/scripts/get-helm-3",
        )]),
        Os::Windows => Some(vec![choco("kubernetes-helm")]),
        Os::Other => None,
    }
}
