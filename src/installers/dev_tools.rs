// Checkers for the developer inner-loop tools: Telepresence (intercepts),
// jq (output processing in intercept scripts) and Skaffold (live reload).

use std::sync::Arc;

use super::package_manager::{apt, binary_download, brew, choco};
use super::{CliTool, InstallStep};
use crate::libs::executor::CommandExecutor;
use crate::libs::utilities::platform::{Os, download_arch};

pub fn telepresence(executor: Arc<dyn CommandExecutor>) -> CliTool {
    CliTool::new(
        "telepresence",
        "telepresence",
        &["version"],
        telepresence_help,
        telepresence_plan,
        executor,
    )
}

pub fn jq(executor: Arc<dyn CommandExecutor>) -> CliTool {
    CliTool::new("jq", "jq", &["--version"], jq_help, jq_plan, executor)
}

pub fn skaffold(executor: Arc<dyn CommandExecutor>) -> CliTool {
    CliTool::new(
        "skaffold",
        "skaffold",
        &["version"],
        skaffold_help,
        skaffold_plan,
        executor,
    )
}

fn telepresence_help(os: Os) -> String {
    match os {
        Os::MacOs => "telepresence: Run 'brew install datawire/blackbird/telepresence' or see https://www.telepresence.io/docs/latest/install/".into(),
        _ => "telepresence: See https://www.telepresence.io/docs/latest/install/".into(),
    }
}

fn telepresence_plan(os: Os) -> Option<Vec<InstallStep>> {
    match os {
        Os::MacOs => Some(vec![brew("datawire/blackbird/telepresence")]),
        Os::Linux => Some(vec![binary_download(
            "telepresence",
            &format!(
                "https://github.com/telepresenceio/telepresence/releases/latest/download/telepresence-linux-{}",
                download_arch()
            ),
        )]),
        _ => None,
    }
}

fn jq_help(os: Os) -> String {
    match os {
        Os::MacOs => "jq: Run 'brew install jq'".into(),
        Os::Linux => "jq: Run 'sudo apt-get install jq' (Debian/Ubuntu) or 'sudo dnf install jq' (Fedora)".into(),
        Os::Windows => "jq: Run 'choco install jq'".into(),
        Os::Other => "jq: See https://jqlang.github.io/jq/download/".into(),
    }
}

fn jq_plan(os: Os) -> Option<Vec<InstallStep>> {
    match os {
        Os::MacOs => Some(vec![brew("jq")]),
        Os::Linux => Some(vec![apt("jq")]),
        Os::Windows => Some(vec![choco("jq")]),
        Os::Other => None,
    }
}

fn skaffold_help(os: Os) -> String {
    match os {
        Os::MacOs => "skaffold: Run 'brew install skaffold' or see https://skaffold.dev/docs/install/".into(),
        Os::Windows => "skaffold: Run 'choco install skaffold' or see https://skaffold.dev/docs/install/".into(),
        _ => "skaffold: See https://skaffold.dev/docs/install/".into(),
    }
}

fn skaffold_plan(os: Os) -> Option<Vec<InstallStep>> {
    match os {
        Os::MacOs => Some(vec![brew("skaffold")]),
        Os::Linux => Some(vec![binary_download(
            "skaffold",
            &format!(
                "https://storage.googleapis.com/skaffold/releases/latest/skaffold-linux-{}",
                download_arch()
            ),
        )]),
        Os::Windows => Some(vec![choco("skaffold")]),
        Os::Other => None,
    }
}
