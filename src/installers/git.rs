// Git is a hard requirement for cloning the chart repository, but openframe
// never installs it: the install path only returns instructions.

use std::sync::Arc;

use super::{InstallError, Installability, ToolChecker};
use crate::libs::executor::{CommandExecutor, ExecutorExt};
use crate::libs::utilities::platform::{Os, detect_os};

pub struct GitChecker {
    executor: Arc<dyn CommandExecutor>,
    os: Os,
}

impl GitChecker {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            os: detect_os(),
        }
    }
}

impl ToolChecker for GitChecker {
    fn name(&self) -> String {
        "Git".to_string()
    }

    fn is_installed(&self) -> bool {
        self.executor.execute("git", &["--version"]).is_ok()
    }

    fn install_help(&self) -> String {
        match self.os {
            Os::MacOs => "Git: Run 'xcode-select --install' or 'brew install git'".into(),
            Os::Linux => "Git: Run 'sudo apt-get install git' (Debian/Ubuntu) or 'sudo dnf install git' (Fedora)".into(),
            Os::Windows => "Git: Download from https://git-scm.com/download/win".into(),
            Os::Other => "Git: See https://git-scm.com/downloads".into(),
        }
    }

    fn install(&self) -> Result<(), InstallError> {
        if self.is_installed() {
            return Ok(());
        }
        Err(InstallError::ManualOnly {
            tool: self.name(),
            instructions: self.install_help(),
        })
    }

    fn installability(&self) -> Installability {
        Installability::ManualOnly
    }
}
