// This module is the hub for the per-tool checkers used by the prerequisite
// sets. Every external binary openframe depends on gets a `ToolChecker`:
// a cheap presence check, OS-aware install instructions and (when possible) an
// automatic installer built from package-manager steps.

use std::sync::Arc;

use crate::libs::executor::{CommandExecutor, ExecError, ExecOptions, ExecutorExt};
use crate::libs::utilities::platform::{Os, detect_os};
use crate::{log_debug, log_info};

/// Certificates for local ingress, generated with mkcert.
pub mod certificates;
/// Docker engine / Docker Desktop, including starting a stopped daemon.
pub mod docker;
/// Git (manual installation only).
pub mod git;
/// kubectl, k3d and Helm.
pub mod kubernetes;
/// Developer loop tools: Telepresence, jq, Skaffold.
pub mod dev_tools;
/// System memory check (warning only).
pub mod memory;
/// Install step builders for brew / apt / choco / scripts.
pub mod package_manager;

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("{tool} cannot be installed automatically. {instructions}")]
    ManualOnly { tool: String, instructions: String },

    #[error("automatic installation of {tool} is not supported on this platform")]
    UnsupportedPlatform { tool: String },

    #[error("{step}: {source}")]
    Step {
        step: String,
        #[source]
        source: ExecError,
    },

    #[error("{0}")]
    Verification(String),
}

/// How a missing requirement is handled by the prerequisite flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installability {
    /// Installed when the user agrees (or automatically in non-interactive mode).
    Automatic,
    /// Reported with instructions; `install` always fails.
    ManualOnly,
    /// Reported as a warning, never installed, never blocks.
    WarningOnly,
    /// Installed interactively; skipped entirely in non-interactive mode.
    SkipWhenNonInteractive,
}

/// The contract every prerequisite tool fulfils.
#[cfg_attr(test, mockall::automock)]
pub trait ToolChecker: Send + Sync {
    fn name(&self) -> String;
    /// Lightweight check; true only when the tool is usable right now.
    fn is_installed(&self) -> bool;
    /// `"<Tool>: <instructions>"` for the current OS. Pure, no I/O beyond
    /// what the checker already knows.
    fn install_help(&self) -> String;
    /// Installs the tool. A no-op success when it is already installed.
    fn install(&self) -> Result<(), InstallError>;
    fn installability(&self) -> Installability;
}

/// One command of an install plan.
#[derive(Debug, Clone)]
pub struct InstallStep {
    pub description: String,
    pub options: ExecOptions,
}

impl InstallStep {
    pub fn new(description: &str, command: &str, args: &[&str]) -> Self {
        Self {
            description: description.to_string(),
            options: ExecOptions::new(command, args.iter().copied()),
        }
    }

    /// A shell pipeline run with `sh -c`.
    pub fn shell(description: &str, script: &str) -> Self {
        Self::new(description, "sh", &["-c", script])
    }
}

/// Runs install steps in order, stopping at the first failure.
pub fn run_steps(executor: &dyn CommandExecutor, steps: &[InstallStep]) -> Result<(), InstallError> {
    for step in steps {
        log_debug!("[Installer] {}", step.description);
        executor
            .execute_with_options(&step.options)
            .map_err(|source| InstallError::Step {
                step: step.description.clone(),
                source,
            })?;
    }
    Ok(())
}

/// A command line tool whose presence is a `<binary> <check args>` call and
/// whose installation is a per-OS list of steps.
pub struct CliTool {
    name: &'static str,
    binary: &'static str,
    check_args: &'static [&'static str],
    help: fn(Os) -> String,
    plan: fn(Os) -> Option<Vec<InstallStep>>,
    executor: Arc<dyn CommandExecutor>,
    os: Os,
}

impl CliTool {
    pub fn new(
        name: &'static str,
        binary: &'static str,
        check_args: &'static [&'static str],
        help: fn(Os) -> String,
        plan: fn(Os) -> Option<Vec<InstallStep>>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            name,
            binary,
            check_args,
            help,
            plan,
            executor,
            os: detect_os(),
        }
    }

    /// Pins the OS used for help and install plans.
    pub fn for_os(mut self, os: Os) -> Self {
        self.os = os;
        self
    }

    /// Install plan for the configured OS (exposed for inspection).
    pub fn install_plan(&self) -> Option<Vec<InstallStep>> {
        (self.plan)(self.os)
    }
}

impl ToolChecker for CliTool {
    fn name(&self) -> String {
        self.name.to_string()
    }

    fn is_installed(&self) -> bool {
        let installed = self.executor.execute(self.binary, self.check_args).is_ok();
        log_debug!("[{}] installed: {}", self.name, installed);
        installed
    }

    fn install_help(&self) -> String {
        (self.help)(self.os)
    }

    fn install(&self) -> Result<(), InstallError> {
        if self.is_installed() {
            log_debug!("[{}] already installed, nothing to do", self.name);
            return Ok(());
        }
        let steps = self.install_plan().ok_or_else(|| InstallError::UnsupportedPlatform {
            tool: self.name.to_string(),
        })?;
        log_info!("Installing {} ({} step(s))", self.name, steps.len());
        run_steps(self.executor.as_ref(), &steps)
    }

    fn installability(&self) -> Installability {
        Installability::Automatic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::executor::{CommandResult, MockCommandExecutor};

    fn help(_: Os) -> String {
        "jq: brew install jq".to_string()
    }

    fn plan(os: Os) -> Option<Vec<InstallStep>> {
        match os {
            Os::MacOs => Some(vec![InstallStep::new("brew install jq", "brew", &["install", "jq"])]),
            _ => None,
        }
    }

    #[test]
    fn install_is_noop_when_check_succeeds() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute_with_options()
            .withf(|o| o.command == "jq")
            .times(1)
            .returning(|_| Ok(CommandResult::default()));

        let tool = CliTool::new("jq", "jq", &["--version"], help, plan, Arc::new(executor))
            .for_os(Os::MacOs);
        assert!(tool.install().is_ok());
    }

    #[test]
    fn unsupported_platform_is_reported() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().returning(|o| {
            Err(ExecError::Failed {
                command: o.command.clone(),
                result: CommandResult {
                    exit_code: 127,
                    ..Default::default()
                },
            })
        });

        let tool = CliTool::new("jq", "jq", &["--version"], help, plan, Arc::new(executor))
            .for_os(Os::Windows);
        let err = tool.install().unwrap_err();
        assert!(matches!(err, InstallError::UnsupportedPlatform { .. }));
    }
}
