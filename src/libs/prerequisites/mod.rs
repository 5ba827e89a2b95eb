// This module drives the "detect, confirm, install, re-verify" flow shared by
// every workflow that needs external tools. A `PrerequisiteSet` is just an
// ordered list of `ToolChecker`s; the cluster, chart and dev sets in the
// submodules only differ in which checkers they declare.
//
// Flow:
// - check every tool in declaration order and collect the missing ones
// - warning-only tools (memory) are reported and never installed
// - tools that are skipped without a terminal (certificates) drop out in
//   non-interactive mode
// - ask for confirmation (auto-confirmed in non-interactive mode)
// - install sequentially, one progress line per tool
// - check everything again; the install result alone is not trusted

use colored::Colorize;

use crate::installers::{InstallError, Installability, ToolChecker};
use crate::libs::display;
use crate::libs::prompts::{self, PromptError};
use crate::libs::run_mode::RunMode;
use crate::{log_debug, log_info, log_warn};

/// Docker, kubectl and k3d for cluster lifecycle commands.
pub mod cluster;
/// Git, Helm, memory and certificates for chart installation.
pub mod chart;
/// Telepresence, jq and Skaffold for the developer loop.
pub mod dev;

#[derive(Debug, thiserror::Error)]
pub enum PrerequisiteError {
    #[error("required tools are not installed: {}", .missing.join(", "))]
    Declined { missing: Vec<String> },

    #[error("failed to install {tool}: {source}")]
    InstallFailed {
        tool: String,
        #[source]
        source: InstallError,
    },

    #[error("installation completed but some tools are still missing: {}", .0.join(", "))]
    StillMissing(Vec<String>),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("No clusters found. Create a cluster first with: openframe cluster create")]
    NoClusters,
}

/// Answers the install question for the listed tools in interactive mode.
type ConfirmFn = Box<dyn Fn(&[String]) -> Result<bool, PromptError> + Send + Sync>;

/// An ordered list of tools a workflow depends on.
pub struct PrerequisiteSet {
    tools: Vec<Box<dyn ToolChecker>>,
    mode: RunMode,
    confirm: Option<ConfirmFn>,
}

impl PrerequisiteSet {
    pub fn new(mode: RunMode) -> Self {
        Self {
            tools: Vec::new(),
            mode,
            confirm: None,
        }
    }

    pub fn with_tool(mut self, tool: Box<dyn ToolChecker>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Replaces the terminal prompt that asks before installing.
    pub fn with_confirm<F>(mut self, confirm: F) -> Self
    where
        F: Fn(&[String]) -> Result<bool, PromptError> + Send + Sync + 'static,
    {
        self.confirm = Some(Box::new(confirm));
        self
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// `(true, [])` when every check succeeds, otherwise `(false, names)` with
    /// the missing tools in declaration order.
    pub fn check_all(&self) -> (bool, Vec<String>) {
        let missing: Vec<String> = self
            .tools
            .iter()
            .filter(|t| !t.is_installed())
            .map(|t| t.name())
            .collect();
        (missing.is_empty(), missing)
    }

    /// Install help for every missing tool, `"<Tool>: <instructions>"`.
    pub fn install_instructions(&self) -> Vec<String> {
        self.tools
            .iter()
            .filter(|t| !t.is_installed())
            .map(|t| t.install_help())
            .collect()
    }

    /// Runs the whole flow. `Ok(())` means the workflow may proceed.
    pub fn ensure(&self) -> Result<(), PrerequisiteError> {
        let missing: Vec<&dyn ToolChecker> = self
            .tools
            .iter()
            .map(|t| t.as_ref())
            .filter(|t| !t.is_installed())
            .collect();

        if missing.is_empty() {
            log_debug!("[Prerequisites] all of {:?} present", self.tool_names());
            return Ok(());
        }

        let mut installable = Vec::new();
        for tool in missing {
            match tool.installability() {
                Installability::WarningOnly => log_warn!("{}", tool.install_help()),
                Installability::SkipWhenNonInteractive if self.mode.is_non_interactive() => {
                    log_info!("Skipping {} (non-interactive mode)", tool.name());
                }
                _ => installable.push(tool),
            }
        }
        if installable.is_empty() {
            return Ok(());
        }

        let names: Vec<String> = installable.iter().map(|t| t.name()).collect();
        log_warn!("Missing Prerequisites: {}", names.join(", "));

        let confirmed = if self.mode.is_interactive() {
            self.ask_to_install(&names)?
        } else {
            log_info!("Auto-installing prerequisites (non-interactive mode)...");
            true
        };

        if !confirmed {
            let help: Vec<String> = installable.iter().map(|t| t.install_help()).collect();
            display::print_manual_instructions(&help);
            return Err(PrerequisiteError::Declined { missing: names });
        }

        self.install_in_order(&installable)?;
        self.verify(&installable)
    }

    fn ask_to_install(&self, names: &[String]) -> Result<bool, PromptError> {
        match &self.confirm {
            Some(confirm) => confirm(names),
            None => prompts::confirm(
                self.mode,
                "Would you like me to install them automatically?",
                true,
            ),
        }
    }

    fn install_in_order(&self, tools: &[&dyn ToolChecker]) -> Result<(), PrerequisiteError> {
        let total = tools.len();
        for (index, tool) in tools.iter().enumerate() {
            let name = tool.name();
            log_info!("[{}/{}] Installing {}...", index + 1, total, name.cyan());
            match tool.install() {
                Ok(()) => log_info!("{} installed successfully", name),
                Err(source) if self.mode.is_interactive() => {
                    return Err(PrerequisiteError::InstallFailed { tool: name, source });
                }
                Err(source) => log_warn!("failed to install {}: {}", name, source),
            }
        }
        Ok(())
    }

    fn verify(&self, tools: &[&dyn ToolChecker]) -> Result<(), PrerequisiteError> {
        let still_missing: Vec<String> = tools
            .iter()
            .filter(|t| !t.is_installed())
            .map(|t| t.name())
            .collect();

        if still_missing.is_empty() {
            log_info!("All prerequisites installed successfully!");
            return Ok(());
        }

        let err = PrerequisiteError::StillMissing(still_missing);
        if self.mode.is_interactive() {
            return Err(err);
        }
        log_warn!("{}", err);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installers::MockToolChecker;

    fn tool(name: &'static str, installed: bool, installability: Installability) -> MockToolChecker {
        let mut mock = MockToolChecker::new();
        mock.expect_name().return_const(name.to_string());
        mock.expect_is_installed().return_const(installed);
        mock.expect_installability().return_const(installability);
        mock.expect_install_help()
            .return_const(format!("{}: install it", name));
        mock
    }

    /// Missing on the first check, present after `install` ran.
    fn installs_cleanly(name: &'static str) -> MockToolChecker {
        let mut mock = MockToolChecker::new();
        mock.expect_name().return_const(name.to_string());
        mock.expect_installability().return_const(Installability::Automatic);
        mock.expect_install_help().return_const(format!("{}: install it", name));
        mock.expect_is_installed().returning({
            let mut calls = 0;
            move || {
                calls += 1;
                calls > 1
            }
        });
        mock.expect_install().times(1).returning(|| Ok(()));
        mock
    }

    #[test]
    fn check_all_keeps_declaration_order() {
        let set = PrerequisiteSet::new(RunMode::Test)
            .with_tool(Box::new(tool("Docker", false, Installability::Automatic)))
            .with_tool(Box::new(tool("kubectl", true, Installability::Automatic)))
            .with_tool(Box::new(tool("k3d", false, Installability::Automatic)));

        assert_eq!(
            set.check_all(),
            (false, vec!["Docker".to_string(), "k3d".to_string()])
        );
    }

    #[test]
    fn check_all_passes_when_everything_is_present() {
        let set = PrerequisiteSet::new(RunMode::Test)
            .with_tool(Box::new(tool("Helm", true, Installability::Automatic)));
        assert_eq!(set.check_all(), (true, vec![]));
    }

    #[test]
    fn nothing_is_installed_when_all_present() {
        let mut helm = tool("Helm", true, Installability::Automatic);
        helm.expect_install().never();
        let set = PrerequisiteSet::new(RunMode::Interactive).with_tool(Box::new(helm));
        assert!(set.ensure().is_ok());
    }

    #[test]
    fn non_interactive_installs_and_reverifies() {
        let set = PrerequisiteSet::new(RunMode::NonInteractive)
            .with_tool(Box::new(installs_cleanly("telepresence")))
            .with_tool(Box::new(installs_cleanly("jq")));
        assert!(set.ensure().is_ok());
    }

    #[test]
    fn warning_only_tools_never_install_or_block() {
        let mut memory = tool("Memory", false, Installability::WarningOnly);
        memory.expect_install().never();
        let set = PrerequisiteSet::new(RunMode::Interactive).with_tool(Box::new(memory));
        assert!(set.ensure().is_ok());
    }

    #[test]
    fn certificates_are_skipped_without_a_terminal() {
        let mut certs = tool("Certificates", false, Installability::SkipWhenNonInteractive);
        certs.expect_install().never();
        let set = PrerequisiteSet::new(RunMode::NonInteractive).with_tool(Box::new(certs));
        assert!(set.ensure().is_ok());
    }

    #[test]
    fn non_interactive_failure_continues_with_next_tool() {
        let mut git = tool("Git", false, Installability::ManualOnly);
        git.expect_install().times(1).returning(|| {
            Err(InstallError::ManualOnly {
                tool: "Git".into(),
                instructions: "Git: see docs".into(),
            })
        });
        let set = PrerequisiteSet::new(RunMode::NonInteractive)
            .with_tool(Box::new(git))
            .with_tool(Box::new(installs_cleanly("Helm")));

        // still missing Git, but non-interactive runs only warn
        assert!(set.ensure().is_ok());
    }

    #[test]
    fn still_missing_after_install_is_reported() {
        let mut kubectl = tool("kubectl", false, Installability::Automatic);
        kubectl.expect_install().times(1).returning(|| Ok(()));
        let set = PrerequisiteSet::new(RunMode::NonInteractive).with_tool(Box::new(kubectl));
        assert!(set.ensure().is_ok());

        let (ok, missing) = set.check_all();
        assert!(!ok);
        assert_eq!(missing, vec!["kubectl".to_string()]);
    }

    #[test]
    fn interactive_failure_stops_remaining_installs() {
        let mut git = tool("Git", false, Installability::ManualOnly);
        git.expect_install().times(1).returning(|| {
            Err(InstallError::ManualOnly {
                tool: "Git".into(),
                instructions: "Git: see docs".into(),
            })
        });
        let mut helm = tool("Helm", false, Installability::Automatic);
        helm.expect_install().never();
        let set = PrerequisiteSet::new(RunMode::Interactive)
            .with_tool(Box::new(git))
            .with_tool(Box::new(helm))
            .with_confirm(|_| Ok(true));

        match set.ensure() {
            Err(PrerequisiteError::InstallFailed { tool, .. }) => assert_eq!(tool, "Git"),
            other => panic!("expected InstallFailed, got {:?}", other),
        }
    }

    #[test]
    fn interactive_still_missing_is_an_error() {
        let mut kubectl = tool("kubectl", false, Installability::Automatic);
        kubectl.expect_install().times(1).returning(|| Ok(()));
        let set = PrerequisiteSet::new(RunMode::Interactive)
            .with_tool(Box::new(kubectl))
            .with_confirm(|_| Ok(true));

        match set.ensure() {
            Err(PrerequisiteError::StillMissing(missing)) => {
                assert_eq!(missing, vec!["kubectl".to_string()])
            }
            other => panic!("expected StillMissing, got {:?}", other),
        }
    }

    #[test]
    fn declining_returns_missing_names_without_installing() {
        let mut docker = tool("Docker", false, Installability::Automatic);
        docker.expect_install().never();
        let mut k3d = tool("k3d", false, Installability::Automatic);
        k3d.expect_install().never();
        let asked = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = asked.clone();
        let set = PrerequisiteSet::new(RunMode::Interactive)
            .with_tool(Box::new(docker))
            .with_tool(Box::new(k3d))
            .with_confirm(move |names| {
                seen.lock().unwrap().extend_from_slice(names);
                Ok(false)
            });

        match set.ensure() {
            Err(PrerequisiteError::Declined { missing }) => {
                assert_eq!(missing, vec!["Docker".to_string(), "k3d".to_string()])
            }
            other => panic!("expected Declined, got {:?}", other),
        }
        assert_eq!(*asked.lock().unwrap(), vec!["Docker".to_string(), "k3d".to_string()]);
    }

    #[test]
    fn interactive_install_passes_after_confirmation() {
        let set = PrerequisiteSet::new(RunMode::Interactive)
            .with_tool(Box::new(installs_cleanly("Skaffold")))
            .with_confirm(|_| Ok(true));
        assert!(set.ensure().is_ok());
    }

    #[test]
    fn still_missing_message_lists_tools() {
        let err = PrerequisiteError::StillMissing(vec!["k3d".into(), "Helm".into()]);
        assert_eq!(
            err.to_string(),
            "installation completed but some tools are still missing: k3d, Helm"
        );
    }
}
