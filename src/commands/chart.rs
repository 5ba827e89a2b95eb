// This file contains the entry point for `openframe chart install`.

use std::str::FromStr;

use anyhow::Context;

use crate::cli::cmd_enums::{ChartCommands, ChartInstallArgs};
use crate::cli::type_enums::DeploymentMode;
use crate::commands::GlobalOptions;
use crate::libs::chart_installer::{ChartError, ChartInstaller, InstallRequest};
use crate::libs::run_mode::RunMode;
use crate::schemas::chart::InstallFlags;
use crate::log_debug;

pub fn run(action: ChartCommands, global: &GlobalOptions) -> anyhow::Result<()> {
    match action {
        ChartCommands::Install(args) => install(args, global),
    }
}

/// Installs ArgoCD and the app-of-apps chart.
///
/// With `--dry-run` only the Helm and Git calls are simulated; cluster
/// queries still run so the target cluster can be resolved.
fn install(args: ChartInstallArgs, global: &GlobalOptions) -> anyhow::Result<()> {
    log_debug!("Entered chart::install() function.");

    let deployment_mode = args
        .deployment_mode
        .as_deref()
        .filter(|m| !m.is_empty())
        .map(DeploymentMode::from_str)
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let flags = install_flags(&args);
    let request = InstallRequest {
        cluster: args.cluster_name.clone(),
        flags: flags.clone(),
        deployment_mode,
        non_interactive: args.non_interactive,
        verbose: global.verbose,
        silent: global.silent,
    };

    let mode = RunMode::from_flags(args.non_interactive);
    let installer = ChartInstaller::new(global.executor(flags.dry_run), mode, global.verbose, global.cancel.clone())
        .with_cluster_executor(global.executor(false));

    match installer.install(&request) {
        Ok(()) | Err(ChartError::Declined) => Ok(()),
        Err(e) => Err(e).context("failed to install charts"),
    }
}

/// The install flags carried by `chart install`.
pub fn install_flags(args: &ChartInstallArgs) -> InstallFlags {
    InstallFlags {
        force: args.force,
        dry_run: args.dry_run,
        github_repo: args.github_repo.clone(),
        github_branch: args.github_branch.clone(),
        cert_dir: args.cert_dir.clone(),
    }
}
