// This file contains the entry point for `openframe bootstrap`: a new k3d
// cluster with ArgoCD and the app-of-apps chart installed on it.

use crate::commands::GlobalOptions;
use crate::libs::bootstrap::{BootstrapRequest, BootstrapService};
use crate::libs::run_mode::RunMode;
use crate::log_debug;

/// Runs the bootstrap workflow.
///
/// The deployment mode is validated before any executor is built, so a bad
/// `--deployment-mode` or a missing one in `--non-interactive` runs fails
/// without touching Docker or Helm.
pub fn run(
    cluster_name: Option<String>,
    deployment_mode: Option<String>,
    non_interactive: bool,
    global: &GlobalOptions,
) -> anyhow::Result<()> {
    log_debug!("Entered bootstrap::run() function.");

    let request = BootstrapRequest {
        cluster_name,
        deployment_mode,
        non_interactive,
        verbose: global.verbose,
    };
    request.validate()?;

    let mode = RunMode::from_flags(non_interactive);
    BootstrapService::new(global.executor(false), mode, global.cancel.clone()).run(&request)
}
