// This file contains the entry points for `openframe dev ...`: Telepresence
// intercepts and Skaffold development sessions against a local cluster.

use crate::cli::cmd_enums::{DevCommands, InterceptArgs, ScaffoldArgs};
use crate::commands::GlobalOptions;
use crate::libs::intercept::{DevError, InterceptService, interactive_setup};
use crate::libs::prerequisites::dev::ensure_intercept_prerequisites;
use crate::libs::run_mode::RunMode;
use crate::libs::scaffold::ScaffoldService;
use crate::schemas::dev::{InterceptFlags, ScaffoldFlags};
use crate::{log_debug, log_info};

pub fn run(action: DevCommands, global: &GlobalOptions) -> anyhow::Result<()> {
    let result = match action {
        DevCommands::Intercept(args) => intercept(args, global),
        DevCommands::Scaffold(args) => scaffold(args, global),
    };
    match result {
        Err(DevError::Cancelled) => {
            log_info!("Operation cancelled");
            Ok(())
        }
        other => Ok(other?),
    }
}

fn intercept(args: InterceptArgs, global: &GlobalOptions) -> Result<(), DevError> {
    log_debug!("Entered dev::intercept() function.");
    let mode = RunMode::from_flags(false);
    let executor = global.executor(false);
    ensure_intercept_prerequisites(executor.clone(), mode)?;

    let named = args.service_name.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    let (service, flags) = match named {
        Some(service) => (service, intercept_flags(&args)),
        None => match interactive_setup(executor.clone(), mode, global.verbose)? {
            Some(selection) => selection,
            None => return Ok(()),
        },
    };

    InterceptService::new(executor, global.verbose, global.cancel.clone()).start(&service, &flags)
}

fn scaffold(args: ScaffoldArgs, global: &GlobalOptions) -> Result<(), DevError> {
    log_debug!("Entered dev::scaffold() function.");
    let flags = scaffold_flags(&args);
    ScaffoldService::new(global.executor(false), RunMode::from_flags(false), global.verbose, global.cancel.clone())
        .run(args.cluster_name.as_deref(), &flags)
}

pub fn intercept_flags(args: &InterceptArgs) -> InterceptFlags {
    InterceptFlags {
        port: args.port,
        namespace: args.namespace.clone(),
        mount: args.mount.clone(),
        env_file: args.env_file.clone(),
        global: args.global,
        header: args.header.clone(),
        replace: args.replace,
        remote_port: args.remote_port.clone(),
    }
}

pub fn scaffold_flags(args: &ScaffoldArgs) -> ScaffoldFlags {
    ScaffoldFlags {
        port: Some(args.port),
        namespace: args.namespace.clone(),
        image: args.image.clone(),
        sync_local: args.sync_local.clone(),
        sync_remote: args.sync_remote.clone(),
        skip_bootstrap: args.skip_bootstrap,
        helm_values: args.helm_values.clone(),
    }
}
