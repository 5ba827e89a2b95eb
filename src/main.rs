use clap::Parser;
use colored::Colorize;

use openframe::cli::cmd_enums::{Cli, Commands};
use openframe::commands::{self, GlobalOptions};
use openframe::libs::{cancellation, system};
use openframe::{log_debug, logger};

fn main() {
    let cli = Cli::parse();

    logger::init(cli.verbose, cli.silent);
    system::initialize(cli.log_dir.as_deref(), cli.verbose);
    log_debug!("[Main] openframe {} starting", env!("CARGO_PKG_VERSION"));

    let global = GlobalOptions {
        verbose: cli.verbose,
        silent: cli.silent,
        cancel: cancellation::install_interrupt_handler(),
    };

    let result = match cli.command {
        Commands::Bootstrap {
            cluster_name,
            deployment_mode,
            non_interactive,
        } => commands::bootstrap::run(cluster_name, deployment_mode, non_interactive, &global),
        Commands::Cluster { action } => commands::cluster::run(action, &global),
        Commands::Chart { action } => commands::chart::run(action, &global),
        Commands::Dev { action } => commands::dev::run(action, &global),
    };

    if let Err(err) = result {
        report(&err, global.cancel.is_cancelled());
        std::process::exit(1);
    }
}

/// Prints the failure block: the error, its causes, and a hint when the
/// user interrupted the run.
fn report(err: &anyhow::Error, interrupted: bool) {
    tracing::error!("{:#}", err);
    eprintln!();
    eprintln!("{} {}", "Error:".bright_red().bold(), err);
    for cause in err.chain().skip(1) {
        eprintln!("  {} {}", "caused by:".red(), cause);
    }
    if interrupted {
        eprintln!();
        eprintln!(
            "{}",
            "The operation was interrupted. Re-run the command to continue where it stopped.".yellow()
        );
    }
}
