// Command-line parsing: defaults and argument handling that the workflows
// rely on.

use clap::Parser;

use openframe::cli::cmd_enums::{ChartCommands, Cli, ClusterCommands, Commands};
use openframe::commands::chart::install_flags;
use openframe::schemas::chart::InstallFlags;

fn chart_install(args: &[&str]) -> InstallFlags {
    let mut argv = vec!["openframe", "chart", "install"];
    argv.extend_from_slice(args);
    match Cli::try_parse_from(argv).unwrap().command {
        Commands::Chart {
            action: ChartCommands::Install(args),
        } => install_flags(&args),
        _ => panic!("expected chart install"),
    }
}

#[test]
fn chart_install_defaults_match_install_flags() {
    let flags = chart_install(&[]);
    assert_eq!(flags, InstallFlags::default());
    assert!(!flags.force);
    assert!(!flags.dry_run);
    assert_eq!(flags.github_repo, "https://github.com/flamingo-stack/openframe-oss-tenant");
    assert_eq!(flags.github_branch, "main");
    assert_eq!(flags.cert_dir, "");
}

#[test]
fn chart_install_flags_are_carried_over() {
    let flags = chart_install(&["-f", "--dry-run", "--github-branch", "develop", "--cert-dir", "/tmp/certs"]);
    assert!(flags.force);
    assert!(flags.dry_run);
    assert_eq!(flags.github_branch, "develop");
    assert_eq!(flags.cert_dir, "/tmp/certs");
}

#[test]
fn bootstrap_takes_an_optional_cluster_name() {
    let cli = Cli::try_parse_from(["openframe", "bootstrap", "--deployment-mode", "oss-tenant", "--non-interactive"]).unwrap();
    match cli.command {
        Commands::Bootstrap {
            cluster_name,
            deployment_mode,
            non_interactive,
        } => {
            assert_eq!(cluster_name, None);
            assert_eq!(deployment_mode.as_deref(), Some("oss-tenant"));
            assert!(non_interactive);
        }
        _ => panic!("expected bootstrap"),
    }
}

#[test]
fn cluster_alias_and_create_flags() {
    let cli = Cli::try_parse_from(["openframe", "k", "create", "dev", "-t", "k3d", "-n", "2", "--skip-wizard"]).unwrap();
    match cli.command {
        Commands::Cluster {
            action:
                ClusterCommands::Create {
                    name,
                    nodes,
                    skip_wizard,
                    ..
                },
        } => {
            assert_eq!(name.as_deref(), Some("dev"));
            assert_eq!(nodes, Some(2));
            assert!(skip_wizard);
        }
        _ => panic!("expected cluster create"),
    }
}

#[test]
fn unknown_cluster_type_is_a_usage_error() {
    assert!(Cli::try_parse_from(["openframe", "cluster", "create", "--type", "kind"]).is_err());
}
