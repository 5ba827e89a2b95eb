// Core library of openframe. The command layer only parses arguments and
// calls into these modules; every external process goes through `executor`.

// ArgoCD application queries and the readiness wait loop.
pub mod argocd;
// `bootstrap`: cluster creation followed by chart installation.
pub mod bootstrap;
// Cancellation tokens, deadlines and the Ctrl+C handler.
pub mod cancellation;
// The `chart install` workflow.
pub mod chart_installer;
// Interactive deployment configuration for chart installs.
pub mod chart_wizard;
// User-facing cluster operations and cluster selection.
pub mod cluster_service;
// Interactive `cluster create` wizard.
pub mod cluster_wizard;
// Boxes, tables and separators.
pub mod display;
// Runs external commands (dry-run, timeouts, redaction).
pub mod executor;
// Shallow clones of the chart repository.
pub mod git_repository;
// Helm releases: ArgoCD and app-of-apps.
pub mod helm_manager;
// helm-values.yaml loading, editing and validation.
pub mod helm_values;
// Telepresence intercepts.
pub mod intercept;
// k3d cluster provider.
pub mod k3d_manager;
// kubectl context and resource queries for the dev workflows.
pub mod kubectl;
// Well-known paths under ~/.openframe.
pub mod paths;
// Detect, confirm, install and re-verify external tools.
pub mod prerequisites;
// dialoguer prompts that respect the run mode.
pub mod prompts;
// Interactive, non-interactive or test.
pub mod run_mode;
// Skaffold development sessions.
pub mod scaffold;
// Start-up initialization (log directory, file logging).
pub mod system;
pub mod utilities;
