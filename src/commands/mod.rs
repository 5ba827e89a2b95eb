// Register application subcommands.
// Each module corresponds to a specific `openframe` command-line action and
// turns parsed clap arguments into calls on the services under `libs/`.

use std::sync::Arc;

use crate::libs::cancellation::CancelToken;
use crate::libs::executor::{CommandExecutor, RealExecutor};

// Cluster creation followed by chart installation.
pub mod bootstrap;
// ArgoCD and app-of-apps installation.
pub mod chart;
// Cluster lifecycle: create, list, status, delete, cleanup.
pub mod cluster;
// Developer loop: Telepresence intercepts and Skaffold sessions.
pub mod dev;

/// Settings shared by every command, resolved once in `main`.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub verbose: bool,
    pub silent: bool,
    /// Cancelled on Ctrl+C.
    pub cancel: CancelToken,
}

impl GlobalOptions {
    /// A process executor bound to the interrupt token.
    pub fn executor(&self, dry_run: bool) -> Arc<dyn CommandExecutor> {
        Arc::new(RealExecutor::new(dry_run, self.verbose).with_cancel_token(self.cancel.clone()))
    }
}
