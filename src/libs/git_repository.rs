// Shallow clone of the app-of-apps repository into a temporary directory.
// The directory is owned by the returned `ClonedChart` and removed when it
// is dropped, whether the install succeeded or not.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use crate::libs::cancellation::CancelToken;
use crate::libs::executor::{CommandExecutor, ExecError, ExecOptions};
use crate::log_debug;
use crate::schemas::chart::AppOfAppsConfig;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),

    #[error(
        "branch '{0}' does not exist in repository. Please check if the branch name is correct or use 'main' branch"
    )]
    BranchNotFound(String),

    #[error("failed to clone repository: {source}{}", git_output(.source))]
    Clone {
        #[source]
        source: ExecError,
    },

    #[error("chart path '{0}' does not exist in repository")]
    ChartPathMissing(String),
}

fn git_output(source: &ExecError) -> String {
    let stderr = source.stderr().trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\nGit output: {}", crate::libs::executor::redact_sensitive(stderr))
    }
}

/// A cloned repository. Dropping it deletes the checkout.
#[derive(Debug)]
pub struct ClonedChart {
    pub checkout: TempDir,
    pub chart_path: PathBuf,
}

pub struct GitRepository {
    executor: Arc<dyn CommandExecutor>,
}

impl GitRepository {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// `git clone --depth 1 --single-branch --no-tags --branch <b> <repo> <tmp>`
    /// and checks that the chart path exists in the checkout. In dry-run the
    /// executor clones nothing, so the chart path check is skipped.
    pub fn clone_chart_repository(
        &self,
        config: &AppOfAppsConfig,
        dry_run: bool,
        cancel: &CancelToken,
    ) -> Result<ClonedChart, GitError> {
        let checkout = tempfile::Builder::new()
            .prefix("openframe-chart-")
            .tempdir()
            .map_err(GitError::TempDir)?;
        let target = checkout.path().display().to_string();

        let options = ExecOptions::new(
            "git",
            [
                "clone",
                "--depth",
                "1",
                "--single-branch",
                "--no-tags",
                "--branch",
                config.github_branch.as_str(),
                config.github_repo.as_str(),
                target.as_str(),
            ],
        )
        .cancel(cancel);

        if let Err(e) = self.executor.execute_with_options(&options) {
            if e.is_cancelled() {
                return Err(GitError::Cancelled);
            }
            let stderr = e.stderr();
            if stderr.contains("Remote branch") && stderr.contains("not found") {
                return Err(GitError::BranchNotFound(config.github_branch.clone()));
            }
            return Err(GitError::Clone { source: e });
        }

        let chart_path = checkout.path().join(&config.chart_path);
        if !dry_run && !chart_path.exists() {
            return Err(GitError::ChartPathMissing(config.chart_path.clone()));
        }
        log_debug!("[Git] chart checked out at {}", chart_path.display());

        Ok(ClonedChart { checkout, chart_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::executor::{CommandResult, MockCommandExecutor};

    fn config() -> AppOfAppsConfig {
        AppOfAppsConfig::new(
            "https://github.com/flamingo-stack/openframe-oss-tenant",
            "feature/x",
            PathBuf::from("/certs"),
            PathBuf::from("values.yaml"),
        )
    }

    #[test]
    fn missing_branch_gets_a_clear_message() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().returning(|_| {
            Err(ExecError::Failed {
                command: "git clone".into(),
                result: CommandResult {
                    exit_code: 128,
                    stderr: "warning: Could not find remote branch feature/x to clone.\nfatal: Remote branch feature/x not found in upstream origin".into(),
                    ..Default::default()
                },
            })
        });
        let err = GitRepository::new(Arc::new(executor))
            .clone_chart_repository(&config(), false, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, GitError::BranchNotFound(ref b) if b == "feature/x"));
    }

    #[test]
    fn chart_path_must_exist_after_clone() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute_with_options()
            .withf(|o| o.args[0] == "clone" && o.args.contains(&"feature/x".to_string()))
            .returning(|_| Ok(CommandResult::default()));
        let err = GitRepository::new(Arc::new(executor))
            .clone_chart_repository(&config(), false, &CancelToken::new())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "chart path 'manifests/app-of-apps' does not exist in repository"
        );
    }

    #[test]
    fn clone_places_chart_inside_checkout() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_with_options().returning(|o| {
            let target = PathBuf::from(o.args.last().cloned().unwrap_or_default());
            std::fs::create_dir_all(target.join("manifests/app-of-apps")).unwrap();
            Ok(CommandResult::default())
        });
        let cloned = GitRepository::new(Arc::new(executor))
            .clone_chart_repository(&config(), false, &CancelToken::new())
            .unwrap();
        assert!(cloned.chart_path.starts_with(cloned.checkout.path()));
        let root = cloned.checkout.path().to_path_buf();
        drop(cloned);
        assert!(!root.exists());
    }
}
