// Shared fixtures for the integration tests. No test spawns a real process:
// every command goes to a `RecordingExecutor` that answers from a closure.

use std::sync::Mutex;

use openframe::libs::executor::{CommandExecutor, CommandResult, ExecError, ExecOptions};

type Responder = Box<dyn Fn(&ExecOptions) -> Result<CommandResult, ExecError> + Send + Sync>;

pub struct RecordingExecutor {
    calls: Mutex<Vec<String>>,
    respond: Responder,
}

impl RecordingExecutor {
    /// Answers every command with an empty success.
    pub fn succeeding() -> Self {
        Self::responding(|_| Ok(CommandResult::default()))
    }

    pub fn responding<F>(respond: F) -> Self
    where
        F: Fn(&ExecOptions) -> Result<CommandResult, ExecError> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Command lines seen so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute_with_options(&self, options: &ExecOptions) -> Result<CommandResult, ExecError> {
        self.calls.lock().unwrap().push(options.command_line());
        (self.respond)(options)
    }
}

pub fn stdout(text: &str) -> Result<CommandResult, ExecError> {
    Ok(CommandResult {
        stdout: text.to_string(),
        ..Default::default()
    })
}
