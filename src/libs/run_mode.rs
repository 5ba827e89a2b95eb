// How the current invocation may interact with the user. Decided once from
// flags in the command layer and handed to every prompt, prerequisite set and
// service that could otherwise block on a terminal.

/// Environment variable forcing [`RunMode::Test`] (prompt-free, no chrome).
pub const TEST_MODE_ENV: &str = "OPENFRAME_TEST_MODE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// A human is at the terminal; prompts and spinners are allowed.
    #[default]
    Interactive,
    /// CI / automation: never prompt, auto-confirm, tolerate non-critical failures.
    NonInteractive,
    /// Automated tests: like `NonInteractive`, and decorative output is skipped.
    Test,
}

impl RunMode {
    /// Resolves the mode from the `--non-interactive` flag and the environment.
    pub fn from_flags(non_interactive: bool) -> Self {
        if std::env::var_os(TEST_MODE_ENV).is_some() {
            RunMode::Test
        } else if non_interactive {
            RunMode::NonInteractive
        } else {
            RunMode::Interactive
        }
    }

    pub fn is_interactive(self) -> bool {
        self == RunMode::Interactive
    }

    pub fn is_non_interactive(self) -> bool {
        !self.is_interactive()
    }

    /// Whether boxes, banners and progress lines should be drawn.
    pub fn shows_chrome(self) -> bool {
        self != RunMode::Test
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_interactive_allows_prompts() {
        assert!(RunMode::Interactive.is_interactive());
        assert!(RunMode::NonInteractive.is_non_interactive());
        assert!(RunMode::Test.is_non_interactive());
        assert!(!RunMode::Test.shows_chrome());
        assert!(RunMode::NonInteractive.shows_chrome());
    }
}
