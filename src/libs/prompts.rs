// Thin wrappers over `dialoguer` that honour the run mode: when prompts are
// not allowed the caller's default is returned and the terminal is never
// touched, so non-interactive and test runs can't hang on stdin.

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password, Select};

use crate::libs::run_mode::RunMode;
use crate::log_debug;

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("prompt failed: {0}")]
    Terminal(#[from] dialoguer::Error),

    #[error("'{0}' needs an answer but prompts are disabled in non-interactive mode")]
    NotInteractive(String),

    #[error("nothing to choose from for '{0}'")]
    NoChoices(String),
}

pub fn confirm(mode: RunMode, prompt: &str, default: bool) -> Result<bool, PromptError> {
    if !mode.is_interactive() {
        log_debug!("[Prompt] '{}' answered with default {}", prompt, default);
        return Ok(default);
    }
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact()?)
}

/// Returns the index of the chosen item.
pub fn select(
    mode: RunMode,
    prompt: &str,
    items: &[String],
    default: usize,
) -> Result<usize, PromptError> {
    if items.is_empty() {
        return Err(PromptError::NoChoices(prompt.to_string()));
    }
    let default = default.min(items.len() - 1);
    if !mode.is_interactive() {
        return Ok(default);
    }
    Ok(Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(items)
        .default(default)
        .interact()?)
}

/// Free-text input. `validate` returns an error message for rejected input.
pub fn input<V>(
    mode: RunMode,
    prompt: &str,
    default: &str,
    validate: V,
) -> Result<String, PromptError>
where
    V: Fn(&str) -> Result<(), String>,
{
    if !mode.is_interactive() {
        return Ok(default.to_string());
    }
    let theme = ColorfulTheme::default();
    let mut builder = Input::<String>::with_theme(&theme).with_prompt(prompt);
    if !default.is_empty() {
        builder = builder.default(default.to_string());
    }
    let value = builder
        .validate_with(|value: &String| validate(value.trim()))
        .interact_text()?;
    Ok(value.trim().to_string())
}

/// Hidden input for secrets. There is no sensible default, so a
/// non-interactive run gets an error instead.
pub fn password(mode: RunMode, prompt: &str) -> Result<String, PromptError> {
    if !mode.is_interactive() {
        return Err(PromptError::NotInteractive(prompt.to_string()));
    }
    let value = Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .validate_with(|value: &String| {
            if value.trim().is_empty() {
                Err("value cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact()?;
    Ok(value.trim().to_string())
}
