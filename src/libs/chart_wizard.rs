// Interactive configuration for `chart install`: deployment mode, default
// vs interactive configuration, SaaS credentials, branches and registry
// login. The wizard only edits the values tree; writing it out is the
// caller's job.

use crate::cli::type_enums::DeploymentMode;
use crate::libs::helm_values::{ConfigError, HelmValues};
use crate::libs::prompts;
use crate::libs::run_mode::RunMode;
use crate::schemas::chart::{RegistryCredentials, SaasConfig};
use crate::{log_info, log_warn};

const DEFAULT_GHCR_USERNAME: &str = "default";
const DEFAULT_GHCR_EMAIL: &str = "default@example.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Default,
    Interactive,
}

pub struct ChartWizard {
    mode: RunMode,
}

impl ChartWizard {
    pub fn new(mode: RunMode) -> Self {
        Self { mode }
    }

    /// Runs the wizard over `values`. With `preset` the deployment-mode
    /// question is skipped.
    pub fn configure(
        &self,
        preset: Option<DeploymentMode>,
        mut values: HelmValues,
    ) -> Result<(DeploymentMode, HelmValues), ConfigError> {
        let deployment = match preset {
            Some(mode) => mode,
            None => self.select_deployment_mode()?,
        };
        let style = self.select_style()?;

        match style {
            Style::Default => log_info!("Using default configuration for {} deployment", deployment),
            Style::Interactive => log_info!("Configuring Helm values for {} deployment", deployment),
        }
        values.apply_deployment_mode(deployment);

        if deployment.is_saas() {
            self.configure_saas(deployment, style, &mut values)?;
        } else if style == Style::Interactive {
            self.configure_oss_branch(&mut values)?;
            self.configure_docker(&mut values)?;
        }
        Ok((deployment, values))
    }

    fn select_deployment_mode(&self) -> Result<DeploymentMode, ConfigError> {
        log_info!("Select your deployment mode:");
        let items = vec![
            "OSS Tenant deployment (Default self-hosted version)".to_string(),
            "SaaS Tenant deployment".to_string(),
            "SaaS Shared deployment".to_string(),
        ];
        let index = prompts::select(self.mode, "Deployment Mode", &items, 0)?;
        Ok(DeploymentMode::ALL[index])
    }

    fn select_style(&self) -> Result<Style, ConfigError> {
        log_info!("How would you like to configure your chart installation?");
        let items = vec![
            "Default configuration".to_string(),
            "Interactive configuration".to_string(),
        ];
        Ok(match prompts::select(self.mode, "Configuration Mode", &items, 0)? {
            0 => Style::Default,
            _ => Style::Interactive,
        })
    }

    fn configure_saas(
        &self,
        deployment: DeploymentMode,
        style: Style,
        values: &mut HelmValues,
    ) -> Result<(), ConfigError> {
        log_warn!("SaaS deployment requires additional access");
        let repository_password = prompts::password(self.mode, "Read Contents token for SaaS repository")?;
        let config_repository_password = if deployment == DeploymentMode::SaasTenant {
            prompts::password(self.mode, "Read Contents token for SaaS Config repository")?
        } else {
            String::new()
        };
        let ghcr = self.configure_ghcr(values)?;

        let (saas_branch, oss_branch) = match style {
            Style::Default => (values.saas_branch(), values.oss_branch()),
            Style::Interactive => (
                self.pick_branch("SaaS tenant repository branch", &values.saas_branch())?,
                self.pick_branch("OSS tenant repository branch", &values.oss_branch())?,
            ),
        };

        values.apply_saas(&SaasConfig {
            repository_password,
            config_repository_password,
            saas_branch,
            oss_branch,
        });
        values.apply_registry(deployment, &ghcr);
        Ok(())
    }

    /// GHCR login. Existing non-placeholder credentials may be kept, but the
    /// password is never stored in a form we can show, so it is always asked.
    fn configure_ghcr(&self, values: &HelmValues) -> Result<RegistryCredentials, ConfigError> {
        let current = values.ghcr_credentials();
        let has_existing = !current.username.is_empty() && current.username != DEFAULT_GHCR_USERNAME;
        let email = if current.email.is_empty() {
            DEFAULT_GHCR_EMAIL.to_string()
        } else {
            current.email.clone()
        };

        log_info!("GHCR Registry Credentials Configuration");
        if has_existing {
            let items = vec![
                format!("Keep existing GHCR credentials ({})", current.username),
                "Update GHCR credentials".to_string(),
            ];
            if prompts::select(self.mode, "GHCR credentials", &items, 0)? == 0 {
                let password = prompts::password(self.mode, "GHCR Registry Password/Token (required)")?;
                return Ok(RegistryCredentials {
                    username: current.username,
                    password,
                    email,
                });
            }
        }

        let default_username = if has_existing {
            current.username.as_str()
        } else {
            DEFAULT_GHCR_USERNAME
        };
        let username = prompts::input(self.mode, "GHCR Registry Username", default_username, not_empty)?;
        let password = prompts::password(self.mode, "GHCR Registry Password/Token")?;
        let email = prompts::input(self.mode, "GHCR Registry Email", &email, not_empty)?;
        Ok(RegistryCredentials {
            username,
            password,
            email,
        })
    }

    fn configure_oss_branch(&self, values: &mut HelmValues) -> Result<(), ConfigError> {
        let current = values.oss_branch();
        let branch = self.pick_branch("OSS repository branch", &current)?;
        if branch != current {
            values.set_oss_branch(&branch);
        }
        Ok(())
    }

    fn pick_branch(&self, label: &str, current: &str) -> Result<String, ConfigError> {
        log_info!("{} (current: {})", label, current);
        let items = vec![
            format!("Keep '{}' branch", current),
            "Specify custom branch".to_string(),
        ];
        if prompts::select(self.mode, label, &items, 0)? == 0 {
            return Ok(current.to_string());
        }
        Ok(prompts::input(
            self.mode,
            &format!("Enter {} name", label),
            current,
            not_empty,
        )?)
    }

    fn configure_docker(&self, values: &mut HelmValues) -> Result<(), ConfigError> {
        let current = values.docker_credentials();
        log_info!("Docker Registry Configuration (current: {})", current.username);
        let items = vec![
            "No Docker credentials".to_string(),
            "Input custom Docker credentials".to_string(),
        ];
        if prompts::select(self.mode, "Docker credentials", &items, 0)? == 0 {
            return Ok(());
        }

        let updated = RegistryCredentials {
            username: prompts::input(self.mode, "Docker Registry Username", &current.username, not_empty)?,
            password: prompts::password(self.mode, "Docker Registry Password/Token")?,
            email: prompts::input(self.mode, "Docker Registry Email", &current.email, not_empty)?,
        };
        if updated != current {
            values.apply_registry(DeploymentMode::OssTenant, &updated);
        }
        Ok(())
    }
}

fn not_empty(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err("value cannot be empty".to_string())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_oss_keeps_existing_values() {
        let values = HelmValues::from_yaml("deployment:\n  oss:\n    repository:\n      branch: dev\n").unwrap();
        let (mode, values) = ChartWizard::new(RunMode::Test).configure(None, values).unwrap();
        assert_eq!(mode, DeploymentMode::OssTenant);
        assert!(values.get_bool(&["deployment", "oss", "enabled"]));
        assert_eq!(values.oss_branch(), "dev");
    }

    #[test]
    fn saas_needs_a_terminal_for_tokens() {
        let err = ChartWizard::new(RunMode::Test)
            .configure(Some(DeploymentMode::SaasTenant), HelmValues::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Prompt(_)));
    }
}
