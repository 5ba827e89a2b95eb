//! # Helm Values
//!
//! `helm-values.yaml` is user-owned and may carry keys openframe knows
//! nothing about, so it is held as a [`serde_yaml::Value`] tree: only the
//! paths we touch are rewritten and everything else survives a
//! load-modify-write cycle.
//!
//! Paths written by openframe:
//!
//! - `deployment.{oss,saas}.enabled`
//! - `deployment.oss.repository.branch`
//! - `deployment.saas.repository.{password,branch}`, `deployment.saas.config.password`
//! - `registry.{docker,ghcr}.{username,password,email}`

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tempfile::TempPath;

use crate::cli::type_enums::DeploymentMode;
use crate::log_debug;
use crate::schemas::chart::{DEFAULT_GITHUB_BRANCH, RegistryCredentials, SaasConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("helm values file not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read helm values file: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to parse helm values YAML: {0}")]
    Parse(#[source] serde_yaml::Error),

    #[error("failed to marshal updated helm values: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("failed to create temporary values file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("--deployment-mode is required when using --non-interactive")]
    ModeRequired,

    #[error("configuration validation failed: {0}")]
    Invalid(&'static str),

    #[error("configuration wizard failed: {0}")]
    Prompt(#[from] crate::libs::prompts::PromptError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HelmValues {
    root: Mapping,
}

impl HelmValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(text).map_err(ConfigError::Parse)?;
        Ok(match value {
            Value::Mapping(root) => Self { root },
            // An empty document parses as null.
            _ => Self::default(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(ConfigError::Read)?;
        Self::from_yaml(&text)
    }

    /// The file when it exists, otherwise an empty tree.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log_debug!("[Values] {} not found, starting from empty values", path.display());
            Ok(Self::default())
        }
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(&self.root).map_err(ConfigError::Serialize)
    }

    /// Writes the tree to a fresh `helm-values-*.yaml` temp file. The file
    /// is deleted when the returned path is dropped.
    pub fn write_temp(&self) -> Result<TempPath, ConfigError> {
        let yaml = self.to_yaml()?;
        let mut file = tempfile::Builder::new()
            .prefix("helm-values-")
            .suffix(".yaml")
            .tempfile()
            .map_err(ConfigError::TempFile)?;
        file.write_all(yaml.as_bytes())
            .and_then(|_| file.flush())
            .map_err(ConfigError::TempFile)?;
        Ok(file.into_temp_path())
    }

    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.root.get(*first)?;
        for key in rest {
            current = current.as_mapping()?.get(*key)?;
        }
        Some(current)
    }

    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn get_bool(&self, path: &[&str]) -> bool {
        self.get(path).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Sets `path` to `value`, creating (or replacing non-mapping) parents.
    pub fn set(&mut self, path: &[&str], value: impl Into<Value>) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };
        let mut current = &mut self.root;
        for key in parents {
            let entry = current
                .entry(Value::from(*key))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if !entry.is_mapping() {
                *entry = Value::Mapping(Mapping::new());
            }
            current = match entry {
                Value::Mapping(map) => map,
                _ => return,
            };
        }
        current.insert(Value::from(*last), value.into());
    }

    /// Copies the top-level keys of `other` over ours.
    pub fn merge(&mut self, other: HelmValues) {
        for (key, value) in other.root {
            self.root.insert(key, value);
        }
    }

    /// Best guess of the deployment mode the tree was prepared for.
    pub fn detect_deployment_mode(&self) -> DeploymentMode {
        if !self.get_bool(&["deployment", "saas", "enabled"]) {
            DeploymentMode::OssTenant
        } else if self.get_str(&["deployment", "saas", "config", "password"]).is_some_and(|p| !p.trim().is_empty()) {
            DeploymentMode::SaasTenant
        } else {
            DeploymentMode::SaasShared
        }
    }

    /// Enables the section matching the mode and disables the other.
    pub fn apply_deployment_mode(&mut self, mode: DeploymentMode) {
        let saas = mode.is_saas();
        self.set(&["deployment", "oss", "enabled"], !saas);
        self.set(&["deployment", "saas", "enabled"], saas);
    }

    pub fn set_oss_branch(&mut self, branch: &str) {
        self.set(&["deployment", "oss", "repository", "branch"], branch);
    }

    /// SaaS modes log in to GHCR, OSS to a plain Docker registry.
    pub fn apply_registry(&mut self, mode: DeploymentMode, credentials: &RegistryCredentials) {
        let registry = if mode.is_saas() { "ghcr" } else { "docker" };
        self.set(&["registry", registry, "username"], credentials.username.as_str());
        self.set(&["registry", registry, "password"], credentials.password.as_str());
        self.set(&["registry", registry, "email"], credentials.email.as_str());
    }

    pub fn apply_saas(&mut self, saas: &SaasConfig) {
        self.set(&["deployment", "saas", "repository", "password"], saas.repository_password.as_str());
        self.set(&["deployment", "saas", "repository", "branch"], saas.saas_branch.as_str());
        self.set(&["deployment", "saas", "config", "password"], saas.config_repository_password.as_str());
        self.set_oss_branch(&saas.oss_branch);
    }

    pub fn oss_branch(&self) -> String {
        self.get_str(&["deployment", "oss", "repository", "branch"])
            .unwrap_or(DEFAULT_GITHUB_BRANCH)
            .to_string()
    }

    pub fn saas_branch(&self) -> String {
        self.get_str(&["deployment", "saas", "repository", "branch"])
            .unwrap_or(DEFAULT_GITHUB_BRANCH)
            .to_string()
    }

    /// The app-of-apps branch configured for `mode`, if any. saas-shared
    /// reads the SaaS repository branch, the other modes the OSS one.
    pub fn branch_for_mode(&self, mode: Option<DeploymentMode>) -> Option<String> {
        let path: &[&str] = match mode {
            Some(DeploymentMode::SaasShared) => &["deployment", "saas", "repository", "branch"],
            _ => &["deployment", "oss", "repository", "branch"],
        };
        self.get_str(path)
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
    }

    /// Stored Docker registry login, falling back to placeholder values.
    pub fn docker_credentials(&self) -> RegistryCredentials {
        self.registry_credentials("docker")
    }

    pub fn ghcr_credentials(&self) -> RegistryCredentials {
        self.registry_credentials("ghcr")
    }

    fn registry_credentials(&self, registry: &str) -> RegistryCredentials {
        let defaults = RegistryCredentials::default();
        let field = |name: &str, fallback: String| {
            self.get_str(&["registry", registry, name])
                .map(str::to_string)
                .unwrap_or(fallback)
        };
        RegistryCredentials {
            username: field("username", defaults.username),
            password: field("password", defaults.password),
            email: field("email", defaults.email),
        }
    }

    /// Checks that the tree carries what `mode` needs to deploy.
    pub fn validate(&self, mode: DeploymentMode) -> Result<(), ConfigError> {
        match mode {
            DeploymentMode::OssTenant => {
                if !self.get_bool(&["deployment", "oss", "enabled"]) {
                    return Err(ConfigError::Invalid("OSS deployment must be enabled in helm-values.yaml"));
                }
            }
            DeploymentMode::SaasTenant | DeploymentMode::SaasShared => {
                if !self.get_bool(&["deployment", "saas", "enabled"]) {
                    return Err(ConfigError::Invalid("SaaS deployment must be enabled in helm-values.yaml"));
                }
                if !self.has_text(&["deployment", "saas", "repository", "password"]) {
                    return Err(ConfigError::Invalid(
                        "SaaS repository password must be configured in helm-values.yaml",
                    ));
                }
                if mode == DeploymentMode::SaasTenant && !self.has_text(&["deployment", "saas", "config", "password"]) {
                    return Err(ConfigError::Invalid(
                        "SaaS config repository password must be configured in helm-values.yaml",
                    ));
                }
                if !self.has_text(&["registry", "ghcr", "username"]) || !self.has_text(&["registry", "ghcr", "password"]) {
                    return Err(ConfigError::Invalid(
                        "GHCR registry credentials must be configured in helm-values.yaml",
                    ));
                }
            }
        }
        Ok(())
    }

    fn has_text(&self, path: &[&str]) -> bool {
        self.get_str(path).is_some_and(|s| !s.trim().is_empty())
    }
}

/// The values an install runs with, written to a temp file that lives as
/// long as this struct.
#[derive(Debug)]
pub struct PreparedValues {
    pub mode: Option<DeploymentMode>,
    pub values: HelmValues,
    file: TempPath,
}

impl PreparedValues {
    pub fn new(mode: Option<DeploymentMode>, values: HelmValues) -> Result<Self, ConfigError> {
        let file = values.write_temp()?;
        Ok(Self { mode, values, file })
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    /// SaaS repository token, used to authenticate the saas-shared clone.
    pub fn repository_token(&self) -> Option<&str> {
        self.values
            .get_str(&["deployment", "saas", "repository", "password"])
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
global:
  repoBranch: main
deployment:
  oss:
    enabled: true
    repository:
      branch: develop
custom:
  keep: me
"#;

    #[test]
    fn unknown_keys_survive_a_rewrite() {
        let mut values = HelmValues::from_yaml(SAMPLE).unwrap();
        values.apply_deployment_mode(DeploymentMode::SaasTenant);
        let reparsed = HelmValues::from_yaml(&values.to_yaml().unwrap()).unwrap();
        assert_eq!(reparsed.get_str(&["custom", "keep"]), Some("me"));
        assert!(reparsed.get_bool(&["deployment", "saas", "enabled"]));
        assert!(!reparsed.get_bool(&["deployment", "oss", "enabled"]));
    }

    #[test]
    fn empty_document_is_an_empty_tree() {
        assert_eq!(HelmValues::from_yaml("").unwrap(), HelmValues::new());
    }

    #[test]
    fn set_replaces_scalar_parents() {
        let mut values = HelmValues::from_yaml("registry: none\n").unwrap();
        values.set(&["registry", "docker", "username"], "me");
        assert_eq!(values.get_str(&["registry", "docker", "username"]), Some("me"));
    }

    #[test]
    fn branch_depends_on_mode() {
        let mut values = HelmValues::from_yaml(SAMPLE).unwrap();
        assert_eq!(values.branch_for_mode(None).as_deref(), Some("develop"));
        assert_eq!(values.branch_for_mode(Some(DeploymentMode::SaasShared)), None);
        values.set(&["deployment", "saas", "repository", "branch"], "saas-main");
        assert_eq!(
            values.branch_for_mode(Some(DeploymentMode::SaasShared)).as_deref(),
            Some("saas-main")
        );
    }

    #[test]
    fn registry_target_follows_mode() {
        let mut values = HelmValues::new();
        let creds = RegistryCredentials {
            username: "bot".into(),
            password: "pw".into(),
            email: "bot@example.com".into(),
        };
        values.apply_registry(DeploymentMode::SaasShared, &creds);
        assert_eq!(values.ghcr_credentials(), creds);
        assert_eq!(values.docker_credentials(), RegistryCredentials::default());
    }

    #[test]
    fn validation_messages_per_mode() {
        let mut values = HelmValues::new();
        assert_eq!(
            values.validate(DeploymentMode::OssTenant).unwrap_err().to_string(),
            "configuration validation failed: OSS deployment must be enabled in helm-values.yaml"
        );

        values.apply_deployment_mode(DeploymentMode::SaasTenant);
        values.apply_saas(&SaasConfig {
            repository_password: "repo".into(),
            ..Default::default()
        });
        let err = values.validate(DeploymentMode::SaasTenant).unwrap_err();
        assert!(err.to_string().contains("SaaS config repository password"));

        // saas-shared does not need the config repository.
        let err = values.validate(DeploymentMode::SaasShared).unwrap_err();
        assert!(err.to_string().contains("GHCR registry credentials"));

        values.apply_registry(
            DeploymentMode::SaasShared,
            &RegistryCredentials {
                username: "u".into(),
                password: "p".into(),
                email: "e".into(),
            },
        );
        assert!(values.validate(DeploymentMode::SaasShared).is_ok());
    }

    #[test]
    fn prepared_values_remove_their_file() {
        let prepared = PreparedValues::new(None, HelmValues::from_yaml(SAMPLE).unwrap()).unwrap();
        let path = prepared.path().to_path_buf();
        assert!(fs::read_to_string(&path).unwrap().contains("develop"));
        drop(prepared);
        assert!(!path.exists());
    }

    #[test]
    fn merge_replaces_top_level_keys_and_mode_is_detected() {
        let mut values = HelmValues::from_yaml(SAMPLE).unwrap();
        assert_eq!(values.detect_deployment_mode(), DeploymentMode::OssTenant);

        values.merge(HelmValues::from_yaml("deployment:\n  saas:\n    enabled: true\n").unwrap());
        assert_eq!(values.get_str(&["custom", "keep"]), Some("me"));
        assert!(values.get(&["deployment", "oss"]).is_none());
        assert_eq!(values.detect_deployment_mode(), DeploymentMode::SaasShared);

        values.set(&["deployment", "saas", "config", "password"], "cfg");
        assert_eq!(values.detect_deployment_mode(), DeploymentMode::SaasTenant);
    }
}
