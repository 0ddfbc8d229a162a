//! Harness Configuration
//!
//! Settings for the fixture helpers and CLI. Values come from an optional
//! `instrument-master.toml` (or `config/instrument-master.toml`), an explicit
//! file passed on the command line, and `IMH_*` environment variables, in
//! increasing order of precedence.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Default scope for property definitions created by the tutorials
pub const DEFAULT_SCOPE: &str = "tutorials";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Secrets file consumed by the client factory. When unset, the factory
    /// reads `FBN_*` environment variables.
    pub secrets_path: Option<PathBuf>,

    /// Scope used for tutorial property definitions
    pub tutorials_scope: String,

    /// Page size used when listing instruments
    pub list_page_size: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            secrets_path: None,
            tutorials_scope: DEFAULT_SCOPE.to_string(),
            list_page_size: 5,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from the default files, `explicit` (which must
    /// exist when given) and the environment
    pub fn load(explicit: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("tutorials_scope", DEFAULT_SCOPE)?
            .set_default("list_page_size", 5)?
            .add_source(File::with_name("instrument-master").required(false))
            .add_source(File::with_name("config/instrument-master").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(Path::new(path)).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("IMH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option(
                "secrets_path",
                std::env::var("FBN_SECRETS_PATH")
                    .ok()
                    .filter(|_| std::env::var("IMH_SECRETS_PATH").is_err()),
            )?
            .build()?;

        let harness: HarnessConfig = config.try_deserialize()?;
        harness.validate()?;

        info!(
            scope = %harness.tutorials_scope,
            secrets = ?harness.secrets_path,
            "harness configuration loaded"
        );
        Ok(harness)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tutorials_scope.trim().is_empty() || self.tutorials_scope.contains('/') {
            return Err(ConfigError::Message(format!(
                "tutorials_scope must be a non-empty single path segment, got '{}'",
                self.tutorials_scope
            )));
        }
        if self.list_page_size == 0 {
            return Err(ConfigError::Message(
                "list_page_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = HarnessConfig::default();
        assert_eq!(config.tutorials_scope, "tutorials");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "tutorials_scope = \"sandbox\"\nlist_page_size = 20").unwrap();

        let config = HarnessConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.list_page_size, 20);
        if std::env::var("IMH_TUTORIALS_SCOPE").is_err() {
            assert_eq!(config.tutorials_scope, "sandbox");
        }
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(HarnessConfig::load(Some("/no/such/harness-config.toml")).is_err());
    }

    #[test]
    fn scope_with_slash_is_rejected() {
        let config = HarnessConfig {
            tutorials_scope: "a/b".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
