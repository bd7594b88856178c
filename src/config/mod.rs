//! Proxy configuration.
//!
//! Loaded from YAML files or environment variables:
//!
//! ```yaml
//! log_invocations: true
//! strict_interceptor_resolution: false
//! ```
//!
//! Environment overrides use the `INTERPOSE__` prefix, e.g.
//! `INTERPOSE__STRICT_INTERCEPTOR_RESOLUTION=true`.

use serde::Deserialize;

use crate::error::Result;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "interpose.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "INTERPOSE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "INTERPOSE";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "INTERPOSE_LOG";

/// Behavior switches for proxy registration and invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Emit a trace event for every intercepted call.
    pub log_invocations: bool,
    /// Fail service construction when an interceptor type cannot be
    /// resolved, instead of skipping it.
    pub strict_interceptor_resolution: bool,
}

impl ProxyConfig {
    /// Load configuration from file and environment.
    ///
    /// Sources, later overriding earlier:
    /// 1. `interpose.yaml` in the working directory, if present
    /// 2. `path`, if given
    /// 3. the file named by `INTERPOSE_CONFIG`, if set
    /// 4. `INTERPOSE__*` environment variables
    pub fn load(path: Option<&str>) -> Result<Self> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse configuration from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Strict interceptor resolution, everything else default.
    pub fn strict() -> Self {
        Self {
            strict_interceptor_resolution: true,
            ..Self::default()
        }
    }
}
