use config::{Config, Environment, File, Map};
use serde::Deserialize;
use std::path::Path;

use crate::core::ProxyError;
use crate::executor::ResourceStrategy;

/// Default configuration file locations, first existing one wins
pub const CONFIG_PATHS: [&str; 2] = ["/etc/shardexec/shardexec.toml", "./shardexec.toml"];

/// Per-request defaults handed to the execution core
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub resource_strategy: ResourceStrategy,
    #[serde(default)]
    pub return_generated_keys: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            resource_strategy: ResourceStrategy::default(),
            return_generated_keys: false,
            log_level: default_log_level(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration with priority: ENV > config file > defaults.
    ///
    /// An explicit `path` must exist; otherwise the first of `CONFIG_PATHS` found is used.
    pub fn load(path: Option<&Path>) -> Result<Self, ProxyError> {
        Self::load_with_env(path, None)
    }

    /// Same as `load`, reading `SHARDEXEC_*` variables from `env` instead of the process
    /// environment when given
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, ProxyError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        } else if let Some(found) = CONFIG_PATHS.iter().map(Path::new).find(|p| p.exists()) {
            builder = builder.add_source(File::from(found));
        }

        // SHARDEXEC_RESOURCE_STRATEGY, SHARDEXEC_LOG_LEVEL, ...
        builder = builder.add_source(
            Environment::with_prefix("SHARDEXEC")
                .prefix_separator("_")
                .separator("__")
                .source(env),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Command-line values win over everything loaded
    pub fn apply_overrides(
        &mut self,
        strategy: Option<ResourceStrategy>,
        return_generated_keys: Option<bool>,
    ) {
        if let Some(strategy) = strategy {
            self.resource_strategy = strategy;
        }
        if let Some(return_generated_keys) = return_generated_keys {
            self.return_generated_keys = return_generated_keys;
        }
    }
}
