use anyhow::Result;
use jsonschema::{validator_for, Validator};
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::util::{env_parse, env_string};

/// Metadata key that carries the continuation token on a frame.
pub const DEFAULT_CONTINUATION_KEY: &str = "nextToken";
/// Joins the original request id and the continuation counter.
pub const DEFAULT_REQUEST_ID_SEPARATOR: &str = ".";

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct DriverConfig {
    /// Key under `meta.custom` holding the continuation token.
    #[serde(default = "default_continuation_key")]
    pub continuation_key: String,
    /// Separator placed between the original request id and the cycle counter.
    #[serde(default = "default_request_id_separator")]
    pub request_id_separator: String,
    /// Stop paging after this many cycles even if more data is signalled.
    #[serde(default)]
    pub max_cycles: Option<u32>,
}

fn default_continuation_key() -> String {
    DEFAULT_CONTINUATION_KEY.to_string()
}

fn default_request_id_separator() -> String {
    DEFAULT_REQUEST_ID_SEPARATOR.to_string()
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            continuation_key: default_continuation_key(),
            request_id_separator: default_request_id_separator(),
            max_cycles: None,
        }
    }
}

impl DriverConfig {
    /// Apply `PAGEFLOW_CONTINUATION_KEY` and `PAGEFLOW_MAX_CYCLES` on top of `self`.
    /// `PAGEFLOW_MAX_CYCLES=0` clears the cap.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(key) = env_string("PAGEFLOW_CONTINUATION_KEY") {
            self.continuation_key = key;
        }
        if let Some(max) = env_parse::<u32>("PAGEFLOW_MAX_CYCLES") {
            self.max_cycles = (max > 0).then_some(max);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.continuation_key.trim().is_empty() {
            anyhow::bail!("driver.continuation_key must not be empty");
        }
        if self.request_id_separator.is_empty() {
            anyhow::bail!("driver.request_id_separator must not be empty");
        }
        if self.max_cycles == Some(0) {
            anyhow::bail!("driver.max_cycles must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub driver: DriverConfig,
}

static CONFIG_SCHEMA: Lazy<Validator> = Lazy::new(|| {
    let schema = schemars::schema_for!(Config);
    let schema_value = serde_json::to_value(&schema).expect("schema value");
    validator_for(&schema_value).expect("valid schema")
});

/// Returns the JSON schema describing the configuration structure.
///
/// # Panics
///
/// Panics if schema generation fails; this indicates a programming error.
pub fn config_schema_json() -> serde_json::Value {
    let schema = schemars::schema_for!(Config);
    serde_json::to_value(&schema).expect("schema json")
}

pub fn write_schema_file(path: &str) -> std::io::Result<()> {
    let schema_json = config_schema_json();
    std::fs::write(path, serde_json::to_string_pretty(&schema_json)?)
}

pub fn load_config(path: &str) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let raw: toml::Value = toml::from_str(&content)?;
    let json_value = serde_json::to_value(&raw)?;
    let validation_errors: Vec<_> = CONFIG_SCHEMA
        .iter_errors(&json_value)
        .map(|e| e.to_string())
        .collect();
    if !validation_errors.is_empty() {
        return Err(anyhow::anyhow!(validation_errors.join(", ")));
    }
    let cfg: Config = toml::from_str(&content)?;
    cfg.driver.validate()?;
    Ok(cfg)
}
