use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::{DEFAULT_EXTENSIONS_ROOT_URL, GeneratorMode, SubstitutionMode};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub extensions: ExtensionsConfig,
    pub output: OutputConfig,
}

/// Template generator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Recorded in the `generator` parameter of every template
    pub generator_code: String,
    pub tool_version: String,
    pub mode: GeneratorMode,
    pub substitution: SubstitutionMode,
}

/// Where VM extensions are fetched from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionsConfig {
    pub root_url: String,
    pub timeout_secs: Option<u64>,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub pretty: bool,
    /// Only write azuredeploy.parameters.json
    pub parameters_only: bool,
    pub overwrite: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            generator_code: "aksengine".to_string(),
            tool_version: format!("v{}", env!("CARGO_PKG_VERSION")),
            mode: GeneratorMode::default(),
            substitution: SubstitutionMode::default(),
        }
    }
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            root_url: DEFAULT_EXTENSIONS_ROOT_URL.to_string(),
            timeout_secs: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("_output"),
            pretty: true,
            parameters_only: false,
            overwrite: true,
        }
    }
}
