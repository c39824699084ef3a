pub mod types;

use crate::error::{ConfigError, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".armgen.toml";

/// Get the global config file path (~/.armgen.toml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME))
}

/// Get the local config file path (dir/.armgen.toml)
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// Reads and parses one config file
pub fn read_config(path: &Path) -> Result<types::Config> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let config = toml::from_str(&content).map_err(|e| ConfigError::ParsingFailed(e.to_string()))?;
    debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Load configuration from an explicit file or use defaults.
/// Without an explicit file, checks `dir` first, then the home directory.
pub fn load_config(explicit: Option<&Path>, dir: Option<&Path>) -> Result<types::Config> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    let candidates = dir
        .map(local_config_path)
        .into_iter()
        .chain(global_config_path());
    for candidate in candidates {
        if candidate.exists() {
            return read_config(&candidate);
        }
    }

    Ok(types::Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GeneratorMode;
    use crate::error::ArmgenError;

    #[test]
    fn test_local_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            local_config_path(dir.path()),
            "[generator]\nmode = \"legacy\"\n",
        )
        .unwrap();
        let config = load_config(None, Some(dir.path())).unwrap();
        assert_eq!(config.generator.mode, GeneratorMode::Legacy);
    }

    #[test]
    fn test_explicit_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            load_config(Some(&missing), None),
            Err(ArmgenError::Config(ConfigError::ReadFailed { .. }))
        ));

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[generator\n").unwrap();
        assert!(matches!(
            load_config(Some(&broken), None),
            Err(ArmgenError::Config(ConfigError::ParsingFailed(_)))
        ));
    }
}
