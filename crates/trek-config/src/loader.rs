use std::path::{Path, PathBuf};

use tracing::{debug, info};
use trek_common::{Error, Result};

use crate::model::AppConfig;

/// Config files looked up in the working directory when no explicit path is given.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["trek.yml", "trek.yaml", "trek.toml"];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from `path` if given, otherwise from the first default file found in
    /// the current directory, otherwise fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        match path {
            Some(path) => Self::load_file(path),
            None => Self::load_from_dir(Path::new(".")),
        }
    }

    pub fn load_from_dir(dir: &Path) -> Result<AppConfig> {
        match Self::find_default(dir) {
            Some(path) => Self::load_file(&path),
            None => {
                debug!("no config file in {}, using defaults", dir.display());
                Ok(AppConfig::default())
            }
        }
    }

    pub fn load_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = parse_config(path, &contents)?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    fn find_default(dir: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

fn parse_config(path: &Path, contents: &str) -> Result<AppConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yml" | "yaml" => serde_yaml::from_str(contents)
            .map_err(|e| Error::Config(format!("YAML parse error in {}: {e}", path.display()))),
        "toml" => toml::from_str(contents)
            .map_err(|e| Error::Config(format!("TOML parse error in {}: {e}", path.display()))),
        other => Err(Error::Config(format!(
            "unsupported config extension: {other}"
        ))),
    }
}
