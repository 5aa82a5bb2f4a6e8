//! Explorer configuration, persisted as TOML.
//!
//! Looked up at `$XDG_CONFIG_HOME/ontolens/config.toml`. Every key is
//! optional; CLI flags override whatever the file sets.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::external::ExternalConfig;
use crate::paths::LensPaths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplorerConfig {
    /// Ontology document to explore.
    #[serde(default = "default_ontology_path")]
    pub ontology_path: PathBuf,
    /// Offline cache file. Defaults to the XDG cache directory.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    /// Never write to the ontology (disables import).
    #[serde(default)]
    pub read_only: bool,
    /// Class new individuals are imported under.
    #[serde(default = "default_import_class")]
    pub import_class: String,
    #[serde(default)]
    pub external: ExternalConfig,
}

fn default_ontology_path() -> PathBuf {
    PathBuf::from("criptomonedas.owl")
}
fn default_import_class() -> String {
    "Criptomoneda".into()
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            ontology_path: default_ontology_path(),
            cache_path: None,
            read_only: false,
            import_class: default_import_class(),
            external: ExternalConfig::default(),
        }
    }
}

impl ExplorerConfig {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// The XDG config file if it exists, defaults otherwise.
    pub fn discover(paths: &LensPaths) -> ConfigResult<Self> {
        let file = paths.config_file();
        if file.is_file() {
            tracing::debug!(path = %file.display(), "loading config");
            Self::load(&file)
        } else {
            Ok(Self::default())
        }
    }

    /// Configured cache path, or the XDG default.
    pub fn resolved_cache_path(&self, paths: Option<&LensPaths>) -> PathBuf {
        match (&self.cache_path, paths) {
            (Some(p), _) => p.clone(),
            (None, Some(paths)) => paths.cache_file(),
            (None, None) => PathBuf::from("dbpedia_cache.json"),
        }
    }
}
