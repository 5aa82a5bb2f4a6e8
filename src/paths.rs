//! XDG-compliant path resolution for ontolens.
//!
//! Provides `LensPaths`: where the config file is looked up and where the
//! offline cache lives when no explicit path is configured.

use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult};

const APP_DIR: &str = "ontolens";

/// Global XDG-compliant directories for ontolens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LensPaths {
    /// `$XDG_CONFIG_HOME/ontolens/`
    pub config_dir: PathBuf,
    /// `$XDG_CACHE_HOME/ontolens/`
    pub cache_dir: PathBuf,
}

impl LensPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> ConfigResult<Self> {
        Self::resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary variable lookup.
    pub fn resolve_with(var: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let home = var("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::NoHome)?;

        let xdg = |key: &str, fallback: &str| {
            var(key)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| home.join(fallback))
                .join(APP_DIR)
        };

        Ok(Self {
            config_dir: xdg("XDG_CONFIG_HOME", ".config"),
            cache_dir: xdg("XDG_CACHE_HOME", ".cache"),
        })
    }

    /// Path to the global config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Default location of the DBpedia offline cache.
    pub fn cache_file(&self) -> PathBuf {
        self.cache_dir.join("dbpedia_cache.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn falls_back_to_home() {
        let paths = LensPaths::resolve_with(env(&[("HOME", "/home/ada")])).unwrap();
        assert_eq!(paths.config_file(), PathBuf::from("/home/ada/.config/ontolens/config.toml"));
        assert_eq!(
            paths.cache_file(),
            PathBuf::from("/home/ada/.cache/ontolens/dbpedia_cache.json")
        );
    }

    #[test]
    fn xdg_overrides_win() {
        let paths = LensPaths::resolve_with(env(&[
            ("HOME", "/home/ada"),
            ("XDG_CONFIG_HOME", "/cfg"),
            ("XDG_CACHE_HOME", "/var/cache"),
        ]))
        .unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/cfg/ontolens"));
        assert_eq!(paths.cache_dir, PathBuf::from("/var/cache/ontolens"));
    }

    #[test]
    fn missing_home_is_an_error() {
        let err = LensPaths::resolve_with(env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::NoHome));
    }
}
