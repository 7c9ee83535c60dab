use std::path::{Path, PathBuf};
use serde::Deserialize;
use crate::error::{AssocError, Result};

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Path to the associations file. Defaults to ~/.assocxml/associations.xml.
    #[serde(default)]
    pub associations: Option<String>,

    /// Default `tracing` filter (e.g. "debug", "assocxml=trace").
    /// `ASSOCXML_LOG` takes precedence when set.
    #[serde(default)]
    pub log: Option<String>,
}

impl Config {
    /// Load config from ~/.assocxml/config.toml.
    /// Returns a default config if the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| AssocError::File {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&raw).map_err(|e| AssocError::TomlParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Resolve the associations file, falling back to ~/.assocxml/associations.xml.
    pub fn associations_path(&self) -> PathBuf {
        match &self.associations {
            Some(p) => PathBuf::from(expand_tilde(p)),
            None => assocxml_dir().join("associations.xml"),
        }
    }

    pub fn log_filter(&self) -> &str {
        self.log.as_deref().unwrap_or("warn")
    }
}

/// Root directory for assocxml config and data: ~/.assocxml/
pub fn assocxml_dir() -> PathBuf {
    home_dir().join(".assocxml")
}

fn config_file_path() -> PathBuf {
    assocxml_dir().join("config.toml")
}

/// Resolve the user's home directory.
///
/// Uses the `HOME` environment variable (the shell's value), falling back to
/// `dirs::home_dir()` if it is unset or empty.
pub fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .ok()
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn expand_tilde(p: &str) -> String {
    match p.strip_prefix("~/") {
        Some(rest) => format!("{}/{}", home_dir().display(), rest),
        None => p.to_string(),
    }
}
