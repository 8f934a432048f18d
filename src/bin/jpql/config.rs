//! `cli.toml`: named profiles bundling grammar, metadata and output settings.
//!
//! ```toml
//! default_profile = "legacy"
//!
//! [metadata]
//! default = "/srv/app/orm.json"
//!
//! [profiles.legacy]
//! grammar = "jpql-1.0"
//! style = "lower"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::StyleArg;

/// One `[profiles.<name>]` table.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    #[serde(skip)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grammar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleArg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// Fields a `profile set` invocation overrides; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub grammar: Option<String>,
    pub metadata: Option<PathBuf>,
    pub style: Option<StyleArg>,
    pub strict: Option<bool>,
}

impl Profile {
    fn apply(&mut self, update: ProfileUpdate) {
        self.grammar = update.grammar.or(self.grammar.take());
        self.metadata = update.metadata.or(self.metadata.take());
        self.style = update.style.or(self.style);
        self.strict = update.strict.or(self.strict);
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_profile: Option<String>,
    #[serde(default)]
    metadata: MetadataSection,
    #[serde(default)]
    profiles: BTreeMap<String, Profile>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct MetadataSection {
    #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
    default_path: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    file: ConfigFile,
}

impl CliConfig {
    /// Loads `explicit`, or the per-user config file. A missing file is an
    /// empty config.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let mut file = match path.as_deref() {
            Some(path) if path.exists() => read_config(path)?,
            _ => ConfigFile::default(),
        };
        for (name, profile) in &mut file.profiles {
            profile.name.clone_from(name);
        }
        Ok(Self { path, file })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn default_metadata_path(&self) -> Option<&PathBuf> {
        self.file.metadata.default_path.as_ref()
    }

    /// The configured default, ignored when it names a deleted profile.
    pub fn default_profile_name(&self) -> Option<&str> {
        self.file
            .default_profile
            .as_deref()
            .filter(|name| self.file.profiles.contains_key(*name))
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.file.profiles.get(name)
    }

    /// Profiles sorted by name.
    pub fn profiles(&self) -> Vec<&Profile> {
        self.file.profiles.values().collect()
    }

    pub fn set_default_profile(&mut self, name: Option<&str>) -> Result<(), ConfigError> {
        if let Some(name) = name {
            self.require(name)?;
        }
        self.file.default_profile = name.map(str::to_string);
        Ok(())
    }

    pub fn upsert_profile(&mut self, name: &str, update: ProfileUpdate) {
        let profile = self
            .file
            .profiles
            .entry(name.to_string())
            .or_insert_with(|| Profile {
                name: name.to_string(),
                ..Profile::default()
            });
        profile.apply(update);
    }

    pub fn delete_profile(&mut self, name: &str) -> Result<(), ConfigError> {
        self.require(name)?;
        self.file.profiles.remove(name);
        if self.file.default_profile.as_deref() == Some(name) {
            self.file.default_profile = None;
        }
        Ok(())
    }

    /// Writes the config back, creating parent directories. Returns the path
    /// written.
    pub fn persist(&self) -> Result<PathBuf, ConfigError> {
        let target = self
            .path
            .clone()
            .or_else(default_config_path)
            .ok_or(ConfigError::NoConfigPath)?;
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                action: "create directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let serialized = toml::to_string_pretty(&self.file)?;
        fs::write(&target, serialized).map_err(|source| ConfigError::Io {
            action: "write",
            path: target.clone(),
            source,
        })?;
        Ok(target)
    }

    fn require(&self, name: &str) -> Result<(), ConfigError> {
        if self.file.profiles.contains_key(name) {
            Ok(())
        } else {
            Err(ConfigError::ProfileNotFound {
                name: name.to_string(),
            })
        }
    }
}

fn read_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        action: "read",
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    #[error("invalid CLI config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize CLI config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },
    #[error("no config directory found; pass --config or set JPQL_CONFIG")]
    NoConfigPath,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("jpql").join("cli.toml"))
}
