use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{map_io_err, EditorError, EditorResult};
use crate::publish::git::{DEFAULT_BRANCH, DEFAULT_REMOTE};
use crate::publish::{GitPublisher, Publisher};

/// Runtime settings for the editor and its HTTP front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Device configuration file being edited
    pub config_file: PathBuf,
    /// Create the file with demo content at startup when missing
    pub seed_default: bool,
    pub server: ServerSettings,
    pub publish: PublishSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub workers: usize,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    pub enabled: bool,
    /// Repository root; defaults to the directory holding the config file
    pub repo_dir: Option<PathBuf>,
    pub branch: String,
    pub remote: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("rtr1_config.txt"),
            seed_default: false,
            server: ServerSettings::default(),
            publish: PublishSettings::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            workers: 4,
            max_body_bytes: 64 * 1024,
        }
    }
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            repo_dir: None,
            branch: DEFAULT_BRANCH.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
        }
    }
}

impl Settings {
    /// Load from a JSON, YAML or TOML file, picked by extension
    pub fn load(path: &Path) -> EditorResult<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let content = std::fs::read_to_string(path).map_err(map_io_err(path))?;

        let settings: Settings = match ext {
            "json" => serde_json::from_str(&content)?,
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            _ => {
                return Err(EditorError::invalid_argument(format!(
                    "Unsupported config format: {}",
                    ext
                )))
            }
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Write to a JSON, YAML or TOML file, creating parent directories
    pub fn save(&self, path: &Path) -> EditorResult<()> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let content = match ext {
            "json" => serde_json::to_string_pretty(self)?,
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            "toml" => toml::to_string(self)?,
            _ => {
                return Err(EditorError::invalid_argument(format!(
                    "Unsupported config format: {}",
                    ext
                )))
            }
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(map_io_err(parent))?;
            }
        }
        std::fs::write(path, content).map_err(map_io_err(path))?;
        Ok(())
    }

    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cfgedit")
            .join("config.toml")
    }

    /// Load an explicit settings file, or the default one if it exists.
    /// Falls back to built-in defaults only when no path was given.
    pub fn load_or_default(path: Option<&Path>) -> EditorResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Self::default_config_path();
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> EditorResult<()> {
        if self.config_file.as_os_str().is_empty() {
            return Err(EditorError::invalid_argument("config_file must not be empty"));
        }
        if self.server.bind.trim().is_empty() {
            return Err(EditorError::invalid_argument("server.bind must not be empty"));
        }
        if self.server.workers == 0 {
            return Err(EditorError::invalid_argument(
                "server.workers must be at least 1",
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(EditorError::invalid_argument(
                "server.max_body_bytes must be at least 1",
            ));
        }
        if self.publish.enabled && self.publish.branch.trim().is_empty() {
            return Err(EditorError::invalid_argument("publish.branch must not be empty"));
        }
        Ok(())
    }

    /// Build the configured publisher, if publishing is enabled
    pub fn publisher(&self) -> EditorResult<Option<Arc<dyn Publisher>>> {
        if !self.publish.enabled {
            return Ok(None);
        }

        let file = if self.config_file.is_absolute() {
            self.config_file.clone()
        } else {
            std::env::current_dir()?.join(&self.config_file)
        };

        let repo_dir = match &self.publish.repo_dir {
            Some(dir) => dir.clone(),
            None => file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        let publisher = GitPublisher::new(repo_dir, file)
            .with_branch(&self.publish.branch)
            .with_remote(&self.publish.remote);

        Ok(Some(Arc::new(publisher)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.config_file, PathBuf::from("rtr1_config.txt"));
        assert_eq!(settings.server.bind, "127.0.0.1:5000");
        assert_eq!(settings.server.workers, 4);
        assert!(!settings.publish.enabled);
        assert_eq!(settings.publish.branch, "update-rtr1-config");
        assert!(settings.validate().is_ok());
        assert!(settings.publisher().unwrap().is_none());
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfgedit.toml");
        std::fs::write(
            &path,
            "config_file = \"/srv/rtr9.txt\"\n\n[server]\nworkers = 2\n\n[publish]\nenabled = true\nbranch = \"lab\"\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.config_file, PathBuf::from("/srv/rtr9.txt"));
        assert_eq!(settings.server.workers, 2);
        assert_eq!(settings.server.bind, "127.0.0.1:5000");
        assert!(settings.publish.enabled);
        assert_eq!(settings.publish.branch, "lab");
        assert_eq!(settings.publish.remote, "origin");

        let publisher = settings.publisher().unwrap().unwrap();
        assert_eq!(publisher.name(), "git");
    }

    #[test]
    fn test_yaml_and_json_roundtrip() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.server.bind = "0.0.0.0:8080".to_string();
        settings.seed_default = true;

        for name in ["s.yaml", "s.json", "s.toml"] {
            let path = dir.path().join(name);
            settings.save(&path).unwrap();
            assert_eq!(Settings::load(&path).unwrap(), settings);
        }
    }

    #[test]
    fn test_rejects_unknown_extension_and_bad_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(EditorError::InvalidArgument { .. })
        ));

        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"workers": 0}}"#).unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(EditorError::InvalidArgument { .. })
        ));

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(EditorError::ParseError { .. })
        ));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfgedit").join("config.toml");
        let mut settings = Settings::default();
        settings.config_file = PathBuf::from("/srv/rtr1_config.txt");

        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Settings::load_or_default(Some(&missing)),
            Err(EditorError::Io { .. })
        ));
    }
}
