use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const CONFIG_ENV: &str = "STORYFORGE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

/// Which request contract the generation server speaks.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiVariant {
    /// Story bible requests carry `importance` and `themeEmphasis`.
    #[default]
    Classic,
    /// Story bible requests carry the original `prompt` instead.
    Prompted,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    #[default]
    Local,
    Server,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub variant: ApiVariant,
    /// Unset means requests wait indefinitely.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ExportConfig {
    #[serde(default)]
    pub mode: ExportMode,
}

fn default_output() -> String {
    "output".to_string()
}
fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            variant: ApiVariant::default(),
            timeout_seconds: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_folder: default_output(),
            server: ServerConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn base_url(&self) -> Result<Url> {
        // A trailing slash keeps `Url::join` from dropping the last path segment.
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).with_context(|| format!("Invalid server.base_url: {}", self.base_url))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

impl Config {
    pub fn path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            // Leave a file behind for the user to edit; a read-only
            // directory still gets a working session.
            match config.save_to(path) {
                Ok(()) => log::info!("{} not found, wrote defaults", path.display()),
                Err(e) => log::warn!("{} not found, using defaults: {:#}", path.display(), e),
            }
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.server.base_url()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)
            .with_context(|| format!("Failed to create {}", self.output_folder))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("absent.yml");
        let config = Config::load_from(&path)?;
        assert_eq!(config.output_folder, "output");
        assert_eq!(config.server.base_url, "http://localhost:5000");
        assert_eq!(config.server.variant, ApiVariant::Classic);
        assert_eq!(config.export.mode, ExportMode::Local);
        assert!(config.server.timeout().is_none());

        // the defaults are written out for editing
        assert!(path.exists());
        assert_eq!(Config::load_from(&path)?.server.base_url, "http://localhost:5000");
        Ok(())
    }

    #[test]
    fn test_missing_file_in_missing_directory_still_loads() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nope").join("config.yml");
        let config = Config::load_from(&path)?;
        assert_eq!(config.output_folder, "output");
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_partial_yaml_fills_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yml");
        fs::write(
            &path,
            "server:\n  variant: prompted\n  timeout_seconds: 90\nexport:\n  mode: server\n",
        )?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.server.variant, ApiVariant::Prompted);
        assert_eq!(config.server.timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.export.mode, ExportMode::Server);
        assert_eq!(config.server.base_url, "http://localhost:5000");
        assert_eq!(config.output_folder, "output");
        Ok(())
    }

    #[test]
    fn test_invalid_base_url_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yml");
        fs::write(&path, "server:\n  base_url: \"not a url\"\n")?;
        assert!(Config::load_from(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_base_url_keeps_path_prefix() -> Result<()> {
        let server = ServerConfig {
            base_url: "http://example.test/api".to_string(),
            ..Default::default()
        };
        let url = server.base_url()?.join("generate")?;
        assert_eq!(url.as_str(), "http://example.test/api/generate");
        Ok(())
    }

    #[test]
    fn test_save_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yml");
        let mut config = Config::default();
        config.output_folder = "books".to_string();
        config.save_to(&path)?;
        assert_eq!(Config::load_from(&path)?.output_folder, "books");
        Ok(())
    }
}
