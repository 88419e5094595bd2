//! Application Configuration
//!
//! Engine, image and download settings stored in TOML format. Command-line
//! flags override anything read from the file.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{default_system_dirs, LibrarySearch};
use crate::source::FetchOptions;
use crate::vision::{VisionConfig, DEFAULT_MIN_WIDTH};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Engine library and language pack settings
    pub engine: EngineSettings,
    /// Image preparation settings
    pub image: ImageSettings,
    /// Download settings
    pub fetch: FetchSettings,
}

/// Engine-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Library base name ("tesseract" resolves to libtesseract.so etc.)
    pub library_name: String,
    /// Directories searched before the system ones
    pub search_paths: Vec<PathBuf>,
    /// Also search the platform's usual library directories
    pub use_system_paths: bool,
    /// Platform library directories
    pub system_paths: Vec<PathBuf>,
    /// Folder containing the language packs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tessdata: Option<PathBuf>,
    /// Language code, e.g. "eng"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            library_name: "tesseract".to_string(),
            search_paths: Vec::new(),
            use_system_paths: true,
            system_paths: default_system_dirs(),
            tessdata: None,
            language: None,
        }
    }
}

impl EngineSettings {
    /// Library search built from these settings
    pub fn library_search(&self) -> LibrarySearch {
        let system_paths = if self.use_system_paths {
            self.system_paths.clone()
        } else {
            Vec::new()
        };
        LibrarySearch::new(self.library_name.clone())
            .with_extra_paths(self.search_paths.iter().cloned())
            .with_system_paths(system_paths)
    }
}

/// Image preparation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    /// Images narrower than this are upscaled before recognition
    pub min_width: u32,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            min_width: DEFAULT_MIN_WIDTH,
        }
    }
}

impl ImageSettings {
    pub fn vision_config(&self) -> VisionConfig {
        VisionConfig {
            min_width: self.min_width,
        }
    }
}

/// Download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Largest accepted image in bytes
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        let defaults = FetchOptions::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            max_bytes: defaults.max_bytes,
        }
    }
}

impl FetchSettings {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            max_bytes: self.max_bytes,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("org", "tesseract-capi", "tesseract-capi")
        .ok_or_else(|| anyhow!("Could not determine config directory"))?;

    Ok(proj_dirs.config_dir().to_path_buf())
}

/// Default location of `config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.engine.library_name, "tesseract");
        assert!(config.engine.search_paths.is_empty());
        assert!(config.engine.use_system_paths);
        assert!(!config.engine.system_paths.is_empty());
        assert!(config.engine.tessdata.is_none());
        assert!(config.engine.language.is_none());

        assert_eq!(config.image.min_width, 150);

        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.fetch.max_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.engine.language = Some("chi_sim".to_string());
        config.engine.search_paths = vec![PathBuf::from("/home/ocr/local/lib")];

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.engine.language.as_deref(), Some("chi_sim"));
        assert_eq!(parsed.engine.search_paths, config.engine.search_paths);
        assert!(parsed.engine.tessdata.is_none());
        assert_eq!(parsed.image.min_width, config.image.min_width);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[engine]
language = "eng"
tessdata = "/usr/share/tessdata"

[image]
min_width = 300
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.engine.language.as_deref(), Some("eng"));
        assert_eq!(config.engine.tessdata, Some(PathBuf::from("/usr/share/tessdata")));
        assert_eq!(config.engine.library_name, "tesseract");
        assert_eq!(config.image.min_width, 300);
        assert_eq!(config.fetch.timeout_secs, 30);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.fetch.timeout_secs = 5;

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.fetch.timeout_secs, 5);
        assert_eq!(loaded.fetch.fetch_options().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_library_search_respects_system_toggle() {
        let mut settings = EngineSettings::default();
        settings.search_paths = vec![PathBuf::from("/opt/tess/lib")];

        let search = settings.library_search();
        assert_eq!(search.extra_paths, vec![PathBuf::from("/opt/tess/lib")]);
        assert_eq!(search.system_paths, settings.system_paths);

        settings.use_system_paths = false;
        assert!(settings.library_search().system_paths.is_empty());
    }
}
