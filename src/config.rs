//! Configuration management for jobscout using the prefer crate.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::LlmConfig;
use crate::quota::QuotaConfig;
use crate::scrapers::{BrowserEngineConfig, CaptchaConfig, ScrapeConfig, SessionConfig};

const SESSIONS_SUBDIR: &str = "sessions";
const OUTPUT_SUBDIR: &str = "results";

/// Runtime paths and defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Where session blobs are stored.
    pub sessions_dir: PathBuf,
    /// Default directory for result files.
    pub output_dir: PathBuf,
    /// Concurrent analyses per batch.
    pub analysis_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        // Platform data dir, falling back to home, then CWD
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jobscout");
        Self::with_data_dir(data_dir)
    }
}

impl Settings {
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            sessions_dir: data_dir.join(SESSIONS_SUBDIR),
            output_dir: data_dir.join(OUTPUT_SUBDIR),
            data_dir,
            analysis_concurrency: 2,
        }
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (dir, label) in [
            (&self.data_dir, "data"),
            (&self.sessions_dir, "sessions"),
            (&self.output_dir, "output"),
        ] {
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        label,
                        dir.display(),
                        e
                    ),
                )
            })?;
        }
        Ok(())
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Session store directory (defaults under the data dir).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions_dir: Option<String>,
    /// Result output directory (defaults under the data dir).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Concurrent analyses per batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_concurrency: Option<usize>,
    /// Scoring service.
    #[serde(default, skip_serializing_if = "LlmConfig::is_default")]
    pub llm: LlmConfig,
    /// Scoring service budgets.
    #[serde(default, skip_serializing_if = "QuotaConfig::is_default")]
    pub quota: QuotaConfig,
    /// Browser launch settings.
    #[serde(default, skip_serializing_if = "BrowserEngineConfig::is_default")]
    pub browser: BrowserEngineConfig,
    #[serde(default, skip_serializing_if = "CaptchaConfig::is_default")]
    pub captcha: CaptchaConfig,
    #[serde(default, skip_serializing_if = "SessionConfig::is_default")]
    pub session: SessionConfig,
    #[serde(default, skip_serializing_if = "ScrapeConfig::is_default")]
    pub scrape: ScrapeConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover a `jobscout` config file in the standard locations.
    pub async fn load() -> Self {
        // prefer finds the file, serde parses it
        match prefer::load("jobscout").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_or_default(path).await,
                None => Self::default(),
            },
            Err(e) => {
                debug!("No config file discovered: {}", e);
                Self::default()
            }
        }
    }

    async fn load_or_default(path: &Path) -> Self {
        match Self::load_from_path(path).await {
            Ok(config) => config,
            Err(e) => {
                warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn parse(contents: &str, ext: &str) -> Result<Self, String> {
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e)),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Directory of the config file, if loaded from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved against `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            *settings = Settings {
                analysis_concurrency: settings.analysis_concurrency,
                ..Settings::with_data_dir(self.resolve_path(data_dir, base_dir))
            };
        }
        if let Some(ref dir) = self.sessions_dir {
            settings.sessions_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(dir) = self.session.dir.as_ref().and_then(|d| d.to_str()) {
            settings.sessions_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref dir) = self.output_dir {
            settings.output_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(n) = self.analysis_concurrency {
            settings.analysis_concurrency = n.max(1);
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory override (--data flag).
    pub data: Option<PathBuf>,
}

/// Load settings and config. Returns (Settings, Config).
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => Config::load_or_default(path).await,
        None => Config::load().await,
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    if let Some(ref data) = options.data {
        let data_dir = if data.is_absolute() {
            data.clone()
        } else {
            cwd.join(data)
        };
        settings = Settings {
            analysis_concurrency: settings.analysis_concurrency,
            ..Settings::with_data_dir(data_dir)
        };
    }
    debug!("Data directory: {}", settings.data_dir.display());
    (settings, config)
}
