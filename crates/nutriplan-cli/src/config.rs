//! Configuration file management for nutriplan.
//!
//! Provides a TOML-based config file at `~/.config/nutriplan/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use nutriplan_core::PlannerConfig;
use nutriplan_core::backend::{
    CATALOG_PATH_ENV, DEFAULT_BASE_URL, DEFAULT_EXTRACTION_MODEL, DEFAULT_GENERATION_MODEL,
    EXTRACTION_MODEL_ENV, LLM_API_KEY_ENV, LLM_BASE_URL_ENV, LLM_MODEL_ENV, ServiceSettings,
};

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub catalog: CatalogSection,
    /// Limits and tolerances; omitted keys keep their defaults.
    #[serde(default)]
    pub planner: PlannerConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LlmSection {
    pub base_url: String,
    pub model: String,
    pub extraction_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
            extraction_model: DEFAULT_EXTRACTION_MODEL.to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CatalogSection {
    /// JSON file of knowledge-base documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the nutriplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/nutriplan` or
/// `~/.config/nutriplan`, never the platform-specific `dirs::config_dir()`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("nutriplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("nutriplan")
}

/// Return the path to the nutriplan config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&config_path())
}

fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents).context("failed to parse config file")
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix, since it may hold an API key.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line; `None` defers to the rest of the chain.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub catalog: Option<PathBuf>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct NutriplanConfig {
    pub services: ServiceSettings,
    pub planner: PlannerConfig,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl NutriplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Base URL: `--base-url` > `NUTRIPLAN_LLM_BASE_URL` > `llm.base_url` > OpenAI
    /// - Model: `--model` > `NUTRIPLAN_LLM_MODEL` > `llm.model` > `gpt-4o`
    /// - Extraction model: `NUTRIPLAN_EXTRACTION_MODEL` > `llm.extraction_model` > `gpt-4o-mini`
    /// - API key: `NUTRIPLAN_LLM_API_KEY` > `llm.api_key`
    /// - Catalog: `--catalog` > `NUTRIPLAN_CATALOG_PATH` > `catalog.path`
    ///
    /// A missing API key or catalog is not an error here; the backends report
    /// every missing value together on first use.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let path = config_path();
        let file_config = if path.exists() {
            load_config_from(&path)?
        } else {
            ConfigFile::default()
        };
        Ok(Self::resolve_with(cli, file_config))
    }

    fn resolve_with(cli: &CliOverrides, file: ConfigFile) -> Self {
        let ConfigFile {
            llm,
            catalog,
            planner,
        } = file;

        let services = ServiceSettings {
            base_url: cli
                .base_url
                .clone()
                .or_else(|| env_var(LLM_BASE_URL_ENV))
                .unwrap_or(llm.base_url),
            generation_model: cli
                .model
                .clone()
                .or_else(|| env_var(LLM_MODEL_ENV))
                .unwrap_or(llm.model),
            extraction_model: env_var(EXTRACTION_MODEL_ENV).unwrap_or(llm.extraction_model),
            api_key: env_var(LLM_API_KEY_ENV).or(llm.api_key),
            catalog_path: cli
                .catalog
                .clone()
                .or_else(|| env_var(CATALOG_PATH_ENV).map(PathBuf::from))
                .or(catalog.path),
        };

        Self { services, planner }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
