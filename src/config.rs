use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub notion: NotionConfig,
    pub summary: SummaryConfig,
    pub recap: RecapConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Page text beyond this many characters is cut before prompting.
    pub max_content_chars: usize,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 120,
            max_content_chars: 300_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    pub api_key: Option<String>,
    pub database_id: Option<String>,
    pub base_url: String,
    pub version: String,
    /// Blocks sent per request.
    pub chunk_size: usize,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            database_id: None,
            base_url: "https://api.notion.com/v1".to_string(),
            version: "2022-06-28".to_string(),
            chunk_size: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub output_dir: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            user_agent: concat!("Mozilla/5.0 (compatible; notedown/", env!("CARGO_PKG_VERSION"), ")")
                .to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RecapConfig {
    pub max_chars: usize,
}

impl Default for RecapConfig {
    fn default() -> Self {
        Self { max_chars: 100_000 }
    }
}

impl Config {
    /// Load config from a TOML file, or return defaults if not found.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                warn!("ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// `<config dir>/notedown/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("notedown").join("config.toml"))
    }

    /// Override credentials from `GEMINI_API_KEY`, `NOTION_API_KEY` and
    /// `NOTION_DATABASE_ID`.
    pub fn with_env(mut self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(key) = get("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Some(key) = get("NOTION_API_KEY") {
            self.notion.api_key = Some(key);
        }
        if let Some(id) = get("NOTION_DATABASE_ID") {
            self.notion.database_id = Some(id);
        }
    }

    pub fn gemini_api_key(&self) -> Result<&str> {
        non_empty(&self.gemini.api_key).ok_or(Error::MissingCredential("Gemini API key"))
    }

    pub fn notion_api_key(&self) -> Result<&str> {
        non_empty(&self.notion.api_key).ok_or(Error::MissingCredential("Notion API key"))
    }

    pub fn notion_database_id(&self) -> Result<&str> {
        non_empty(&self.notion.database_id).ok_or(Error::MissingCredential("Notion database id"))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
