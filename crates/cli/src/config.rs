//! Configuration file for `blankfill`.
//!
//! Looked up in order: `--config <path>`, the `BLANKFILL_CONFIG` environment
//! variable, then `./blankfill.toml` if it exists. Every section and key is
//! optional. API keys are never read from here, only from the environment.
//!
//! # Example
//!
//! ```toml
//! [scan]
//! context_radius = 80
//! preview_chars = 500
//!
//! [oracle]
//! provider = "openai"          # openai | anthropic | heuristic
//! model = "gpt-4o-mini"
//! base_url = "https://api.openai.com"
//!
//! [rewrite]
//! slot_policy = "best-effort"  # best-effort | strict
//! ```

use std::path::{Path, PathBuf};

use blankfill_core::{ScanOptions, SlotPolicy};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "BLANKFILL_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "blankfill.toml";

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub scan: ScanOptions,
    pub oracle: OracleSettings,
    pub rewrite: RewriteSettings,
}

/// Which decision oracle `fill` talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OracleProvider {
    #[default]
    Openai,
    Anthropic,
    Heuristic,
}

impl OracleProvider {
    /// Environment variable holding the provider's API key, if it needs one.
    pub fn api_key_env(self) -> Option<&'static str> {
        match self {
            OracleProvider::Openai => Some("OPENAI_API_KEY"),
            OracleProvider::Anthropic => Some("ANTHROPIC_API_KEY"),
            OracleProvider::Heuristic => None,
        }
    }
}

/// `[oracle]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleSettings {
    pub provider: OracleProvider,
    /// Model name; the provider's default when absent.
    pub model: Option<String>,
    /// API base URL; the provider's public endpoint when absent.
    pub base_url: Option<String>,
}

/// `[rewrite]` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteSettings {
    pub slot_policy: SlotPolicy,
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Read and parse a config file from `path`.
///
/// Returns a human-readable error string on failure.
pub fn read_config(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

/// Find and load the config. An explicitly named file (flag or environment)
/// must exist; the default file is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, String> {
    let named = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    if let Some(path) = named {
        tracing::debug!(path = %path.display(), "loading config");
        return read_config(&path);
    }

    let default = Path::new(DEFAULT_CONFIG_FILE);
    if default.is_file() {
        tracing::debug!(path = %default.display(), "loading config");
        return read_config(default);
    }
    Ok(Config::default())
}
