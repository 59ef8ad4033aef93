//! Proxy configuration.
//!
//! Environment variables:
//! - `GROQ_API_KEY`: upstream key; requests fail with 500 while it is unset
//! - `GROQ_MODEL`: model name (default: `llama-3.3-70b-versatile`)
//! - `GROQ_BASE_URL`: OpenAI-compatible base URL (default: Groq)
//! - `BRANCH_SERVER_HOST` / `BRANCH_SERVER_PORT`: bind address (default: `127.0.0.1:5000`)
//!
//! A `.env` file is read first; variables already present in the process
//! environment take precedence over it.

use std::collections::HashMap;
use std::path::Path;

use branch_llm::upstream::{DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load `.env` from the working directory (if any), then read the
    /// process environment.
    pub fn from_env() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => log::info!("Loaded environment from {}", path.display()),
            Err(err) if err.not_found() => {}
            Err(err) => log::warn!("Ignoring unreadable .env file: {}", err),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings from an explicit env file without touching the process
    /// environment. Process variables still win over the file.
    pub fn from_env_file(path: &Path) -> anyhow::Result<Self> {
        let mut file_vars = HashMap::new();
        for item in dotenvy::from_path_iter(path)? {
            let (key, value) = item?;
            file_vars.insert(key, value);
        }
        Ok(Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .or_else(|| file_vars.get(key).cloned())
        }))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_blank = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            host: non_blank("BRANCH_SERVER_HOST").unwrap_or(defaults.host),
            port: non_blank("BRANCH_SERVER_PORT")
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.port),
            api_key: non_blank("GROQ_API_KEY"),
            model: non_blank("GROQ_MODEL").unwrap_or(defaults.model),
            base_url: non_blank("GROQ_BASE_URL").unwrap_or(defaults.base_url),
        }
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}
