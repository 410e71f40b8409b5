//! Runtime configuration loaded from the environment

use std::path::PathBuf;

use reqwest::Url;
use tracing::debug;

use crate::error::{Error, Result};

pub const ENV_API_URL: &str = "LINGO_API_URL";
pub const ENV_TTS_VOICE: &str = "LINGO_TTS_VOICE";
pub const ENV_AUTOPLAY: &str = "LINGO_AUTOPLAY";
pub const ENV_DB_PATH: &str = "LINGO_DB_PATH";

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Common prefix of every endpoint, always ending in `/`
    pub api_base_url: String,
    /// Voice passed to text-to-speech, server default when unset
    pub voice: Option<String>,
    /// Speak each assistant reply once it arrives
    pub autoplay_responses: bool,
    /// SQLite file holding the durable settings
    pub database_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: normalize_base_url(DEFAULT_API_URL),
            voice: None,
            autoplay_responses: true,
            database_path: default_database_path(),
        }
    }
}

impl Config {
    /// Build from `LINGO_*` environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            config.api_base_url = normalize_base_url(&url);
        }
        config.voice = lookup(ENV_TTS_VOICE).filter(|v| !v.trim().is_empty());
        if let Some(flag) = lookup(ENV_AUTOPLAY) {
            config.autoplay_responses = !matches!(flag.trim(), "0" | "false" | "FALSE" | "False");
        }
        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.is_empty()) {
            config.database_path = PathBuf::from(path);
        }

        debug!(?config, "Loaded configuration");
        config
    }

    pub fn with_api_base_url(mut self, url: &str) -> Self {
        self.api_base_url = normalize_base_url(url);
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay_responses = autoplay;
        self
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Parse the base URL, rejecting anything that cannot carry relative paths
    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(&self.api_base_url)
            .map_err(|e| Error::Config(format!("invalid API base URL {:?}: {e}", self.api_base_url)))?;
        if url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "API base URL {:?} cannot be used as a base",
                self.api_base_url
            )));
        }
        Ok(url)
    }
}

/// Strip trailing slashes, then append exactly one
pub fn normalize_base_url(url: &str) -> String {
    format!("{}/", url.trim().trim_end_matches('/'))
}

fn default_database_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("lingo");
    path.push("lingo.db");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[]));
        assert_eq!(config.api_base_url, "http://localhost:5000/api/");
        assert!(config.voice.is_none());
        assert!(config.autoplay_responses);
        assert!(config.database_path.ends_with("lingo/lingo.db"));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_API_URL, "https://practice.example.com/api//"),
            (ENV_TTS_VOICE, "nova"),
            (ENV_AUTOPLAY, "false"),
            (ENV_DB_PATH, "/tmp/lingo-test.db"),
        ]));
        assert_eq!(config.api_base_url, "https://practice.example.com/api/");
        assert_eq!(config.voice.as_deref(), Some("nova"));
        assert!(!config.autoplay_responses);
        assert_eq!(config.database_path, PathBuf::from("/tmp/lingo-test.db"));
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://h/api"), "http://h/api/");
        assert_eq!(normalize_base_url("http://h/api/"), "http://h/api/");
        assert_eq!(normalize_base_url("http://h/api///"), "http://h/api/");
    }

    #[test]
    fn test_validate() {
        let url = Config::default().validate().unwrap();
        assert_eq!(url.join("conversation").unwrap().path(), "/api/conversation");

        let bad = Config::default().with_api_base_url("not a url");
        assert!(matches!(bad.validate(), Err(Error::Config(_))));

        let opaque = Config::default().with_api_base_url("mailto:someone@example.com");
        assert!(matches!(opaque.validate(), Err(Error::Config(_))));
    }
}
