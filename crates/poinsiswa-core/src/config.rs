//! Application configuration management.
//!
//! Settings come from `~/.config/poinsiswa/config.json`, overridden by
//! environment variables. Only the file-backed values are ever written back.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::advice::DEFAULT_MODEL;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "poinsiswa";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_BACKEND_URL: &str = "SUPABASE_URL";
const ENV_BACKEND_ANON_KEY: &str = "SUPABASE_ANON_KEY";
const ENV_ADVICE_API_KEYS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];
const ENV_ADVICE_MODEL: &str = "POINSISWA_ADVICE_MODEL";
const ENV_SCHOOL_UTC_OFFSET: &str = "POINSISWA_UTC_OFFSET";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub backend_url: Option<String>,
    pub backend_anon_key: Option<String>,
    pub advice_api_key: Option<String>,
    pub advice_model: Option<String>,
    /// School time zone as a UTC offset such as `+07:00`. The machine's
    /// local zone is used when unset.
    pub school_utc_offset: Option<String>,
    pub last_email: Option<String>,
}

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub url: String,
    pub anon_key: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// A copy with environment variables applied over the file values.
    pub fn with_env_overrides(&self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(&self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut merged = self.clone();
        if let Some(url) = get(ENV_BACKEND_URL) {
            merged.backend_url = Some(url);
        }
        if let Some(key) = get(ENV_BACKEND_ANON_KEY) {
            merged.backend_anon_key = Some(key);
        }
        if let Some(key) = ENV_ADVICE_API_KEYS.iter().find_map(|name| get(name)) {
            merged.advice_api_key = Some(key);
        }
        if let Some(model) = get(ENV_ADVICE_MODEL) {
            merged.advice_model = Some(model);
        }
        if let Some(offset) = get(ENV_SCHOOL_UTC_OFFSET) {
            merged.school_utc_offset = Some(offset);
        }
        merged
    }

    /// Backend settings, or an error naming what is missing.
    pub fn backend(&self) -> Result<BackendSettings> {
        match (self.backend_url.as_deref(), self.backend_anon_key.as_deref()) {
            (Some(url), Some(anon_key)) => Ok(BackendSettings {
                url: url.to_string(),
                anon_key: anon_key.to_string(),
            }),
            (None, _) => bail!("Backend URL is not configured (set {} or backend_url)", ENV_BACKEND_URL),
            (_, None) => bail!(
                "Backend key is not configured (set {} or backend_anon_key)",
                ENV_BACKEND_ANON_KEY
            ),
        }
    }

    pub fn advice_model(&self) -> &str {
        self.advice_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// The current time in the school's time zone.
    pub fn school_now(&self) -> Result<DateTime<FixedOffset>> {
        self.school_time(Utc::now())
    }

    pub fn school_time(&self, at: DateTime<Utc>) -> Result<DateTime<FixedOffset>> {
        match self.school_utc_offset.as_deref() {
            Some(raw) => {
                let offset: FixedOffset = raw
                    .parse()
                    .map_err(|e| anyhow!("Invalid school UTC offset {:?} (expected e.g. +07:00): {}", raw, e))?;
                Ok(at.with_timezone(&offset))
            }
            None => Ok(at.with_timezone(&Local).fixed_offset()),
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        let path = cache_dir.join(APP_NAME);
        std::fs::create_dir_all(&path).context("Failed to create cache directory")?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_overrides_file_values() {
        let file = Config {
            backend_url: Some("https://file.example.co".to_string()),
            last_email: Some("guru@sekolah.sch.id".to_string()),
            ..Default::default()
        };
        let merged = file.with_overrides(env(&[
            ("SUPABASE_URL", "https://env.example.co"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("GEMINI_API_KEY", "g-key"),
        ]));
        assert_eq!(merged.backend_url.as_deref(), Some("https://env.example.co"));
        assert_eq!(merged.advice_api_key.as_deref(), Some("g-key"));
        assert_eq!(merged.last_email, file.last_email);
        assert_eq!(merged.advice_model(), DEFAULT_MODEL);
        assert!(file.advice_api_key.is_none());
    }

    #[test]
    fn test_api_key_takes_precedence() {
        let merged = Config::default().with_overrides(env(&[("API_KEY", "a"), ("GEMINI_API_KEY", "b")]));
        assert_eq!(merged.advice_api_key.as_deref(), Some("a"));
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let file = Config {
            backend_anon_key: Some("file-key".to_string()),
            ..Default::default()
        };
        let merged = file.with_overrides(env(&[("SUPABASE_ANON_KEY", "  ")]));
        assert_eq!(merged.backend_anon_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn test_backend_requires_both_settings() {
        assert!(Config::default().backend().is_err());
        let partial = Config {
            backend_url: Some("https://x.example.co".to_string()),
            ..Default::default()
        };
        let err = partial.backend().unwrap_err().to_string();
        assert!(err.contains("SUPABASE_ANON_KEY"));

        let full = Config {
            backend_anon_key: Some("anon".to_string()),
            ..partial
        };
        assert_eq!(full.backend().unwrap().url, "https://x.example.co");
    }

    #[test]
    fn test_school_time_uses_configured_offset() {
        let config = Config::default().with_overrides(env(&[("POINSISWA_UTC_OFFSET", "+07:00")]));
        let at = Utc.with_ymd_and_hms(2024, 2, 29, 17, 30, 0).unwrap();
        let local = config.school_time(at).unwrap();
        assert_eq!(local.offset().local_minus_utc(), 7 * 3600);
        assert_eq!((local.year(), local.month(), local.day(), local.hour()), (2024, 3, 1, 0));
        assert_eq!(local.with_timezone(&Utc), at);
    }

    #[test]
    fn test_school_time_defaults_to_local_zone() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let local = Config::default().school_time(at).unwrap();
        assert_eq!(local.with_timezone(&Utc), at);

        let bad = Config {
            school_utc_offset: Some("Asia/Jakarta".to_string()),
            ..Default::default()
        };
        assert!(bad.school_time(at).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        let config = Config {
            last_email: Some("admin@sekolah.sch.id".to_string()),
            advice_model: Some("gemini-2.5-pro".to_string()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
