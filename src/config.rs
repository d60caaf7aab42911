//! User settings at ~/.ipinformer/config.json.
//!
//! Every key is optional; a missing file means defaults. The path can be
//! overridden with `IPINFORMER_CONFIG`. Command-line flags are applied on top
//! of whatever the file sets.

use crate::geo::{Aggregator, ConfigError, FailurePolicy, ProviderRef, Transport, DEFAULT_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const CONFIG_ENV: &str = "IPINFORMER_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Language name, provider code (`pt-BR`) or numeric id.
    pub language: Option<String>,
    /// 0 means every registered provider.
    pub provider_cap: usize,
    /// Provider names or ids never queried.
    pub exclude: Vec<String>,
    /// Provider name or id → API key.
    pub api_keys: BTreeMap<String, String>,
    pub timeout_secs: Option<u64>,
    pub on_transport_error: FailurePolicy,
}

impl Settings {
    /// Load from `IPINFORMER_CONFIG` if set, else the default path.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path())
    }

    /// Load from a specific file. A missing file yields defaults; an
    /// unreadable or malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let settings: Self = serde_json::from_str(&data)?;
        debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn path() -> PathBuf {
        match std::env::var_os(CONFIG_ENV) {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => Self::default_path(),
        }
    }

    fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ipinformer")
            .join("config.json")
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        match self.timeout_secs {
            Some(0) | None => DEFAULT_TIMEOUT,
            Some(secs) => Duration::from_secs(secs),
        }
    }

    /// Push these settings into an engine. Unknown providers are errors; an
    /// unknown language only warns and leaves provider defaults in place.
    pub fn apply_to<T: Transport>(&self, agg: &mut Aggregator<T>) -> Result<(), ConfigError> {
        if let Some(lang) = self.language.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            let applied = match lang.parse::<u8>() {
                Ok(id) => agg.set_language(id),
                Err(_) => agg.set_language(lang),
            };
            if let Err(e) = applied {
                warn!("{}, providers will answer in their default language", e);
            }
        }

        agg.set_provider_cap(self.provider_cap);
        agg.set_failure_policy(self.on_transport_error);

        for provider in &self.exclude {
            agg.exclude(ProviderRef::parse(provider))?;
        }
        for (provider, key) in &self.api_keys {
            agg.set_api_key(ProviderRef::parse(provider), key.as_str())?;
        }
        Ok(())
    }
}

/// Parse one `PROVIDER=KEY` entry.
pub fn parse_key_entry(entry: &str) -> Result<(String, String), ConfigError> {
    let malformed = || ConfigError::MalformedKey(entry.to_string());
    let (provider, key) = entry.split_once('=').ok_or_else(malformed)?;
    let (provider, key) = (provider.trim(), key.trim());
    if provider.is_empty() || key.is_empty() {
        return Err(malformed());
    }
    Ok((provider.to_string(), key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::testing::{alpha_beta, ScriptedTransport};
    use crate::geo::Language;
    use std::sync::Arc;

    fn engine() -> Aggregator<ScriptedTransport> {
        Aggregator::new(Arc::new(alpha_beta()), Arc::new(ScriptedTransport::new()))
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"language": "de", "exclude": ["beta"], "on_transport_error": "abort"}"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.language.as_deref(), Some("de"));
        assert_eq!(settings.exclude, vec!["beta".to_string()]);
        assert_eq!(settings.on_transport_error, FailurePolicy::AbortRun);
        assert_eq!(settings.provider_cap, 0);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Settings::load_from(&path), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut settings = Settings {
            timeout_secs: Some(2),
            ..Settings::default()
        };
        settings.api_keys.insert("ipwhois.app".into(), "secret".into());
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_apply_to_engine() {
        let settings = Settings {
            language: Some("1".into()),
            provider_cap: 1,
            exclude: vec!["1".into()],
            api_keys: BTreeMap::from([("alpha".to_string(), "k".to_string())]),
            ..Settings::default()
        };
        let mut agg = engine();
        settings.apply_to(&mut agg).unwrap();

        let config = agg.config();
        assert_eq!(config.language, Some(Language::German));
        assert_eq!(config.provider_cap, 1);
        assert!(config.excluded.contains(&1));
        assert_eq!(config.api_keys.get(&0).map(String::as_str), Some("k"));
    }

    #[test]
    fn test_apply_rejects_unknown_provider() {
        let settings = Settings {
            exclude: vec!["gamma".into()],
            ..Settings::default()
        };
        assert!(matches!(
            settings.apply_to(&mut engine()),
            Err(ConfigError::UnsupportedProvider(p)) if p == "gamma"
        ));
    }

    #[test]
    fn test_unknown_language_is_not_fatal() {
        let settings = Settings {
            language: Some("klingon".into()),
            ..Settings::default()
        };
        let mut agg = engine();
        assert!(settings.apply_to(&mut agg).is_ok());
        assert_eq!(agg.config().language, None);
    }

    #[test]
    fn test_parse_key_entries() {
        assert_eq!(
            parse_key_entry(" ipwhois.app = abc ").unwrap(),
            ("ipwhois.app".to_string(), "abc".to_string())
        );
        assert!(matches!(parse_key_entry("abc"), Err(ConfigError::MalformedKey(_))));
        assert!(parse_key_entry("=abc").is_err());
        assert!(parse_key_entry("alpha=").is_err());
        // keys may themselves contain '='
        assert_eq!(parse_key_entry("beta=a=b").unwrap().1, "a=b");
    }
}
