use imagegen::{BackendConfig, Credential};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use storyboard::{ParserConfig, StyleTag};
use thiserror::Error;
use tracing::{debug, info};

/// Environment variables checked before the stored key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["STORYBOARD_API_KEY", "GEMINI_API_KEY"];

pub fn app_config_dir() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(std::env::temp_dir);
    base.join("storyboard_workshop")
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SettingsError + '_ {
    move |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn ensure_parent(path: &Path) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub default_style: StyleTag,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

impl AppSettings {
    pub fn default_path() -> PathBuf {
        app_config_dir().join("settings.json")
    }

    /// Missing file means defaults; a malformed one is an error.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        match fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(io_err(path)(err)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        ensure_parent(path)?;
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err(path))
    }
}

/// Where the API key lives between sessions.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_location() -> Self {
        Self::new(app_config_dir().join("credential"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Credential>, SettingsError> {
        match fs::read_to_string(&self.path) {
            Ok(key) => Ok(Credential::new(key)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(&self.path)(err)),
        }
    }

    pub fn save(&self, credential: &Credential) -> Result<(), SettingsError> {
        ensure_parent(&self.path)?;
        fs::write(&self.path, credential.expose()).map_err(io_err(&self.path))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(io_err(&self.path))?;
        }
        info!(path = %self.path.display(), "API key saved");
        Ok(())
    }

    /// Forgets the stored key. Returns whether one existed.
    pub fn clear(&self) -> Result<bool, SettingsError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_err(&self.path)(err)),
        }
    }

    /// Environment first, then the stored key.
    pub fn resolve(&self) -> Result<Option<Credential>, SettingsError> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Credential>, SettingsError> {
        for name in API_KEY_ENV_VARS {
            if let Some(credential) = lookup(name).and_then(Credential::new) {
                debug!(source = name, "using API key from environment");
                return Ok(Some(credential));
            }
        }
        self.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyboard::{ExtractionPolicy, Locale};

    #[test]
    fn test_missing_settings_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings::load_or_default(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.default_style, StyleTag::Sketch);
    }

    #[test]
    fn test_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = AppSettings::default();
        settings.default_style = StyleTag::Noir;
        settings.parser = ParserConfig::default()
            .with_policy(ExtractionPolicy::Structured)
            .with_locale(Locale::Vietnamese);
        settings.save(&path).unwrap();

        assert_eq!(AppSettings::load_or_default(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_settings_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "default_style": "realistic" }"#).unwrap();
        let settings = AppSettings::load_or_default(&path).unwrap();
        assert_eq!(settings.default_style, StyleTag::Realistic);
        assert_eq!(settings.parser, ParserConfig::default());
    }

    #[test]
    fn test_malformed_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AppSettings::load_or_default(&path),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn test_credential_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credential"));
        assert!(store.load().unwrap().is_none());

        store.save(&Credential::new("abc123").unwrap()).unwrap();
        assert_eq!(store.load().unwrap().unwrap().expose(), "abc123");

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_environment_overrides_stored_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credential"));
        store.save(&Credential::new("stored").unwrap()).unwrap();

        let from_env = store
            .resolve_with(|name| (name == "GEMINI_API_KEY").then(|| "env-key".to_string()))
            .unwrap();
        assert_eq!(from_env.unwrap().expose(), "env-key");

        let blank_env = store.resolve_with(|_| Some("   ".to_string())).unwrap();
        assert_eq!(blank_env.unwrap().expose(), "stored");
    }
}
