//! User settings, layered from a TOML file under the platform config
//! directory and `ANIMIST_`-prefixed environment variables. Environment
//! values override the file; every field has a default, so a missing
//! file is not an error.

use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;
use url::Url;

use crate::types::{Provider, Track};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the metadata resolution service. The hard-coded
    /// public instance remains the fallback even when this is set.
    pub backend_url: Option<String>,
    /// Provider tried first when resolving episodes and streams.
    pub provider: Provider,
    /// Audio track preferred when both are available.
    pub track: Track,
    /// External player binary, e.g. "mpv" or a full path.
    pub player: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: None,
            provider: Provider::Gogoanime,
            track: Track::Sub,
            player: "mpv".to_string(),
        }
    }
}

impl Settings {
    /// Reads settings from `settings_path()` and the environment. A
    /// missing file yields defaults; a malformed file is an error the
    /// user should see rather than silently ignore.
    pub fn load() -> Result<Self> {
        let path = Self::settings_path()?;
        let mut builder = Config::builder();
        if path.exists() {
            builder = builder.add_source(
                File::from(path.clone()).format(FileFormat::Toml),
            );
        } else {
            debug!("no settings file at {}, using defaults", path.display());
        }
        let settings: Settings = builder
            .add_source(Environment::with_prefix("ANIMIST"))
            .build()
            .and_then(Config::try_deserialize)
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        if let Some(backend) = &settings.backend_url {
            Url::parse(backend)
                .with_context(|| format!("backend_url is not a valid URL: {backend}"))?;
        }
        Ok(settings)
    }

    /// Writes the current settings out as TOML, creating the config
    /// directory if needed. Used to seed a file the user can then edit.
    pub fn save(&self) -> Result<()> {
        let path = Self::settings_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }
        let blob = toml::to_string_pretty(self)?;
        fs::write(&path, blob)
            .with_context(|| format!("failed to write settings to {}", path.display()))?;
        Ok(())
    }

    pub fn settings_path() -> Result<PathBuf> {
        let base = config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(base.join("animist").join("settings.toml"))
    }
}
