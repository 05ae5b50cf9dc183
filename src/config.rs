//! Layered settings: built-in defaults, then the config file, then
//! `ANISOURCE_*` environment variables. CLI flags are applied on top by the
//! binary.

use anyhow::{Context, Result, anyhow};
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::providers::{AllAnimeClient, GogoanimeClient, Provider, ProviderKind, gogoanime};
use crate::types::ResolveOptions;

pub const ENV_PREFIX: &str = "ANISOURCE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub provider: ProviderKind,
    /// Search for dubbed releases unless told otherwise.
    pub dubbed: bool,
    /// Search result position to use for subbed lookups.
    pub index: usize,
    /// Per provider call, in seconds.
    pub timeout_secs: u64,
    pub gogoanime_url: String,
    pub player: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::AllAnime,
            dubbed: false,
            index: 0,
            timeout_secs: 15,
            gogoanime_url: gogoanime::DEFAULT_BASE_URL.to_string(),
            player: "mpv".to_string(),
        }
    }
}

impl Settings {
    pub fn path() -> Result<PathBuf> {
        let base = config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(base.join("anisource").join("config.toml"))
    }

    /// Load settings from the default config file (if present) and the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::path()?,
        };
        Self::load_with_env(&path, Environment::with_prefix(ENV_PREFIX))
    }

    pub fn load_with_env(path: &Path, env: Environment) -> Result<Self> {
        let config = Self::defaults()?
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(env.try_parsing(true))
            .build()
            .with_context(|| format!("failed to load settings from {}", path.display()))?;
        let settings: Settings = config
            .try_deserialize()
            .context("failed to interpret settings")?;
        tracing::debug!(?settings, "loaded settings");
        Ok(settings)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let defaults = Settings::default();
        Ok(Config::builder()
            .set_default("provider", defaults.provider.as_str())?
            .set_default("dubbed", defaults.dubbed)?
            .set_default("index", defaults.index as i64)?
            .set_default("timeout_secs", defaults.timeout_secs as i64)?
            .set_default("gogoanime_url", defaults.gogoanime_url)?
            .set_default("player", defaults.player)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            index: self.index,
            timeout: self.timeout(),
        }
    }

    pub fn build_provider(&self) -> Result<Provider> {
        let provider = match self.provider {
            ProviderKind::AllAnime => {
                Provider::AllAnime(AllAnimeClient::new().context("failed to set up AllAnime")?)
            }
            ProviderKind::Gogoanime => Provider::Gogoanime(
                GogoanimeClient::with_base_url(&self.gogoanime_url)
                    .context("failed to set up Gogoanime")?,
            ),
        };
        Ok(provider)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render settings")
    }
}
