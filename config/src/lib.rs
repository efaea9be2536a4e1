//! Load configuration from XDG `config.toml` and project `.env`, then apply to the
//! process environment with priority: **existing env > .env > XDG**.
//!
//! [`ServerSettings`] is the typed view over the applied environment: listen port,
//! public base URL, agent config directory, provider/backend credentials, and
//! model defaults.

mod dotenv;
mod settings;
mod xdg_toml;

use std::path::Path;
use thiserror::Error;

pub use settings::ServerSettings;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },
}

/// Loads config from XDG `config.toml` and optional project `.env`, then sets
/// environment variables only for keys that are **not** already set (so existing
/// env has highest priority).
///
/// Order of precedence when a key is missing in the process environment:
/// 1. Value from project `.env` (current directory or `override_dir` if given)
/// 2. Value from `~/.config/<app_name>/config.toml` `[env]` table
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let xdg_map = xdg_toml::load_env_map(app_name)?;
    let dotenv_map = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;

    let mut keys: std::collections::HashSet<String> = xdg_map.keys().cloned().collect();
    keys.extend(dotenv_map.keys().cloned());

    for key in keys {
        if std::env::var(&key).is_ok() {
            continue; // existing env wins
        }
        let value = dotenv_map.get(&key).or_else(|| xdg_map.get(&key)).cloned();
        if let Some(v) = value {
            std::env::set_var(&key, v);
        }
    }

    Ok(())
}
