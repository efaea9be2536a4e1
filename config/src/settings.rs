//! Typed server settings resolved from the process environment.
//!
//! Model defaults (`AVIARY_DEFAULT_MODEL`, `AVIARY_DEFAULT_TEMPERATURE`,
//! `AVIARY_DEFAULT_MAX_TOKENS`) and backend credentials (`GEMINI_API_KEY`,
//! `PINECONE_API_KEY`, `CHROMA_URL`, `PGVECTOR_API_URL`, …) stay in the
//! environment and are read by the components that need them; this struct
//! carries only what the server process itself consumes.

use std::path::PathBuf;

use crate::LoadError;

/// Server-level settings, resolved once at startup after
/// [`load_and_apply`](crate::load_and_apply).
#[derive(Clone, Debug)]
pub struct ServerSettings {
    /// Listen port (`AVIARY_PORT`, default 3000).
    pub port: u16,
    /// Public base URL used in discovery cards (`AVIARY_PUBLIC_URL`,
    /// default `http://localhost:<port>`).
    pub public_url: String,
    /// Directory of agent definition JSON files (`AVIARY_AGENTS_DIR`,
    /// default `./agents`).
    pub agents_dir: PathBuf,
}

impl ServerSettings {
    pub const DEFAULT_PORT: u16 = 3000;

    /// Resolves settings from the environment. Unset variables take
    /// defaults; an unparseable port is an error (a typo should not silently
    /// fall back).
    pub fn from_env() -> Result<Self, LoadError> {
        let port = parse_or("AVIARY_PORT", Self::DEFAULT_PORT)?;
        let public_url = std::env::var("AVIARY_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));
        let agents_dir = std::env::var("AVIARY_AGENTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./agents"));
        Ok(Self {
            port,
            public_url,
            agents_dir,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, LoadError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| LoadError::InvalidSetting {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test covers the env-dependent paths: parallel tests in this
    // process would race on the shared environment otherwise.
    #[test]
    fn settings_resolve_defaults_and_follow_port() {
        std::env::remove_var("AVIARY_PORT");
        std::env::remove_var("AVIARY_PUBLIC_URL");
        let settings = ServerSettings::from_env().unwrap();
        assert_eq!(settings.port, ServerSettings::DEFAULT_PORT);
        assert_eq!(settings.public_url, "http://localhost:3000");
        assert_eq!(settings.agents_dir, PathBuf::from("./agents"));

        std::env::set_var("AVIARY_PORT", "4100");
        let settings = ServerSettings::from_env().unwrap();
        std::env::remove_var("AVIARY_PORT");
        assert_eq!(settings.public_url, "http://localhost:4100");
    }

    #[test]
    fn unparseable_numeric_setting_is_an_error() {
        std::env::set_var("AVIARY_PORT_TEST_BAD", "not-a-port");
        let r: Result<u16, _> = parse_or("AVIARY_PORT_TEST_BAD", 3000);
        std::env::remove_var("AVIARY_PORT_TEST_BAD");
        assert!(matches!(r, Err(LoadError::InvalidSetting { .. })));
    }
}
