//! Client configuration.
//!
//! [`ClientConfig`] is a partial, unvalidated bag of settings. Resolving it
//! yields [`Credentials`], which are what an [`crate::AnvilClient`] is built
//! from. The process environment is read only by [`ClientConfig::from_env`].

use crate::error::ConfigError;
use url::Url;

/// Production root of the World Anvil API.
pub const DEFAULT_API_URL: &str = "https://www.worldanvil.com/api/external/boromir";

pub const ENV_API_URL: &str = "WORLD_ANVIL_API_URL";
pub const ENV_API_KEY: &str = "WORLD_ANVIL_KEY";
pub const ENV_ACCESS_TOKEN: &str = "WORLD_ANVIL_TOKEN";

/// Partial configuration; unset fields fall back to another source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
}

impl ClientConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[must_use]
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    /// Reads `WORLD_ANVIL_API_URL`, `WORLD_ANVIL_KEY` and `WORLD_ANVIL_TOKEN`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`], reading from an arbitrary lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            api_url: read(ENV_API_URL),
            api_key: read(ENV_API_KEY),
            access_token: read(ENV_ACCESS_TOKEN),
        }
    }

    /// Field-by-field merge: values set on `self` win, unless they are blank
    /// and `fallback` has one.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            api_url: prefer(self.api_url, fallback.api_url),
            api_key: prefer(self.api_key, fallback.api_key),
            access_token: prefer(self.access_token, fallback.access_token),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if the application key is missing or blank, or if the
    /// API url is blank or not a valid URL.
    pub fn resolve(self) -> Result<Credentials, ConfigError> {
        let api_url = match self.api_url {
            None => DEFAULT_API_URL.to_string(),
            Some(url) => {
                let trimmed = url.trim();
                if trimmed.is_empty() {
                    return Err(ConfigError::EmptyApiUrl);
                }
                Url::parse(trimmed).map_err(|source| ConfigError::InvalidApiUrl {
                    url: trimmed.to_string(),
                    source,
                })?;
                trimmed.trim_end_matches('/').to_string()
            }
        };

        let api_key = self
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let access_token = self
            .access_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        Ok(Credentials {
            api_url,
            api_key,
            access_token,
        })
    }
}

/// Validated connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Base URL without a trailing slash.
    pub api_url: String,
    pub api_key: String,
    pub access_token: Option<String>,
}

impl Credentials {
    /// Builds credentials from the process environment.
    ///
    /// # Errors
    /// Returns an error if `WORLD_ANVIL_KEY` is unset or the url is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        ClientConfig::from_env().resolve()
    }
}

// A blank value is kept only when there is nothing else, so `resolve` can
// still report it.
fn prefer(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    match primary {
        Some(value) if value.trim().is_empty() => fallback.or(Some(value)),
        Some(value) => Some(value),
        None => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn reads_all_fields_from_lookup() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://test-api.worldanvil.com"),
            (ENV_API_KEY, "test-api-key"),
            (ENV_ACCESS_TOKEN, "test-access-token"),
        ]));
        let credentials = config.resolve().unwrap();
        assert_eq!(credentials.api_url, "https://test-api.worldanvil.com");
        assert_eq!(credentials.api_key, "test-api-key");
        assert_eq!(credentials.access_token.as_deref(), Some("test-access-token"));
    }

    #[test]
    fn access_token_is_optional() {
        let config = ClientConfig::from_lookup(lookup(&[(ENV_API_KEY, "k1")]));
        let credentials = config.resolve().unwrap();
        assert_eq!(credentials.access_token, None);
    }

    #[test]
    fn missing_url_uses_production_root() {
        let credentials = ClientConfig::new().with_api_key("k1").resolve().unwrap();
        assert_eq!(credentials.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn missing_api_key_fails() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_API_URL, "https://x.test")]))
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = ClientConfig::from_lookup(lookup(&[(ENV_API_KEY, "  ")]));
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn blank_explicit_key_falls_back_to_process_key() {
        let process = ClientConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "k-process"),
            (ENV_ACCESS_TOKEN, "t-process"),
        ]));
        let credentials = ClientConfig::new()
            .with_api_key("  ")
            .with_access_token("")
            .or(process)
            .resolve()
            .unwrap();
        assert_eq!(credentials.api_key, "k-process");
        assert_eq!(credentials.access_token.as_deref(), Some("t-process"));
    }

    #[test]
    fn explicit_key_wins_over_process_key() {
        let process = ClientConfig::from_lookup(lookup(&[(ENV_API_KEY, "k-process")]));
        let credentials = ClientConfig::new()
            .with_api_key("k-explicit")
            .or(process)
            .resolve()
            .unwrap();
        assert_eq!(credentials.api_key, "k-explicit");
    }

    #[test]
    fn blank_url_without_fallback_still_fails() {
        let err = ClientConfig::new()
            .with_api_url(" ")
            .with_api_key("k1")
            .or(ClientConfig::new())
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyApiUrl));
    }

    #[test]
    fn explicit_blank_url_fails() {
        let err = ClientConfig::new()
            .with_api_url(" ")
            .with_api_key("k1")
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyApiUrl));
    }

    #[test]
    fn unparseable_url_fails() {
        let err = ClientConfig::new()
            .with_api_url("not a url")
            .with_api_key("k1")
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidApiUrl { .. }));
    }

    #[test]
    fn explicit_fields_override_process_fields_one_by_one() {
        let process = ClientConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://process.test"),
            (ENV_API_KEY, "process-key"),
            (ENV_ACCESS_TOKEN, "process-token"),
        ]));
        let merged = ClientConfig::new().with_api_key("explicit-key").or(process);
        let credentials = merged.resolve().unwrap();
        assert_eq!(credentials.api_url, "https://process.test");
        assert_eq!(credentials.api_key, "explicit-key");
        assert_eq!(credentials.access_token.as_deref(), Some("process-token"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let credentials = ClientConfig::new()
            .with_api_url("https://x.test/api/")
            .with_api_key("k1")
            .resolve()
            .unwrap();
        assert_eq!(credentials.api_url, "https://x.test/api");
    }
}
