#![allow(clippy::multiple_crate_versions)]

use serde::{Deserialize, Serialize};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::Command;
use worldanvil::{AuthorizationResult, ClientConfig};

pub const APP_NAME: &str = "worldanvil";

/// A secret value, either inline or fetched at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Secret {
    Literal(String),
    Env { env: String },
    Cmd { cmd: String },
}

/// OAuth application registered with World Anvil.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: Secret,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnvilConfig {
    /// Overrides the production API root.
    #[serde(default)]
    pub api_url: Option<String>,
    pub api_key: Secret,
    #[serde(default)]
    pub access_token: Option<Secret>,
    #[serde(default)]
    pub refresh_token: Option<Secret>,
    #[serde(default)]
    pub oauth: Option<OAuthApp>,
}

impl Default for AnvilConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: Secret::Literal(String::new()),
            access_token: None,
            refresh_token: None,
            oauth: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnvilConfigError {
    #[error("config error: {0}")]
    Confy(#[from] confy::ConfyError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("missing application key in config; set `api_key` in the worldanvil config file")]
    MissingApiKey,
    #[error("missing [oauth] section in config; set client_id, client_secret and redirect_uri")]
    MissingOAuth,
    #[error("missing refresh token; pass one explicitly or log in first")]
    MissingRefreshToken,
    #[error("secret resolved to an empty value")]
    EmptySecret,
    #[error("environment variable '{env}' not found")]
    MissingEnv { env: String },
    #[error("secret command failed: {cmd}: {message}")]
    CommandFailed { cmd: String, message: String },
    #[error("failed to execute secret command '{cmd}': {source}")]
    CommandExec { cmd: String, source: io::Error },
    #[error("secret command returned empty output: {cmd}")]
    CommandEmpty { cmd: String },
    #[error(
        "application key required but stdin is not interactive; set `api_key` in {path} (example: api_key = \"YOUR_KEY\" or api_key = {{ cmd = \"...\" }})",
        path = .path.display()
    )]
    NonInteractive { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, AnvilConfigError>;

impl AnvilConfig {
    /// Loads the config file from the standard OS location.
    ///
    /// # Errors
    /// Returns an error if the config file cannot be read or deserialized.
    pub fn load() -> Result<Self> {
        Ok(confy::load(APP_NAME, None)?)
    }

    /// Loads config or walks the user through entering the application key.
    ///
    /// # Errors
    /// Returns an error if the config cannot be loaded, the key cannot be
    /// resolved, or onboarding fails (including non-interactive stdin).
    pub fn load_or_onboard() -> Result<Self> {
        let config = Self::load()?;
        if let Secret::Literal(value) = &config.api_key {
            if !value.trim().is_empty() {
                return Ok(config);
            }
        } else {
            config.api_key()?;
            return Ok(config);
        }

        config.onboard_api_key()
    }

    /// Stores the config to the standard OS location.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn store(&self) -> Result<()> {
        confy::store(APP_NAME, None, self)?;
        Ok(())
    }

    /// Resolves the application key from the configured source.
    ///
    /// # Errors
    /// Returns an error if the key cannot be resolved or is empty.
    pub fn api_key(&self) -> Result<String> {
        self.api_key.resolve().map_err(|err| match err {
            AnvilConfigError::EmptySecret => AnvilConfigError::MissingApiKey,
            other => other,
        })
    }

    /// Client settings from this file; unset or blank fields stay unset so
    /// that another source can fill them.
    ///
    /// # Errors
    /// Returns an error if a configured secret cannot be resolved.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match self.api_key() {
            Ok(api_key) => ClientConfig::new().with_api_key(api_key),
            Err(AnvilConfigError::MissingApiKey) => ClientConfig::new(),
            Err(err) => return Err(err),
        };
        if let Some(url) = &self.api_url {
            config = config.with_api_url(url.clone());
        }
        if let Some(token) = &self.access_token {
            config = config.with_access_token(token.resolve()?);
        }
        Ok(config)
    }

    /// # Errors
    /// Returns an error if there is no `[oauth]` section.
    pub fn oauth(&self) -> Result<&OAuthApp> {
        self.oauth.as_ref().ok_or(AnvilConfigError::MissingOAuth)
    }

    /// # Errors
    /// Returns an error if no refresh token is stored or it cannot be resolved.
    pub fn refresh_token(&self) -> Result<String> {
        self.refresh_token
            .as_ref()
            .ok_or(AnvilConfigError::MissingRefreshToken)?
            .resolve()
    }

    /// Keeps the tokens from a grant as literals, replacing earlier ones.
    pub fn remember_tokens(&mut self, token: &AuthorizationResult) {
        self.access_token = Some(Secret::Literal(token.access_token.clone()));
        if !token.refresh_token.is_empty() {
            self.refresh_token = Some(Secret::Literal(token.refresh_token.clone()));
        }
    }

    fn onboard_api_key(mut self) -> Result<Self> {
        let config_path = confy::get_configuration_file_path(APP_NAME, None)?;
        if !io::stdin().is_terminal() {
            return Err(AnvilConfigError::NonInteractive { path: config_path });
        }

        if !config_path.as_os_str().is_empty() {
            eprintln!(
                "World Anvil config not found or missing api_key. It will be stored at: {}",
                config_path.display()
            );
        }

        eprint!("Enter your World Anvil application key: ");
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AnvilConfigError::MissingApiKey);
        }

        self.api_key = Secret::Literal(trimmed.to_string());
        self.store()?;
        Ok(self)
    }
}

impl OAuthApp {
    /// # Errors
    /// Returns an error if the client secret cannot be resolved.
    pub fn client_secret(&self) -> Result<String> {
        self.client_secret.resolve()
    }
}

impl Secret {
    /// Produces the trimmed secret value.
    ///
    /// # Errors
    /// Returns an error if the variable is unset, the command fails, or the
    /// value is empty.
    pub fn resolve(&self) -> Result<String> {
        match self {
            Self::Literal(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(AnvilConfigError::EmptySecret);
                }
                Ok(trimmed.to_string())
            }
            Self::Env { env } => {
                let value = std::env::var(env)
                    .map_err(|_| AnvilConfigError::MissingEnv { env: env.clone() })?;
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(AnvilConfigError::EmptySecret);
                }
                Ok(trimmed.to_string())
            }
            Self::Cmd { cmd } => {
                let output = Command::new("sh")
                    .arg("-c")
                    .arg(cmd)
                    .output()
                    .map_err(|e| AnvilConfigError::CommandExec {
                        cmd: cmd.clone(),
                        source: e,
                    })?;

                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(AnvilConfigError::CommandFailed {
                        cmd: cmd.clone(),
                        message: stderr.trim().to_string(),
                    });
                }

                let stdout = String::from_utf8_lossy(&output.stdout);
                let trimmed = stdout.trim();
                if trimmed.is_empty() {
                    return Err(AnvilConfigError::CommandEmpty { cmd: cmd.clone() });
                }
                Ok(trimmed.to_string())
            }
        }
    }
}
