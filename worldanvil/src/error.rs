use std::fmt;

/// Construction-time configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing application key; set WORLD_ANVIL_KEY or pass api_key explicitly")]
    MissingApiKey,
    #[error("api url is empty; unset WORLD_ANVIL_API_URL to use the production API")]
    EmptyApiUrl,
    #[error("invalid api url '{url}': {source}")]
    InvalidApiUrl {
        url: String,
        source: url::ParseError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status} {reason}: {body}")]
    HttpStatus {
        status: u16,
        reason: String,
        body: String,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("identity response did not include a user id")]
    MissingIdentity,
    #[error("upstream reported failure: {0}")]
    Upstream(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Coarse classification of a failed request, derived from the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 401: bad or expired credentials; re-authenticating may help.
    Unauthorized,
    /// 403: credentials are valid but lack permission.
    Forbidden,
    /// 429: the caller must back off.
    RateLimited,
    /// Any other status, or a failure that never produced one.
    ServerOrUnknown,
}

impl ErrorClass {
    #[must_use]
    pub const fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(401) => Self::Unauthorized,
            Some(403) => Self::Forbidden,
            Some(429) => Self::RateLimited,
            _ => Self::ServerOrUnknown,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::RateLimited => "rate_limited",
            Self::ServerOrUnknown => "server_or_unknown",
        };
        f.write_str(name)
    }
}

impl Error {
    /// HTTP status of the failed response, if the failure came from one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    #[must_use]
    pub fn class(&self) -> ErrorClass {
        ErrorClass::from_status(self.status())
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.class() == ErrorClass::Unauthorized
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.class() == ErrorClass::RateLimited
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::{Error, ErrorClass};

    fn status_error(status: u16) -> Error {
        Error::HttpStatus {
            status,
            reason: String::new(),
            body: String::new(),
        }
    }

    #[test]
    fn classifies_by_status() {
        assert_eq!(status_error(401).class(), ErrorClass::Unauthorized);
        assert_eq!(status_error(403).class(), ErrorClass::Forbidden);
        assert_eq!(status_error(429).class(), ErrorClass::RateLimited);
        assert_eq!(status_error(500).class(), ErrorClass::ServerOrUnknown);
        assert_eq!(status_error(404).class(), ErrorClass::ServerOrUnknown);
    }

    #[test]
    fn non_http_failures_are_unknown() {
        let err = Error::Transport("connection reset".to_string());
        assert_eq!(err.status(), None);
        assert_eq!(err.class(), ErrorClass::ServerOrUnknown);
        assert_eq!(Error::MissingIdentity.class(), ErrorClass::ServerOrUnknown);
    }

    #[test]
    fn status_error_keeps_upstream_body() {
        let err = Error::HttpStatus {
            status: 400,
            reason: "Bad Request".to_string(),
            body: "{\"error\":\"invalid_grant\"}".to_string(),
        };
        assert!(err.to_string().contains("invalid_grant"));
    }
}
