// src/credentials.rs
//! Credential provider: reads the four feed secrets from the process environment
//! and builds an authenticated, not yet opened feed handle.

use std::fmt;

use crate::feed::{FeedHandle, HttpFeedTransport};

pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_API_SECRET: &str = "API_SEC";
pub const ENV_ACCESS_TOKEN: &str = "ACS_TOK";
pub const ENV_ACCESS_TOKEN_SECRET: &str = "ACS_TOK_SEC";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing or empty secret {0}")]
    MissingSecret(&'static str),

    #[error("cannot build feed client: {0}")]
    Client(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

// Never print secrets; lengths are enough for diagnostics.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key_len", &self.consumer_key.len())
            .field("access_token_len", &self.access_token.len())
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Read all four secrets. Credentials are static for the process lifetime;
    /// there is no retry.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| -> Result<String, AuthError> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(AuthError::MissingSecret(name))
        };
        Ok(Self {
            consumer_key: read(ENV_API_KEY)?,
            consumer_secret: read(ENV_API_SECRET)?,
            access_token: read(ENV_ACCESS_TOKEN)?,
            access_token_secret: read(ENV_ACCESS_TOKEN_SECRET)?,
        })
    }
}

pub trait CredentialProvider: Send + Sync {
    fn authenticate(&self) -> Result<FeedHandle, AuthError>;
}

/// Production provider: environment secrets + HTTP filter stream.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    endpoint: String,
}

impl EnvCredentials {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl CredentialProvider for EnvCredentials {
    fn authenticate(&self) -> Result<FeedHandle, AuthError> {
        let creds = Credentials::from_env()?;
        tracing::info!(target: "stream", ?creds, endpoint = %self.endpoint, "feed credentials loaded");
        let transport = HttpFeedTransport::new(self.endpoint.clone(), creds)
            .map_err(|e| AuthError::Client(e.to_string()))?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn all_four_secrets_required() {
        let ok = Credentials::from_lookup(lookup_from(&[
            (ENV_API_KEY, "k"),
            (ENV_API_SECRET, "s"),
            (ENV_ACCESS_TOKEN, "t"),
            (ENV_ACCESS_TOKEN_SECRET, " ts "),
        ]))
        .unwrap();
        assert_eq!(ok.access_token_secret, "ts");

        let err = Credentials::from_lookup(lookup_from(&[
            (ENV_API_KEY, "k"),
            (ENV_API_SECRET, "s"),
            (ENV_ACCESS_TOKEN, "t"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AuthError::MissingSecret(ENV_ACCESS_TOKEN_SECRET)));
    }

    #[test]
    fn blank_secret_is_missing() {
        let err = Credentials::from_lookup(lookup_from(&[
            (ENV_API_KEY, "   "),
            (ENV_API_SECRET, "s"),
            (ENV_ACCESS_TOKEN, "t"),
            (ENV_ACCESS_TOKEN_SECRET, "ts"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AuthError::MissingSecret(ENV_API_KEY)));
    }

    #[test]
    fn debug_hides_secrets() {
        let c = Credentials {
            consumer_key: "visible-key".into(),
            consumer_secret: "super-secret".into(),
            access_token: "tok".into(),
            access_token_secret: "tok-secret".into(),
        };
        let s = format!("{c:?}");
        assert!(!s.contains("super-secret"));
        assert!(!s.contains("visible-key"));
    }
}
