use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{AipDriftError, Result};
use crate::store::{headers, Headers};

pub const SOURCE_USER_ENV: &str = "BAGGER_DRUPAL_DEFAULT_ACCOUNT_NAME";
pub const SOURCE_PASSWORD_ENV: &str = "BAGGER_DRUPAL_DEFAULT_ACCOUNT_PASSWORD";
pub const STORAGE_URL_ENV: &str = "OS_STORAGE_URL";
pub const AUTH_TOKEN_ENV: &str = "OS_AUTH_TOKEN";
pub const AUTH_URL_ENV: &str = "OS_AUTH_URL";
pub const STORE_USER_ENV: &str = "OS_USERNAME";
pub const STORE_PASSWORD_ENV: &str = "OS_PASSWORD";

#[derive(Clone)]
pub struct SourceCredentials {
    pub username: String,
    pub password: String,
}

impl SourceCredentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            username: required(&lookup, SOURCE_USER_ENV)?,
            password: required(&lookup, SOURCE_PASSWORD_ENV)?,
        })
    }
}

impl std::fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// How to reach the object store: a pre-issued token, or v1 user/key auth.
#[derive(Clone, PartialEq, Eq)]
pub enum StoreCredentials {
    Token { storage_url: String, token: String },
    Password { auth_url: String, username: String, password: String },
}

impl StoreCredentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// A storage URL plus token wins over auth URL plus user and password.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let (Some(storage_url), Some(token)) = (get(STORAGE_URL_ENV), get(AUTH_TOKEN_ENV)) {
            return Ok(StoreCredentials::Token { storage_url, token });
        }

        match (get(AUTH_URL_ENV), get(STORE_USER_ENV), get(STORE_PASSWORD_ENV)) {
            (Some(auth_url), Some(username), Some(password)) => Ok(StoreCredentials::Password {
                auth_url,
                username,
                password,
            }),
            _ => Err(AipDriftError::Config(format!(
                "object store credentials missing: set {} and {}, or {}, {} and {}",
                STORAGE_URL_ENV, AUTH_TOKEN_ENV, AUTH_URL_ENV, STORE_USER_ENV, STORE_PASSWORD_ENV
            ))),
        }
    }
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreCredentials::Token { storage_url, .. } => f
                .debug_struct("Token")
                .field("storage_url", storage_url)
                .field("token", &"***")
                .finish(),
            StoreCredentials::Password { auth_url, username, .. } => f
                .debug_struct("Password")
                .field("auth_url", auth_url)
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AipDriftError::Config(format!("environment variable {} is not set", key)))
}

/// Project-level metadata attached to every uploaded package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectMetadata {
    pub project_id: String,
    pub aip_version: String,
    pub project: String,
    pub promise: String,
}

impl ProjectMetadata {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Empty values are still sent so every object carries the full key set.
    pub fn headers(&self) -> Headers {
        let mut map = Headers::new();
        map.insert(headers::PROJECT_ID.to_string(), self.project_id.clone());
        map.insert(headers::AIP_VERSION.to_string(), self.aip_version.clone());
        map.insert(headers::PROJECT.to_string(), self.project.clone());
        map.insert(headers::PROMISE.to_string(), self.promise.clone());
        map
    }
}
