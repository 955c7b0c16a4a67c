//! Service-account credential loading.
//!
//! The credential is a JSON service-account key supplied out of band, either through the
//! `FIREBASE_SERVICE_ACCOUNT` environment variable or a key file. A missing or malformed
//! key is a startup condition: nothing downstream can run without it.

use serde_json::Value as SerdeValue;
use std::path::Path;
use thiserror::Error;
use yup_oauth2::ServiceAccountKey;

pub const SERVICE_ACCOUNT_ENV: &str = "FIREBASE_SERVICE_ACCOUNT";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const REQUIRED_FIELDS: [&str; 3] = ["project_id", "private_key", "client_email"];

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("{SERVICE_ACCOUNT_ENV} environment variable is not set")]
    Missing,
    #[error("Failed to read service account file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse service account key. Make sure it's valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Service account key is missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

/// A validated service-account key.
#[derive(Clone)]
pub struct Credentials {
    key: ServiceAccountKey,
}

impl Credentials {
    /// Parses and validates a service-account key from its JSON text.
    pub fn from_json(raw: &str) -> Result<Self, CredentialsError> {
        let mut value: SerdeValue = serde_json::from_str(raw)?;

        let missing: Vec<&'static str> = REQUIRED_FIELDS
            .into_iter()
            .filter(|field| {
                value
                    .get(*field)
                    .and_then(SerdeValue::as_str)
                    .map_or(true, |s| s.trim().is_empty())
            })
            .collect();
        if !missing.is_empty() {
            return Err(CredentialsError::MissingFields(missing));
        }

        if let SerdeValue::Object(map) = &mut value {
            map.entry("token_uri")
                .or_insert_with(|| SerdeValue::String(DEFAULT_TOKEN_URI.to_string()));
        }

        let key: ServiceAccountKey = serde_json::from_value(value)?;
        Ok(Self { key })
    }

    /// Reads the key from `FIREBASE_SERVICE_ACCOUNT`.
    pub fn from_env() -> Result<Self, CredentialsError> {
        let raw = std::env::var(SERVICE_ACCOUNT_ENV).map_err(|_| CredentialsError::Missing)?;
        Self::from_json(&raw)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn project_id(&self) -> &str {
        self.key.project_id.as_deref().unwrap_or_default()
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    pub fn key(&self) -> &ServiceAccountKey {
        &self.key
    }
}
