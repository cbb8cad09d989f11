//! API credentials for TelemetryFlow authentication.
//!
//! Credentials are an immutable value object: the key pair is validated once
//! at construction and never mutated afterwards. Key IDs carry the `tfk_`
//! prefix and key secrets the `tfs_` prefix.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Required prefix for API key IDs.
pub const KEY_ID_PREFIX: &str = "tfk_";
/// Required prefix for API key secrets.
pub const KEY_SECRET_PREFIX: &str = "tfs_";

/// Errors raised when a key pair fails validation.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    /// The key ID was empty.
    #[error("API key ID is required")]
    MissingKeyId,

    /// The key secret was empty.
    #[error("API key secret is required")]
    MissingKeySecret,

    /// The key ID did not start with `tfk_`.
    #[error("API key ID must start with '{KEY_ID_PREFIX}'")]
    InvalidKeyIdPrefix,

    /// The key secret did not start with `tfs_`.
    #[error("API key secret must start with '{KEY_SECRET_PREFIX}'")]
    InvalidKeySecretPrefix,
}

/// Validated TelemetryFlow API key pair.
///
/// Construction through [`Credentials::new`] is the only validation point;
/// once built the pair is immutable. Equality is structural.
///
/// # Example
///
/// ```
/// use telemetryflow::Credentials;
///
/// let creds = Credentials::new("tfk_abc", "tfs_def").unwrap();
/// assert_eq!(creds.authorization_header(), "Bearer tfk_abc:tfs_def");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    key_id: String,
    key_secret: String,
}

impl Credentials {
    /// Creates a validated key pair.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialsError`] when either key is empty or carries
    /// the wrong prefix.
    pub fn new(
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let key_id = key_id.into();
        let key_secret = key_secret.into();

        if key_id.is_empty() {
            return Err(CredentialsError::MissingKeyId);
        }
        if key_secret.is_empty() {
            return Err(CredentialsError::MissingKeySecret);
        }
        if !key_id.starts_with(KEY_ID_PREFIX) {
            return Err(CredentialsError::InvalidKeyIdPrefix);
        }
        if !key_secret.starts_with(KEY_SECRET_PREFIX) {
            return Err(CredentialsError::InvalidKeySecretPrefix);
        }

        Ok(Self { key_id, key_secret })
    }

    /// Returns the API key ID.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Returns the API key secret.
    pub fn key_secret(&self) -> &str {
        &self.key_secret
    }

    /// Returns the `Authorization` header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}:{}", self.key_id, self.key_secret)
    }

    /// Returns all authentication headers for the TelemetryFlow API.
    ///
    /// Header keys use canonical HTTP casing here; the gRPC exporter path
    /// lower-cases them, since tonic rejects uppercase metadata keys.
    pub fn auth_headers(&self) -> HashMap<String, String> {
        HashMap::from([
            ("Authorization".to_owned(), self.authorization_header()),
            ("X-TelemetryFlow-Key-ID".to_owned(), self.key_id.clone()),
            (
                "X-TelemetryFlow-Key-Secret".to_owned(),
                self.key_secret.clone(),
            ),
        ])
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never leak the secret into logs.
        let preview = if self.key_secret.len() > 8 {
            format!("{}...", &self.key_secret[..8])
        } else {
            "***".to_owned()
        };
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("key_secret", &preview)
            .finish()
    }
}
