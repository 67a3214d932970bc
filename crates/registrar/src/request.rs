//! Caller-facing registration request.

use deedchain_types::TokenId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("missing required field: propertyId")]
    MissingPropertyId,

    #[error("invalid email format: {0}")]
    InvalidEmail(String),

    #[error("update requires the token id of an existing property record")]
    MissingTokenId,
}

/// One registration or update request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRequest {
    pub property_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    #[serde(default)]
    pub file_urls: Vec<String>,
    #[serde(default, rename = "userFullName", skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(default, rename = "userEmail", skip_serializing_if = "Option::is_none")]
    pub requester_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    /// Existing record to update. Ignored by registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<TokenId>,
}

impl PropertyRequest {
    pub fn new(property_id: impl Into<String>, file_urls: Vec<String>) -> Self {
        Self {
            property_id: property_id.into(),
            file_urls,
            ..Self::default()
        }
    }

    pub fn with_owner_name(mut self, owner_name: impl Into<String>) -> Self {
        self.owner_name = Some(owner_name.into());
        self
    }

    pub fn with_property_name(mut self, property_name: impl Into<String>) -> Self {
        self.property_name = Some(property_name.into());
        self
    }

    pub fn with_property_type(mut self, property_type: impl Into<String>) -> Self {
        self.property_type = Some(property_type.into());
        self
    }

    pub fn with_requester_email(mut self, email: impl Into<String>) -> Self {
        self.requester_email = Some(email.into());
        self
    }

    pub fn with_token_id(mut self, token_id: TokenId) -> Self {
        self.token_id = Some(token_id);
        self
    }

    /// Shape checks that need no network access. The file list is checked
    /// separately by the document validator. The requester e-mail is
    /// optional and only its format is checked when present.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.property_id.trim().is_empty() {
            return Err(RequestError::MissingPropertyId);
        }
        if let Some(email) = &self.requester_email {
            if !EMAIL_PATTERN.is_match(email) {
                return Err(RequestError::InvalidEmail(email.clone()));
            }
        }
        Ok(())
    }

    pub fn require_token_id(&self) -> Result<TokenId, RequestError> {
        self.token_id.ok_or(RequestError::MissingTokenId)
    }
}
