//! Inline validation for the signup and contact forms.
//!
//! A failed check names the offending field so the page can show the message
//! next to it; submission is blocked until the form validates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fairytrail_core::tracker::SignupSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: &str) -> Self {
        Self {
            field,
            message: message.to_string(),
        }
    }
}

fn is_valid_email(target: &str) -> bool {
    let trimmed = target.trim();
    let Some((local, domain)) = trimmed.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !trimmed.contains(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn require_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("name", "Please enter your name"));
    }
    Ok(())
}

fn require_email(email: &str) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::new("email", "Please enter your email"));
    }
    if !is_valid_email(email) {
        return Err(ValidationError::new(
            "email",
            "Please enter a valid email address",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub child_name: Option<String>,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_name(&self.name)?;
        require_email(&self.email)
    }

    /// Attach the instrumentation snapshot, trimming user input.
    pub fn into_request(self, snapshot: SignupSnapshot) -> SignupRequest {
        SignupRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            child_name: self
                .child_name
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            snapshot,
        }
    }
}

/// Body of `POST /api/signup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub child_name: Option<String>,
    #[serde(flatten)]
    pub snapshot: SignupSnapshot,
}

/// Body of `POST /api/contact`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_name(&self.name)?;
        require_email(&self.email)?;
        if self.message.trim().is_empty() {
            return Err(ValidationError::new("message", "Please enter a message"));
        }
        Ok(())
    }
}
