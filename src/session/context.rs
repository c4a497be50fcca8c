//! Session context captured at start and merged with stop-time overrides.

use serde::{Deserialize, Serialize};

use super::error::SessionError;

/// Who is teaching what, to whom.
///
/// Optional fields use the empty string for "not supplied", which is also how
/// they are persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub subject: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub education: String,
}

/// Fields a client may resend when stopping a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOverrides {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
}

impl SessionContext {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_education(mut self, education: impl Into<String>) -> Self {
        self.education = education.into();
        self
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.subject.trim().is_empty() {
            return Err(SessionError::InvalidContext(
                "subject must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply stop-time overrides. A supplied value replaces the start-time
    /// value only when it is non-blank.
    pub fn merge(mut self, overrides: &SessionOverrides) -> Self {
        override_field(&mut self.subject, overrides.subject.as_deref());
        override_field(&mut self.name, overrides.name.as_deref());
        override_field(&mut self.education, overrides.education.as_deref());
        self
    }
}

fn override_field(target: &mut String, value: Option<&str>) {
    if let Some(value) = value {
        if !value.trim().is_empty() {
            *target = value.to_string();
        }
    }
}
