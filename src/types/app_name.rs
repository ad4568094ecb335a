// ABOUTME: Application name validation and normalization.
// ABOUTME: Handles character sanitization and version-suffix detection for blue/green.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separator between an application's base name and its numeric version
/// suffix, e.g. `orders__3`.
pub const VERSION_SEPARATOR: &str = "__";

#[derive(Debug, Error)]
pub enum AppNameError {
    #[error("application name cannot be empty")]
    Empty,

    #[error("application name cannot contain whitespace: '{0}'")]
    Whitespace(String),
}

/// How to treat characters the target platform does not accept in
/// application names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamePolicy {
    /// Replace each disallowed character with `__`.
    #[default]
    Sanitize,
    /// Keep the name exactly as written in the manifest.
    AllowSpecialCharacters,
}

/// A platform application name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppName(String);

impl AppName {
    pub fn new(value: &str) -> Result<Self, AppNameError> {
        if value.is_empty() {
            return Err(AppNameError::Empty);
        }
        if value.chars().any(char::is_whitespace) {
            return Err(AppNameError::Whitespace(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Build a name from raw manifest content, applying the phase's name
    /// policy. Under [`NamePolicy::Sanitize`] every character outside
    /// `[A-Za-z0-9_-]` is replaced with `__`.
    pub fn normalized(value: &str, policy: NamePolicy) -> Result<Self, AppNameError> {
        match policy {
            NamePolicy::AllowSpecialCharacters => Self::new(value),
            NamePolicy::Sanitize => {
                let mut out = String::with_capacity(value.len());
                for c in value.chars() {
                    if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                        out.push(c);
                    } else {
                        out.push_str(VERSION_SEPARATOR);
                    }
                }
                Self::new(&out)
            }
        }
    }

    /// Whether this name carries a numeric version suffix (`name__3`).
    /// Fixed-name deployments have no such suffix.
    pub fn is_versioned(&self) -> bool {
        match self.0.rfind(VERSION_SEPARATOR) {
            None => false,
            Some(idx) => {
                let suffix = &self.0[idx + VERSION_SEPARATOR.len()..];
                !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit())
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
