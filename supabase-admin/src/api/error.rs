//! API error types

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// PostgREST codes that mean "this table does not exist"
pub const MISSING_TABLE_CODES: &[&str] = &["42P01", "PGRST205"];

/// Error raised by any call to the remote service
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Remote(RemoteError),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

impl ApiError {
    /// HTTP status of a remote error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote(e) => Some(e.status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Service error code (PostgREST / Postgres SQLSTATE or GoTrue error code)
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Remote(e) => e.code.as_deref(),
            _ => None,
        }
    }

    pub fn is_missing_table(&self) -> bool {
        self.code()
            .is_some_and(|code| MISSING_TABLE_CODES.contains(&code))
    }
}

/// Structured error body returned by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl RemoteError {
    /// Parse an error body. Understands both the PostgREST shape
    /// (`code`, `message`, `details`, `hint`) and the GoTrue shapes
    /// (`error`/`error_description`, `msg`/`error_code`).
    pub fn from_body(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let field = |name: &str| -> Option<String> {
            match parsed.as_ref()?.get(name)? {
                Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        };

        let message = ["message", "msg", "error_description", "error"]
            .iter()
            .find_map(|name| field(name))
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    trimmed.to_string()
                }
            });

        // GoTrue sends a numeric `code` equal to the status next to a textual `error_code`
        let code = field("error_code").or_else(|| {
            field("code").filter(|c| c.parse::<u16>().map(|n| n != status).unwrap_or(true))
        });

        Self {
            status,
            code,
            message,
            details: field("details"),
            hint: field("hint"),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (HTTP {}", self.message, self.status)?;
        if let Some(code) = &self.code {
            write!(f, ", code {}", code)?;
        }
        write!(f, ")")?;
        if let Some(details) = &self.details {
            write!(f, ": {}", details)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for RemoteError {}
