//! Shared types for the diagnostic console.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Severity/category of a diagnostic log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Event,
}

impl LogLevel {
    /// Single-glyph marker shown next to each log line.
    pub fn icon(self) -> &'static str {
        match self {
            LogLevel::Success => "✓",
            LogLevel::Warning => "⚠",
            LogLevel::Error => "✗",
            LogLevel::Event => "⚡",
            LogLevel::Info => "→",
        }
    }
}

/// A single timestamped diagnostic event. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: u64,
    pub time: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
    pub data: Option<String>,
}

/// The four-field OIDC client configuration driven by the settings form.
///
/// No format validation is enforced; malformed values surface as protocol
/// failures from the auth client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OidcSettings {
    pub authority: String,
    pub client_id: String,
    pub scope: String,
    pub redirect_uri: String,
}

impl Default for OidcSettings {
    fn default() -> Self {
        Self {
            authority: String::new(),
            client_id: String::new(),
            scope: String::new(),
            redirect_uri: String::new(),
        }
    }
}

/// Display-only view of a compact JWT. No signature or expiry validation
/// is performed; successful decoding is not proof of token validity.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedJwt {
    pub header: serde_json::Value,
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// Human-readable countdown to a token expiry, plus the raw remaining
/// seconds for threshold comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeLeft {
    pub text: String,
    pub seconds: i64,
}

impl TimeLeft {
    pub fn is_expired(&self) -> bool {
        self.text == "EXPIRED"
    }

    /// Under two minutes remaining, but not yet expired.
    pub fn is_expiring_soon(&self) -> bool {
        self.seconds > 0 && self.seconds < 120
    }
}
