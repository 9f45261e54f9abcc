//! Session and protocol types.

use oidc_probe_core::decode_jwt;
use serde::{Deserialize, Serialize};

/// The authenticated user as cached by the agent.
///
/// `profile` holds the id-token claims decoded for display only; nothing
/// here is signature-verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Epoch seconds.
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub profile: serde_json::Map<String, serde_json::Value>,
}

impl User {
    pub fn from_token_response(response: TokenResponse, now: i64, prior: Option<&User>) -> Self {
        let profile = response
            .id_token
            .as_deref()
            .and_then(decode_jwt)
            .map(|decoded| decoded.payload)
            .unwrap_or_default();

        Self {
            access_token: response.access_token,
            id_token: response
                .id_token
                .or_else(|| prior.and_then(|u| u.id_token.clone())),
            // A refresh grant may omit the rotation; keep the prior token.
            refresh_token: response
                .refresh_token
                .or_else(|| prior.and_then(|u| u.refresh_token.clone())),
            expires_at: response.expires_in.map(|secs| now + secs as i64),
            profile,
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.profile.get("email").and_then(|v| v.as_str())
    }
}

/// Read-only view of the agent's session state.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub is_loading: bool,
    pub is_authenticated: bool,
    /// Last action failure, if any. Cleared by the next successful action.
    pub error: Option<String>,
    pub user: Option<User>,
    /// Authorization or end-session URL currently awaiting the operator's
    /// browser, surfaced so the console can display it.
    pub pending_url: Option<String>,
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
}

/// The subset of the OIDC discovery document the agent consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub end_session_endpoint: Option<String>,
    pub revocation_endpoint: Option<String>,
}
