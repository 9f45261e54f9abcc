//! Agent configuration.

use oidc_probe_core::OidcSettings;
use oidc_probe_storage::KeyValueStore;
use std::sync::Arc;

/// Full re-parameterization surface of the agent. A settings change
/// builds a fresh `AgentConfig` and a fresh agent; configurations are
/// never mutated in place.
#[derive(Clone)]
pub struct AgentConfig {
    pub authority: String,
    pub client_id: String,
    pub scope: String,
    pub redirect_uri: String,
    pub post_logout_redirect_uri: Option<String>,
    pub silent_redirect_uri: Option<String>,
    /// Spawn the renew timer that refreshes ahead of expiry.
    pub automatic_silent_renew: bool,
    /// Lead time before expiry at which `AccessTokenExpiring` fires.
    pub expiring_notification_secs: u64,
    pub revoke_tokens_on_signout: bool,
    pub http_timeout_secs: u64,
    /// Where the agent caches its session, under the `oidc.` namespace.
    pub storage: Arc<dyn KeyValueStore>,
}

impl AgentConfig {
    /// Configuration the console uses: four-field settings plus the
    /// derived logout/silent-renew URIs and renewal defaults.
    pub fn from_settings(
        settings: &OidcSettings,
        base_url: &str,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            authority: settings.authority.clone(),
            client_id: settings.client_id.clone(),
            scope: settings.scope.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            post_logout_redirect_uri: Some(base_url.to_string()),
            silent_redirect_uri: Some(format!("{base_url}/silent-renew")),
            automatic_silent_renew: true,
            expiring_notification_secs: 60,
            revoke_tokens_on_signout: true,
            http_timeout_secs: 30,
            storage,
        }
    }

    /// Storage key for the cached user, scoped to authority and client so
    /// a reconfiguration can never resurrect another realm's session.
    pub(crate) fn user_storage_key(&self) -> String {
        format!(
            "{}user:{}:{}",
            oidc_probe_storage::CLIENT_STORAGE_PREFIX,
            self.authority,
            self.client_id
        )
    }

    pub(crate) fn pending_storage_key(&self, state: &str) -> String {
        format!("{}pending:{}", oidc_probe_storage::CLIENT_STORAGE_PREFIX, state)
    }
}
