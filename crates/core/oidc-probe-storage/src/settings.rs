//! Settings persistence and default derivation.

use crate::{KeyValueStore, StorageResult};
use oidc_probe_core::OidcSettings;
use std::sync::Arc;
use tracing::debug;

/// Fixed key holding the serialized settings record.
pub const SETTINGS_KEY: &str = "oidc_debug_settings";

/// Namespace prefix under which the auth client persists its own session
/// cache. Settings reset purges it so a stale session can never outlive
/// the configuration it was bound to.
pub const CLIENT_STORAGE_PREFIX: &str = "oidc.";

const FALLBACK_AUTHORITY: &str = "https://auth.jamcard.io/realms/jamcard";
const FALLBACK_CLIENT_ID: &str = "mobile_app";
const DEFAULT_SCOPE: &str = "openid profile email offline_access";
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:4571";

/// Base URL the callback listener binds to, with any trailing slash or
/// `/callback` segment stripped so the derived redirect URI is stable no
/// matter how the override was written.
pub fn base_url() -> String {
    let raw =
        std::env::var("OIDC_PROBE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    normalize_base(&raw).to_string()
}

/// Trailing slashes go first so `http://host/callback/` still loses its
/// `/callback` segment.
fn normalize_base(raw: &str) -> &str {
    let trimmed = raw.trim_end_matches('/');
    trimmed.strip_suffix("/callback").unwrap_or(trimmed)
}

/// Built-in settings: environment overrides where provided, fixed
/// fallbacks otherwise, redirect URI derived from the base URL.
pub fn default_settings() -> OidcSettings {
    OidcSettings {
        authority: std::env::var("OIDC_PROBE_AUTHORITY")
            .unwrap_or_else(|_| FALLBACK_AUTHORITY.to_string()),
        client_id: std::env::var("OIDC_PROBE_CLIENT_ID")
            .unwrap_or_else(|_| FALLBACK_CLIENT_ID.to_string()),
        scope: DEFAULT_SCOPE.to_string(),
        redirect_uri: format!("{}/callback", base_url()),
    }
}

/// Load/save/reset lifecycle for the four-field OIDC configuration.
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    defaults: OidcSettings,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_defaults(store, default_settings())
    }

    pub fn with_defaults(store: Arc<dyn KeyValueStore>, defaults: OidcSettings) -> Self {
        Self { store, defaults }
    }

    pub fn defaults(&self) -> &OidcSettings {
        &self.defaults
    }

    /// Read persisted settings, merging persisted fields over defaults
    /// field-by-field so a partially-saved record still yields a complete
    /// configuration. Storage or parse failures degrade to the defaults.
    pub fn load(&self) -> OidcSettings {
        let raw = match self.store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return self.defaults.clone(),
            Err(e) => {
                debug!(error = %e, "settings storage unavailable, using defaults");
                return self.defaults.clone();
            }
        };

        let saved: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "persisted settings unparseable, using defaults");
                return self.defaults.clone();
            }
        };

        let field = |name: &str, fallback: &str| -> String {
            saved
                .get(name)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| fallback.to_string())
        };

        OidcSettings {
            authority: field("authority", &self.defaults.authority),
            client_id: field("clientId", &self.defaults.client_id),
            scope: field("scope", &self.defaults.scope),
            redirect_uri: field("redirectUri", &self.defaults.redirect_uri),
        }
    }

    /// Persist the full record, overwriting any prior value. Does not
    /// touch an already-initialized auth client; the caller triggers
    /// re-initialization separately.
    pub fn save(&self, settings: &OidcSettings) -> StorageResult<()> {
        let raw = serde_json::to_string(settings)?;
        self.store.set(SETTINGS_KEY, &raw)
    }

    /// Delete the settings record and every key in the auth client's own
    /// namespace. Does not reload defaults into memory.
    pub fn reset(&self) -> StorageResult<()> {
        self.store.remove(SETTINGS_KEY)?;
        self.store.remove_prefix(CLIENT_STORAGE_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn defaults() -> OidcSettings {
        OidcSettings {
            authority: "https://default.example/realms/d".to_string(),
            client_id: "default-client".to_string(),
            scope: "openid".to_string(),
            redirect_uri: "http://127.0.0.1:4571/callback".to_string(),
        }
    }

    fn store() -> (Arc<MemoryStore>, SettingsStore) {
        let kv = Arc::new(MemoryStore::new());
        let settings = SettingsStore::with_defaults(kv.clone(), defaults());
        (kv, settings)
    }

    #[test]
    fn base_normalization_strips_slash_and_callback_in_either_order() {
        assert_eq!(normalize_base("http://127.0.0.1:4571"), "http://127.0.0.1:4571");
        assert_eq!(normalize_base("http://127.0.0.1:4571/"), "http://127.0.0.1:4571");
        assert_eq!(
            normalize_base("http://127.0.0.1:4571/callback"),
            "http://127.0.0.1:4571"
        );
        assert_eq!(
            normalize_base("http://127.0.0.1:4571/callback/"),
            "http://127.0.0.1:4571"
        );
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_, settings) = store();
        let record = OidcSettings {
            authority: "https://idp.example/realms/x".to_string(),
            client_id: "app1".to_string(),
            scope: "openid profile".to_string(),
            redirect_uri: "http://127.0.0.1:9000/callback".to_string(),
        };

        settings.save(&record).unwrap();
        assert_eq!(settings.load(), record);
    }

    #[test]
    fn load_without_saved_record_yields_defaults() {
        let (_, settings) = store();
        assert_eq!(settings.load(), defaults());
    }

    #[test]
    fn load_merges_partial_record_over_defaults() {
        let (kv, settings) = store();
        kv.set(SETTINGS_KEY, r#"{"clientId":"partial-app"}"#).unwrap();

        let loaded = settings.load();
        assert_eq!(loaded.client_id, "partial-app");
        assert_eq!(loaded.authority, defaults().authority);
        assert_eq!(loaded.scope, defaults().scope);
    }

    #[test]
    fn load_with_corrupt_record_yields_defaults() {
        let (kv, settings) = store();
        kv.set(SETTINGS_KEY, "{not json").unwrap();
        assert_eq!(settings.load(), defaults());
    }

    #[test]
    fn reset_removes_settings_and_client_namespace() {
        let (kv, settings) = store();
        settings.save(&defaults()).unwrap();
        kv.set("oidc.user:https://idp:app1", "{}").unwrap();
        kv.set("oidc.pending:abc", "{}").unwrap();
        kv.set("unrelated", "keep").unwrap();

        settings.reset().unwrap();

        assert_eq!(settings.load(), defaults());
        let keys = kv.keys().unwrap();
        assert!(keys.iter().all(|k| !k.starts_with(CLIENT_STORAGE_PREFIX)));
        assert!(keys.contains(&"unrelated".to_string()));
    }
}
