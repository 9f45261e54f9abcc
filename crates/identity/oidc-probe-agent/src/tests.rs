//! Agent integration tests against a mocked identity provider.

use crate::callback::wait_for_callback;
use crate::{
    AgentConfig, AgentError, AuthClient, AuthSignal, OidcAgent, TokenResponse, User,
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use oidc_probe_storage::{KeyValueStore, MemoryStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(authority: &str, storage: Arc<MemoryStore>) -> AgentConfig {
    AgentConfig {
        authority: authority.to_string(),
        client_id: "probe-client".to_string(),
        scope: "openid profile email".to_string(),
        redirect_uri: "http://127.0.0.1:47310/callback".to_string(),
        post_logout_redirect_uri: Some("http://127.0.0.1:47310".to_string()),
        silent_redirect_uri: Some("http://127.0.0.1:47310/silent-renew".to_string()),
        automatic_silent_renew: false,
        expiring_notification_secs: 60,
        revoke_tokens_on_signout: true,
        http_timeout_secs: 5,
        storage,
    }
}

async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issuer": server.uri(),
            "authorization_endpoint": format!("{}/authorize", server.uri()),
            "token_endpoint": format!("{}/token", server.uri()),
            "end_session_endpoint": format!("{}/logout", server.uri()),
            "revocation_endpoint": format!("{}/revoke", server.uri()),
        })))
        .mount(server)
        .await;
}

fn cached_user(refresh_token: Option<&str>) -> User {
    User {
        access_token: "old-access".to_string(),
        id_token: Some("old-id-token".to_string()),
        refresh_token: refresh_token.map(str::to_string),
        expires_at: Some(Utc::now().timestamp() + 3600),
        profile: Default::default(),
    }
}

fn seed_user(storage: &MemoryStore, config: &AgentConfig, user: &User) {
    storage
        .set(
            &config.user_storage_key(),
            &serde_json::to_string(user).unwrap(),
        )
        .unwrap();
}

fn record_signals(agent: &OidcAgent) -> (Arc<Mutex<Vec<AuthSignal>>>, Vec<crate::EventSubscription>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut subs = Vec::new();
    for signal in [
        AuthSignal::AccessTokenExpiring,
        AuthSignal::AccessTokenExpired,
        AuthSignal::SilentRenewError,
        AuthSignal::UserLoaded,
        AuthSignal::UserUnloaded,
        AuthSignal::UserSignedIn,
        AuthSignal::UserSignedOut,
    ] {
        let seen = seen.clone();
        subs.push(agent.events().subscribe(signal, move |event| {
            seen.lock().unwrap().push(event.signal());
        }));
    }
    (seen, subs)
}

fn unsigned_id_token(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(serde_json::json!({"alg": "RS256"}).to_string());
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

#[tokio::test]
async fn start_restores_cached_session_and_emits_user_loaded() {
    let storage = Arc::new(MemoryStore::new());
    let config = test_config("https://idp.invalid", storage.clone());
    seed_user(&storage, &config, &cached_user(Some("refresh-1")));

    let agent = OidcAgent::new(config).unwrap();
    let (seen, _subs) = record_signals(&agent);
    agent.start();

    assert_eq!(seen.lock().unwrap().as_slice(), [AuthSignal::UserLoaded]);
    let snapshot = agent.snapshot();
    assert!(snapshot.is_authenticated);
    assert_eq!(snapshot.user.unwrap().access_token, "old-access");
}

#[tokio::test]
async fn silent_renew_exchanges_refresh_token() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    let id_token = unsigned_id_token(serde_json::json!({
        "sub": "user-1",
        "email": "user@example.com",
    }));
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-access",
            "token_type": "Bearer",
            "expires_in": 300,
            "refresh_token": "refresh-2",
            "id_token": id_token,
        })))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStore::new());
    let config = test_config(&server.uri(), storage.clone());
    let user_key = config.user_storage_key();
    seed_user(&storage, &config, &cached_user(Some("refresh-1")));

    let agent = OidcAgent::new(config).unwrap();
    let (seen, _subs) = record_signals(&agent);
    agent.start();

    let renewed = agent.signin_silent().await.unwrap().unwrap();
    assert_eq!(renewed.access_token, "new-access");
    assert_eq!(renewed.refresh_token.as_deref(), Some("refresh-2"));
    assert_eq!(renewed.email(), Some("user@example.com"));
    assert!(renewed.expires_at.unwrap() > Utc::now().timestamp());

    // The session cache under the client namespace was rewritten.
    let persisted: User =
        serde_json::from_str(&storage.get(&user_key).unwrap().unwrap()).unwrap();
    assert_eq!(persisted.access_token, "new-access");

    assert_eq!(
        seen.lock().unwrap().as_slice(),
        [AuthSignal::UserLoaded, AuthSignal::UserLoaded]
    );
    assert!(agent.snapshot().error.is_none());
}

#[tokio::test]
async fn silent_renew_keeps_prior_refresh_token_when_not_rotated() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-access",
            "token_type": "Bearer",
            "expires_in": 300,
        })))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStore::new());
    let config = test_config(&server.uri(), storage.clone());
    seed_user(&storage, &config, &cached_user(Some("refresh-1")));

    let agent = OidcAgent::new(config).unwrap();
    agent.start();

    let renewed = agent.signin_silent().await.unwrap().unwrap();
    assert_eq!(renewed.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(renewed.id_token.as_deref(), Some("old-id-token"));
}

#[tokio::test]
async fn silent_renew_without_session_or_refresh_token_fails() {
    let storage = Arc::new(MemoryStore::new());
    let agent = OidcAgent::new(test_config("https://idp.invalid", storage.clone())).unwrap();
    agent.start();

    assert!(matches!(
        agent.signin_silent().await,
        Err(AgentError::NotAuthenticated)
    ));

    let config = test_config("https://idp.invalid", storage.clone());
    seed_user(&storage, &config, &cached_user(None));
    let agent = OidcAgent::new(config).unwrap();
    agent.start();

    assert!(matches!(
        agent.signin_silent().await,
        Err(AgentError::NoRefreshToken)
    ));
    // Failures land in the error slot for the console's error watcher.
    assert!(agent.snapshot().error.is_some());
}

#[tokio::test]
async fn token_endpoint_rejection_surfaces_as_error() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"error": "invalid_grant"})),
        )
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStore::new());
    let config = test_config(&server.uri(), storage.clone());
    seed_user(&storage, &config, &cached_user(Some("stale")));

    let agent = OidcAgent::new(config).unwrap();
    agent.start();

    let result = agent.signin_silent().await;
    assert!(matches!(result, Err(AgentError::TokenEndpoint(_))));
    assert!(
        agent
            .snapshot()
            .error
            .unwrap()
            .contains("invalid_grant")
    );
    // Prior session state is left untouched on failure.
    assert_eq!(agent.snapshot().user.unwrap().access_token, "old-access");
}

#[tokio::test]
async fn remove_user_drops_only_the_local_cache() {
    let storage = Arc::new(MemoryStore::new());
    let config = test_config("https://idp.invalid", storage.clone());
    let user_key = config.user_storage_key();
    seed_user(&storage, &config, &cached_user(Some("refresh-1")));

    let agent = OidcAgent::new(config).unwrap();
    let (seen, _subs) = record_signals(&agent);
    agent.start();

    agent.remove_user().await.unwrap();

    assert_eq!(storage.get(&user_key).unwrap(), None);
    assert!(!agent.snapshot().is_authenticated);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        [AuthSignal::UserLoaded, AuthSignal::UserUnloaded]
    );
}

#[tokio::test]
async fn silent_signout_revokes_and_unloads() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/revoke"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2) // access token and refresh token
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStore::new());
    let config = test_config(&server.uri(), storage.clone());
    seed_user(&storage, &config, &cached_user(Some("refresh-1")));

    let agent = OidcAgent::new(config).unwrap();
    let (seen, _subs) = record_signals(&agent);
    agent.start();

    agent.signout_silent().await.unwrap();

    assert!(!agent.snapshot().is_authenticated);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        [
            AuthSignal::UserLoaded,
            AuthSignal::UserSignedOut,
            AuthSignal::UserUnloaded
        ]
    );
}

#[tokio::test]
async fn automatic_renew_fires_expiring_then_renews() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "renewed-access",
            "token_type": "Bearer",
            "expires_in": 600,
        })))
        .mount(&server)
        .await;

    let storage = Arc::new(MemoryStore::new());
    let mut config = test_config(&server.uri(), storage.clone());
    config.automatic_silent_renew = true;
    // Already inside the notification window.
    let mut user = cached_user(Some("refresh-1"));
    user.expires_at = Some(Utc::now().timestamp() + 30);
    seed_user(&storage, &config, &user);

    let agent = OidcAgent::new(config).unwrap();
    let (seen, _subs) = record_signals(&agent);
    agent.start();

    tokio::time::sleep(Duration::from_millis(500)).await;

    let signals = seen.lock().unwrap().clone();
    assert!(signals.contains(&AuthSignal::AccessTokenExpiring));
    // The renewal's UserLoaded follows the expiring notification.
    assert_eq!(signals.last(), Some(&AuthSignal::UserLoaded));
    assert_eq!(agent.snapshot().user.unwrap().access_token, "renewed-access");
}

#[tokio::test]
async fn callback_listener_returns_query_parameters() {
    let redirect_uri = "http://127.0.0.1:47311/callback";
    let waiter = tokio::spawn(wait_for_callback(
        redirect_uri,
        Some(Duration::from_secs(5)),
    ));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = reqwest::get(format!("{redirect_uri}?code=abc&state=xyz"))
        .await
        .unwrap();
    assert!(response.status().is_success());

    let params = waiter.await.unwrap().unwrap();
    assert_eq!(params.code.as_deref(), Some("abc"));
    assert_eq!(params.state.as_deref(), Some("xyz"));
    assert!(params.error.is_none());
}

#[tokio::test]
async fn callback_listener_times_out_when_abandoned() {
    let result = wait_for_callback(
        "http://127.0.0.1:47312/callback",
        Some(Duration::from_millis(200)),
    )
    .await;
    assert!(matches!(result, Err(AgentError::Timeout)));
}

#[test]
fn user_from_token_response_decodes_profile_for_display_only() {
    let id_token = unsigned_id_token(serde_json::json!({
        "sub": "abc",
        "preferred_username": "probe",
    }));
    let response = TokenResponse {
        access_token: "a".to_string(),
        token_type: "Bearer".to_string(),
        expires_in: Some(120),
        refresh_token: None,
        scope: None,
        id_token: Some(id_token),
    };

    let user = User::from_token_response(response, 1_000, None);
    assert_eq!(user.expires_at, Some(1_120));
    assert_eq!(
        user.profile.get("preferred_username").unwrap(),
        "probe"
    );
}
