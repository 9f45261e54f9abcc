//! Authorization-code-with-PKCE agent.

use crate::callback;
use crate::client::AuthClient;
use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::events::{AuthEvent, AuthEvents};
use crate::pkce::{PkceChallenge, random_token};
use crate::types::{ProviderMetadata, SessionSnapshot, TokenResponse, User};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// How long a popup-style login waits before it is considered abandoned.
const POPUP_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Default)]
struct SessionState {
    is_loading: bool,
    error: Option<String>,
    user: Option<User>,
    pending_url: Option<String>,
}

struct Inner {
    config: AgentConfig,
    http: reqwest::Client,
    events: Arc<AuthEvents>,
    session: RwLock<SessionState>,
    metadata: tokio::sync::Mutex<Option<ProviderMetadata>>,
}

/// The concrete auth client: discovery, interactive login over a loopback
/// callback, refresh grants, revocation, and the automatic renew timer.
///
/// One agent instance per configuration; a settings change constructs a
/// new agent and drops this one, which aborts its renew task.
pub struct OidcAgent {
    inner: Arc<Inner>,
    renew_task: Mutex<Option<JoinHandle<()>>>,
}

impl OidcAgent {
    pub fn new(config: AgentConfig) -> AgentResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                http,
                events: AuthEvents::new(),
                session: RwLock::new(SessionState::default()),
                metadata: tokio::sync::Mutex::new(None),
            }),
            renew_task: Mutex::new(None),
        })
    }

    /// Load any cached session and start the automatic renew timer.
    ///
    /// Call after event subscriptions are in place, otherwise the initial
    /// `UserLoaded` emission has no observers.
    pub fn start(&self) {
        if let Some(user) = self.inner.load_cached_user() {
            info!("restored cached session from storage");
            if let Ok(mut session) = self.inner.session.write() {
                session.user = Some(user.clone());
            }
            self.inner.events.emit(&AuthEvent::UserLoaded { user });
        }

        if self.inner.config.automatic_silent_renew {
            let inner = self.inner.clone();
            let handle = tokio::spawn(async move {
                Inner::renew_loop(inner).await;
            });
            if let Ok(mut slot) = self.renew_task.lock() {
                *slot = Some(handle);
            }
        }
    }

    async fn run_interactive_signin(&self, timeout: Option<Duration>) -> AgentResult<()> {
        self.inner.begin_action();
        let result = Inner::interactive_signin(&self.inner, timeout).await;
        self.inner.finish_action(&result);
        // The authorization URL is spent once the listener returns.
        if let Ok(mut session) = self.inner.session.write() {
            session.pending_url = None;
        }
        result
    }
}

impl Drop for OidcAgent {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.renew_task.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

impl Inner {
    fn load_cached_user(&self) -> Option<User> {
        let raw = self.config.storage.get(&self.config.user_storage_key()).ok()??;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                debug!(error = %e, "discarding unparseable session cache");
                None
            }
        }
    }

    /// Mark an action in flight and clear any stale pending URL.
    fn begin_action(&self) {
        if let Ok(mut session) = self.session.write() {
            session.is_loading = true;
            session.pending_url = None;
        }
    }

    fn finish_action<T>(&self, result: &AgentResult<T>) {
        if let Ok(mut session) = self.session.write() {
            session.is_loading = false;
            match result {
                Ok(_) => session.error = None,
                Err(e) => session.error = Some(e.to_string()),
            }
        }
    }

    async fn metadata(&self) -> AgentResult<ProviderMetadata> {
        let mut cached = self.metadata.lock().await;
        if let Some(meta) = cached.as_ref() {
            return Ok(meta.clone());
        }

        let url = format!(
            "{}/.well-known/openid-configuration",
            self.config.authority.trim_end_matches('/')
        );
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AgentError::Discovery(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let meta: ProviderMetadata = response
            .json()
            .await
            .map_err(|e| AgentError::Discovery(e.to_string()))?;
        debug!(authority = %self.config.authority, "discovery document cached");
        *cached = Some(meta.clone());
        Ok(meta)
    }

    async fn interactive_signin(inner: &Arc<Self>, timeout: Option<Duration>) -> AgentResult<()> {
        let meta = inner.metadata().await?;
        let pkce = PkceChallenge::new();
        let state = random_token(32);
        let nonce = random_token(32);

        let mut url = Url::parse(&meta.authorization_endpoint)?;
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("client_id", &inner.config.client_id);
            params.append_pair("redirect_uri", &inner.config.redirect_uri);
            params.append_pair("scope", &inner.config.scope);
            params.append_pair("state", &state);
            params.append_pair("nonce", &nonce);
            params.append_pair("code_challenge", &pkce.code_challenge);
            params.append_pair("code_challenge_method", &pkce.code_challenge_method);
        }
        let auth_url = url.to_string();

        // Persist the pending exchange under the client namespace so an
        // interrupted login leaves an inspectable trace, not mystery state.
        let pending_key = inner.config.pending_storage_key(&state);
        let pending = serde_json::json!({
            "codeVerifier": pkce.code_verifier,
            "nonce": nonce,
            "createdAt": Utc::now().timestamp(),
        });
        if let Err(e) = inner.config.storage.set(&pending_key, &pending.to_string()) {
            warn!(error = %e, "failed to persist pending login state");
        }

        if let Ok(mut session) = inner.session.write() {
            session.pending_url = Some(auth_url.clone());
        }
        info!(%auth_url, "authorization URL ready, open it in a browser");

        let params = callback::wait_for_callback(&inner.config.redirect_uri, timeout).await?;

        if let Some(error) = params.error {
            let description = params
                .error_description
                .unwrap_or_else(|| "no description".to_string());
            return Err(AgentError::Callback(format!("{error}: {description}")));
        }
        if params.state.as_deref() != Some(state.as_str()) {
            return Err(AgentError::StateMismatch);
        }
        let code = params
            .code
            .ok_or_else(|| AgentError::Callback("missing authorization code".to_string()))?;

        let token = inner.exchange_code(&meta, &code, &pkce.code_verifier).await?;
        if let Err(e) = inner.config.storage.remove(&pending_key) {
            warn!(error = %e, "failed to remove pending login state");
        }

        let user = inner.install_user(token, None)?;
        inner.events.emit(&AuthEvent::UserLoaded { user });
        inner.events.emit(&AuthEvent::UserSignedIn);
        Ok(())
    }

    async fn exchange_code(
        &self,
        meta: &ProviderMetadata,
        code: &str,
        code_verifier: &str,
    ) -> AgentResult<TokenResponse> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", &self.config.client_id),
            ("redirect_uri", &self.config.redirect_uri),
            ("code_verifier", code_verifier),
        ];
        self.token_request(&meta.token_endpoint, &form).await
    }

    async fn silent_renew(inner: &Arc<Self>) -> AgentResult<User> {
        let prior = {
            let session = inner
                .session
                .read()
                .map_err(|e| AgentError::Callback(e.to_string()))?;
            session.user.clone().ok_or(AgentError::NotAuthenticated)?
        };
        let refresh_token = prior
            .refresh_token
            .clone()
            .ok_or(AgentError::NoRefreshToken)?;

        let meta = inner.metadata().await?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", &refresh_token),
            ("client_id", &inner.config.client_id),
            ("scope", &inner.config.scope),
        ];
        let token = inner.token_request(&meta.token_endpoint, &form).await?;

        let user = inner.install_user(token, Some(&prior))?;
        inner.events.emit(&AuthEvent::UserLoaded { user: user.clone() });
        Ok(user)
    }

    async fn token_request(
        &self,
        endpoint: &str,
        form: &[(&str, &str)],
    ) -> AgentResult<TokenResponse> {
        let response = self.http.post(endpoint).form(form).send().await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::TokenEndpoint(body));
        }

        response
            .json()
            .await
            .map_err(|e| AgentError::InvalidTokenResponse(e.to_string()))
    }

    fn install_user(&self, response: TokenResponse, prior: Option<&User>) -> AgentResult<User> {
        let user = User::from_token_response(response, Utc::now().timestamp(), prior);
        let raw = serde_json::to_string(&user)?;
        if let Err(e) = self.config.storage.set(&self.config.user_storage_key(), &raw) {
            warn!(error = %e, "failed to persist session cache");
        }
        if let Ok(mut session) = self.session.write() {
            session.user = Some(user.clone());
        }
        Ok(user)
    }

    fn clear_user(&self) {
        if let Err(e) = self.config.storage.remove(&self.config.user_storage_key()) {
            warn!(error = %e, "failed to remove session cache");
        }
        if let Ok(mut session) = self.session.write() {
            session.user = None;
        }
    }

    async fn signout(inner: &Arc<Self>, interactive: bool) -> AgentResult<()> {
        let user = {
            let session = inner
                .session
                .read()
                .map_err(|e| AgentError::Callback(e.to_string()))?;
            session.user.clone().ok_or(AgentError::NotAuthenticated)?
        };

        let meta = inner.metadata().await?;
        if inner.config.revoke_tokens_on_signout {
            inner.revoke_tokens(&meta, &user).await;
        }

        if let Some(end_session) = &meta.end_session_endpoint {
            let mut url = Url::parse(end_session)?;
            {
                let mut params = url.query_pairs_mut();
                params.append_pair("client_id", &inner.config.client_id);
                if let Some(id_token) = &user.id_token {
                    params.append_pair("id_token_hint", id_token);
                }
                if let Some(post_logout) = &inner.config.post_logout_redirect_uri {
                    params.append_pair("post_logout_redirect_uri", post_logout);
                }
            }

            if interactive {
                // The operator finishes the browser session themselves.
                let end_url = url.to_string();
                if let Ok(mut session) = inner.session.write() {
                    session.pending_url = Some(end_url.clone());
                }
                info!(%end_url, "end-session URL ready, open it in a browser");
            } else {
                match inner.http.get(url).send().await {
                    Ok(response) if response.status().is_success() => {
                        debug!("end-session endpoint acknowledged silent signout");
                    }
                    Ok(response) => {
                        warn!(status = %response.status(), "end-session endpoint rejected signout");
                    }
                    Err(e) => warn!(error = %e, "end-session request failed"),
                }
            }
        }

        inner.clear_user();
        inner.events.emit(&AuthEvent::UserSignedOut);
        inner.events.emit(&AuthEvent::UserUnloaded);
        Ok(())
    }

    async fn revoke_tokens(&self, meta: &ProviderMetadata, user: &User) {
        let Some(endpoint) = &meta.revocation_endpoint else {
            return;
        };

        let targets = [
            (Some(&user.access_token), "access_token"),
            (user.refresh_token.as_ref(), "refresh_token"),
        ];
        for (token, hint) in targets {
            let Some(token) = token else { continue };
            let form = [
                ("token", token.as_str()),
                ("token_type_hint", hint),
                ("client_id", &self.config.client_id),
            ];
            match self.http.post(endpoint).form(&form).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(hint, "token revoked");
                }
                Ok(response) => {
                    warn!(hint, status = %response.status(), "revocation rejected");
                }
                Err(e) => warn!(hint, error = %e, "revocation request failed"),
            }
        }
    }

    /// Timer behind `automatic_silent_renew`: notify ahead of expiry,
    /// attempt one renewal, and report expiry if it fails. Renewal retry
    /// beyond this single attempt per token lifetime is not this layer's
    /// job.
    async fn renew_loop(inner: Arc<Self>) {
        let lead = inner.config.expiring_notification_secs as i64;
        let mut handled_expiry: Option<i64> = None;

        loop {
            let expires_at = inner
                .session
                .read()
                .ok()
                .and_then(|s| s.user.as_ref().and_then(|u| u.expires_at));

            let Some(expires_at) = expires_at else {
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            };
            if handled_expiry == Some(expires_at) {
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }

            let until_notice = expires_at - lead - Utc::now().timestamp();
            if until_notice > 0 {
                // Short slices so a renewed session re-evaluates promptly.
                tokio::time::sleep(Duration::from_secs(until_notice.min(5) as u64)).await;
                continue;
            }

            handled_expiry = Some(expires_at);
            inner.events.emit(&AuthEvent::AccessTokenExpiring);

            match Self::silent_renew(&inner).await {
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "automatic silent renew failed");
                    inner.events.emit(&AuthEvent::SilentRenewError {
                        message: e.to_string(),
                    });

                    let remaining = expires_at - Utc::now().timestamp();
                    if remaining > 0 {
                        tokio::time::sleep(Duration::from_secs(remaining as u64)).await;
                    }
                    let current = inner
                        .session
                        .read()
                        .ok()
                        .and_then(|s| s.user.as_ref().and_then(|u| u.expires_at));
                    if current == Some(expires_at) {
                        inner.events.emit(&AuthEvent::AccessTokenExpired);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl AuthClient for OidcAgent {
    fn events(&self) -> Arc<AuthEvents> {
        self.inner.events.clone()
    }

    fn snapshot(&self) -> SessionSnapshot {
        match self.inner.session.read() {
            Ok(session) => SessionSnapshot {
                is_loading: session.is_loading,
                is_authenticated: session.user.is_some(),
                error: session.error.clone(),
                user: session.user.clone(),
                pending_url: session.pending_url.clone(),
            },
            Err(_) => SessionSnapshot::default(),
        }
    }

    async fn signin_redirect(&self) -> AgentResult<()> {
        self.run_interactive_signin(None).await
    }

    async fn signin_popup(&self) -> AgentResult<()> {
        self.run_interactive_signin(Some(POPUP_TIMEOUT)).await
    }

    async fn signout_redirect(&self) -> AgentResult<()> {
        self.inner.begin_action();
        // The end-session URL set here stays visible until the next action.
        let result = Inner::signout(&self.inner, true).await;
        self.inner.finish_action(&result);
        result
    }

    async fn signout_silent(&self) -> AgentResult<()> {
        self.inner.begin_action();
        let result = Inner::signout(&self.inner, false).await;
        self.inner.finish_action(&result);
        result
    }

    async fn remove_user(&self) -> AgentResult<()> {
        self.inner.begin_action();
        self.inner.clear_user();
        let result = Ok(());
        self.inner.finish_action(&result);
        self.inner.events.emit(&AuthEvent::UserUnloaded);
        result
    }

    async fn signin_silent(&self) -> AgentResult<Option<User>> {
        self.inner.begin_action();
        let result = Inner::silent_renew(&self.inner).await;
        self.inner.finish_action(&result);
        result.map(Some)
    }
}
