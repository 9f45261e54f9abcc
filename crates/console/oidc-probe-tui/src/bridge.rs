//! Glue between the auth client and the console log.
//!
//! The bridge subscribes to every lifecycle signal at mount, translates
//! each into a log entry, and watches the session snapshot for
//! authentication flips and new errors. All subscriptions are released
//! together on teardown so a reconfigured client never double-logs.

use crate::app::AppEvent;
use chrono::{Local, TimeZone};
use oidc_probe_agent::{AuthClient, AuthEvent, AuthSignal, EventSubscription, SessionSnapshot};
use oidc_probe_core::LogLevel;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    Redirect,
    Popup,
}

impl LoginMethod {
    fn name(self) -> &'static str {
        match self {
            Self::Redirect => "redirect",
            Self::Popup => "popup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutMethod {
    Redirect,
    Silent,
    Local,
}

impl LogoutMethod {
    fn name(self) -> &'static str {
        match self {
            Self::Redirect => "redirect",
            Self::Silent => "silent",
            Self::Local => "local",
        }
    }
}

fn format_expiry(expires_at: Option<i64>) -> String {
    match expires_at.and_then(|secs| Local.timestamp_opt(secs, 0).single()) {
        Some(time) => format!("Expires: {}", time.format("%H:%M:%S")),
        None => "Expires: N/A".to_string(),
    }
}

pub struct SessionBridge {
    client: Arc<dyn AuthClient>,
    subscriptions: Vec<EventSubscription>,
    events_tx: UnboundedSender<AppEvent>,
    refreshing: Arc<AtomicBool>,
    prev_authenticated: Option<bool>,
    last_error: Option<String>,
    last_pending_url: Option<String>,
}

impl SessionBridge {
    pub fn new(client: Arc<dyn AuthClient>, events_tx: UnboundedSender<AppEvent>) -> Self {
        let subscriptions = Self::subscribe_all(&client, &events_tx);
        Self {
            client,
            subscriptions,
            events_tx,
            refreshing: Arc::new(AtomicBool::new(false)),
            prev_authenticated: None,
            last_error: None,
            last_pending_url: None,
        }
    }

    /// One log entry per lifecycle signal, mirroring the agent's seven
    /// emissions.
    fn subscribe_all(
        client: &Arc<dyn AuthClient>,
        events_tx: &UnboundedSender<AppEvent>,
    ) -> Vec<EventSubscription> {
        let events = client.events();
        let mut subs = Vec::with_capacity(7);

        let tx = events_tx.clone();
        subs.push(events.subscribe(AuthSignal::AccessTokenExpiring, move |_| {
            let _ = tx.send(AppEvent::log(
                LogLevel::Warning,
                "Token expiring soon",
                Some("Auto-refresh will trigger".to_string()),
            ));
        }));

        let tx = events_tx.clone();
        subs.push(events.subscribe(AuthSignal::AccessTokenExpired, move |_| {
            let _ = tx.send(AppEvent::log(
                LogLevel::Error,
                "Token expired!",
                Some("Manual refresh required".to_string()),
            ));
        }));

        let tx = events_tx.clone();
        subs.push(events.subscribe(AuthSignal::SilentRenewError, move |event| {
            let detail = match event {
                AuthEvent::SilentRenewError { message } => Some(message.clone()),
                _ => None,
            };
            let _ = tx.send(AppEvent::log(LogLevel::Error, "Silent renew failed", detail));
        }));

        let tx = events_tx.clone();
        subs.push(events.subscribe(AuthSignal::UserLoaded, move |event| {
            let detail = match event {
                AuthEvent::UserLoaded { user } => Some(format_expiry(user.expires_at)),
                _ => None,
            };
            let _ = tx.send(AppEvent::log(LogLevel::Event, "User loaded", detail));
        }));

        let tx = events_tx.clone();
        subs.push(events.subscribe(AuthSignal::UserUnloaded, move |_| {
            let _ = tx.send(AppEvent::log(LogLevel::Event, "User unloaded", None));
        }));

        let tx = events_tx.clone();
        subs.push(events.subscribe(AuthSignal::UserSignedIn, move |_| {
            let _ = tx.send(AppEvent::log(
                LogLevel::Success,
                "Signed in successfully",
                None,
            ));
        }));

        let tx = events_tx.clone();
        subs.push(events.subscribe(AuthSignal::UserSignedOut, move |_| {
            let _ = tx.send(AppEvent::log(
                LogLevel::Event,
                "Signed out from identity provider",
                None,
            ));
        }));

        subs
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.client.snapshot()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Snapshot watcher, called once per render tick.
    ///
    /// The first observation seeds the authentication flip detector
    /// without logging, so mounting against an already-signed-in session
    /// stays quiet. Errors are logged once per distinct occurrence.
    pub fn observe(&mut self) {
        let snapshot = self.client.snapshot();

        match self.prev_authenticated {
            None => self.prev_authenticated = Some(snapshot.is_authenticated),
            Some(prev) if prev != snapshot.is_authenticated => {
                if snapshot.is_authenticated {
                    self.log(LogLevel::Success, "AUTHENTICATED", None);
                } else {
                    self.log(LogLevel::Info, "NOT AUTHENTICATED", None);
                }
                self.prev_authenticated = Some(snapshot.is_authenticated);
            }
            Some(_) => {}
        }

        if snapshot.error != self.last_error {
            if let Some(error) = &snapshot.error {
                self.log(LogLevel::Error, "Auth error", Some(error.clone()));
            }
            self.last_error = snapshot.error;
        }

        if snapshot.pending_url != self.last_pending_url {
            if let Some(url) = &snapshot.pending_url {
                self.log(
                    LogLevel::Info,
                    "Waiting for browser",
                    Some(format!("Open: {url}")),
                );
            }
            self.last_pending_url = snapshot.pending_url;
        }
    }

    pub fn login(&self, method: LoginMethod) -> JoinHandle<()> {
        let client = self.client.clone();
        let tx = self.events_tx.clone();
        let _ = tx.send(AppEvent::log(
            LogLevel::Info,
            format!("Starting login ({})...", method.name()),
            None,
        ));
        tokio::spawn(async move {
            let outcome = match method {
                LoginMethod::Redirect => client.signin_redirect().await,
                LoginMethod::Popup => client.signin_popup().await,
            };
            match outcome {
                Ok(()) => {
                    let message = match method {
                        LoginMethod::Redirect => "Redirect login completed",
                        LoginMethod::Popup => "Popup login completed",
                    };
                    let _ = tx.send(AppEvent::log(LogLevel::Success, message, None));
                }
                Err(error) => {
                    let _ = tx.send(AppEvent::log(
                        LogLevel::Error,
                        "Login failed",
                        Some(error.to_string()),
                    ));
                }
            }
        })
    }

    pub fn logout(&self, method: LogoutMethod) -> JoinHandle<()> {
        let client = self.client.clone();
        let tx = self.events_tx.clone();
        let _ = tx.send(AppEvent::log(
            LogLevel::Info,
            format!("Starting logout ({})...", method.name()),
            None,
        ));
        tokio::spawn(async move {
            let outcome = match method {
                LogoutMethod::Redirect => client.signout_redirect().await,
                LogoutMethod::Silent => client.signout_silent().await,
                LogoutMethod::Local => client.remove_user().await,
            };
            match (method, outcome) {
                (LogoutMethod::Redirect, Ok(())) => {
                    let _ = tx.send(AppEvent::log(
                        LogLevel::Success,
                        "Redirect logout completed",
                        None,
                    ));
                }
                (LogoutMethod::Silent, Ok(())) => {
                    let _ = tx.send(AppEvent::log(
                        LogLevel::Success,
                        "Silent logout completed",
                        None,
                    ));
                }
                (LogoutMethod::Local, Ok(())) => {
                    let _ =
                        tx.send(AppEvent::log(LogLevel::Success, "Local user removed", None));
                }
                (_, Err(error)) => {
                    let _ = tx.send(AppEvent::log(
                        LogLevel::Error,
                        "Logout failed",
                        Some(error.to_string()),
                    ));
                }
            }
        })
    }

    /// Manual token refresh. Re-entrancy is rejected while a refresh is
    /// in flight.
    pub fn refresh(&self) -> Option<JoinHandle<()>> {
        if self.refreshing.swap(true, Ordering::SeqCst) {
            debug!("refresh already in flight, ignoring");
            return None;
        }
        let client = self.client.clone();
        let tx = self.events_tx.clone();
        let refreshing = self.refreshing.clone();
        let _ = tx.send(AppEvent::log(
            LogLevel::Info,
            "Starting token refresh...",
            None,
        ));
        Some(tokio::spawn(async move {
            match client.signin_silent().await {
                Ok(user) => {
                    let expiry = user.and_then(|u| u.expires_at);
                    let _ = tx.send(AppEvent::log(
                        LogLevel::Success,
                        "Token refreshed!",
                        Some(format_expiry(expiry).replace("Expires:", "New expiry:")),
                    ));
                }
                Err(error) => {
                    let _ = tx.send(AppEvent::log(
                        LogLevel::Error,
                        "Refresh failed",
                        Some(error.to_string()),
                    ));
                }
            }
            refreshing.store(false, Ordering::SeqCst);
            let _ = tx.send(AppEvent::RefreshFinished);
        }))
    }

    /// Release every subscription. After this the bridge logs nothing,
    /// even if the old client keeps emitting.
    pub fn teardown(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }

    /// Swap in a freshly built client, releasing every handler attached
    /// to the old one first.
    pub fn reconfigure(&mut self, client: Arc<dyn AuthClient>) {
        self.teardown();
        self.subscriptions = Self::subscribe_all(&client, &self.events_tx);
        self.client = client;
        self.prev_authenticated = None;
        self.last_error = None;
        self.last_pending_url = None;
        self.refreshing.store(false, Ordering::SeqCst);
    }

    fn log(&self, level: LogLevel, message: &str, data: Option<String>) {
        let _ = self.events_tx.send(AppEvent::log(level, message, data));
    }
}

impl Drop for SessionBridge {
    fn drop(&mut self) {
        self.teardown();
    }
}
