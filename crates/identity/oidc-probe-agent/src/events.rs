//! Lifecycle-signal registration table.

use crate::types::User;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::trace;

/// The seven lifecycle signals an auth client emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthSignal {
    AccessTokenExpiring,
    AccessTokenExpired,
    SilentRenewError,
    UserLoaded,
    UserUnloaded,
    UserSignedIn,
    UserSignedOut,
}

/// A lifecycle event with its payload.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    AccessTokenExpiring,
    AccessTokenExpired,
    SilentRenewError { message: String },
    UserLoaded { user: User },
    UserUnloaded,
    UserSignedIn,
    UserSignedOut,
}

impl AuthEvent {
    pub fn signal(&self) -> AuthSignal {
        match self {
            AuthEvent::AccessTokenExpiring => AuthSignal::AccessTokenExpiring,
            AuthEvent::AccessTokenExpired => AuthSignal::AccessTokenExpired,
            AuthEvent::SilentRenewError { .. } => AuthSignal::SilentRenewError,
            AuthEvent::UserLoaded { .. } => AuthSignal::UserLoaded,
            AuthEvent::UserUnloaded => AuthSignal::UserUnloaded,
            AuthEvent::UserSignedIn => AuthSignal::UserSignedIn,
            AuthEvent::UserSignedOut => AuthSignal::UserSignedOut,
        }
    }
}

type Handler = Box<dyn Fn(&AuthEvent) + Send + Sync>;

/// Registration table of (signal, handler) pairs.
///
/// Subscriptions are explicit disposables: dropping an
/// [`EventSubscription`] does not detach its handler, `unsubscribe` does.
/// Consumers collect the handles at subscribe time and release them
/// together on teardown so no handler survives a re-initialization.
#[derive(Default)]
pub struct AuthEvents {
    handlers: Mutex<HashMap<AuthSignal, Vec<(u64, Handler)>>>,
    next_id: AtomicU64,
}

impl AuthEvents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(
        self: &Arc<Self>,
        signal: AuthSignal,
        handler: impl Fn(&AuthEvent) + Send + Sync + 'static,
    ) -> EventSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers
                .entry(signal)
                .or_default()
                .push((id, Box::new(handler)));
        }
        EventSubscription {
            events: Arc::downgrade(self),
            signal,
            id,
        }
    }

    pub fn emit(&self, event: &AuthEvent) {
        trace!(signal = ?event.signal(), "emitting auth event");
        let Ok(handlers) = self.handlers.lock() else {
            return;
        };
        if let Some(registered) = handlers.get(&event.signal()) {
            for (_, handler) in registered {
                handler(event);
            }
        }
    }

    fn remove(&self, signal: AuthSignal, id: u64) {
        if let Ok(mut handlers) = self.handlers.lock() {
            if let Some(registered) = handlers.get_mut(&signal) {
                registered.retain(|(handler_id, _)| *handler_id != id);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn handler_count(&self, signal: AuthSignal) -> usize {
        self.handlers
            .lock()
            .map(|h| h.get(&signal).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

/// Disposable unsubscribe token returned by [`AuthEvents::subscribe`].
pub struct EventSubscription {
    events: Weak<AuthEvents>,
    signal: AuthSignal,
    id: u64,
}

impl EventSubscription {
    pub fn unsubscribe(self) {
        if let Some(events) = self.events.upgrade() {
            events.remove(self.signal, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emit_reaches_only_matching_signal() {
        let events = AuthEvents::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = hits.clone();
        let _sub = events.subscribe(AuthSignal::UserSignedIn, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        events.emit(&AuthEvent::UserSignedIn);
        events.emit(&AuthEvent::UserUnloaded);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_detaches_handler() {
        let events = AuthEvents::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = hits.clone();
        let sub = events.subscribe(AuthSignal::AccessTokenExpired, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        events.emit(&AuthEvent::AccessTokenExpired);
        sub.unsubscribe();
        events.emit(&AuthEvent::AccessTokenExpired);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(events.handler_count(AuthSignal::AccessTokenExpired), 0);
    }

    #[test]
    fn dropping_a_subscription_keeps_the_handler_live() {
        let events = AuthEvents::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = hits.clone();
        drop(events.subscribe(AuthSignal::UserLoaded, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }));

        events.emit(&AuthEvent::UserLoaded {
            user: crate::types::User {
                access_token: "t".to_string(),
                id_token: None,
                refresh_token: None,
                expires_at: None,
                profile: Default::default(),
            },
        });

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_payloads_are_delivered() {
        let events = AuthEvents::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let _sub = events.subscribe(AuthSignal::SilentRenewError, move |event| {
            if let AuthEvent::SilentRenewError { message } = event {
                seen_clone.lock().unwrap().push(message.clone());
            }
        });

        events.emit(&AuthEvent::SilentRenewError {
            message: "network unreachable".to_string(),
        });

        assert_eq!(seen.lock().unwrap().as_slice(), ["network unreachable"]);
    }
}
