//! OIDC agent for the oidc-probe console.
//!
//! This crate is the "external OIDC client" the console observes: it owns
//! the protocol work (endpoint discovery, authorization-code exchange with
//! PKCE, refresh grants, revocation, the automatic silent-renew timer) and
//! exposes it through the [`AuthClient`] trait plus the [`AuthEvents`]
//! lifecycle-signal surface. The console itself never touches the wire.

mod agent;
mod callback;
mod client;
mod config;
mod error;
mod events;
mod pkce;
mod types;

#[cfg(test)]
mod tests;

pub use agent::OidcAgent;
pub use client::AuthClient;
pub use config::AgentConfig;
pub use error::{AgentError, AgentResult};
pub use events::{AuthEvent, AuthEvents, AuthSignal, EventSubscription};
pub use types::{ProviderMetadata, SessionSnapshot, TokenResponse, User};
