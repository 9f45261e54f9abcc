//! Core data model for the oidc-probe diagnostic console.
//!
//! Everything in this crate is pure, synchronous presentation logic:
//! decoding JWTs for display, formatting expiry countdowns, and keeping
//! a bounded diagnostic event log. Nothing here performs protocol work
//! or makes trust decisions.

mod jwt;
mod log;
mod timefmt;
mod types;

pub use jwt::decode_jwt;
pub use log::LogRecorder;
pub use timefmt::{format_time_left, time_left};
pub use types::{DecodedJwt, LogEntry, LogLevel, OidcSettings, TimeLeft};
