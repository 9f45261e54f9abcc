//! The auth client capability surface the console consumes.

use crate::error::AgentResult;
use crate::events::AuthEvents;
use crate::types::{SessionSnapshot, User};
use async_trait::async_trait;
use std::sync::Arc;

/// What the console is allowed to do with an auth client: observe its
/// lifecycle signals, read its session state, and invoke its actions.
/// The console never drives protocol details through this seam.
#[async_trait]
pub trait AuthClient: Send + Sync {
    fn events(&self) -> Arc<AuthEvents>;

    fn snapshot(&self) -> SessionSnapshot;

    /// Interactive login; blocks until the authorization callback lands.
    async fn signin_redirect(&self) -> AgentResult<()>;

    /// Interactive login with a completion deadline, the terminal analog
    /// of a popup the user may abandon.
    async fn signin_popup(&self) -> AgentResult<()>;

    /// End the session at the identity provider, surfacing the
    /// end-session URL to the operator.
    async fn signout_redirect(&self) -> AgentResult<()>;

    /// End the session server-side without operator interaction.
    async fn signout_silent(&self) -> AgentResult<()>;

    /// Drop the locally cached user without contacting the provider.
    async fn remove_user(&self) -> AgentResult<()>;

    /// Silent token renewal via the refresh grant.
    async fn signin_silent(&self) -> AgentResult<Option<User>>;
}
