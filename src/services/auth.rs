//! Contract of the external identity service.

use std::sync::Arc;

use async_trait::async_trait;

use crate::services::change_stream::Subscription;
use crate::types::errors::RemoteRequestError;
use crate::types::session::{Provider, Session, SessionEvent, SignInRedirect};

/// Invoked on every session transition with the session as it is afterwards.
pub type SessionCallback = Arc<dyn Fn(SessionEvent, &Session) + Send + Sync>;

/// Trait defining the identity operations the views rely on. The session
/// lifecycle belongs entirely to the implementation.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Resolves the session currently held, or `Session::Absent`.
    async fn current_session(&self) -> Result<Session, RemoteRequestError>;

    /// Registers a listener for session transitions. Implementations deliver
    /// `SessionEvent::InitialSession` to the new listener straight away.
    fn on_session_change(&self, callback: SessionCallback) -> Subscription;

    /// Starts a sign-in with a third-party provider. Completion arrives later
    /// as a `SignedIn` notification once the redirect lands.
    async fn sign_in_with_provider(
        &self,
        provider: &Provider,
        redirect_to: &str,
    ) -> Result<SignInRedirect, RemoteRequestError>;

    /// Ends the current session.
    async fn sign_out(&self) -> Result<(), RemoteRequestError>;
}
