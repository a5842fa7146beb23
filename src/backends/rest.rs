//! Hosted backend-as-a-service binding over HTTPS.
//!
//! Talks to a PostgREST-style data API (`/rest/v1/...`) and a GoTrue-style
//! auth API (`/auth/v1/...`). Sign-in uses the implicit flow: the provider
//! redirect carries the access token in the URL fragment, which
//! [`HostedBackend::complete_sign_in`] reads. No code or refresh-token
//! exchange happens here.
//!
//! The change stream polls a fingerprint of the visible rows and notifies
//! listeners whenever it differs from the previous poll.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::services::auth::{AuthService, SessionCallback};
use crate::services::change_stream::{ChangeCallback, ChangeStream, SubscriberRegistry, Subscription};
use crate::services::store::{BookmarkStore, QueryOrder};
use crate::services::token_vault::TokenVault;
use crate::types::bookmark::{Bookmark, BookmarkId, NewBookmark, UserId, BOOKMARKS_COLLECTION};
use crate::types::errors::{BackendError, RemoteRequestError};
use crate::types::session::{Provider, Session, SessionEvent, SignInRedirect};
use crate::types::settings::BackendSettings;

type SessionListener = dyn Fn(SessionEvent, &Session) + Send + Sync;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Session material persisted between runs.
#[derive(Clone, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct StoredSession {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds.
    pub expires_at: Option<i64>,
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl StoredSession {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now().timestamp())
    }

    fn to_session(&self) -> Session {
        Session::present(self.user_id.clone(), self.access_token.clone())
    }
}

struct HostedInner {
    client: Client,
    base: Url,
    anon_key: String,
    poll_interval: Duration,
    vault: TokenVault,
    session: Mutex<Option<StoredSession>>,
    session_listeners: SubscriberRegistry<SessionListener>,
}

pub struct HostedBackend {
    inner: Arc<HostedInner>,
}

impl HostedBackend {
    /// Builds the client and restores a sealed session if one exists. A vault
    /// that cannot be opened is logged and treated as signed out.
    pub fn new(settings: &BackendSettings, vault: TokenVault) -> Result<Self, BackendError> {
        if settings.project_url.trim().is_empty() {
            return Err(BackendError::Config("backend.project_url is not set".to_string()));
        }
        let base = Url::parse(settings.project_url.trim_end_matches('/'))
            .map_err(|e| BackendError::Config(format!("invalid project_url: {}", e)))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        let restored = match vault.open::<StoredSession>() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "could not open session vault, starting signed out");
                None
            }
        };

        Ok(Self {
            inner: Arc::new(HostedInner {
                client,
                base,
                anon_key: settings.anon_key.clone(),
                poll_interval: Duration::from_secs(settings.poll_interval_secs.max(1)),
                vault,
                session: Mutex::new(restored),
                session_listeners: SubscriberRegistry::new(),
            }),
        })
    }

    /// URL the user must open to sign in with `provider`.
    pub fn authorize_url(&self, provider: &Provider, redirect_to: &str) -> Result<String, RemoteRequestError> {
        let mut url = self.inner.endpoint("auth/v1/authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect_to);
        Ok(url.into())
    }

    /// Finishes a sign-in from the URL the provider redirected to, persists
    /// the session and notifies session listeners.
    pub fn complete_sign_in(&self, redirect_url: &str) -> Result<Session, RemoteRequestError> {
        let stored = parse_redirect(redirect_url)?;
        if let Err(e) = self.inner.vault.seal(&stored) {
            tracing::warn!(error = %e, "could not persist session");
        }
        let session = stored.to_session();
        *self.inner.lock_session() = Some(stored);
        tracing::info!(user = ?session.user(), "hosted sign-in complete");
        self.inner.emit_session(SessionEvent::SignedIn);
        Ok(session)
    }
}

impl HostedInner {
    fn lock_session(&self) -> MutexGuard<'_, Option<StoredSession>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The live session. The first call that finds the stored session
    /// expired drops it and emits `SignedOut`.
    fn session(&self) -> Session {
        let expired = {
            let mut held = self.lock_session();
            let live = held
                .as_ref()
                .map(|stored| (!stored.is_expired()).then(|| stored.to_session()));
            match live {
                Some(Some(session)) => return session,
                Some(None) => {
                    *held = None;
                    true
                }
                None => false,
            }
        };

        if expired {
            tracing::info!("stored session expired, signing out");
            if let Err(e) = self.vault.clear() {
                tracing::warn!(error = %e, "could not clear session vault");
            }
            self.emit_session(SessionEvent::SignedOut);
        }
        Session::Absent
    }

    fn emit_session(&self, event: SessionEvent) {
        let session = self.session();
        for listener in self.session_listeners.snapshot() {
            listener(event, &session);
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteRequestError> {
        let base = format!("{}/", self.base.as_str().trim_end_matches('/'));
        Url::parse(&base)
            .and_then(|b| b.join(path))
            .map_err(|e| RemoteRequestError::Transport(format!("bad endpoint {}: {}", path, e)))
    }

    /// Request with the API key and the session's bearer token. Fails with
    /// `Unauthenticated` when no live session is held.
    fn authed(&self, method: Method, url: Url) -> Result<RequestBuilder, RemoteRequestError> {
        let token = match self.session() {
            Session::Present { token, .. } => token,
            Session::Absent => return Err(RemoteRequestError::Unauthenticated),
        };
        Ok(self
            .client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token.expose()))
    }

    fn bookmarks_url(&self) -> Result<Url, RemoteRequestError> {
        self.endpoint(&format!("rest/v1/{}", BOOKMARKS_COLLECTION))
    }

    async fn fingerprint(&self) -> Result<String, RemoteRequestError> {
        let mut url = self.bookmarks_url()?;
        // Every mutable column, so edits show up as well as inserts and deletes.
        url.query_pairs_mut()
            .append_pair("select", "id,title,url,created_at")
            .append_pair("order", "created_at.desc");
        let response = check(self.authed(Method::GET, url)?.send().await?).await?;
        Ok(response.text().await?)
    }
}

/// Maps a non-success response to an error.
async fn check(response: Response) -> Result<Response, RemoteRequestError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(RemoteRequestError::Unauthenticated);
    }
    let message = response.text().await.unwrap_or_default();
    Err(RemoteRequestError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Reads the user id (`sub` claim) from a JWT access token without verifying
/// it; verification is the server's job.
pub fn jwt_subject(token: &str) -> Result<UserId, RemoteRequestError> {
    #[derive(Deserialize)]
    struct Claims {
        sub: String,
    }

    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| RemoteRequestError::Decode("access token is not a JWT".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| RemoteRequestError::Decode(format!("token payload: {}", e)))?;
    let claims: Claims = serde_json::from_slice(&bytes)
        .map_err(|e| RemoteRequestError::Decode(format!("token claims: {}", e)))?;
    Ok(UserId(claims.sub))
}

/// Parses an implicit-flow redirect such as
/// `http://localhost:3000/dashboard#access_token=...&expires_in=3600`.
pub fn parse_redirect(redirect_url: &str) -> Result<StoredSession, RemoteRequestError> {
    let url = Url::parse(redirect_url)
        .map_err(|e| RemoteRequestError::Decode(format!("redirect url: {}", e)))?;
    let fragment = url.fragment().unwrap_or_default();

    let mut access_token = None;
    let mut refresh_token = None;
    let mut expires_in = None;
    let mut error = None;
    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes())
        .chain(url.query_pairs())
    {
        match key.as_ref() {
            "access_token" => access_token = Some(value.into_owned()),
            "refresh_token" => refresh_token = Some(value.into_owned()),
            "expires_in" => expires_in = value.parse::<i64>().ok(),
            "error_description" => error = Some(value.into_owned()),
            "error" if error.is_none() => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(message) = error {
        return Err(RemoteRequestError::Rejected { status: 400, message });
    }
    let access_token = access_token
        .ok_or_else(|| RemoteRequestError::Decode("redirect carries no access_token".to_string()))?;
    let user = jwt_subject(&access_token)?;

    Ok(StoredSession {
        user_id: user.0,
        access_token,
        refresh_token,
        expires_at: expires_in.map(|secs| Utc::now().timestamp() + secs),
    })
}

#[async_trait]
impl AuthService for HostedBackend {
    async fn current_session(&self) -> Result<Session, RemoteRequestError> {
        Ok(self.inner.session())
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        let session = self.inner.session();
        let sub = self.inner.session_listeners.register(Arc::clone(&callback));
        callback(SessionEvent::InitialSession, &session);
        sub
    }

    async fn sign_in_with_provider(
        &self,
        provider: &Provider,
        redirect_to: &str,
    ) -> Result<SignInRedirect, RemoteRequestError> {
        let url = self.authorize_url(provider, redirect_to)?;
        tracing::info!(provider = %provider, "open the authorize url to continue sign-in");
        Ok(SignInRedirect { url: Some(url) })
    }

    /// Revokes the session remotely and always drops it locally, even when
    /// the remote call fails.
    async fn sign_out(&self) -> Result<(), RemoteRequestError> {
        let remote = match self.inner.endpoint("auth/v1/logout") {
            Ok(url) => match self.inner.authed(Method::POST, url) {
                Ok(request) => match request.send().await {
                    Ok(response) => check(response).await.map(|_| ()),
                    Err(e) => Err(e.into()),
                },
                Err(RemoteRequestError::Unauthenticated) => Ok(()),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        *self.inner.lock_session() = None;
        if let Err(e) = self.inner.vault.clear() {
            tracing::warn!(error = %e, "could not clear session vault");
        }
        self.inner.emit_session(SessionEvent::SignedOut);
        remote
    }
}

#[async_trait]
impl BookmarkStore for HostedBackend {
    async fn query(&self, order: QueryOrder) -> Result<Vec<Bookmark>, RemoteRequestError> {
        let mut url = self.inner.bookmarks_url()?;
        let order = match order {
            QueryOrder::NewestFirst => "created_at.desc",
            QueryOrder::OldestFirst => "created_at.asc",
        };
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", order);

        tracing::debug!(%url, "query bookmarks");
        let response = check(self.inner.authed(Method::GET, url)?.send().await?).await?;
        Ok(response.json::<Vec<Bookmark>>().await?)
    }

    async fn insert(&self, record: &NewBookmark) -> Result<(), RemoteRequestError> {
        let url = self.inner.bookmarks_url()?;
        let request = self
            .inner
            .authed(Method::POST, url)?
            .header("Prefer", "return=minimal")
            .json(&[record]);
        check(request.send().await?).await?;
        Ok(())
    }

    async fn delete(&self, id: &BookmarkId) -> Result<u64, RemoteRequestError> {
        let mut url = self.inner.bookmarks_url()?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{}", id.as_str()));
        let request = self
            .inner
            .authed(Method::DELETE, url)?
            .header("Prefer", "return=representation");
        let response = check(request.send().await?).await?;
        let deleted: Vec<serde_json::Value> = response.json().await?;
        Ok(deleted.len() as u64)
    }
}

#[async_trait]
impl ChangeStream for HostedBackend {
    async fn subscribe(
        &self,
        collection: &str,
        on_change: ChangeCallback,
    ) -> Result<Subscription, RemoteRequestError> {
        if collection != BOOKMARKS_COLLECTION {
            return Err(RemoteRequestError::Rejected {
                status: 404,
                message: format!("unknown collection '{}'", collection),
            });
        }

        let baseline = self.inner.fingerprint().await?;
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let mut last = baseline;
            let mut interval = tokio::time::interval(inner.poll_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                match inner.fingerprint().await {
                    Ok(current) if current != last => {
                        last = current;
                        on_change();
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "change poll failed"),
                }
            }
        });

        tracing::debug!(collection, "polling change stream started");
        Ok(Subscription::new(0, move || task.abort()))
    }
}
