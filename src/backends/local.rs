//! Single-device backend over SQLite.
//!
//! Implements the auth, store and change-stream contracts in one process.
//! Reads and deletes are scoped to the signed-in user in SQL, the same
//! guarantee a hosted backend gives through row-level security. Every write
//! notifies all change listeners, with no per-user filtering.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::services::auth::{AuthService, SessionCallback};
use crate::services::change_stream::{ChangeCallback, ChangeStream, SubscriberRegistry, Subscription};
use crate::services::store::{BookmarkStore, QueryOrder};
use crate::types::bookmark::{Bookmark, BookmarkId, NewBookmark, UserId, BOOKMARKS_COLLECTION};
use crate::types::errors::{BackendError, RemoteRequestError};
use crate::types::session::{AccessToken, Provider, Session, SessionEvent, SignInRedirect};

type SessionListener = dyn Fn(SessionEvent, &Session) + Send + Sync;
type ChangeListener = dyn Fn() + Send + Sync;

pub struct LocalBackend {
    db: Arc<Database>,
    session: Mutex<Session>,
    session_listeners: SubscriberRegistry<SessionListener>,
    change_listeners: SubscriberRegistry<ChangeListener>,
}

impl LocalBackend {
    /// Creates the backend and restores the session saved by a previous run.
    pub fn new(db: Arc<Database>) -> Result<Self, BackendError> {
        let session = Self::restore_session(&db)?;
        if let Some(user) = session.user() {
            tracing::info!(user = %user, "restored local session");
        }
        Ok(Self {
            db,
            session: Mutex::new(session),
            session_listeners: SubscriberRegistry::new(),
            change_listeners: SubscriberRegistry::new(),
        })
    }

    pub fn open_in_memory() -> Result<Self, BackendError> {
        Self::new(Arc::new(Database::open_in_memory()?))
    }

    fn restore_session(db: &Database) -> Result<Session, rusqlite::Error> {
        let row: Option<(String, String)> = db
            .connection()
            .query_row(
                "SELECT user_id, token FROM local_session WHERE id = 'current'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(match row {
            Some((user, token)) => Session::present(user, token),
            None => Session::Absent,
        })
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current_user(&self) -> Result<UserId, RemoteRequestError> {
        self.lock_session()
            .user()
            .cloned()
            .ok_or(RemoteRequestError::Unauthenticated)
    }

    /// Signs in as a specific user id, creating the user on first use.
    pub fn sign_in_as(&self, user: &UserId, provider: &Provider) -> Result<(), RemoteRequestError> {
        let token = AccessToken::new(Uuid::new_v4().to_string());
        {
            let conn = self.db.connection();
            conn.execute(
                "INSERT OR IGNORE INTO users (id, provider, created_at) VALUES (?1, ?2, ?3)",
                params![user.as_str(), provider.as_str(), Utc::now().timestamp()],
            )?;
            conn.execute(
                "INSERT OR REPLACE INTO local_session (id, user_id, token) VALUES ('current', ?1, ?2)",
                params![user.as_str(), token.expose()],
            )?;
        }
        *self.lock_session() = Session::Present {
            user: user.clone(),
            token,
        };
        tracing::info!(user = %user, provider = %provider, "local sign-in");
        self.emit_session(SessionEvent::SignedIn);
        Ok(())
    }

    fn emit_session(&self, event: SessionEvent) {
        let session = self.lock_session().clone();
        for listener in self.session_listeners.snapshot() {
            listener(event, &session);
        }
    }

    fn emit_change(&self) {
        let listeners = self.change_listeners.snapshot();
        tracing::debug!(listeners = listeners.len(), "broadcasting bookmark change");
        for listener in listeners {
            listener();
        }
    }

    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        let micros: i64 = row.get(4)?;
        let created_at = DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or_default();
        Ok(Bookmark {
            id: BookmarkId(row.get(0)?),
            title: row.get(1)?,
            url: row.get(2)?,
            owner: UserId(row.get(3)?),
            created_at,
        })
    }
}

#[async_trait]
impl AuthService for LocalBackend {
    async fn current_session(&self) -> Result<Session, RemoteRequestError> {
        Ok(self.lock_session().clone())
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        let sub = self.session_listeners.register(Arc::clone(&callback));
        let session = self.lock_session().clone();
        callback(SessionEvent::InitialSession, &session);
        sub
    }

    /// Completes immediately: the device-local identity for `provider` is
    /// signed in and no redirect is needed.
    async fn sign_in_with_provider(
        &self,
        provider: &Provider,
        redirect_to: &str,
    ) -> Result<SignInRedirect, RemoteRequestError> {
        tracing::debug!(redirect_to, "local sign-in needs no redirect");
        let user = UserId(format!("local-{}", provider.as_str()));
        self.sign_in_as(&user, provider)?;
        Ok(SignInRedirect { url: None })
    }

    async fn sign_out(&self) -> Result<(), RemoteRequestError> {
        self.db
            .connection()
            .execute("DELETE FROM local_session", [])?;
        *self.lock_session() = Session::Absent;
        tracing::info!("local sign-out");
        self.emit_session(SessionEvent::SignedOut);
        Ok(())
    }
}

#[async_trait]
impl BookmarkStore for LocalBackend {
    async fn query(&self, order: QueryOrder) -> Result<Vec<Bookmark>, RemoteRequestError> {
        let user = self.current_user()?;
        let sql = match order {
            QueryOrder::NewestFirst => {
                "SELECT id, title, url, user_id, created_at FROM bookmarks \
                 WHERE user_id = ?1 ORDER BY created_at DESC, seq ASC"
            }
            QueryOrder::OldestFirst => {
                "SELECT id, title, url, user_id, created_at FROM bookmarks \
                 WHERE user_id = ?1 ORDER BY created_at ASC, seq ASC"
            }
        };

        let conn = self.db.connection();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![user.as_str()], Self::row_to_bookmark)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    async fn insert(&self, record: &NewBookmark) -> Result<(), RemoteRequestError> {
        let user = self.current_user()?;
        if record.owner != user {
            return Err(RemoteRequestError::Rejected {
                status: 403,
                message: format!("cannot insert a bookmark owned by {}", record.owner),
            });
        }

        let id = Uuid::new_v4().to_string();
        self.db.connection().execute(
            "INSERT INTO bookmarks (id, user_id, title, url, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, user.as_str(), record.title, record.url, Utc::now().timestamp_micros()],
        )?;
        tracing::debug!(collection = BOOKMARKS_COLLECTION, id = %id, "inserted");
        self.emit_change();
        Ok(())
    }

    async fn delete(&self, id: &BookmarkId) -> Result<u64, RemoteRequestError> {
        let user = self.current_user()?;
        let affected = self.db.connection().execute(
            "DELETE FROM bookmarks WHERE id = ?1 AND user_id = ?2",
            params![id.as_str(), user.as_str()],
        )?;
        if affected > 0 {
            self.emit_change();
        }
        Ok(affected as u64)
    }
}

#[async_trait]
impl ChangeStream for LocalBackend {
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
        Ok(self.change_listeners.register(on_change))
    }
}
