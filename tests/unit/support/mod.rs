//! In-process fakes for the services the views depend on.
//!
//! `FakeBackend` implements auth, store and change stream in memory, counts
//! every call and can be told to fail or to hold a query until released.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{oneshot, watch};

use smartmarks::managers::bookmark_sync::{BookmarkSynchronizer, SyncServices};
use smartmarks::services::auth::{AuthService, SessionCallback};
use smartmarks::services::change_stream::{
    ChangeCallback, ChangeStream, SubscriberRegistry, Subscription,
};
use smartmarks::services::navigation::HistoryNavigator;
use smartmarks::services::store::{BookmarkStore, QueryOrder};
use smartmarks::types::bookmark::{Bookmark, BookmarkId, NewBookmark, UserId};
use smartmarks::types::errors::RemoteRequestError;
use smartmarks::types::session::{Provider, Session, SessionEvent, SignInRedirect};
use smartmarks::types::settings::SyncSettings;
use smartmarks::types::view::ViewState;

type SessionListener = dyn Fn(SessionEvent, &Session) + Send + Sync;
type ChangeListener = dyn Fn() + Send + Sync;

pub const USER: &str = "user-1";

#[derive(Default)]
struct FakeState {
    session: Session,
    rows: Vec<Bookmark>,
    next_id: u64,
    inserted: Vec<NewBookmark>,
    gates: VecDeque<oneshot::Receiver<()>>,
    fail_session: bool,
    fail_query: bool,
    fail_insert: bool,
    fail_delete: bool,
    fail_subscribe: bool,
    sign_in_redirect: Option<String>,
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
    session_listeners: SubscriberRegistry<SessionListener>,
    change_listeners: SubscriberRegistry<ChangeListener>,
    pub session_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub subscribe_calls: AtomicUsize,
    pub sign_in_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
}

pub fn bookmark(id: &str, title: &str, url: &str, owner: &str, secs: i64) -> Bookmark {
    Bookmark {
        id: BookmarkId(id.to_string()),
        title: title.to_string(),
        url: url.to_string(),
        owner: UserId(owner.to_string()),
        created_at: ts(secs),
    }
}

impl FakeBackend {
    pub fn signed_in() -> Arc<Self> {
        let fake = Self::default();
        fake.state.lock().unwrap().session = Session::present(USER, "token-1");
        Arc::new(fake)
    }

    pub fn signed_out() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adds rows directly, without notifying anyone.
    pub fn seed(&self, rows: Vec<Bookmark>) {
        self.state.lock().unwrap().rows.extend(rows);
    }

    pub fn inserted(&self) -> Vec<NewBookmark> {
        self.state.lock().unwrap().inserted.clone()
    }

    pub fn row_count(&self) -> usize {
        self.state.lock().unwrap().rows.len()
    }

    pub fn fail_session(&self, fail: bool) {
        self.state.lock().unwrap().fail_session = fail;
    }

    pub fn fail_query(&self, fail: bool) {
        self.state.lock().unwrap().fail_query = fail;
    }

    pub fn fail_insert(&self, fail: bool) {
        self.state.lock().unwrap().fail_insert = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.state.lock().unwrap().fail_delete = fail;
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.state.lock().unwrap().fail_subscribe = fail;
    }

    pub fn redirect_sign_in_to(&self, url: &str) {
        self.state.lock().unwrap().sign_in_redirect = Some(url.to_string());
    }

    /// The next query snapshots its result immediately but only returns
    /// once the returned sender fires (or is dropped).
    pub fn gate_next_query(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().unwrap().gates.push_back(rx);
        tx
    }

    /// Replaces the session and notifies session listeners.
    pub fn set_session(&self, session: Session) {
        let event = if session.is_present() {
            SessionEvent::SignedIn
        } else {
            SessionEvent::SignedOut
        };
        self.state.lock().unwrap().session = session.clone();
        for listener in self.session_listeners.snapshot() {
            listener(event, &session);
        }
    }

    /// Fires every change listener, as a remote write by another client would.
    pub fn notify_change(&self) {
        for listener in self.change_listeners.snapshot() {
            listener();
        }
    }

    pub fn session_listener_count(&self) -> usize {
        self.session_listeners.len()
    }

    pub fn change_listener_count(&self) -> usize {
        self.change_listeners.len()
    }

    pub fn queries(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn inserts(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    fn current_user(&self) -> Result<UserId, RemoteRequestError> {
        self.state
            .lock()
            .unwrap()
            .session
            .user()
            .cloned()
            .ok_or(RemoteRequestError::Unauthenticated)
    }
}

#[async_trait]
impl AuthService for FakeBackend {
    async fn current_session(&self) -> Result<Session, RemoteRequestError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        let st = self.state.lock().unwrap();
        if st.fail_session {
            return Err(RemoteRequestError::Transport("session lookup failed".into()));
        }
        Ok(st.session.clone())
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        let sub = self.session_listeners.register(Arc::clone(&callback));
        let session = self.state.lock().unwrap().session.clone();
        callback(SessionEvent::InitialSession, &session);
        sub
    }

    async fn sign_in_with_provider(
        &self,
        provider: &Provider,
        _redirect_to: &str,
    ) -> Result<SignInRedirect, RemoteRequestError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let redirect = self.state.lock().unwrap().sign_in_redirect.clone();
        match redirect {
            Some(url) if url == "fail" => Err(RemoteRequestError::Rejected {
                status: 400,
                message: format!("provider {} is not enabled", provider),
            }),
            Some(url) => Ok(SignInRedirect { url: Some(url) }),
            None => {
                self.set_session(Session::present(USER, "token-1"));
                Ok(SignInRedirect { url: None })
            }
        }
    }

    async fn sign_out(&self) -> Result<(), RemoteRequestError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.set_session(Session::Absent);
        Ok(())
    }
}

#[async_trait]
impl BookmarkStore for FakeBackend {
    async fn query(&self, order: QueryOrder) -> Result<Vec<Bookmark>, RemoteRequestError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let user = self.current_user()?;
        let (result, gate) = {
            let mut st = self.state.lock().unwrap();
            let gate = st.gates.pop_front();
            let result = if st.fail_query {
                Err(RemoteRequestError::Transport("connection reset".into()))
            } else {
                let mut rows: Vec<Bookmark> =
                    st.rows.iter().filter(|b| b.owner == user).cloned().collect();
                // Stable sort keeps insertion order for equal timestamps.
                match order {
                    QueryOrder::NewestFirst => rows.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
                    QueryOrder::OldestFirst => rows.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
                }
                Ok(rows)
            };
            (result, gate)
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result
    }

    async fn insert(&self, record: &NewBookmark) -> Result<(), RemoteRequestError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let user = self.current_user()?;
        {
            let mut st = self.state.lock().unwrap();
            if st.fail_insert {
                return Err(RemoteRequestError::Rejected {
                    status: 500,
                    message: "insert failed".into(),
                });
            }
            st.next_id += 1;
            let id = format!("bm-{}", st.next_id);
            let secs = 1_000 + st.next_id as i64;
            st.rows.push(Bookmark {
                id: BookmarkId(id),
                title: record.title.clone(),
                url: record.url.clone(),
                owner: user,
                created_at: ts(secs),
            });
            st.inserted.push(record.clone());
        }
        self.notify_change();
        Ok(())
    }

    async fn delete(&self, id: &BookmarkId) -> Result<u64, RemoteRequestError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let user = self.current_user()?;
        let removed = {
            let mut st = self.state.lock().unwrap();
            if st.fail_delete {
                return Err(RemoteRequestError::Transport("timeout".into()));
            }
            let before = st.rows.len();
            st.rows.retain(|b| !(b.id == *id && b.owner == user));
            (before - st.rows.len()) as u64
        };
        if removed > 0 {
            self.notify_change();
        }
        Ok(removed)
    }
}

#[async_trait]
impl ChangeStream for FakeBackend {
    async fn subscribe(
        &self,
        _collection: &str,
        on_change: ChangeCallback,
    ) -> Result<Subscription, RemoteRequestError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.lock().unwrap().fail_subscribe {
            return Err(RemoteRequestError::Transport("channel closed".into()));
        }
        Ok(self.change_listeners.register(on_change))
    }
}

pub fn services(fake: &Arc<FakeBackend>, navigator: &Arc<HistoryNavigator>) -> SyncServices {
    SyncServices {
        auth: fake.clone(),
        store: fake.clone(),
        changes: fake.clone(),
        navigator: navigator.clone(),
    }
}

pub fn synchronizer(
    fake: &Arc<FakeBackend>,
    settings: SyncSettings,
) -> (BookmarkSynchronizer, Arc<HistoryNavigator>) {
    let navigator = Arc::new(HistoryNavigator::new());
    let sync = BookmarkSynchronizer::new(services(fake, &navigator), settings);
    (sync, navigator)
}

/// Waits until the published view satisfies `done`.
pub async fn wait_for_view(
    rx: &mut watch::Receiver<ViewState>,
    done: impl FnMut(&ViewState) -> bool,
) -> ViewState {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(done))
        .await
        .expect("view did not reach the expected state")
        .expect("view channel closed")
        .clone()
}

/// Lets spawned refetch tasks run to completion.
pub async fn drain() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
