//! Bookmark synchronizer for the authenticated dashboard.
//!
//! Owns the dashboard's [`ViewState`]: guards the view behind a session,
//! loads the bookmark list, keeps it fresh from the change stream and issues
//! create/remove requests. Every change to the state is published on a
//! `tokio::sync::watch` channel for the renderer.
//!
//! Refetches are never cancelled and may overlap. With
//! [`RefetchOrdering::LastIssuedWins`] each one is tagged with a sequence
//! number and a response older than the newest applied one is dropped; with
//! [`RefetchOrdering::LastResolvedWins`] whichever response arrives last is
//! what stays on screen.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::watch;

use crate::services::auth::AuthService;
use crate::services::change_stream::{ChangeStream, Subscription};
use crate::services::navigation::Navigator;
use crate::services::store::{BookmarkStore, QueryOrder};
use crate::services::url_validator;
use crate::types::bookmark::{Bookmark, BookmarkId, NewBookmark, BOOKMARKS_COLLECTION};
use crate::types::errors::{RemoteRequestError, SyncError};
use crate::types::session::{Session, SessionEvent};
use crate::types::settings::{DeletePolicy, RefetchOrdering, SyncSettings};
use crate::types::view::{Notice, Route, ViewState};

/// External collaborators of the views, constructed by the host and injected.
#[derive(Clone)]
pub struct SyncServices {
    pub auth: Arc<dyn AuthService>,
    pub store: Arc<dyn BookmarkStore>,
    pub changes: Arc<dyn ChangeStream>,
    pub navigator: Arc<dyn Navigator>,
}

/// Result of mounting the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    /// A session was present; the list is loaded and live.
    Ready,
    /// No session; the host was sent to the entry view and nothing was fetched.
    Redirected,
}

struct SyncState {
    view: ViewState,
    mounted: bool,
    /// Bumped on every mount, teardown and user switch so late responses
    /// from an earlier one are ignored.
    generation: u64,
    in_flight: usize,
    applied_seq: u64,
}

struct SyncInner {
    services: SyncServices,
    settings: SyncSettings,
    state: Mutex<SyncState>,
    subscriptions: Mutex<Vec<Subscription>>,
    issued: AtomicU64,
    updates: watch::Sender<ViewState>,
}

/// The dashboard's state machine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct BookmarkSynchronizer {
    inner: Arc<SyncInner>,
}

impl BookmarkSynchronizer {
    pub fn new(services: SyncServices, settings: SyncSettings) -> Self {
        let (updates, _) = watch::channel(ViewState::default());
        Self {
            inner: Arc::new(SyncInner {
                services,
                settings,
                state: Mutex::new(SyncState {
                    view: ViewState::default(),
                    mounted: false,
                    generation: 0,
                    in_flight: 0,
                    applied_seq: 0,
                }),
                subscriptions: Mutex::new(Vec::new()),
                issued: AtomicU64::new(0),
                updates,
            }),
        }
    }

    /// Activates the view: resolves the session, loads the list and opens
    /// the session and change listeners.
    ///
    /// Without a session the host is navigated to [`Route::Entry`] and no
    /// bookmark query is issued. A failed initial load is recorded as a
    /// notice; the change stream is still opened so the next notification
    /// can recover the list. A failed change-stream subscription is recorded
    /// the same way and the view stays mounted.
    pub async fn mount(&self) -> Result<MountOutcome, SyncError> {
        let inner = &self.inner;
        if inner.lock_state().mounted {
            return Ok(MountOutcome::Ready);
        }

        let session = match inner.services.auth.current_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "could not resolve session, treating as signed out");
                Session::Absent
            }
        };

        let user = match session.user() {
            Some(user) => user.clone(),
            None => {
                tracing::info!("no session, redirecting to entry view");
                inner.services.navigator.navigate_to(Route::Entry);
                return Ok(MountOutcome::Redirected);
            }
        };

        {
            let mut st = inner.lock_state();
            st.mounted = true;
            st.generation += 1;
            st.view = ViewState {
                session_user: Some(user.clone()),
                ..ViewState::default()
            };
            inner.publish(&st);
        }
        tracing::info!(user = %user, "dashboard mounted");

        let weak = Arc::downgrade(inner);
        let session_sub = inner
            .services
            .auth
            .on_session_change(Arc::new(move |event, session| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_session_change(event, session);
                }
            }));
        if !inner.keep_subscription(session_sub) {
            // The session ended during the initial notification.
            return Ok(MountOutcome::Redirected);
        }

        if let Err(e) = inner.load().await {
            tracing::warn!(error = %e, "initial load failed");
        }

        let weak = Arc::downgrade(inner);
        let subscribed = inner
            .services
            .changes
            .subscribe(
                BOOKMARKS_COLLECTION,
                Arc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        SyncInner::on_change(&inner);
                    }
                }),
            )
            .await;

        match subscribed {
            Ok(sub) => {
                inner.keep_subscription(sub);
            }
            Err(e) => {
                // The list stays usable through explicit refetches.
                tracing::warn!(error = %e, "change stream subscription failed");
                inner.record_failure(&e);
            }
        }
        Ok(MountOutcome::Ready)
    }

    /// Deactivates the view and releases both listeners. Responses that
    /// arrive afterwards are discarded.
    pub fn unmount(&self) {
        if self.inner.teardown() {
            tracing::info!("dashboard unmounted");
        }
    }

    /// Fetches the whole list, newest first, and replaces the displayed list
    /// once the response is in.
    pub async fn load(&self) -> Result<Vec<Bookmark>, SyncError> {
        self.inner.load().await
    }

    /// Validates and submits a new bookmark. The list itself is refreshed by
    /// the change notification (and by a local refetch when configured).
    pub async fn create(&self, title: &str, url: &str) -> Result<(), SyncError> {
        let inner = &self.inner;
        let (title, url) = match url_validator::validate_new_bookmark(title, url) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::debug!(field = %e.field(), error = %e, "rejected bookmark input");
                let mut st = inner.lock_state();
                st.view.form.error = Some(e.to_string());
                inner.publish(&st);
                return Err(e.into());
            }
        };

        let owner = {
            let st = inner.lock_state();
            if !st.mounted {
                return Err(SyncError::NotMounted);
            }
            st.view.session_user.clone().ok_or(SyncError::AuthRequired)?
        };

        let record = NewBookmark { title, url, owner };
        tracing::debug!(url = %record.url, "inserting bookmark");
        if let Err(e) = inner.services.store.insert(&record).await {
            tracing::warn!(error = %e, "insert failed");
            inner.record_failure(&e);
            return Err(e.into());
        }

        {
            let mut st = inner.lock_state();
            st.view.form.clear();
            inner.publish(&st);
        }

        inner.refetch_after_mutation().await;
        Ok(())
    }

    /// Submits the current form fields through [`create`](Self::create).
    pub async fn submit_form(&self) -> Result<(), SyncError> {
        let form = self.inner.lock_state().view.form.clone();
        self.create(&form.title, &form.url).await
    }

    /// Deletes a bookmark. Deleting an id that matches nothing follows the
    /// configured [`DeletePolicy`].
    pub async fn remove(&self, id: &BookmarkId) -> Result<(), SyncError> {
        let inner = &self.inner;
        if !inner.lock_state().mounted {
            return Err(SyncError::NotMounted);
        }

        let removed = match inner.services.store.delete(id).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "delete failed");
                inner.record_failure(&e);
                return Err(e.into());
            }
        };

        if removed == 0 {
            match inner.settings.delete_policy {
                DeletePolicy::IgnoreMissing => {
                    tracing::debug!(id = %id, "delete matched no row");
                }
                DeletePolicy::ReportMissing => {
                    let e = RemoteRequestError::NotFound(id.to_string());
                    inner.record_failure(&e);
                    return Err(e.into());
                }
            }
        }

        inner.refetch_after_mutation().await;
        Ok(())
    }

    /// Tears the view down, signs out and returns to the entry view.
    pub async fn logout(&self) -> Result<(), SyncError> {
        let inner = &self.inner;
        inner.teardown();
        let result = inner.services.auth.sign_out().await;
        {
            let mut st = inner.lock_state();
            st.view = ViewState::default();
            inner.publish(&st);
        }
        inner.services.navigator.navigate_to(Route::Entry);
        match result {
            Ok(()) => {
                tracing::info!("signed out");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "sign out failed");
                Err(e.into())
            }
        }
    }

    pub fn set_title(&self, title: &str) {
        let mut st = self.inner.lock_state();
        st.view.form.title = title.to_string();
        self.inner.publish(&st);
    }

    pub fn set_url(&self, url: &str) {
        let mut st = self.inner.lock_state();
        st.view.form.url = url.to_string();
        self.inner.publish(&st);
    }

    pub fn dismiss_notice(&self) {
        let mut st = self.inner.lock_state();
        st.view.notice = None;
        self.inner.publish(&st);
    }

    /// Snapshot of the current view state.
    pub fn view(&self) -> ViewState {
        self.inner.lock_state().view.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.lock_state().mounted
    }

    /// Receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.inner.updates.subscribe()
    }

    /// Number of listeners currently held by the view.
    pub fn active_subscriptions(&self) -> usize {
        self.inner.lock_subscriptions().len()
    }
}

impl SyncInner {
    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_subscriptions(&self) -> MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, st: &SyncState) {
        self.updates.send_replace(st.view.clone());
    }

    /// Stores a listener handle if the view is still mounted, otherwise
    /// releases it immediately. Returns whether it was kept.
    fn keep_subscription(&self, sub: Subscription) -> bool {
        if self.lock_state().mounted {
            self.lock_subscriptions().push(sub);
            true
        } else {
            sub.unsubscribe();
            false
        }
    }

    /// Returns true if the view was mounted.
    fn teardown(&self) -> bool {
        let was_mounted = {
            let mut st = self.lock_state();
            let was_mounted = st.mounted;
            st.mounted = false;
            st.generation += 1;
            st.in_flight = 0;
            st.view.loading = false;
            self.publish(&st);
            was_mounted
        };
        let released: Vec<Subscription> = self.lock_subscriptions().drain(..).collect();
        for sub in released {
            sub.unsubscribe();
        }
        was_mounted
    }

    fn record_failure(&self, error: &RemoteRequestError) {
        let mut st = self.lock_state();
        if st.mounted {
            st.view.notice = Some(Notice {
                message: error.to_string(),
            });
            self.publish(&st);
        }
    }

    async fn load(&self) -> Result<Vec<Bookmark>, SyncError> {
        let (seq, generation) = {
            let mut st = self.lock_state();
            if !st.mounted {
                return Err(SyncError::NotMounted);
            }
            st.in_flight += 1;
            st.view.loading = true;
            self.publish(&st);
            (self.issued.fetch_add(1, Ordering::SeqCst) + 1, st.generation)
        };
        tracing::debug!(seq, "fetching bookmarks");

        let result = self.services.store.query(QueryOrder::NewestFirst).await;

        let mut st = self.lock_state();
        let current = st.mounted && st.generation == generation;
        if current {
            st.in_flight = st.in_flight.saturating_sub(1);
            st.view.loading = st.in_flight > 0;
        }

        match result {
            Ok(rows) => {
                let rows = displayable(rows);
                if current {
                    self.apply(&mut st, seq, &rows);
                }
                self.publish(&st);
                Ok(rows)
            }
            Err(e) => {
                tracing::warn!(seq, error = %e, "bookmark fetch failed");
                if current {
                    st.view.notice = Some(Notice {
                        message: e.to_string(),
                    });
                }
                self.publish(&st);
                Err(e.into())
            }
        }
    }

    fn apply(&self, st: &mut SyncState, seq: u64, rows: &[Bookmark]) {
        match self.settings.ordering {
            RefetchOrdering::LastIssuedWins if seq < st.applied_seq => {
                tracing::debug!(seq, applied = st.applied_seq, "discarding stale fetch result");
            }
            _ => {
                st.view.bookmarks = rows.to_vec();
                st.applied_seq = st.applied_seq.max(seq);
            }
        }
    }

    async fn refetch_after_mutation(&self) {
        if self.settings.refetch_after_mutation {
            // Failures are already recorded as a notice.
            let _ = self.load().await;
        }
    }

    fn on_change(inner: &Arc<SyncInner>) {
        if !inner.lock_state().mounted {
            return;
        }
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("change notification outside a runtime, ignoring");
                return;
            }
        };
        tracing::debug!("change notification, refetching");
        let weak: Weak<SyncInner> = Arc::downgrade(inner);
        handle.spawn(async move {
            if let Some(inner) = weak.upgrade() {
                let _ = inner.load().await;
            }
        });
    }

    fn on_session_change(self: &Arc<Self>, event: SessionEvent, session: &Session) {
        let user = {
            let st = self.lock_state();
            if !st.mounted {
                return;
            }
            st.view.session_user.clone()
        };

        match session.user() {
            None => {
                tracing::info!(?event, "session ended, leaving dashboard");
                self.teardown();
                {
                    let mut st = self.lock_state();
                    st.view = ViewState::default();
                    self.publish(&st);
                }
                self.services.navigator.navigate_to(Route::Entry);
            }
            Some(next) if user.as_ref() != Some(next) => {
                tracing::info!(?event, user = %next, "session user changed, reloading");
                {
                    // Fetches issued for the previous user must not land.
                    let mut st = self.lock_state();
                    st.generation += 1;
                    st.in_flight = 0;
                    st.view.loading = false;
                    st.view.session_user = Some(next.clone());
                    st.view.bookmarks.clear();
                    self.publish(&st);
                }
                SyncInner::on_change(self);
            }
            Some(_) => {}
        }
    }
}

/// Drops rows whose URL could not be shown as a link.
fn displayable(rows: Vec<Bookmark>) -> Vec<Bookmark> {
    rows.into_iter()
        .filter(|b| {
            let ok = url_validator::is_displayable(&b.url);
            if !ok {
                tracing::warn!(id = %b.id, url = %b.url, "hiding bookmark with invalid url");
            }
            ok
        })
        .collect()
}
