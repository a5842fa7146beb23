//! Session guard for the unauthenticated entry screen.
//!
//! While mounted it listens for session changes: a present session sends the
//! host to the dashboard, an absent one clears the loading indicator so the
//! sign-in action can be shown.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use crate::services::auth::AuthService;
use crate::services::change_stream::Subscription;
use crate::services::navigation::Navigator;
use crate::types::errors::RemoteRequestError;
use crate::types::session::{Session, SessionEvent, SignInRedirect};
use crate::types::settings::AuthSettings;
use crate::types::view::{EntryState, Notice, Route};

struct EntrySlot {
    view: EntryState,
    mounted: bool,
}

struct EntryInner {
    auth: Arc<dyn AuthService>,
    navigator: Arc<dyn Navigator>,
    settings: AuthSettings,
    state: Mutex<EntrySlot>,
    subscription: Mutex<Option<Subscription>>,
    updates: watch::Sender<EntryState>,
}

#[derive(Clone)]
pub struct EntryGuard {
    inner: Arc<EntryInner>,
}

impl EntryGuard {
    pub fn new(
        auth: Arc<dyn AuthService>,
        navigator: Arc<dyn Navigator>,
        settings: AuthSettings,
    ) -> Self {
        let (updates, _) = watch::channel(EntryState::default());
        Self {
            inner: Arc::new(EntryInner {
                auth,
                navigator,
                settings,
                state: Mutex::new(EntrySlot {
                    view: EntryState::default(),
                    mounted: false,
                }),
                subscription: Mutex::new(None),
                updates,
            }),
        }
    }

    /// Starts listening for session changes. Calling it twice is a no-op.
    pub fn mount(&self) {
        {
            let mut st = self.inner.lock_state();
            if st.mounted {
                return;
            }
            st.view = EntryState::default();
            st.mounted = true;
            self.inner.updates.send_replace(st.view.clone());
        }

        let weak = Arc::downgrade(&self.inner);
        let sub = self.inner.auth.on_session_change(Arc::new(move |event, session| {
            if let Some(inner) = weak.upgrade() {
                inner.on_session_change(event, session);
            }
        }));

        if self.inner.lock_state().mounted {
            *self.inner.lock_subscription() = Some(sub);
        } else {
            sub.unsubscribe();
        }
    }

    /// Stops listening. No navigation happens after this returns.
    pub fn unmount(&self) {
        self.inner.lock_state().mounted = false;
        let sub = self.inner.lock_subscription().take();
        if let Some(sub) = sub {
            sub.unsubscribe();
        }
    }

    /// Starts sign-in with the configured provider and redirect target.
    pub async fn sign_in(&self) -> Result<SignInRedirect, RemoteRequestError> {
        let provider = &self.inner.settings.provider;
        tracing::info!(provider = %provider, "starting sign-in");
        let result = self
            .inner
            .auth
            .sign_in_with_provider(provider, &self.inner.settings.redirect_to)
            .await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "sign-in failed");
            let mut st = self.inner.lock_state();
            st.view.notice = Some(Notice {
                message: e.to_string(),
            });
            self.inner.updates.send_replace(st.view.clone());
        }
        result
    }

    pub fn state(&self) -> EntryState {
        self.inner.lock_state().view.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.lock_state().mounted
    }

    pub fn watch(&self) -> watch::Receiver<EntryState> {
        self.inner.updates.subscribe()
    }
}

impl EntryInner {
    fn lock_state(&self) -> MutexGuard<'_, EntrySlot> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_subscription(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn on_session_change(&self, event: SessionEvent, session: &Session) {
        let mut st = self.lock_state();
        if !st.mounted {
            return;
        }
        if session.is_present() {
            drop(st);
            tracing::info!(?event, "session present, entering dashboard");
            self.navigator.navigate_to(Route::Dashboard);
        } else {
            st.view.loading = false;
            self.updates.send_replace(st.view.clone());
        }
    }
}
