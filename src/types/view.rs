use serde::Serialize;

use super::bookmark::{Bookmark, UserId};

/// Navigation targets of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Route {
    /// Unauthenticated entry screen with the sign-in action.
    Entry,
    /// Authenticated bookmark list.
    Dashboard,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Entry => "/",
            Route::Dashboard => "/dashboard",
        }
    }
}

/// The add-bookmark form inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormFields {
    pub title: String,
    pub url: String,
    /// Inline message for the last rejected submission.
    pub error: Option<String>,
}

impl FormFields {
    pub fn clear(&mut self) {
        self.title.clear();
        self.url.clear();
        self.error = None;
    }
}

/// A non-blocking message shown to the user after a failed remote request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: String,
}

/// Snapshot of the dashboard's state, owned by the synchronizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewState {
    pub session_user: Option<UserId>,
    /// Newest first.
    pub bookmarks: Vec<Bookmark>,
    pub loading: bool,
    pub form: FormFields,
    pub notice: Option<Notice>,
}

/// State of the entry (sign-in) screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryState {
    /// True until the first session notification arrives.
    pub loading: bool,
    pub notice: Option<Notice>,
}

impl Default for EntryState {
    fn default() -> Self {
        Self {
            loading: true,
            notice: None,
        }
    }
}
