//! Pure renderer for the dashboard and entry views.

use std::fmt;

use serde::Serialize;

use crate::types::bookmark::BookmarkId;
use crate::types::session::Provider;
use crate::types::view::{EntryState, ViewState};

pub const EMPTY_MESSAGE: &str = "No bookmarks yet. Add your first one above.";
pub const ENTRY_LOADING_MESSAGE: &str = "Loading...";

/// Where a bookmark link opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTarget {
    /// A new browsing context; the dashboard stays open.
    NewContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub id: BookmarkId,
    pub title: String,
    pub url: String,
    pub target: LinkTarget,
    /// Argument for the delete action of this row.
    pub delete: BookmarkId,
}

/// What the list area of the dashboard shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum Rendered {
    /// Placeholder while a load is pending.
    Skeleton,
    Empty(String),
    Rows(Vec<Row>),
}

/// Renders the list area. Loading wins over any rows already held, so a
/// refetch shows the skeleton until it settles.
pub fn render(view: &ViewState) -> Rendered {
    if view.loading {
        return Rendered::Skeleton;
    }
    if view.bookmarks.is_empty() {
        return Rendered::Empty(EMPTY_MESSAGE.to_string());
    }
    Rendered::Rows(
        view.bookmarks
            .iter()
            .map(|b| Row {
                id: b.id.clone(),
                title: b.title.clone(),
                url: b.url.clone(),
                target: LinkTarget::NewContext,
                delete: b.id.clone(),
            })
            .collect(),
    )
}

/// What the entry screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum RenderedEntry {
    Loading(String),
    SignIn { label: String, notice: Option<String> },
}

pub fn sign_in_label(provider: &Provider) -> String {
    format!("Sign in with {}", provider.display_name())
}

/// Renders the entry screen for the configured sign-in `provider`.
pub fn render_entry(state: &EntryState, provider: &Provider) -> RenderedEntry {
    if state.loading {
        RenderedEntry::Loading(ENTRY_LOADING_MESSAGE.to_string())
    } else {
        RenderedEntry::SignIn {
            label: sign_in_label(provider),
            notice: state.notice.as_ref().map(|n| n.message.clone()),
        }
    }
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rendered::Skeleton => {
                for _ in 0..3 {
                    writeln!(f, "  ░░░░░░░░░░░░░░░░  ░░░░░░░░░░░░░░░░░░░░░░░░")?;
                }
                Ok(())
            }
            Rendered::Empty(message) => writeln!(f, "  {}", message),
            Rendered::Rows(rows) => {
                let width = rows.iter().map(|r| r.title.chars().count()).max().unwrap_or(0);
                for row in rows {
                    writeln!(
                        f,
                        "  {:<width$}  {}  [rm {}]",
                        row.title,
                        row.url,
                        row.delete,
                        width = width
                    )?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for RenderedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderedEntry::Loading(message) => writeln!(f, "{}", message),
            RenderedEntry::SignIn { label, notice } => {
                writeln!(f, "[{}]", label)?;
                if let Some(notice) = notice {
                    writeln!(f, "! {}", notice)?;
                }
                Ok(())
            }
        }
    }
}

/// Full dashboard text: header, form error, notice and the list area.
pub fn render_text(view: &ViewState) -> String {
    let mut out = String::new();
    if let Some(user) = &view.session_user {
        out.push_str(&format!("Bookmarks for {}\n", user));
    }
    if let Some(error) = &view.form.error {
        out.push_str(&format!("! {}\n", error));
    }
    if let Some(notice) = &view.notice {
        out.push_str(&format!("! {}\n", notice.message));
    }
    out.push_str(&render(view).to_string());
    out
}
