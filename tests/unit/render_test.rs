//! Unit tests for the pure view renderer.

use chrono::{TimeZone, Utc};
use rstest::rstest;

use smartmarks::types::bookmark::{Bookmark, BookmarkId, UserId};
use smartmarks::types::session::Provider;
use smartmarks::types::view::{EntryState, Notice, ViewState};
use smartmarks::ui::render::{
    render, render_entry, render_text, sign_in_label, LinkTarget, Rendered, RenderedEntry,
    EMPTY_MESSAGE, ENTRY_LOADING_MESSAGE,
};

fn bookmark(id: &str, title: &str, url: &str) -> Bookmark {
    Bookmark {
        id: BookmarkId(id.to_string()),
        title: title.to_string(),
        url: url.to_string(),
        owner: UserId("u".to_string()),
        created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    }
}

fn view(loading: bool, bookmarks: Vec<Bookmark>) -> ViewState {
    ViewState {
        loading,
        bookmarks,
        ..ViewState::default()
    }
}

/// Loading shows the skeleton whether or not rows are already held.
#[rstest]
#[case(vec![])]
#[case(vec![bookmark("a", "A", "https://a.example/")])]
fn test_loading_renders_skeleton(#[case] rows: Vec<Bookmark>) {
    assert_eq!(render(&view(true, rows)), Rendered::Skeleton);
}

#[test]
fn test_empty_list_renders_message() {
    assert_eq!(
        render(&view(false, vec![])),
        Rendered::Empty(EMPTY_MESSAGE.to_string())
    );
}

/// One row per bookmark, in list order, each opening in a new context.
#[test]
fn test_rows_follow_list_order() {
    let rendered = render(&view(
        false,
        vec![
            bookmark("b", "Newer", "https://b.example/"),
            bookmark("a", "Older", "https://a.example/"),
        ],
    ));

    let Rendered::Rows(rows) = rendered else {
        panic!("expected rows");
    };
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].title, "Newer");
    assert_eq!(rows[0].url, "https://b.example/");
    assert_eq!(rows[0].delete, BookmarkId::from("b"));
    assert_eq!(rows[1].id, BookmarkId::from("a"));
    assert!(rows.iter().all(|r| r.target == LinkTarget::NewContext));
}

#[test]
fn test_render_text_includes_notice_and_rows() {
    let mut state = view(false, vec![bookmark("a", "Rust", "https://www.rust-lang.org/")]);
    state.session_user = Some(UserId("alice".into()));
    state.notice = Some(Notice {
        message: "Remote request failed: timeout".into(),
    });

    let text = render_text(&state);

    assert!(text.starts_with("Bookmarks for alice\n"));
    assert!(text.contains("! Remote request failed: timeout"));
    assert!(text.contains("Rust  https://www.rust-lang.org/  [rm a]"));
}

#[test]
fn test_entry_renders_loading_then_sign_in() {
    let loading = EntryState::default();
    assert_eq!(
        render_entry(&loading, &Provider::google()),
        RenderedEntry::Loading(ENTRY_LOADING_MESSAGE.to_string())
    );

    let ready = EntryState {
        loading: false,
        notice: Some(Notice {
            message: "provider disabled".into(),
        }),
    };
    match render_entry(&ready, &Provider::google()) {
        RenderedEntry::SignIn { label, notice } => {
            assert_eq!(label, "Sign in with Google");
            assert_eq!(notice.as_deref(), Some("provider disabled"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

/// The sign-in action names whichever provider is configured.
#[rstest]
#[case("google", "Sign in with Google")]
#[case("github", "Sign in with GitHub")]
#[case("azure", "Sign in with Azure")]
#[case("linkedin_oidc", "Sign in with LinkedIn")]
fn test_sign_in_label_follows_provider(#[case] provider: &str, #[case] expected: &str) {
    let provider = Provider(provider.to_string());
    assert_eq!(sign_in_label(&provider), expected);

    let ready = EntryState {
        loading: false,
        notice: None,
    };
    assert_eq!(
        render_entry(&ready, &provider),
        RenderedEntry::SignIn {
            label: expected.to_string(),
            notice: None,
        }
    );
}
