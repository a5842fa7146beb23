//! Property-based tests for bookmark creation.
//!
//! A valid `(title, url)` produces exactly one insert carrying the
//! canonical URL and clears the form; an invalid one produces no request
//! at all.

#[path = "../unit/support/mod.rs"]
mod support;

use proptest::prelude::*;
use smartmarks::services::url_validator::normalize_url;
use smartmarks::types::errors::{SyncError, ValidationError};
use smartmarks::types::settings::SyncSettings;

use support::{synchronizer, FakeBackend};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn arb_url() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("https"), Just("http"), Just("HTTPS")],
        "[a-z][a-z0-9]{2,15}",
        prop_oneof![Just(".com"), Just(".org"), Just(".dev")],
        proptest::option::of("/[a-zA-Z0-9_-]{1,10}"),
    )
        .prop_map(|(scheme, host, tld, path)| {
            format!("{}://{}{}{}", scheme, host, tld, path.unwrap_or_default())
        })
}

/// Host-like text with no scheme, e.g. `example.com`.
fn arb_schemeless_url() -> impl Strategy<Value = String> {
    ("[a-z][a-z0-9]{2,15}", prop_oneof![Just(".com"), Just(".org")], "(/[a-z]{1,5})?")
        .prop_map(|(host, tld, path)| format!("{}{}{}", host, tld, path))
}

fn arb_title() -> impl Strategy<Value = String> {
    "[ ]{0,2}[a-zA-Z][a-zA-Z0-9 ]{0,30}"
}

struct Outcome {
    result: Result<(), SyncError>,
    inserted: Vec<(String, String)>,
    extra_queries: usize,
    form_empty: bool,
}

fn submit(title: &str, url: &str) -> Outcome {
    runtime().block_on(async {
        let fake = FakeBackend::signed_in();
        let (sync, _) = synchronizer(&fake, SyncSettings::default());
        sync.mount().await.unwrap();
        let queries = fake.queries();

        sync.set_title(title);
        sync.set_url(url);
        let result = sync.submit_form().await;

        let form = sync.view().form;
        Outcome {
            result,
            inserted: fake
                .inserted()
                .into_iter()
                .map(|b| (b.title, b.url))
                .collect(),
            extra_queries: fake.queries() - queries,
            form_empty: form.title.is_empty() && form.url.is_empty() && form.error.is_none(),
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn prop_valid_input_inserts_once(title in arb_title(), url in arb_url()) {
        let outcome = submit(&title, &url);

        prop_assert!(outcome.result.is_ok());
        prop_assert_eq!(outcome.inserted.len(), 1);
        prop_assert_eq!(&outcome.inserted[0].0, title.trim());
        prop_assert_eq!(&outcome.inserted[0].1, &normalize_url(&url).unwrap());
        prop_assert!(outcome.form_empty);
    }

    #[test]
    fn prop_schemeless_url_makes_no_request(title in arb_title(), url in arb_schemeless_url()) {
        let outcome = submit(&title, &url);

        prop_assert!(matches!(
            outcome.result,
            Err(SyncError::Validation(ValidationError::MalformedUrl(_)))
        ));
        prop_assert!(outcome.inserted.is_empty());
        prop_assert_eq!(outcome.extra_queries, 0);
        prop_assert!(!outcome.form_empty);
    }

    #[test]
    fn prop_blank_title_makes_no_request(title in "[ \t]{0,5}", url in arb_url()) {
        let outcome = submit(&title, &url);

        prop_assert!(matches!(
            outcome.result,
            Err(SyncError::Validation(ValidationError::EmptyTitle))
        ));
        prop_assert!(outcome.inserted.is_empty());
        prop_assert_eq!(outcome.extra_queries, 0);
    }
}

/// The literal cases from the product description.
#[test]
fn test_example_cases() {
    let rejected = submit("Example", "example.com");
    assert!(matches!(
        rejected.result,
        Err(SyncError::Validation(ValidationError::MalformedUrl(_)))
    ));
    assert!(rejected.inserted.is_empty());

    let accepted = submit("Example", "https://example.com/path");
    assert!(accepted.result.is_ok());
    assert_eq!(
        accepted.inserted,
        vec![("Example".to_string(), "https://example.com/path".to_string())]
    );
    assert!(accepted.form_empty);
}
