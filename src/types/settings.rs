use serde::{Deserialize, Serialize};

use super::session::Provider;

/// Top-level application settings container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppSettings {
    pub backend: BackendSettings,
    pub auth: AuthSettings,
    pub sync: SyncSettings,
}

/// Which backend implementation serves auth, storage and change notifications.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Single-device SQLite backend.
    #[default]
    Local,
    /// Hosted backend-as-a-service reached over HTTPS.
    Hosted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendSettings {
    pub kind: BackendKind,
    /// Base URL of the hosted project, e.g. `https://abc.example.co`.
    pub project_url: String,
    /// Public API key sent with every hosted request.
    pub anon_key: String,
    /// How often the hosted change stream polls for differences.
    pub poll_interval_secs: u64,
    /// SQLite file for the local backend. Defaults to the platform data dir.
    pub database_path: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: BackendKind::Local,
            project_url: String::new(),
            anon_key: String::new(),
            poll_interval_secs: 5,
            database_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthSettings {
    pub provider: Provider,
    /// Where the identity provider sends the user after sign-in.
    pub redirect_to: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            provider: Provider::google(),
            redirect_to: "http://localhost:3000/dashboard".to_string(),
        }
    }
}

/// How concurrent refetches settle the displayed list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefetchOrdering {
    /// Responses to refetches issued before the newest applied one are dropped.
    #[default]
    LastIssuedWins,
    /// Every response overwrites the list when it arrives.
    LastResolvedWins,
}

/// What deleting an id that matches no row does.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    #[default]
    IgnoreMissing,
    ReportMissing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    pub ordering: RefetchOrdering,
    pub delete_policy: DeletePolicy,
    /// Refetch right after a successful create or remove instead of waiting
    /// only for the change notification.
    pub refetch_after_mutation: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            ordering: RefetchOrdering::LastIssuedWins,
            delete_policy: DeletePolicy::IgnoreMissing,
            refetch_after_mutation: true,
        }
    }
}
