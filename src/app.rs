//! App Core for SmartMarks.
//!
//! Builds the configured backend once and hands the same service handles to
//! every view it constructs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backends::local::LocalBackend;
#[cfg(feature = "hosted")]
use crate::backends::rest::HostedBackend;
use crate::database::Database;
use crate::managers::bookmark_sync::{BookmarkSynchronizer, SyncServices};
use crate::managers::entry_guard::EntryGuard;
use crate::services::auth::AuthService;
use crate::services::navigation::HistoryNavigator;
#[cfg(feature = "hosted")]
use crate::services::token_vault::TokenVault;
use crate::types::errors::{BackendError, RemoteRequestError};
use crate::types::session::Session;
use crate::types::settings::{AppSettings, BackendKind};

/// Passphrase for the sealed hosted session. Falls back to the anon key.
pub const ENV_VAULT_PASSPHRASE: &str = "SMARTMARKS_VAULT_PASSPHRASE";

const DATABASE_FILE: &str = "smartmarks.db";
#[cfg(feature = "hosted")]
const VAULT_FILE: &str = "session.vault";

/// The backend selected by `backend.kind`.
#[derive(Clone)]
pub enum Backend {
    Local(Arc<LocalBackend>),
    #[cfg(feature = "hosted")]
    Hosted(Arc<HostedBackend>),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Local(_) => BackendKind::Local,
            #[cfg(feature = "hosted")]
            Backend::Hosted(_) => BackendKind::Hosted,
        }
    }

    pub fn auth(&self) -> Arc<dyn AuthService> {
        match self {
            Backend::Local(b) => b.clone(),
            #[cfg(feature = "hosted")]
            Backend::Hosted(b) => b.clone(),
        }
    }

    fn services(&self, navigator: Arc<HistoryNavigator>) -> SyncServices {
        match self {
            Backend::Local(b) => SyncServices {
                auth: b.clone(),
                store: b.clone(),
                changes: b.clone(),
                navigator,
            },
            #[cfg(feature = "hosted")]
            Backend::Hosted(b) => SyncServices {
                auth: b.clone(),
                store: b.clone(),
                changes: b.clone(),
                navigator,
            },
        }
    }

    /// Finishes a redirect-based sign-in. The local backend signs in
    /// directly and has no redirect to complete.
    pub fn complete_sign_in(&self, redirect_url: &str) -> Result<Session, RemoteRequestError> {
        match self {
            Backend::Local(_) => Err(RemoteRequestError::Rejected {
                status: 400,
                message: format!("the local backend does not use redirects ({})", redirect_url),
            }),
            #[cfg(feature = "hosted")]
            Backend::Hosted(b) => b.complete_sign_in(redirect_url),
        }
    }
}

/// Central application struct: settings, backend and navigator.
pub struct App {
    pub settings: AppSettings,
    pub backend: Backend,
    pub navigator: Arc<HistoryNavigator>,
}

impl App {
    /// Opens the backend described by `settings`, storing local files under
    /// `data_dir` unless a path is configured.
    pub fn new(settings: AppSettings, data_dir: &Path) -> Result<Self, BackendError> {
        let backend = match settings.backend.kind {
            BackendKind::Local => {
                let path = settings
                    .backend
                    .database_path
                    .as_ref()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| data_dir.join(DATABASE_FILE));
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        BackendError::Config(format!("cannot create {}: {}", parent.display(), e))
                    })?;
                }
                tracing::info!(path = %path.display(), "opening local backend");
                let db = Arc::new(Database::open(&path)?);
                Backend::Local(Arc::new(LocalBackend::new(db)?))
            }
            BackendKind::Hosted => Self::hosted(&settings, data_dir)?,
        };

        Ok(Self {
            settings,
            backend,
            navigator: Arc::new(HistoryNavigator::new()),
        })
    }

    /// App over an in-memory local backend.
    pub fn in_memory(settings: AppSettings) -> Result<Self, BackendError> {
        Ok(Self {
            settings,
            backend: Backend::Local(Arc::new(LocalBackend::open_in_memory()?)),
            navigator: Arc::new(HistoryNavigator::new()),
        })
    }

    #[cfg(feature = "hosted")]
    fn hosted(settings: &AppSettings, data_dir: &Path) -> Result<Backend, BackendError> {
        let passphrase = std::env::var(ENV_VAULT_PASSPHRASE)
            .unwrap_or_else(|_| settings.backend.anon_key.clone());
        let vault = TokenVault::new(data_dir.join(VAULT_FILE), passphrase);
        tracing::info!(project = %settings.backend.project_url, "opening hosted backend");
        Ok(Backend::Hosted(Arc::new(HostedBackend::new(&settings.backend, vault)?)))
    }

    #[cfg(not(feature = "hosted"))]
    fn hosted(_settings: &AppSettings, _data_dir: &Path) -> Result<Backend, BackendError> {
        Err(BackendError::Unavailable("hosted".to_string()))
    }

    pub fn dashboard(&self) -> BookmarkSynchronizer {
        BookmarkSynchronizer::new(
            self.backend.services(Arc::clone(&self.navigator)),
            self.settings.sync.clone(),
        )
    }

    pub fn entry(&self) -> EntryGuard {
        EntryGuard::new(
            self.backend.auth(),
            self.navigator.clone(),
            self.settings.auth.clone(),
        )
    }
}
