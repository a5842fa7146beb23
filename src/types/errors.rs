use thiserror::Error;

// === ValidationError ===

/// Add-bookmark form field that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Url,
}

impl std::fmt::Display for FormField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormField::Title => f.write_str("title"),
            FormField::Url => f.write_str("url"),
        }
    }
}

/// Rejected user input. Raised before any network request is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The title is empty after trimming.
    #[error("Invalid title: must not be empty")]
    EmptyTitle,
    /// The URL could not be parsed as an absolute URL.
    #[error("Invalid url: {0}")]
    MalformedUrl(String),
    /// The URL parsed but uses a scheme other than http or https.
    #[error("Invalid url: unsupported scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("Invalid url: missing host")]
    MissingHost,
}

impl ValidationError {
    /// The form field the error refers to.
    pub fn field(&self) -> FormField {
        match self {
            ValidationError::EmptyTitle => FormField::Title,
            _ => FormField::Url,
        }
    }
}

// === RemoteRequestError ===

/// Failure of a request against the auth service, the store or the change
/// stream. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteRequestError {
    /// The request could not be delivered or no response arrived.
    #[error("Remote request failed: {0}")]
    Transport(String),
    /// The service answered with an error status.
    #[error("Remote service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The service response could not be decoded.
    #[error("Malformed remote response: {0}")]
    Decode(String),
    /// The request requires a session and none is present.
    #[error("Not authenticated")]
    Unauthenticated,
    /// A delete matched no row.
    #[error("Bookmark not found: {0}")]
    NotFound(String),
    /// The local store failed.
    #[error("Store database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for RemoteRequestError {
    fn from(error: rusqlite::Error) -> Self {
        RemoteRequestError::Database(error.to_string())
    }
}

#[cfg(feature = "hosted")]
impl From<reqwest::Error> for RemoteRequestError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            RemoteRequestError::Decode(error.to_string())
        } else {
            RemoteRequestError::Transport(error.to_string())
        }
    }
}

// === SyncError ===

/// Errors returned by the dashboard operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// No session was present; the view has been redirected to the entry screen.
    #[error("Authentication required")]
    AuthRequired,
    #[error(transparent)]
    Remote(#[from] RemoteRequestError),
    /// The view is not mounted, either not yet or not anymore.
    #[error("View is not mounted")]
    NotMounted,
}

// === SettingsError ===

/// Errors related to loading, saving and editing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The provided settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}

// === VaultError ===

/// Errors from sealing or opening the persisted session.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Vault I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Vault encoding error: {0}")]
    Encoding(String),
    #[error("Vault crypto error: {0}")]
    Crypto(String),
}

// === BackendError ===

/// Errors raised while constructing a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Backend configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error("Backend '{0}' is not available in this build")]
    Unavailable(String),
}
