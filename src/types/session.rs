use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::bookmark::UserId;

/// Bearer token proving an authenticated identity. Wiped from memory on drop
/// and never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Authentication state as observed by the views.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Session {
    Present { user: UserId, token: AccessToken },
    #[default]
    Absent,
}

impl Session {
    pub fn present(user: impl Into<String>, token: impl Into<String>) -> Self {
        Session::Present {
            user: UserId(user.into()),
            token: AccessToken::new(token),
        }
    }

    pub fn user(&self) -> Option<&UserId> {
        match self {
            Session::Present { user, .. } => Some(user),
            Session::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Session::Present { .. })
    }
}

/// Why a session-change notification was emitted.
///
/// Every auth service delivers `InitialSession` to a new subscriber right
/// after it registers, carrying the session as it is at that moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Third-party identity provider used for sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Provider(pub String);

impl Provider {
    pub fn google() -> Self {
        Self("google".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable provider name, e.g. `github` -> `GitHub`.
    pub fn display_name(&self) -> String {
        match self.0.as_str() {
            "github" => "GitHub".to_string(),
            "gitlab" => "GitLab".to_string(),
            "linkedin_oidc" => "LinkedIn".to_string(),
            other => {
                let mut chars = other.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }
}

impl Default for Provider {
    fn default() -> Self {
        Self::google()
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the host must send the user to continue a provider sign-in.
/// `None` when the backend completed sign-in without a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInRedirect {
    pub url: Option<String>,
}
