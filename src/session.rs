//! Session context for the current user.
//!
//! The identity provider is an external collaborator; the rest of the crate
//! only sees this context, passed explicitly into every component that needs
//! it. Workspace-scoped operations must not run before the session is ready.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identity of the signed-in user as exposed by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
}

impl CurrentUser {
    pub fn new(uid: impl Into<String>, display_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: display_name.into(),
            email: email.into(),
            photo_url: None,
        }
    }

    pub fn with_photo(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }
}

/// Session state: user identity plus a loading flag.
///
/// Initialized once at application start, updated on sign-in/sign-out.
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<CurrentUser>,
    loading: bool,
}

impl Session {
    /// Session that has not resolved yet.
    pub fn loading() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }

    /// Resolved session with no user.
    pub fn signed_out() -> Self {
        Self {
            user: None,
            loading: false,
        }
    }

    /// Resolved session for the given user.
    pub fn signed_in(user: CurrentUser) -> Self {
        Self {
            user: Some(user),
            loading: false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn sign_in(&mut self, user: CurrentUser) {
        self.user = Some(user);
        self.loading = false;
    }

    pub fn sign_out(&mut self) {
        self.user = None;
        self.loading = false;
    }

    pub fn user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }

    /// The signed-in user, or the session-level error.
    ///
    /// `SessionLoading` while the provider has not resolved;
    /// `NotAuthenticated` once it resolved with no user.
    pub fn current_user(&self) -> Result<&CurrentUser> {
        if self.loading {
            return Err(Error::SessionLoading);
        }
        self.user.as_ref().ok_or(Error::NotAuthenticated)
    }
}
