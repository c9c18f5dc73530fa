//! Session holder: the credential, where it lives, and the mode it implies.

use super::AuthError;
use super::storage::{Credential, CredentialStore};
use std::sync::{PoisonError, RwLock};
use url::Url;

/// Query parameter the API uses to hand the credential back after sign-in.
pub const TOKEN_PARAM: &str = "token";

/// Whether the client currently holds a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Unauthenticated,
    Authenticated,
}

/// Explicit session context, shared by the login flow and the
/// synchronizer.
///
/// The in-memory copy is authoritative for [`Session::mode`]. Storage is
/// written through on every change.
pub struct Session {
    store: Box<dyn CredentialStore>,
    credential: RwLock<Option<Credential>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start from whatever `store` already holds.
    pub fn load(store: impl CredentialStore + 'static) -> Result<Self, AuthError> {
        let credential = store.load()?;
        tracing::debug!(authenticated = credential.is_some(), "session loaded");
        Ok(Self {
            store: Box::new(store),
            credential: RwLock::new(credential),
        })
    }

    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        if self
            .credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
        {
            Mode::Authenticated
        } else {
            Mode::Unauthenticated
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.mode() == Mode::Authenticated
    }

    pub fn set_credential(&self, credential: Credential) -> Result<(), AuthError> {
        self.store.save(&credential)?;
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
        tracing::debug!("session authenticated");
        Ok(())
    }

    /// Drop the credential. Memory is cleared even if storage fails.
    pub fn clear_credential(&self) -> Result<(), AuthError> {
        self.credential
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        tracing::debug!("session cleared");
        self.store.clear()
    }

    /// The server rejected the credential: fall back to unauthenticated.
    pub fn handle_unauthorized(&self) {
        tracing::warn!("credential rejected by server, signing out");
        if let Err(e) = self.clear_credential() {
            tracing::warn!("failed to clear stored credential: {e}");
        }
    }

    /// Take the credential out of a sign-in callback URL.
    ///
    /// If `url` carries a non-empty `token` parameter it is stored and the
    /// parameter is removed from `url`, so calling this again on the same
    /// URL yields `None`. Other query parameters are kept.
    pub fn consume_credential_from_callback(
        &self,
        url: &mut Url,
    ) -> Result<Option<Credential>, AuthError> {
        let Some(credential) = take_query_param(url, TOKEN_PARAM)
            .filter(|t| !t.is_empty())
            .map(Credential::new)
        else {
            return Ok(None);
        };

        self.set_credential(credential.clone())?;
        Ok(Some(credential))
    }
}

/// Remove every `name` parameter from `url`, returning the first value.
fn take_query_param(url: &mut Url, name: &str) -> Option<String> {
    let mut found = None;
    let mut rest = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == name {
            if found.is_none() {
                found = Some(value.into_owned());
            }
        } else {
            rest.push((key.into_owned(), value.into_owned()));
        }
    }

    if found.is_some() {
        if rest.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(rest);
        }
    }
    found
}
