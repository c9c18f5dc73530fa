//! Sign-in and the session it produces.
//!
//! The API runs the Google OAuth round trip itself and hands back an opaque
//! bearer credential in a `token` query parameter on the client root. This
//! module holds that credential ([`Session`]), persists it
//! ([`CredentialStore`]) and drives the browser side of sign-in.

mod server;
mod session;
mod storage;

pub use server::CallbackServer;
pub use session::{Mode, Session, TOKEN_PARAM};
pub use storage::{Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore};

use crate::config::Config;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Timed out waiting for the browser to finish sign-in")]
    Timeout,

    #[error("Sign-in callback carried no token")]
    MissingToken,

    #[error("{0}")]
    Provider(String),

    #[error("Could not listen on port {port}: {reason}")]
    Bind { port: u16, reason: String },

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Open the session backed by the default credential file.
pub fn open_session() -> Result<Session, AuthError> {
    Session::load(FileCredentialStore::new()?)
}

/// Sign in through the browser.
///
/// The API must be configured to redirect to
/// `http://localhost:{callback_port}/` once the identity provider is done.
pub async fn login(config: &Config, session: Arc<Session>) -> Result<(), AuthError> {
    let server = CallbackServer::bind(config.callback_port)?;
    tracing::debug!(port = server.port(), "callback listener bound");
    let login_url = config.login_url();

    println!("Opening browser to sign in with Google...");
    println!("If the browser doesn't open, visit:");
    println!("  {login_url}");
    println!();

    if let Err(e) = open::that(&login_url) {
        tracing::warn!("failed to open browser: {e}");
        eprintln!("Failed to open browser: {e}");
        eprintln!("Please open the URL above manually.");
    }

    println!("Waiting for sign-in on {}...", server.client_root());
    let timeout = config.login_timeout();
    tokio::task::spawn_blocking(move || server.wait_for_credential(&session, timeout))
        .await
        .map_err(|e| AuthError::Io(std::io::Error::other(format!("login task failed: {e}"))))?
}

/// Sign out: forget the stored credential.
pub fn logout(session: &Session) -> Result<(), AuthError> {
    session.clear_credential()
}
