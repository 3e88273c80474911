//! Login gate and session context.
//!
//! The login is a static comparison against two configured values. A
//! successful login yields a [`Session`], which is the only way to build an
//! [`HttpTaskRemote`](crate::remote::http::HttpTaskRemote). The
//! authenticated flag is persisted by [`SessionStore`] so later commands
//! can resume without logging in again.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;

/// Errors from the login gate.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The user id or password did not match the configured values.
    #[error("Invalid User ID or Password")]
    InvalidCredentials,

    /// No credentials are configured to compare against.
    #[error("no login configured (set TEACHMATE_USER_ID and TEACHMATE_USER_PASSWORD)")]
    NotConfigured,

    /// No persisted session was found.
    #[error("not logged in (run `teachmate login`)")]
    NotLoggedIn,

    /// The persisted session belongs to a different user than configured.
    #[error("stored session for {0} does not match the configured user")]
    SessionMismatch(String),

    /// The session flag could not be read or written.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors reading or writing the session flag file.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// I/O failure on the session file.
    #[error("session file {path}: {source}")]
    Io {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The session file is not valid TOML.
    #[error("corrupt session file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The session could not be serialized.
    #[error("failed to encode session: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// A user id and password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user_id: String,
    password: String,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(user_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            password: password.into(),
        }
    }

    /// The user id.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An authenticated session.
///
/// Only produced by [`Authenticator`], so holding one proves the login
/// gate was passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user_id: String,
}

impl Session {
    /// The logged-in user.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// Checks logins against the configured credentials.
#[derive(Debug, Clone)]
pub struct Authenticator {
    expected: Option<Credentials>,
}

impl Authenticator {
    /// Creates an authenticator. `None` rejects every login.
    #[must_use]
    pub const fn new(expected: Option<Credentials>) -> Self {
        Self { expected }
    }

    /// Builds an authenticator from the `[auth]` configuration.
    ///
    /// Both the user id and the password must be set for logins to succeed.
    #[must_use]
    pub fn from_config(auth: &AuthConfig) -> Self {
        let expected = auth
            .user_id
            .as_ref()
            .zip(auth.password.as_ref())
            .map(|(user, pass)| Credentials::new(user.clone(), pass.clone()));
        Self::new(expected)
    }

    /// Compares the given credentials with the configured ones.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotConfigured`] if no credentials are configured,
    /// or [`AuthError::InvalidCredentials`] on mismatch.
    pub fn login(&self, user_id: &str, password: &str) -> Result<Session, AuthError> {
        let expected = self.expected.as_ref().ok_or(AuthError::NotConfigured)?;
        if expected.user_id != user_id || expected.password != password {
            tracing::warn!(user = %user_id, "rejected login");
            return Err(AuthError::InvalidCredentials);
        }
        tracing::info!(user = %user_id, "logged in");
        Ok(Session {
            user_id: user_id.to_string(),
        })
    }

    /// Resumes a persisted session.
    ///
    /// When credentials are configured, the stored user must match them.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotLoggedIn`] if no session is stored,
    /// [`AuthError::SessionMismatch`] if it belongs to another user, or
    /// [`AuthError::Session`] if the flag file cannot be read.
    pub fn resume(&self, store: &SessionStore) -> Result<Session, AuthError> {
        let session = store.restore()?.ok_or(AuthError::NotLoggedIn)?;
        if let Some(expected) = &self.expected {
            if expected.user_id != session.user_id {
                return Err(AuthError::SessionMismatch(session.user_id));
            }
        }
        Ok(session)
    }
}

/// On-disk form of the session flag.
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    authenticated: bool,
    user_id: String,
}

/// Persists the authenticated flag in a small TOML file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the flag file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the session, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the file cannot be written.
    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let contents = toml::to_string(&SessionFile {
            authenticated: true,
            user_id: session.user_id.clone(),
        })?;
        std::fs::write(&self.path, contents).map_err(|e| self.io_error(e))
    }

    /// Reads the session, if one is stored and flagged as authenticated.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the file exists but cannot be read or parsed.
    pub fn restore(&self) -> Result<Option<Session>, SessionError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let file: SessionFile = toml::from_str(&contents)?;
        Ok(file.authenticated.then_some(Session {
            user_id: file.user_id,
        }))
    }

    /// Removes the stored session. Missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> SessionError {
        SessionError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
