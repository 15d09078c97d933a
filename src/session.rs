//! Default credentials and their on-disk persistence.
//!
//! The session file lives at `<dir>/credentials.json`. Writes go to a
//! temporary file first and are renamed into place, so readers never see
//! a partially written file.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Credentials of the signed-in user.
///
/// The variant decides which stores the authenticated state builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Credentials {
    /// A WordPress.com account, authenticated with a bearer token.
    WpCom {
        username: String,
        auth_token: String,
        site_address: String,
    },
    /// A self-hosted site, authenticated with an application password.
    WpOrg {
        username: String,
        password: String,
        site_address: String,
    },
}

impl Credentials {
    pub fn wpcom(
        username: impl Into<String>,
        auth_token: impl Into<String>,
        site_address: impl Into<String>,
    ) -> Self {
        Self::WpCom {
            username: username.into(),
            auth_token: auth_token.into(),
            site_address: site_address.into(),
        }
    }

    pub fn wporg(
        username: impl Into<String>,
        password: impl Into<String>,
        site_address: impl Into<String>,
    ) -> Self {
        Self::WpOrg {
            username: username.into(),
            password: password.into(),
            site_address: site_address.into(),
        }
    }

    pub fn is_wpcom(&self) -> bool {
        matches!(self, Self::WpCom { .. })
    }

    pub fn username(&self) -> &str {
        match self {
            Self::WpCom { username, .. } | Self::WpOrg { username, .. } => username,
        }
    }

    pub fn site_address(&self) -> &str {
        match self {
            Self::WpCom { site_address, .. } | Self::WpOrg { site_address, .. } => site_address,
        }
    }

    /// Token to send as `Authorization: Bearer`, if this variant has one.
    pub fn bearer_token(&self) -> Option<&str> {
        match self {
            Self::WpCom { auth_token, .. } => Some(auth_token.as_str()),
            Self::WpOrg { .. } => None,
        }
    }
}

/// File-backed store for the default [`Credentials`].
#[derive(Debug, Clone)]
pub struct Session {
    path: PathBuf,
}

impl Session {
    /// A session persisted under `dir`. Nothing is read until
    /// [`load`](Self::load).
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join("credentials.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored credentials.
    ///
    /// Returns `Ok(None)` if no file exists or its contents cannot be
    /// decoded; the latter is logged as a warning.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] for I/O failures other than a missing
    /// file.
    pub fn load(&self) -> Result<Option<Credentials>, SessionError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(credentials) => Ok(Some(credentials)),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to decode stored credentials; treating as signed out"
                );
                Ok(None)
            }
        }
    }

    /// Persist `credentials`, replacing any previous ones.
    pub fn save(&self, credentials: &Credentials) -> Result<(), SessionError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(credentials)?;
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Forget the stored credentials. A missing file is not an error.
    pub fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
