use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{info, warn};

use crate::api::PollService;
use crate::error::{Error, Result};
use crate::model::user::{Credentials, Registration, User};

/// Who is signed in. Passed explicitly to anything that acts on a user's behalf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    user: Option<User>,
}

impl AuthContext {
    pub fn signed_in(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The signed-in user, or [`Error::Unauthenticated`].
    pub fn require_user(&self) -> Result<&User> {
        self.user.as_ref().ok_or(Error::Unauthenticated)
    }

    pub async fn login<S>(&mut self, service: &S, credentials: &Credentials) -> Result<&User>
    where
        S: PollService + ?Sized,
    {
        let user = service.login(credentials).await?;
        info!("Signed in as {} ({})", user.display_name(), user.id);
        let user: &User = self.user.insert(user);
        Ok(user)
    }

    pub async fn register<S>(&mut self, service: &S, registration: &Registration) -> Result<&User>
    where
        S: PollService + ?Sized,
    {
        let user = service.register(registration).await?;
        info!("Registered {} ({})", user.display_name(), user.id);
        let user: &User = self.user.insert(user);
        Ok(user)
    }

    /// Replace the stored profile, e.g. after an update.
    pub fn refresh(&mut self, user: User) {
        self.user = Some(user);
    }

    pub fn logout(&mut self) {
        if let Some(user) = self.user.take() {
            info!("Signed out {}", user.id);
        }
    }

    /// Load the signed-in user from a session file. A missing file means nobody is signed in;
    /// an unreadable one is discarded with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Self { user: Some(user) }),
            Err(err) => {
                warn!("Ignoring corrupt session file {}: {err}", path.display());
                Ok(Self::default())
            }
        }
    }

    /// Persist the signed-in user, or remove the session file if nobody is signed in.
    pub fn save(&self, path: &Path) -> Result<()> {
        match &self.user {
            Some(user) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, serde_json::to_string_pretty(user)?)?;
            }
            None => match fs::remove_file(path) {
                Err(err) if err.kind() != ErrorKind::NotFound => return Err(err.into()),
                _ => {}
            },
        }
        Ok(())
    }
}
