//! Local persistence of the signed session credential.
//!
//! The credential is stored as-is. Its signature protects it against
//! tampering, nothing protects it against disclosure.

use crate::core::error::CrmResult;
use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait CredentialStore {
    fn save(&self, credential: &str) -> CrmResult<()>;

    /// `Ok(None)` means nobody is logged in.
    fn load(&self) -> CrmResult<Option<String>>;
}

#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, credential: &str) -> CrmResult<()> {
        fs::write(&self.path, credential)?;
        debug!(path = %self.path.display(), "session credential saved");
        Ok(())
    }

    fn load(&self) -> CrmResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: RefCell<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: impl Into<String>) -> Self {
        Self {
            credential: RefCell::new(Some(credential.into())),
        }
    }

    pub fn clear(&self) {
        self.credential.borrow_mut().take();
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, credential: &str) -> CrmResult<()> {
        *self.credential.borrow_mut() = Some(credential.to_string());
        Ok(())
    }

    fn load(&self) -> CrmResult<Option<String>> {
        Ok(self.credential.borrow().clone())
    }
}
