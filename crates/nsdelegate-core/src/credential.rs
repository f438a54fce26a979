// # Transient Credential Material
//
// The provider's service-account key is handed to us as a secret string and
// has to exist on disk while the provider CLI authenticates. It lives in a
// `CredentialFile` guard:
//
// - created with owner-only permissions in a caller-chosen directory
// - scrubbed (overwritten, truncated) and unlinked by `erase()`
// - scrubbed and unlinked on drop if `erase()` was never reached, so error
//   returns, panics and dropped futures (signal handling) all clean up

use std::fmt;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::Error;

/// Secret provider credential material
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the secret.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    /// Wrap secret material
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Borrow the secret
    /// ⚠️ NEVER log this value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is blank
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"<REDACTED>").finish()
    }
}

/// Scoped on-disk copy of a [`Credential`]
#[derive(Debug)]
pub struct CredentialFile {
    file: Option<NamedTempFile>,
    path: PathBuf,
}

impl CredentialFile {
    /// Write `credential` to a fresh file inside `dir`
    pub fn create_in(dir: &Path, credential: &Credential) -> Result<Self, Error> {
        if credential.is_empty() {
            return Err(Error::config("Credential material cannot be empty"));
        }

        let mut file = tempfile::Builder::new()
            .prefix("nsdelegate-credential-")
            .suffix(".json")
            .tempfile_in(dir)
            .map_err(|e| {
                Error::credential(format!(
                    "Failed to create credential file in {}: {}",
                    dir.display(),
                    e
                ))
            })?;

        file.write_all(credential.expose().as_bytes())
            .and_then(|_| file.as_file().sync_all())
            .map_err(|e| Error::credential(format!("Failed to write credential file: {}", e)))?;

        let path = file.path().to_path_buf();
        tracing::debug!("Wrote transient credential file {}", path.display());

        Ok(Self {
            file: Some(file),
            path,
        })
    }

    /// Path of the credential file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the credential back (for connectors that need fields from it)
    pub fn read_to_string(&self) -> Result<String, Error> {
        std::fs::read_to_string(&self.path)
            .map_err(|e| Error::credential(format!("Failed to read credential file: {}", e)))
    }

    /// Scrub and remove the file, reporting failures
    pub fn erase(mut self) -> Result<(), Error> {
        match self.file.take() {
            Some(file) => scrub_and_remove(file),
            None => Ok(()),
        }
    }
}

impl Drop for CredentialFile {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = scrub_and_remove(file) {
                tracing::error!("Failed to erase credential file {}: {}", self.path.display(), e);
            } else {
                tracing::debug!("Erased credential file {} on unwind", self.path.display());
            }
        }
    }
}

fn scrub_and_remove(mut file: NamedTempFile) -> Result<(), Error> {
    let path = file.path().to_path_buf();

    if let Err(e) = scrub(&mut file) {
        tracing::warn!("Failed to scrub credential file {}: {}", path.display(), e);
    }

    file.close().map_err(|e| {
        Error::credential(format!(
            "Failed to remove credential file {}: {}",
            path.display(),
            e
        ))
    })
}

fn scrub(file: &mut NamedTempFile) -> std::io::Result<()> {
    let len = file.as_file().metadata()?.len();
    let handle = file.as_file_mut();
    handle.seek(SeekFrom::Start(0))?;
    handle.write_all(&vec![0u8; len as usize])?;
    handle.set_len(0)?;
    handle.sync_all()
}
