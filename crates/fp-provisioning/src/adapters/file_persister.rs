//! File-backed credential persister.
//!
//! Writes `<certificateId>-certificate.pem.crt` and
//! `<certificateId>-private.pem.key` into a directory, each atomically via a
//! temp file. The key file is readable by the owner only on Unix.

use crate::ports::outbound::{CredentialPersister, PersistError, PersistedCredential};
use async_trait::async_trait;
use shared_types::IssuedCredential;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Persists issued credentials as PEM files.
#[derive(Debug, Clone)]
pub struct FileCredentialPersister {
    dir: PathBuf,
}

impl FileCredentialPersister {
    /// Persister writing into `dir`, created on first use.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Certificate path for a certificate id.
    pub fn certificate_path(&self, certificate_id: &str) -> PathBuf {
        self.dir.join(format!("{certificate_id}-certificate.pem.crt"))
    }

    /// Private key path for a certificate id.
    pub fn private_key_path(&self, certificate_id: &str) -> PathBuf {
        self.dir.join(format!("{certificate_id}-private.pem.key"))
    }
}

#[async_trait]
impl CredentialPersister for FileCredentialPersister {
    async fn persist(
        &self,
        credential: &IssuedCredential,
    ) -> Result<PersistedCredential, PersistError> {
        let id = &credential.certificate_id;
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(PersistError::Invalid(format!(
                "certificate id not usable as a file name: {id:?}"
            )));
        }

        let dir = self.dir.clone();
        let stored = PersistedCredential {
            certificate_path: self.certificate_path(id),
            private_key_path: self.private_key_path(id),
        };
        let certificate = credential.certificate_pem.clone();
        let private_key = credential.private_key.clone();

        let paths = stored.clone();
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir).map_err(|source| PersistError::Io {
                path: dir.clone(),
                source,
            })?;
            write_atomic(&paths.certificate_path, certificate.as_bytes(), false)?;
            write_atomic(&paths.private_key_path, private_key.as_bytes(), true)
        })
        .await
        .map_err(|e| PersistError::Task(e.to_string()))??;

        info!(
            certificate_id = %credential.short_id(),
            dir = %self.dir.display(),
            "Credential written"
        );

        Ok(stored)
    }
}

fn write_atomic(path: &Path, contents: &[u8], secret: bool) -> Result<(), PersistError> {
    let temp_path = path.with_extension("tmp");
    let result = write_then_rename(&temp_path, path, contents, secret);
    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result.map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_then_rename(
    temp_path: &Path,
    path: &Path,
    contents: &[u8],
    secret: bool,
) -> std::io::Result<()> {
    let mut file = open_for_write(temp_path, secret)?;
    file.write_all(contents)?;
    file.sync_all()?;
    std::fs::rename(temp_path, path)
}

#[cfg(unix)]
fn open_for_write(path: &Path, secret: bool) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    let mode = if secret { 0o600 } else { 0o644 };
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
}

#[cfg(not(unix))]
fn open_for_write(path: &Path, _secret: bool) -> std::io::Result<std::fs::File> {
    std::fs::File::create(path)
}
