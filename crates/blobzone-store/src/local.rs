use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::backend::{BackendError, BackendResult, CopyId, CopyStatus, ObjectBackend, WritePolicy};
use crate::content::{BlobContent, BlobReader};

/// Directory holding in-flight writes. Kept on the same filesystem as the
/// objects so that publishing a finished write is a rename.
const PARTIAL_DIR: &str = ".partial";

/// Object backend rooted at a local directory.
///
/// Each object path maps to a file under the root. Writes land in a private
/// temp file first and are renamed into place only once fully flushed, so a
/// reader never observes a short object. Copies are performed synchronously
/// and always report `Complete`.
#[derive(Debug)]
pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    /// Open (creating if needed) a container at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> BackendResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join(PARTIAL_DIR)).await?;
        debug!(root = %root.display(), "opened local container");
        Ok(Self { root })
    }

    /// The container directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an object path to a file, refusing anything that could escape the root.
    fn resolve(&self, path: &str) -> BackendResult<PathBuf> {
        let relative = Path::new(path);
        let valid = !path.is_empty()
            && !path.contains('\\')
            && !path.starts_with(PARTIAL_DIR)
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(BackendError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid object path: {path:?}"),
            )));
        }
        Ok(self.root.join(relative))
    }

    /// Stream `reader` into a temp file and publish it at `dest`.
    async fn write_atomic(
        &self,
        mut reader: BlobReader,
        dest: &Path,
        object_path: &str,
        policy: WritePolicy,
    ) -> BackendResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = tempfile::NamedTempFile::new_in(self.root.join(PARTIAL_DIR))?;
        let (file, temp_path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        // The temp path is removed on drop if publishing fails.
        let published = match policy {
            WritePolicy::Overwrite => temp_path.persist(dest),
            WritePolicy::IfAbsent => temp_path.persist_noclobber(dest),
        };
        match published {
            Ok(()) => Ok(()),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                Err(BackendError::AlreadyExists(object_path.to_owned()))
            }
            Err(e) => Err(BackendError::Io(e.error)),
        }
    }
}

#[async_trait]
impl ObjectBackend for LocalFsBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn put(
        &self,
        path: &str,
        content: BlobContent,
        policy: WritePolicy,
    ) -> BackendResult<()> {
        let dest = self.resolve(path)?;
        self.write_atomic(content.into_reader(), &dest, path, policy)
            .await
    }

    async fn get(&self, path: &str) -> BackendResult<Option<BlobReader>> {
        let file_path = self.resolve(path)?;
        match tokio::fs::File::open(&file_path).await {
            Ok(file) => Ok(Some(Box::pin(file) as BlobReader)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> BackendResult<bool> {
        let file_path = self.resolve(path)?;
        match tokio::fs::metadata(&file_path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn copy(&self, from: &str, to: &str, policy: WritePolicy) -> BackendResult<CopyStatus> {
        let source = self.resolve(from)?;
        let dest = self.resolve(to)?;
        if policy == WritePolicy::IfAbsent && self.exists(to).await? {
            return Ok(CopyStatus::DestinationExists);
        }
        let file = match tokio::fs::File::open(&source).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BackendError::NotFound(from.to_owned()))
            }
            Err(e) => return Err(e.into()),
        };
        match self.write_atomic(Box::pin(file), &dest, to, policy).await {
            Ok(()) => Ok(CopyStatus::Complete),
            Err(BackendError::AlreadyExists(_)) => Ok(CopyStatus::DestinationExists),
            Err(e) => Err(e),
        }
    }

    async fn poll_copy(&self, id: &CopyId) -> BackendResult<CopyStatus> {
        // Copies finish inside `copy`; there is never anything to poll.
        Err(BackendError::UnknownCopy(id.clone()))
    }

    async fn abort_copy(&self, _id: &CopyId) -> BackendResult<()> {
        Ok(())
    }

    async fn delete(&self, path: &str) -> BackendResult<bool> {
        let file_path = self.resolve(path)?;
        match tokio::fs::remove_file(&file_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
