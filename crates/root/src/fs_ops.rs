//! Confined filesystem helpers
//!
//! Every helper takes a path relative to (or absolute inside) the sandbox and
//! confines it right before touching the filesystem. Nothing here accepts a
//! pre-resolved path, so a link swapped in after an earlier check is caught.

use crate::{Result, Sandbox, SandboxedPath};
use prefetch_errors::{Error, SandboxError};
use std::path::Path;
use tokio::fs;

impl Sandbox {
    /// Create a directory and its parents inside the sandbox
    ///
    /// Creating a directory that already exists is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the path escapes the sandbox, before or after
    /// creation, or if the directory cannot be created.
    pub async fn create_dir_all(&self, path: impl AsRef<Path>) -> Result<SandboxedPath> {
        let target = self.join_within_root(path)?;
        fs::create_dir_all(target.path())
            .await
            .map_err(|e| Error::io_with_path(&e, target.path()))?;
        // Created directories may sit under a link planted meanwhile.
        self.resolve_existing(target.relative())
    }

    /// Check whether a confined path exists
    ///
    /// Paths that escape the sandbox are reported as missing.
    pub async fn exists(&self, path: impl AsRef<Path>) -> bool {
        match self.join_within_root(path) {
            Ok(target) => fs::try_exists(target.path()).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Remove a directory tree inside the sandbox
    ///
    /// Removing a missing directory is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the path escapes the sandbox, names the root
    /// itself, or cannot be removed.
    pub async fn remove_dir_all(&self, path: impl AsRef<Path>) -> Result<()> {
        let target = self.join_within_root(path)?;
        if target.relative().as_os_str().is_empty() {
            return Err(SandboxError::InvalidRoot {
                path: target.path().display().to_string(),
                reason: "refusing to remove the sandbox root".to_string(),
            }
            .into());
        }
        if !target.existed() {
            return Ok(());
        }
        fs::remove_dir_all(target.path())
            .await
            .map_err(|e| Error::io_with_path(&e, target.path()))
    }

    /// Ensure a directory exists and is empty
    ///
    /// # Errors
    ///
    /// Returns an error if removal or creation fails.
    pub async fn ensure_empty_dir(&self, path: impl AsRef<Path>) -> Result<SandboxedPath> {
        let path = path.as_ref();
        self.remove_dir_all(path).await?;
        self.create_dir_all(path).await
    }

    /// Write a file, creating parent directories as needed
    ///
    /// # Errors
    ///
    /// Returns an error if the path escapes the sandbox or the write fails.
    pub async fn write(
        &self,
        path: impl AsRef<Path>,
        contents: impl AsRef<[u8]>,
    ) -> Result<SandboxedPath> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent).await?;
        }
        let target = self.join_within_root(path)?;
        fs::write(target.path(), contents)
            .await
            .map_err(|e| Error::io_with_path(&e, target.path()))?;
        Ok(target)
    }

    /// Rename a file or directory within the sandbox
    ///
    /// # Errors
    ///
    /// Returns an error if either side escapes the sandbox, the source is
    /// missing, or the rename fails.
    pub async fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
        let to = to.as_ref();
        if let Some(parent) = to.parent() {
            self.create_dir_all(parent).await?;
        }
        let source = self.resolve_existing(from)?;
        let destination = self.join_within_root(to)?;
        fs::rename(source.path(), destination.path())
            .await
            .map_err(|e| {
                SandboxError::Io {
                    path: destination.path().display().to_string(),
                    message: format!("rename failed: {e}"),
                }
                .into()
            })
    }

    /// Move every file under `from` into the same relative place under `to`
    ///
    /// Files already present at the destination are kept and the staged
    /// copy is dropped, so merging the same content twice is harmless.
    /// Returns the number of files moved.
    ///
    /// # Errors
    ///
    /// Returns an error if either tree escapes the sandbox or a move fails.
    pub async fn merge_directory(
        &self,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
    ) -> Result<u64> {
        self.merge_tree(from.as_ref(), to.as_ref()).await
    }

    async fn merge_tree(&self, from: &Path, to: &Path) -> Result<u64> {
        let source = self.resolve_existing(from)?;
        let destination = self.create_dir_all(to).await?;

        let mut moved = 0;
        let mut entries = fs::read_dir(source.path())
            .await
            .map_err(|e| Error::io_with_path(&e, source.path()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io_with_path(&e, source.path()))?
        {
            let name = entry.file_name();
            let from_rel = source.relative().join(&name);
            let to_rel = destination.relative().join(&name);

            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Error::io_with_path(&e, entry.path()))?;

            if file_type.is_dir() {
                moved += Box::pin(self.merge_tree(&from_rel, &to_rel)).await?;
            } else if self.join_within_root(&to_rel)?.existed() {
                tracing::debug!(path = %to_rel.display(), "keeping existing file");
            } else {
                self.rename(&from_rel, &to_rel).await?;
                moved += 1;
            }
        }

        Ok(moved)
    }

    /// Recursively copy a directory from this sandbox into `target`
    ///
    /// Each entry is confined on both sides before it is read or written.
    /// Linked directories are not descended into. Returns the number of
    /// files copied.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry resolves outside either sandbox or an
    /// I/O operation fails.
    pub async fn copy_directory(
        &self,
        src: impl AsRef<Path>,
        target: &Sandbox,
        dst: impl AsRef<Path>,
    ) -> Result<u64> {
        self.copy_tree(src.as_ref(), target, dst.as_ref()).await
    }

    async fn copy_tree(&self, src: &Path, target: &Sandbox, dst: &Path) -> Result<u64> {
        let source = self.resolve_existing(src)?;
        let destination = target.create_dir_all(dst).await?;

        let mut copied = 0;
        let mut entries = fs::read_dir(source.path())
            .await
            .map_err(|e| Error::io_with_path(&e, source.path()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io_with_path(&e, source.path()))?
        {
            let name = entry.file_name();
            let src_rel = source.relative().join(&name);
            let dst_rel = destination.relative().join(&name);

            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Error::io_with_path(&e, entry.path()))?;
            let src_entry = self.resolve_existing(&src_rel)?;

            if file_type.is_dir() {
                copied += Box::pin(self.copy_tree(&src_rel, target, &dst_rel)).await?;
            } else if src_entry.path().is_dir() {
                tracing::debug!(path = %src_rel.display(), "skipping linked directory");
            } else {
                let dst_entry = target.join_within_root(&dst_rel)?;
                fs::copy(src_entry.path(), dst_entry.path())
                    .await
                    .map_err(|e| Error::io_with_path(&e, dst_entry.path()))?;
                copied += 1;
            }
        }

        Ok(copied)
    }
}
