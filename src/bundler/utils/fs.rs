//! File system utilities for image building.
//!
//! Provides the file operations the build steps perform on the host and on
//! the mounted volume, with path-annotated errors.

use crate::bundler::error::{Error, ErrorExt, Result};
use std::{io, path::Path};
use tokio::fs;

/// Bytes in one megabyte as `du -m` counts them.
const MEGABYTE: u64 = 1024 * 1024;

/// Creates a single directory. Fails if it already exists.
pub async fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir(path)
        .await
        .fs_context("creating directory", path)
}

/// Removes a file, treating a missing file as success.
pub async fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()), // Idempotent
        Err(e) => Err(Error::Fs {
            context: "removing file".into(),
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Makes a symbolic link at `link` pointing to `target`.
///
/// The target is stored as given and need not exist.
#[cfg(unix)]
pub async fn symlink(target: &Path, link: &Path) -> Result<()> {
    fs::symlink(target, link)
        .await
        .fs_context("creating symbolic link", link)
}

/// Makes a symbolic link at `link` pointing to `target`.
#[cfg(not(unix))]
pub async fn symlink(_target: &Path, link: &Path) -> Result<()> {
    Err(Error::GenericError(format!(
        "cannot create {}: symbolic links need a Unix host",
        link.display()
    )))
}

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.exists() {
        return Err(Error::GenericError(format!("{from:?} does not exist")));
    }
    if !from.is_file() {
        return Err(Error::GenericError(format!("{from:?} is not a file")));
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating directory", dest_dir)?;
    }
    fs::copy(from, to).await.fs_context("copying file", from)?;
    Ok(())
}

/// Disk usage of a file or directory tree in whole megabytes, rounded up.
///
/// Counts apparent file sizes without following symbolic links, so a
/// bundle's size matches what `cp -R` will write.
pub async fn disk_usage_mb(path: &Path) -> Result<u64> {
    let root = path.to_path_buf();

    // Offload blocking work to dedicated thread pool
    let bytes = tokio::task::spawn_blocking(move || -> Result<u64> {
        let mut total = 0u64;
        for entry in walkdir::WalkDir::new(&root).follow_links(false) {
            let entry = entry?;
            if entry.file_type().is_file() {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    })
    .await
    .map_err(|e| Error::GenericError(format!("Disk usage task panicked: {e}")))??;

    Ok(bytes.div_ceil(MEGABYTE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disk_usage_rounds_up_to_megabytes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), vec![0u8; 10]).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/b.bin"), vec![0u8; MEGABYTE as usize]).unwrap();

        assert_eq!(disk_usage_mb(dir.path()).await.unwrap(), 2);
        assert_eq!(disk_usage_mb(&dir.path().join("a.bin")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_tree_uses_no_space() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(disk_usage_mb(dir.path()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn copy_file_creates_parents_and_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("bg.png");
        std::fs::write(&src, b"png").unwrap();

        let dest = dir.path().join(".background/bg.png");
        copy_file(&src, &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"png");

        assert!(copy_file(dir.path(), &dir.path().join("x")).await.is_err());
    }

    #[tokio::test]
    async fn remove_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmp.dmg");
        std::fs::write(&path, b"").unwrap();

        remove_file(&path).await.unwrap();
        remove_file(&path).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn create_dir_fails_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".background");
        create_dir(&path).await.unwrap();
        assert!(matches!(create_dir(&path).await, Err(Error::Fs { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_may_dangle() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("Applications");
        symlink(Path::new("/Applications"), &link).await.unwrap();
        assert_eq!(std::fs::read_link(&link).unwrap(), Path::new("/Applications"));
    }
}
