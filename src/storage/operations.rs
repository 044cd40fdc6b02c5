//! Storage operations
//!
//! File area operations behind `/dir`, `/store` and `/get`.

use log::{error, info};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::transfer::STAGING_DIR;

/// Creates the storage directory if it does not exist yet.
pub async fn ensure_storage_dir(root: &Path) -> io::Result<()> {
    fs::create_dir_all(root).await
}

/// Lists the names stored under `root`, sorted. The staging directory of
/// uploads in progress is hidden.
pub async fn list_directory(root: &Path) -> io::Result<Vec<String>> {
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            error!("Failed to list directory {}: {}", root.display(), e);
            return Err(e);
        }
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name != STAGING_DIR {
            names.push(name);
        }
    }
    names.sort();

    info!("Listed directory {} - {} entries", root.display(), names.len());
    Ok(names)
}

/// Maps a filename from the wire onto the storage directory.
///
/// The name is used verbatim; `..` components are not rejected.
pub fn resolve_file(root: &Path, filename: &str) -> PathBuf {
    root.join(filename)
}

/// Resolves a file for `/get`, returning `None` when nothing is stored under that name.
pub async fn prepare_file_retrieval(root: &Path, filename: &str) -> Option<PathBuf> {
    let path = resolve_file(root, filename);
    match fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => Some(path),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_sorted_names_without_staging_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(dir.path().join(STAGING_DIR)).unwrap();
        std::fs::write(dir.path().join(STAGING_DIR).join("c.txt.1-0"), b"partial").unwrap();

        let names = list_directory(dir.path()).await.unwrap();
        assert_eq!(names, vec!["a.txt".to_string(), "b.txt".to_string()]);
    }

    #[tokio::test]
    async fn user_files_named_like_partials_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("backup.part"), b"hello").unwrap();

        let names = list_directory(dir.path()).await.unwrap();
        assert_eq!(names, vec!["backup.part".to_string()]);
    }

    #[tokio::test]
    async fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let names = list_directory(&dir.path().join("absent")).await.unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn retrieval_requires_a_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("here.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("folder")).unwrap();

        assert!(prepare_file_retrieval(dir.path(), "here.txt").await.is_some());
        assert!(prepare_file_retrieval(dir.path(), "gone.txt").await.is_none());
        assert!(prepare_file_retrieval(dir.path(), "folder").await.is_none());
    }
}
