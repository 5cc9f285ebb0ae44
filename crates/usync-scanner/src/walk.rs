use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Result, ScannerError};

//--------------------------------------------------------------------------------------------------
// Type Definitions
//--------------------------------------------------------------------------------------------------

const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// One observed file, hashed and ready to be compared against the store.
/// `relative_path` is always POSIX-form, even on a platform whose
/// native path separator differs.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub relative_path: String,
    pub size: u64,
    pub content_hash: [u8; 32],
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Walks `root`, returning every regular file as a [`ScannedFile`] in
/// canonical order: byte-wise ascending on the POSIX relative path.
/// Symlinks are followed only when they resolve inside `root`; any that
/// escape it are skipped with a warning rather than followed.
pub async fn walk_folder(root: &Path) -> Result<Vec<ScannedFile>> {
    let root = root.to_path_buf();
    let canonical_root = tokio::fs::canonicalize(&root).await.map_err(|e| ScannerError::Walk {
        path: root.display().to_string(),
        source: e,
    })?;

    let mut out = Vec::new();
    let mut stack = vec![canonical_root.clone()];
    while let Some(dir) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| ScannerError::Walk {
            path: dir.display().to_string(),
            source: e,
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| ScannerError::Walk {
            path: dir.display().to_string(),
            source: e,
        })? {
            let path = entry.path();
            let metadata = entry.metadata().await.map_err(|e| ScannerError::Walk {
                path: path.display().to_string(),
                source: e,
            })?;

            if metadata.is_symlink() {
                match tokio::fs::canonicalize(&path).await {
                    Ok(target) if target.starts_with(&canonical_root) => {
                        let target_meta = tokio::fs::metadata(&target).await.map_err(|e| ScannerError::Walk {
                            path: target.display().to_string(),
                            source: e,
                        })?;
                        if target_meta.is_dir() {
                            stack.push(path);
                        } else {
                            out.push(hash_file(&canonical_root, &path, target_meta.len()).await?);
                        }
                    }
                    Ok(target) => {
                        tracing::warn!(?path, ?target, "skipping symlink that escapes folder root");
                    }
                    Err(e) => {
                        tracing::warn!(?path, error = %e, "skipping unresolvable symlink");
                    }
                }
                continue;
            }

            if metadata.is_dir() {
                stack.push(path);
            } else if metadata.is_file() {
                out.push(hash_file(&canonical_root, &path, metadata.len()).await?);
            }
        }
    }

    out.sort_by(|a, b| a.relative_path.as_bytes().cmp(b.relative_path.as_bytes()));
    Ok(out)
}

async fn hash_file(root: &Path, path: &Path, size: u64) -> Result<ScannedFile> {
    use tokio::io::AsyncReadExt;

    let relative_path = relative_posix_path(root, path);
    let mut file = tokio::fs::File::open(path).await.map_err(|e| ScannerError::Walk {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await.map_err(|e| ScannerError::Walk {
            path: path.display().to_string(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(ScannedFile { relative_path, size, content_hash: hasher.finalize().into() })
}

fn relative_posix_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn walks_files_in_canonical_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.txt", "sub/c.txt"] {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            let mut f = std::fs::File::create(&path).unwrap();
            f.write_all(name.as_bytes()).unwrap();
        }

        let files = walk_folder(dir.path()).await.unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.relative_path.clone()).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt", "sub/c.txt"]);
    }

    #[tokio::test]
    async fn computes_sha256_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), b"hello world").unwrap();

        let files = walk_folder(dir.path()).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 11);

        let mut hasher = Sha256::new();
        hasher.update(b"hello world");
        let expected: [u8; 32] = hasher.finalize().into();
        assert_eq!(files[0].content_hash, expected);
    }
}
