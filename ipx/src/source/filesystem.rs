//! Local filesystem supplier: resolves an id under a root directory with
//! traversal protection (§4.2).
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::{SourceDescriptor, Supplier};
use crate::error::IpxError;

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Serves files from under `root`. `root` is canonicalized once at
/// construction so every later prefix check is a plain path comparison.
pub struct FilesystemSupplier {
    root: PathBuf,
    max_age: u32,
}

impl FilesystemSupplier {
    pub fn new(root: impl AsRef<Path>, max_age: u32) -> std::io::Result<FilesystemSupplier> {
        let root = std::fs::canonicalize(root)?;
        Ok(FilesystemSupplier { root, max_age })
    }

    fn resolve_fs_path(&self, id: &str) -> Result<PathBuf, IpxError> {
        // The colon after a Windows drive letter (`C:`) is legitimate; the
        // forbidden-character check below only applies to the part of the
        // path after that prefix.
        let check_target = strip_windows_drive_prefix(id);
        if check_target.contains(FORBIDDEN_CHARS) {
            return Err(IpxError::Forbidden("Forbidden path".to_string()));
        }

        let joined = join_under_root(&self.root, id);
        let resolved = normalize_lexically(&joined);

        if !resolved.starts_with(&self.root) {
            return Err(IpxError::Forbidden("Forbidden path".to_string()));
        }

        Ok(resolved)
    }
}

#[async_trait]
impl Supplier for FilesystemSupplier {
    async fn resolve(&self, id: &str, _bypass_domain: bool) -> Result<SourceDescriptor, IpxError> {
        let fs_path = self.resolve_fs_path(id)?;

        let meta = tokio::fs::metadata(&fs_path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                IpxError::NotFound("File not found".to_string())
            } else {
                IpxError::Forbidden(format!("File access error {}", err))
            }
        })?;

        if !meta.is_file() {
            return Err(IpxError::BadRequest("Path should be a file".to_string()));
        }

        let mtime = meta.modified().ok();
        let max_age = self.max_age;
        let read_path = fs_path.clone();

        Ok(SourceDescriptor::new(mtime, Some(max_age), move || {
            let read_path = read_path.clone();
            async move {
                let bytes = tokio::fs::read(&read_path).await.map_err(IpxError::from)?;
                Ok(Bytes::from(bytes))
            }
        }))
    }
}

fn strip_windows_drive_prefix(id: &str) -> &str {
    let bytes = id.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        &id[2..]
    } else {
        id
    }
}

fn join_under_root(root: &Path, id: &str) -> PathBuf {
    let id = id.strip_prefix('/').unwrap_or(id);
    root.join(id)
}

/// Resolve `.` and `..` components lexically, without requiring the path to
/// exist (`Path::canonicalize` would fail on a nonexistent file).
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            },
            Component::CurDir => {},
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, FilesystemSupplier) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), b"fake-png-bytes").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let supplier = FilesystemSupplier::new(dir.path(), 300).unwrap();
        (dir, supplier)
    }

    #[tokio::test]
    async fn serves_a_file_under_root() {
        let (_dir, supplier) = fixture();
        let descriptor = supplier.resolve("/logo.png", false).await.unwrap();
        assert_eq!(descriptor.data().await.unwrap().as_ref(), b"fake-png-bytes");
        assert!(descriptor.mtime.is_some());
        assert_eq!(descriptor.max_age, Some(300));
    }

    #[tokio::test]
    async fn rejects_traversal_outside_root() {
        let (_dir, supplier) = fixture();
        let err = supplier.resolve("/../etc/passwd", false).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn rejects_forbidden_characters() {
        let (_dir, supplier) = fixture();
        let err = supplier.resolve("/lo<go.png", false).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let (_dir, supplier) = fixture();
        let err = supplier.resolve("/nope.png", false).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn directory_is_400() {
        let (_dir, supplier) = fixture();
        let err = supplier.resolve("/sub", false).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
