//! `ProjectFiles` over the local filesystem.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::domain::ports::{FileError, ProjectFiles, ProjectFilesFactory};

/// Local filesystem access confined to one project root.
#[derive(Debug, Clone)]
pub struct FsProjectFiles {
    root: PathBuf,
}

impl FsProjectFiles {
    /// Files confined to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Factory handing out filesystem views per project root.
    pub fn factory() -> ProjectFilesFactory {
        Arc::new(|root: &Path| Arc::new(Self::new(root)) as Arc<dyn ProjectFiles>)
    }

    /// Resolve a project-relative (or in-root absolute) path.
    ///
    /// Rejects `..` segments that climb above the root and absolute paths
    /// elsewhere on disk. Resolution is lexical; symlinks are not followed.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, FileError> {
        let candidate = Path::new(path);
        let relative = if candidate.is_absolute() {
            candidate
                .strip_prefix(&self.root)
                .map_err(|_| FileError::OutsideRoot(path.to_string()))?
        } else {
            candidate
        };

        let mut resolved = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !resolved.pop() {
                        return Err(FileError::OutsideRoot(path.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(FileError::OutsideRoot(path.to_string()));
                }
            }
        }

        if resolved.as_os_str().is_empty() {
            return Err(FileError::OutsideRoot(path.to_string()));
        }
        Ok(self.root.join(resolved))
    }
}

#[async_trait]
impl ProjectFiles for FsProjectFiles {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn read(&self, path: &str) -> Result<String, FileError> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => FileError::NotFound(path.to_string()),
                _ => FileError::Io {
                    path: path.to_string(),
                    source,
                },
            })
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), FileError> {
        let full = self.resolve(path)?;
        let io_err = |source: std::io::Error| FileError::Io {
            path: path.to_string(),
            source,
        };
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&full, content).await.map_err(io_err)?;
        tracing::debug!(path = %path, bytes = content.len(), "Wrote project file");
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::try_exists(full).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_rejects_escapes() {
        let files = FsProjectFiles::new("/project");
        assert!(matches!(
            files.resolve("../etc/passwd"),
            Err(FileError::OutsideRoot(_))
        ));
        assert!(matches!(
            files.resolve("/etc/passwd"),
            Err(FileError::OutsideRoot(_))
        ));
        assert_eq!(
            files.resolve("src/../lib/a.js").unwrap(),
            PathBuf::from("/project/lib/a.js")
        );
        assert_eq!(
            files.resolve("/project/src/a.js").unwrap(),
            PathBuf::from("/project/src/a.js")
        );
    }

    #[tokio::test]
    async fn test_write_creates_parents_and_reads_back() {
        let dir = TempDir::new().unwrap();
        let files = FsProjectFiles::new(dir.path());

        files.write("src/deep/file.txt", "hello").await.unwrap();
        assert!(files.exists("src/deep/file.txt").await);
        assert_eq!(files.read("src/deep/file.txt").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let files = FsProjectFiles::new(dir.path());
        assert!(matches!(
            files.read("nope.txt").await,
            Err(FileError::NotFound(_))
        ));
        assert!(!files.exists("nope.txt").await);
    }
}
