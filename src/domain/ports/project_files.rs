use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::errors::FileError;

/// Port for reading and writing files inside one project root.
///
/// Paths are project-relative. Implementations must refuse paths that
/// resolve outside the root.
#[async_trait]
pub trait ProjectFiles: Send + Sync {
    /// Root directory all relative paths resolve against.
    fn root(&self) -> &Path;

    /// Read a file relative to the root.
    async fn read(&self, path: &str) -> Result<String, FileError>;

    /// Create or overwrite a file, creating parent directories as needed.
    async fn write(&self, path: &str, content: &str) -> Result<(), FileError>;

    /// Whether a file exists relative to the root.
    async fn exists(&self, path: &str) -> bool;
}

/// Opens a [`ProjectFiles`] view for a project root.
///
/// Fix strategies serve many projects, so they receive the root through
/// the fix context and open files through this factory.
pub type ProjectFilesFactory = Arc<dyn Fn(&Path) -> Arc<dyn ProjectFiles> + Send + Sync>;
