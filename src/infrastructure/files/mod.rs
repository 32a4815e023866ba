//! Filesystem access behind the `ProjectFiles` port.

pub mod fs_project_files;

pub use fs_project_files::FsProjectFiles;
