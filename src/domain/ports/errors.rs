use thiserror::Error;

/// Errors from the LLM port
#[derive(Debug, Error)]
pub enum LlmError {
    /// No client is configured (usually a missing API key)
    #[error("LLM client is not configured: {0}")]
    NotConfigured(String),

    /// The request failed after retries
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    /// The model answered with no text
    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Errors from running subprocesses
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The shell could not be started.
    #[error("Failed to spawn command `{command}`: {source}")]
    Spawn {
        /// Command line.
        command: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The command is not on the allow-list
    #[error("Command `{0}` is not on the allow-list")]
    NotAllowed(String),

    /// The command string was empty
    #[error("Command is empty")]
    EmptyCommand,
}

/// Errors from reading or writing project files
#[derive(Debug, Error)]
pub enum FileError {
    /// The path resolves outside the project root
    #[error("Path escapes the project root: {0}")]
    OutsideRoot(String),

    /// The file does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// Reading or writing failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Project-relative path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}
