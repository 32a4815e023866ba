//! Subprocess execution behind the `CommandRunner` port.

pub mod shell_runner;

pub use shell_runner::ShellCommandRunner;
