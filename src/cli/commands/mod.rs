//! One module per subcommand.

pub mod classify;
pub mod context;
pub mod fix;
pub mod init;
pub mod rules;
pub mod run;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

/// The argument itself, or stdin when it is `-`.
pub(crate) async fn read_arg_or_stdin(value: &str) -> Result<String> {
    if value != "-" {
        return Ok(value.to_string());
    }
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("Failed to read error text from stdin")?;
    Ok(text)
}
