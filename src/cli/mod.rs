//! Command-line interface.

pub(crate) mod app;
pub mod commands;
pub(crate) mod output;
pub mod types;

use console::style;

pub use types::{Cli, Commands};

/// Print `err` with its cause chain and exit with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": causes,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );
    } else {
        eprintln!("{} {err}", style("Error:").red().bold());
        for cause in causes {
            eprintln!("  {} {cause}", style("caused by:").dim());
        }
    }
    std::process::exit(1);
}
