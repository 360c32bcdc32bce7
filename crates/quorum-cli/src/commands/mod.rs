//! CLI command implementations.
//!
//! # Exit Codes
//!
//! - 0: Success / authorization accepted
//! - 1: Error (unreadable input, invalid configuration, ...)
//! - 2: Authorization rejected

pub mod action;
pub mod bundle;
pub mod permit;
pub mod registry;

use std::path::Path;

use anyhow::{Context, Result};
use quorum_core::AuthorizationError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Exit codes shared by all commands.
pub mod exit_codes {
    /// Success exit code.
    pub const SUCCESS: u8 = 0;
    /// General error exit code.
    pub const ERROR: u8 = 1;
    /// Authorization rejected exit code.
    pub const REJECTED: u8 = 2;
}

/// Error body printed on stderr.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

/// Read and decode a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Encode `value` as pretty JSON and write it to `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("failed to encode JSON")?;
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to encode JSON")?
    );
    Ok(())
}

/// Report an error and return its exit code.
pub fn output_error(code: &str, message: &str, exit_code: u8) -> u8 {
    let error = ErrorResponse {
        code: code.to_string(),
        message: message.to_string(),
    };
    eprintln!(
        "{}",
        serde_json::to_string_pretty(&error).unwrap_or_else(|_| "{}".to_string())
    );
    exit_code
}

/// Map the result of a command body to an exit code.
///
/// Authorization rejections exit with [`exit_codes::REJECTED`]; any other
/// failure exits with [`exit_codes::ERROR`].
pub fn finish(result: Result<()>) -> u8 {
    match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => match err.downcast_ref::<AuthorizationError>() {
            Some(rejection) => {
                output_error(rejection.code(), &rejection.to_string(), exit_codes::REJECTED)
            },
            None => output_error("error", &format!("{err:#}"), exit_codes::ERROR),
        },
    }
}
