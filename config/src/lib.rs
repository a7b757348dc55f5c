//! Load configuration from a project `.env` and apply it to the process
//! environment with priority: **existing env > .env**.
//!
//! Also exposes the env-file primitives the credential manager uses to
//! re-read and upsert `WARP_JWT` / `WARP_REFRESH_TOKEN` at runtime.

mod env_file;

use std::path::Path;
use thiserror::Error;

pub use env_file::{env_file_var, read_env_file, upsert_env_var};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
}

/// Loads the project `.env` and sets environment variables only for keys that
/// are **not** already set (existing env has highest priority).
///
/// * `override_dir`: if `Some`, look for `.env` in this directory instead of
///   `std::env::current_dir()`.
pub fn load_and_apply(override_dir: Option<&Path>) -> Result<(), LoadError> {
    let dir = override_dir
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok());
    let Some(dir) = dir else {
        return Ok(());
    };
    let map = env_file::read_env_file(&dir.join(".env")).map_err(LoadError::DotenvRead)?;
    for (key, value) in map {
        if std::env::var(&key).is_err() {
            std::env::set_var(&key, value);
        }
    }
    Ok(())
}

/// Reads an env var and parses it, falling back to `default` when absent or
/// unparsable. Used for the retry/delay knobs.
pub fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// True when `key` is set to a truthy marker (`1`, `true`, `yes`, any case).
pub fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
