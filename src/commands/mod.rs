//! CLI command implementations for unikv.
//!
//! - [`read`] - `get`, `scan`, `info`
//! - [`write`] - `set`, `batch-set`, `delete`, `delete-bucket`, `reap`
//!
//! The CLI moves text values. With the raw codec the UTF-8 bytes are stored
//! as-is; the other codecs store the string in their own encoding.

pub mod read;
pub mod write;

use crate::config::StoreConfig;
use crate::encoding::Codec;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "UNIKV_CONFIG";

/// Resolves the configuration file to load, if any.
///
/// Order: the explicit path, `$UNIKV_CONFIG`, then
/// `<config_dir>/unikv/config.toml` when it exists.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("unikv").join("config.toml"))
        .filter(|path| path.exists())
}

/// Loads the store configuration, falling back to a redb store in the
/// current directory.
///
/// # Errors
///
/// Returns an error if a resolved configuration file cannot be read or parsed.
pub fn load_config(explicit: Option<&Path>) -> Result<StoreConfig> {
    match config_path(explicit) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading store configuration");
            StoreConfig::load_from(&path)
                .with_context(|| format!("Failed to load config: {}", path.display()))
        },
        None => Ok(StoreConfig::default()),
    }
}

/// Parses a `KEY=VALUE` argument.
///
/// # Errors
///
/// Returns a message if the argument has no `=` or an empty key.
pub fn parse_pair(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Decodes stored bytes back into display text.
pub(crate) fn decode_text(codec: Codec, bytes: &[u8]) -> Result<String> {
    match codec {
        Codec::Raw => Ok(String::from_utf8_lossy(bytes).into_owned()),
        _ => Ok(codec.unmarshal::<String>(bytes)?),
    }
}
