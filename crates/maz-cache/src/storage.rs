//! Binary persistence for cache files
//!
//! Payloads are CBOR encoded (self-describing, so arbitrary JSON object trees
//! survive the round trip), optionally gzip compressed, and always written to a
//! temporary sibling first and renamed over the destination.

use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Write},
    path::{Path, PathBuf},
    thread,
    time::{Duration, SystemTime},
};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::{CacheError, Result};

/// Owner read/write only
pub const FILE_MODE: u32 = 0o600;

/// Owner-only directory
pub const DIR_MODE: u32 = 0o700;

/// Backoff applied when the final rename fails
#[derive(Debug, Clone)]
pub struct RenameRetry {
    /// Total rename attempts
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RenameRetry {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RenameRetry {
    /// Delay after the given failed attempt (0-based), doubling each time
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Serialize `data` to `path` atomically.
pub fn save<T: Serialize + ?Sized>(
    path: &Path,
    data: &T,
    permissions: u32,
    compress: bool,
) -> Result<()> {
    save_with_retry(path, data, permissions, compress, &RenameRetry::default())
}

pub fn save_with_retry<T: Serialize + ?Sized>(
    path: &Path,
    data: &T,
    permissions: u32,
    compress: bool,
    retry: &RenameRetry,
) -> Result<()> {
    let bytes = encode(data, compress)?;
    ensure_parent_dir(path)?;

    let tmp_path = temp_sibling(path);
    write_file(&tmp_path, &bytes, permissions)?;

    let mut attempt = 0;
    loop {
        match fs::rename(&tmp_path, path) {
            Ok(()) => break,
            Err(e) if attempt + 1 < retry.attempts => {
                let delay = retry.delay(attempt);
                warn!(
                    "Rename {} -> {} failed (attempt {}/{}), retrying in {:?}: {}",
                    tmp_path.display(),
                    path.display(),
                    attempt + 1,
                    retry.attempts,
                    delay,
                    e
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(CacheError::io(path, e));
            }
        }
    }

    debug!(path = %path.display(), bytes = bytes.len(), compress, "saved cache file");
    Ok(())
}

/// Read and decode a file written by [`save`].
pub fn load<T: DeserializeOwned>(path: &Path, compressed: bool) -> Result<T> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CacheError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(CacheError::io(path, e)),
    };
    if metadata.len() == 0 {
        return Err(CacheError::Corrupt {
            path: path.to_path_buf(),
            message: "file is empty".to_string(),
        });
    }

    let raw = fs::read(path).map_err(|e| CacheError::io(path, e))?;
    decode(&raw, compressed).map_err(|message| CacheError::Corrupt {
        path: path.to_path_buf(),
        message,
    })
}

/// Time since `path` was last modified, or `None` if it does not exist
pub fn file_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    )
}

/// Modification time of `path`, if it exists
pub fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Remove a file, treating "already gone" as success. Returns whether it existed.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

/// Create a directory tree with owner-only permissions
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(dir).map_err(|e| CacheError::io(dir, e))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_file(path: &Path, bytes: &[u8], permissions: u32) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(permissions);
    }
    let mut file: File = options.open(path).map_err(|e| CacheError::io(path, e))?;

    // mode() only applies on creation; a leftover temp file keeps its old bits
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(permissions))
            .map_err(|e| CacheError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = permissions;

    file.write_all(bytes).map_err(|e| CacheError::io(path, e))?;
    file.sync_all().map_err(|e| CacheError::io(path, e))
}

fn encode<T: Serialize + ?Sized>(data: &T, compress: bool) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    data.serialize(&mut serde_cbor::Serializer::new(&mut raw))
        .map_err(|e| CacheError::Serialization {
            message: e.to_string(),
        })?;
    if !compress {
        return Ok(raw);
    }
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder
        .write_all(&raw)
        .and_then(|_| encoder.finish())
        .map_err(|e| CacheError::Serialization {
            message: format!("gzip: {e}"),
        })
}

fn decode<T: DeserializeOwned>(raw: &[u8], compressed: bool) -> std::result::Result<T, String> {
    if compressed {
        let mut plain = Vec::new();
        GzDecoder::new(raw)
            .read_to_end(&mut plain)
            .map_err(|e| format!("gzip: {e}"))?;
        serde_cbor::from_slice(&plain).map_err(|e| e.to_string())
    } else {
        serde_cbor::from_slice(raw).map_err(|e| e.to_string())
    }
}
