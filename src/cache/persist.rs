//! Reading and writing a bucket's whole dataset as one JSON document
//!
//! Every save rewrites the entire file. That keeps the on-disk format trivial
//! but makes each mutation cost one full bucket rewrite, so buckets are meant
//! to stay small to moderate in size.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use tracing::debug;

use super::entry::CacheEntry;
use super::error::{CacheError, Result};

/// The in-memory contents of one bucket
pub type BucketData = HashMap<String, CacheEntry>;

/// Loads a bucket file, returning an empty map if the file does not exist
pub fn load(path: &Path) -> Result<BucketData> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(target: "filecache", path = %path.display(), "no cache file yet, starting empty");
            return Ok(BucketData::new());
        }
        Err(source) => {
            return Err(CacheError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let data: BucketData =
        serde_json::from_slice(&content).map_err(|source| CacheError::DecodeFile {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(
        target: "filecache",
        path = %path.display(),
        entries = data.len(),
        "loaded cache file"
    );
    Ok(data)
}

/// Replaces the bucket file with the full contents of `data`
pub fn save(path: &Path, data: &BucketData) -> Result<()> {
    let write_err = |source: std::io::Error| CacheError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, data).map_err(|source| CacheError::EncodeFile {
        path: path.to_path_buf(),
        source,
    })?;
    writer.write_all(b"\n").map_err(write_err)?;
    writer.flush().map_err(write_err)?;

    debug!(
        target: "filecache",
        path = %path.display(),
        entries = data.len(),
        "saved cache file"
    );
    Ok(())
}
