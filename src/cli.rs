//! Command-line interface for inspecting and maintaining a cache directory
//!
//! Values are handled as raw JSON, so any bucket can be read or written from
//! the shell regardless of the Rust types the owning application uses.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;
use thiserror::Error;

use crate::cache::{CacheError, Cacher, CacherConfig};

/// Error types for running CLI commands
#[derive(Debug, Error)]
pub enum CliError {
    /// No --dir was given and the per-user cache directory is unknown
    #[error("Could not determine a cache directory; pass --dir")]
    NoCacheDir,

    /// The value given to `set` is not valid JSON
    #[error("Invalid JSON value: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// A cache operation failed
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Writing the command output failed
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// filecache - inspect and maintain a bucketed file cache
#[derive(Parser, Debug)]
#[command(name = "filecache")]
#[command(about = "Inspect and maintain a bucketed file cache")]
#[command(version)]
pub struct Cli {
    /// Cache directory (defaults to the per-user cache directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Bucket file extension
    #[arg(long, global = true, value_name = "EXT")]
    pub ext: Option<String>,

    /// Log cache activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the total size of the cache directory in bytes
    Size,
    /// Print a value as JSON; exits with status 1 if it is absent
    Get {
        bucket: String,
        key: String,
        /// Ignore the entry's expiration
        #[arg(long)]
        frozen: bool,
    },
    /// Store a JSON value, frozen unless --ttl is given
    Set {
        bucket: String,
        key: String,
        value: String,
        /// Time-to-live in seconds
        #[arg(long, value_name = "SECONDS")]
        ttl: Option<u64>,
    },
    /// Print every live entry of a bucket as a JSON object
    List { bucket: String },
    /// Delete one key
    Delete { bucket: String, key: String },
    /// Remove the expired entries of a bucket
    Clean { bucket: String },
    /// Remove every entry of a bucket
    Empty { bucket: String },
    /// Delete a bucket and its file
    RemoveBucket { bucket: String },
    /// Delete every bucket file whose name starts with a prefix
    Purge {
        /// File name prefix; all bucket files when omitted
        #[arg(long)]
        prefix: Option<String>,
    },
}

impl Cli {
    /// Resolves the cache configuration from --dir and --ext
    pub fn config(&self) -> Result<CacherConfig, CliError> {
        let config = match &self.dir {
            Some(dir) => CacherConfig::new(dir),
            None => CacherConfig::default_location().ok_or(CliError::NoCacheDir)?,
        };
        Ok(match &self.ext {
            Some(ext) => config.with_ext(ext),
            None => config,
        })
    }
}

/// Runs the parsed command, writing its output to `out`.
///
/// Returns `Ok(false)` when `get` found nothing.
pub fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<bool, CliError> {
    let cacher = Cacher::with_config(cli.config()?)?;

    match &cli.command {
        Command::Size => {
            writeln!(out, "{}", cacher.total_size()?)?;
        }
        Command::Get {
            bucket,
            key,
            frozen,
        } => {
            let value: Option<Value> = if *frozen {
                cacher.get_frozen(bucket, key)?
            } else {
                cacher.get(bucket, key)?
            };
            match value {
                Some(value) => writeln!(out, "{}", value)?,
                None => return Ok(false),
            }
        }
        Command::Set {
            bucket,
            key,
            value,
            ttl,
        } => {
            let value: Value = serde_json::from_str(value).map_err(CliError::InvalidJson)?;
            match ttl {
                Some(secs) => cacher.set(bucket, Duration::from_secs(*secs), key, &value)?,
                None => cacher.set_frozen(bucket, key, &value)?,
            }
        }
        Command::List { bucket } => {
            let all = cacher.get_all::<Value>(bucket)?;
            let sorted: std::collections::BTreeMap<_, _> = all.into_iter().collect();
            writeln!(out, "{}", Value::from_iter(sorted))?;
        }
        Command::Delete { bucket, key } => cacher.delete(bucket, key)?,
        Command::Clean { bucket } => cacher.clean_bucket(bucket)?,
        Command::Empty { bucket } => cacher.empty_bucket(bucket)?,
        Command::RemoveBucket { bucket } => {
            if !cacher.remove_bucket(bucket)? {
                writeln!(out, "bucket '{}' had no file", bucket)?;
            }
        }
        Command::Purge { prefix } => {
            let prefix = prefix.as_deref().unwrap_or("");
            let removed = cacher.remove_all_by(|name| name.starts_with(prefix))?;
            writeln!(out, "removed {} bucket file(s)", removed)?;
        }
    }

    Ok(true)
}
