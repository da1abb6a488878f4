use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Permanent artifact storage root.
    pub storage_dir: String,
    /// Scratch root holding one directory per open upload session.
    pub upload_dir: String,
    /// Maximum accepted size of a single chunk body, in bytes.
    pub max_chunk_bytes: usize,
    /// Sessions older than this are reaped. 0 disables the sweep.
    pub session_ttl_secs: u64,
}

/// Negotiated with clients; matches the 4 MiB chunking the frontend produces.
const DEFAULT_MAX_CHUNK_BYTES: usize = 4 * 1024 * 1024;
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Chunked file-storage service with resumable transfers")]
pub struct Args {
    /// Host to bind to (overrides FILEDEPOT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILEDEPOT_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where finalized artifacts are stored (overrides FILEDEPOT_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Directory holding in-flight upload chunks (overrides FILEDEPOT_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Maximum chunk size in bytes (overrides FILEDEPOT_MAX_CHUNK_BYTES)
    #[arg(long)]
    pub max_chunk_bytes: Option<usize>,

    /// Upload session time-to-live in seconds, 0 to disable reaping
    /// (overrides FILEDEPOT_SESSION_TTL_SECS)
    #[arg(long)]
    pub session_ttl_secs: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("FILEDEPOT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("FILEDEPOT_PORT", 3000u16)?;
        let env_storage =
            env::var("FILEDEPOT_STORAGE_DIR").unwrap_or_else(|_| "./data/storage".into());
        let env_upload =
            env::var("FILEDEPOT_UPLOAD_DIR").unwrap_or_else(|_| "./data/uploads".into());
        let env_chunk = parse_env("FILEDEPOT_MAX_CHUNK_BYTES", DEFAULT_MAX_CHUNK_BYTES)?;
        let env_ttl = parse_env("FILEDEPOT_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            upload_dir: args.upload_dir.unwrap_or(env_upload),
            max_chunk_bytes: args.max_chunk_bytes.unwrap_or(env_chunk),
            session_ttl_secs: args.session_ttl_secs.unwrap_or(env_ttl),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
