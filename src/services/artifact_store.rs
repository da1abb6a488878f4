//! Read-side access to finalized artifacts.
//!
//! The store never mutates what it serves; concurrent downloads need no
//! locking. Window reads are exposed as bounded streams so arbitrarily
//! large artifacts download under fixed memory.

use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, SeekFrom, Take},
};
use tokio_util::io::ReaderStream;

/// Buffer size for ranged reads; each stream item is at most this large.
const WINDOW_BUF_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("artifact `{0}` not found")]
    NotFound(String),
    #[error("invalid artifact name")]
    InvalidName,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type DownloadResult<T> = Result<T, DownloadError>;

/// Serves finalized artifacts from the permanent storage root.
#[derive(Clone)]
pub struct ArtifactStore {
    /// Base directory on disk where finalized artifacts live.
    pub root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open an artifact for reading and report its length.
    ///
    /// An artifact deleted between listing and serving surfaces as
    /// `NotFound`, not as an I/O failure.
    pub async fn open(&self, name: &str) -> DownloadResult<(File, u64)> {
        self.ensure_name_safe(name)?;
        let path = self.root.join(name);

        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                DownloadError::NotFound(name.to_string())
            } else {
                DownloadError::Io(err)
            }
        })?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(DownloadError::NotFound(name.to_string()));
        }
        Ok((file, meta.len()))
    }

    /// Length of an artifact without opening a read stream.
    pub async fn length(&self, name: &str) -> DownloadResult<u64> {
        let (_, length) = self.open(name).await?;
        Ok(length)
    }

    /// Turn an opened artifact into a stream of the inclusive byte window
    /// `[start, end]`. The caller must have validated the window against
    /// the artifact length.
    pub async fn window_stream(
        mut file: File,
        start: u64,
        end: u64,
    ) -> io::Result<ReaderStream<Take<File>>> {
        file.seek(SeekFrom::Start(start)).await?;
        let limited = file.take(end - start + 1);
        Ok(ReaderStream::with_capacity(limited, WINDOW_BUF_BYTES))
    }

    /// Stream the whole artifact in bounded reads.
    pub fn full_stream(file: File) -> ReaderStream<File> {
        ReaderStream::with_capacity(file, WINDOW_BUF_BYTES)
    }

    /// Artifact names are flat file names under the storage root; reject
    /// anything that could reach outside it.
    fn ensure_name_safe(&self, name: &str) -> DownloadResult<()> {
        if name.is_empty() {
            return Err(DownloadError::InvalidName);
        }
        if name.starts_with('/') || name.contains("..") {
            return Err(DownloadError::InvalidName);
        }
        if name
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(DownloadError::InvalidName);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::TempDir;
    use tokio::fs;

    async fn collect(mut stream: impl futures::Stream<Item = io::Result<bytes::Bytes>> + Unpin) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn open_reports_length_and_missing_artifacts() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("a.txt"), b"hello").await.unwrap();
        let store = ArtifactStore::new(root.path());

        let (_, length) = store.open("a.txt").await.unwrap();
        assert_eq!(length, 5);

        assert!(matches!(
            store.open("gone.txt").await,
            Err(DownloadError::NotFound(_))
        ));
        assert!(matches!(
            store.open("../a.txt").await,
            Err(DownloadError::InvalidName)
        ));
    }

    #[tokio::test]
    async fn window_stream_yields_exactly_the_window() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("f.txt"), b"abcdef").await.unwrap();
        let store = ArtifactStore::new(root.path());

        let (file, _) = store.open("f.txt").await.unwrap();
        let stream = ArtifactStore::window_stream(file, 2, 4).await.unwrap();
        assert_eq!(collect(stream).await, b"cde");
    }

    #[tokio::test]
    async fn non_overlapping_windows_reassemble_the_artifact() {
        let root = TempDir::new().unwrap();
        let content: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        fs::write(root.path().join("big.bin"), &content).await.unwrap();
        let store = ArtifactStore::new(root.path());

        let mut reassembled = Vec::new();
        for (start, end) in [(0u64, 499u64), (500, 899), (900, 999)] {
            let (file, length) = store.open("big.bin").await.unwrap();
            assert_eq!(length, 1000);
            let stream = ArtifactStore::window_stream(file, start, end).await.unwrap();
            reassembled.extend(collect(stream).await);
        }
        assert_eq!(reassembled, content);
    }
}
