//! Merges a complete chunk set into a single stored artifact.
//!
//! Chunks are concatenated in strictly increasing index order while a
//! SHA-256 digest is computed over the same bytes, a single pass over the
//! data. Output goes to a temporary name first and is renamed into place on
//! success, so a failed merge never leaves a plausible-looking artifact
//! under the final name.

use crate::models::artifact::FinalizedArtifact;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

/// File name of one chunk inside a session scratch directory.
///
/// Zero-padded so the scratch directory lists in merge order.
pub fn chunk_file_name(index: u64) -> String {
    format!("chunk_{:04}", index)
}

/// Concatenate `total_chunks` chunk files from `chunk_dir` into one artifact
/// under `storage_dir`, preferring `display_name` and disambiguating on
/// collision. The caller is responsible for having verified completeness.
pub async fn merge_session(
    chunk_dir: &Path,
    total_chunks: u64,
    storage_dir: &Path,
    display_name: &str,
) -> io::Result<FinalizedArtifact> {
    fs::create_dir_all(storage_dir).await?;
    let tmp_path = storage_dir.join(format!(".merge-{}", Uuid::new_v4()));

    let result = merge_into(chunk_dir, total_chunks, &tmp_path).await;
    let (size, digest_hex) = match result {
        Ok(out) => out,
        Err(err) => {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
    };

    let (final_path, final_name) = match free_artifact_name(storage_dir, display_name).await {
        Ok(resolved) => resolved,
        Err(err) => {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
    };
    if let Err(err) = fs::rename(&tmp_path, &final_path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err);
    }

    Ok(FinalizedArtifact {
        artifact_id: digest_hex.clone(),
        filename: final_name,
        size,
        sha256: digest_hex,
        path: final_path,
    })
}

/// Stream every chunk into `out_path`, hashing as bytes are written.
/// Returns the merged size and the hex digest.
async fn merge_into(
    chunk_dir: &Path,
    total_chunks: u64,
    out_path: &Path,
) -> io::Result<(u64, String)> {
    let mut out = File::create(out_path).await?;
    let mut hasher = Sha256::new();
    let mut size: u64 = 0;

    for index in 0..total_chunks {
        let chunk_path = chunk_dir.join(chunk_file_name(index));
        let bytes = fs::read(&chunk_path).await?;
        hasher.update(&bytes);
        size += bytes.len() as u64;
        out.write_all(&bytes).await?;
        debug!("merged chunk {}/{}", index + 1, total_chunks);
    }

    out.flush().await?;
    out.sync_all().await?;
    Ok((size, format!("{:x}", hasher.finalize())))
}

/// Pick a storage path for `display_name` that does not collide with an
/// existing artifact. Collisions get a `_<timestamp>_<counter>` suffix with
/// the extension preserved, as in `report_20260829_143502_1.pdf`.
async fn free_artifact_name(storage_dir: &Path, display_name: &str) -> io::Result<(PathBuf, String)> {
    let mut candidate = display_name.to_string();
    let mut path = storage_dir.join(&candidate);
    let mut counter = 1u32;

    while fs::try_exists(&path).await? {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        candidate = match display_name.rsplit_once('.') {
            Some((base, ext)) => format!("{}_{}_{}.{}", base, stamp, counter, ext),
            None => format!("{}_{}_{}", display_name, stamp, counter),
        };
        path = storage_dir.join(&candidate);
        counter += 1;
    }

    Ok((path, candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_chunks(dir: &Path, chunks: &[&[u8]]) {
        for (index, data) in chunks.iter().enumerate() {
            fs::write(dir.join(chunk_file_name(index as u64)), data)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn merges_in_index_order_and_hashes_once() {
        let scratch = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        write_chunks(scratch.path(), &[b"abc", b"def"]).await;

        let artifact = merge_session(scratch.path(), 2, storage.path(), "f.txt")
            .await
            .unwrap();

        assert_eq!(artifact.filename, "f.txt");
        assert_eq!(artifact.size, 6);
        let content = fs::read(&artifact.path).await.unwrap();
        assert_eq!(content, b"abcdef");
        let expected = format!("{:x}", Sha256::digest(b"abcdef"));
        assert_eq!(artifact.sha256, expected);
        assert_eq!(artifact.artifact_id, expected);
    }

    #[tokio::test]
    async fn collision_gets_a_fresh_name_and_keeps_both() {
        let scratch_a = TempDir::new().unwrap();
        let scratch_b = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        write_chunks(scratch_a.path(), &[b"first"]).await;
        write_chunks(scratch_b.path(), &[b"second"]).await;

        let first = merge_session(scratch_a.path(), 1, storage.path(), "f.txt")
            .await
            .unwrap();
        let second = merge_session(scratch_b.path(), 1, storage.path(), "f.txt")
            .await
            .unwrap();

        assert_eq!(first.filename, "f.txt");
        assert_ne!(second.filename, "f.txt");
        assert!(second.filename.ends_with(".txt"));
        assert_eq!(fs::read(&first.path).await.unwrap(), b"first");
        assert_eq!(fs::read(&second.path).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn missing_chunk_fails_without_leaving_an_artifact() {
        let scratch = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        // Chunk 1 is absent.
        write_chunks(scratch.path(), &[b"abc"]).await;

        let err = merge_session(scratch.path(), 2, storage.path(), "f.txt").await;
        assert!(err.is_err());

        let mut entries = fs::read_dir(storage.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }
}
