//! Uploaded artifact storage
//!
//! Images and bootloader firmware live as plain files in the uploads
//! directory, which is also served read-only to devices. Each upload is
//! streamed to its own hidden partial file while hashing, verified, and only
//! then linked into place. Linking fails if the name already exists, so
//! concurrent uploads of one name never overwrite each other.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::error::ArtifactError;

/// Listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactInfo {
    pub name: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArtifact {
    pub name: String,
    pub size: u64,
    pub sha256: String,
}

/// Check an artifact name is a single, visible path component
pub fn validate_artifact_name(name: &str) -> Result<(), ArtifactError> {
    let valid = !name.is_empty()
        && name.len() <= 255
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(ArtifactError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Compute the SHA256 checksum of a file
pub async fn compute_checksum(path: &Path) -> Result<String, ArtifactError> {
    let io_err = |e: std::io::Error| ArtifactError::Io {
        path: path.to_path_buf(),
        error: e.to_string(),
    };

    let mut file = File::open(path).await.map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).await.map_err(io_err)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// The uploads directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of an existing artifact
    pub fn path(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        validate_artifact_name(name)?;
        let path = self.root.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ArtifactError::NotFound {
                name: name.to_string(),
            })
        }
    }

    /// Store an in-memory artifact
    pub async fn store(
        &self,
        name: &str,
        data: &[u8],
        expected_sha256: Option<&str>,
    ) -> Result<StoredArtifact, ArtifactError> {
        let chunks = futures::stream::once(async move { Ok::<_, std::io::Error>(data) });
        self.store_stream(name, expected_sha256, chunks).await
    }

    /// Stream an artifact to disk, verifying its checksum when one is given
    ///
    /// On any failure the partial file is removed and nothing new is visible
    /// under `name`. When two uploads of one name race, the first to finish
    /// wins and the other fails with `AlreadyExists`.
    pub async fn store_stream<S, B, E>(
        &self,
        name: &str,
        expected_sha256: Option<&str>,
        chunks: S,
    ) -> Result<StoredArtifact, ArtifactError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        validate_artifact_name(name)?;
        let dest = self.root.join(name);
        if dest.exists() {
            return Err(ArtifactError::AlreadyExists {
                name: name.to_string(),
            });
        }

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ArtifactError::Io {
                path: self.root.clone(),
                error: e.to_string(),
            })?;

        let partial = self.root.join(format!(".{name}.{}.partial", Uuid::new_v4()));
        let written = write_hashed(&partial, chunks).await;
        let (size, actual) = match written {
            Ok(done) => done,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        if let Some(expected) = expected_sha256 {
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                let _ = fs::remove_file(&partial).await;
                tracing::warn!(artifact = %name, expected = %expected, actual = %actual, "Upload checksum mismatch");
                return Err(ArtifactError::ChecksumMismatch {
                    name: name.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let linked = fs::hard_link(&partial, &dest).await;
        let _ = fs::remove_file(&partial).await;
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::warn!(artifact = %name, "Concurrent upload already stored this name");
                return Err(ArtifactError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            Err(e) => {
                return Err(ArtifactError::Io {
                    path: dest,
                    error: e.to_string(),
                });
            }
        }

        tracing::info!(artifact = %name, size, sha256 = %actual, "Artifact stored");
        Ok(StoredArtifact {
            name: name.to_string(),
            size,
            sha256: actual,
        })
    }

    /// All artifacts, sorted by name
    pub async fn list(&self) -> Result<Vec<ArtifactInfo>, ArtifactError> {
        let io_err = |e: std::io::Error| ArtifactError::Io {
            path: self.root.clone(),
            error: e.to_string(),
        };

        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if validate_artifact_name(&name).is_err() {
                continue;
            }
            let metadata = entry.metadata().await.map_err(io_err)?;
            if !metadata.is_file() {
                continue;
            }
            artifacts.push(ArtifactInfo {
                name,
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }
        artifacts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(artifacts)
    }

    pub async fn delete(&self, name: &str) -> Result<(), ArtifactError> {
        let path = self.path(name)?;
        fs::remove_file(&path).await.map_err(|e| ArtifactError::Io {
            path,
            error: e.to_string(),
        })?;
        tracing::info!(artifact = %name, "Artifact deleted");
        Ok(())
    }
}

async fn write_hashed<S, B, E>(path: &Path, chunks: S) -> Result<(u64, String), ArtifactError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let io_err = |e: std::io::Error| ArtifactError::Io {
        path: path.to_path_buf(),
        error: e.to_string(),
    };

    let mut file = File::create(path).await.map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut size: u64 = 0;

    futures::pin_mut!(chunks);
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| ArtifactError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        let bytes = chunk.as_ref();
        file.write_all(bytes).await.map_err(io_err)?;
        hasher.update(bytes);
        size += bytes.len() as u64;
    }

    file.flush().await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    Ok((size, hex::encode(hasher.finalize())))
}
