//! Directory-backed index store.

use crate::error::{Result, RetrievalError};
use crate::retrieval::{DocumentId, DocumentIndex};
use crate::storage::codec::{self, EncodedIndex};
use crate::storage::{IndexHeader, IndexStore};
use async_trait::async_trait;
use docqa_embed::EmbeddingModelMetadata;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const VECTOR_EXTENSION: &str = "vidx";
const METADATA_SUFFIX: &str = "_meta.json";

/// Stores each document's artifacts as files in one directory.
///
/// Writes go to temporary files in the same directory and are renamed into
/// place, so a reader never observes a half-written artifact.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vector_path(&self, document_id: &DocumentId) -> PathBuf {
        self.root.join(format!("{document_id}.{VECTOR_EXTENSION}"))
    }

    pub fn metadata_path(&self, document_id: &DocumentId) -> PathBuf {
        self.root.join(format!("{document_id}{METADATA_SUFFIX}"))
    }

    async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_vectors(&self, document_id: &DocumentId) -> Result<Vec<u8>> {
        Self::read_optional(&self.vector_path(document_id))
            .await?
            .ok_or_else(|| RetrievalError::not_found(document_id.as_str()))
    }

    /// An orphaned vector file without its metadata is not an index.
    async fn require_metadata(&self, document_id: &DocumentId) -> Result<()> {
        if tokio::fs::try_exists(self.metadata_path(document_id)).await? {
            Ok(())
        } else {
            debug!("Vector file for {} has no chunk metadata", document_id);
            Err(RetrievalError::not_found(document_id.as_str()))
        }
    }

    async fn remove_if_present(path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_atomically(root: PathBuf, artifacts: Vec<(PathBuf, Vec<u8>)>) -> Result<()> {
    std::fs::create_dir_all(&root)?;

    // Stage everything before the first rename
    let mut staged = Vec::with_capacity(artifacts.len());
    for (path, bytes) in artifacts {
        let mut file = tempfile::NamedTempFile::new_in(&root)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        staged.push((file, path));
    }

    for (file, path) in staged {
        file.persist(&path).map_err(|e| e.error)?;
    }
    Ok(())
}

#[async_trait]
impl IndexStore for FileStore {
    async fn save(&self, index: &DocumentIndex) -> Result<()> {
        let EncodedIndex { vectors, metadata } = codec::encode_index(index)?;
        let document_id = index.document_id();
        let artifacts = vec![
            (self.vector_path(document_id), vectors),
            (self.metadata_path(document_id), metadata),
        ];

        let root = self.root.clone();
        tokio::task::spawn_blocking(move || write_atomically(root, artifacts))
            .await
            .map_err(|e| RetrievalError::Io {
                source: std::io::Error::other(e),
            })??;

        info!(
            "Saved index for {} ({} chunks) to {}",
            document_id,
            index.len(),
            self.root.display()
        );
        Ok(())
    }

    async fn load(
        &self,
        document_id: &DocumentId,
        model: &EmbeddingModelMetadata,
    ) -> Result<DocumentIndex> {
        let vectors = self.read_vectors(document_id).await?;

        // Fail on an incompatible model before touching the metadata file
        let (header, _) = codec::decode_header(document_id, &vectors)?;
        header.check_compatible(model)?;

        let metadata = Self::read_optional(&self.metadata_path(document_id))
            .await?
            .ok_or_else(|| RetrievalError::not_found(document_id.as_str()))?;

        let index = codec::decode_index(document_id, &EncodedIndex { vectors, metadata }, model)?;
        debug!("Loaded index for {} ({} chunks)", document_id, index.len());
        Ok(index)
    }

    async fn header(&self, document_id: &DocumentId) -> Result<IndexHeader> {
        let vectors = self.read_vectors(document_id).await?;
        self.require_metadata(document_id).await?;
        let (header, _) = codec::decode_header(document_id, &vectors)?;
        Ok(header)
    }

    async fn exists(&self, document_id: &DocumentId) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.vector_path(document_id)).await?
            && tokio::fs::try_exists(self.metadata_path(document_id)).await?)
    }

    async fn delete(&self, document_id: &DocumentId) -> Result<bool> {
        let vectors = Self::remove_if_present(&self.vector_path(document_id)).await?;
        let metadata = Self::remove_if_present(&self.metadata_path(document_id)).await?;
        if vectors || metadata {
            info!("Deleted index for {}", document_id);
        }
        Ok(vectors || metadata)
    }

    async fn list(&self) -> Result<Vec<DocumentId>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(VECTOR_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(id) = DocumentId::parse(stem) else {
                debug!("Ignoring unrecognized file {}", path.display());
                continue;
            };
            if tokio::fs::try_exists(self.metadata_path(&id)).await? {
                ids.push(id);
            } else {
                debug!("Ignoring {} without chunk metadata", path.display());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
