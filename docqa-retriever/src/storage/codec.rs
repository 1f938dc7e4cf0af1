//! Binary encoding of document indexes.
//!
//! Vector file layout, all integers little-endian:
//!
//! ```text
//! magic      4 bytes   "DQVX"
//! version    u32
//! header_len u32
//! header     header_len bytes of JSON (`IndexHeader`)
//! vectors    count * dimension f16 values, row-major
//! ```
//!
//! The metadata file is a JSON array of chunks in vector order.

use crate::error::{Result, RetrievalError};
use crate::retrieval::{DocumentId, DocumentIndex};
use crate::storage::IndexHeader;
use docqa_context::Chunk;
use docqa_embed::EmbeddingModelMetadata;
use half::f16;

pub const MAGIC: &[u8; 4] = b"DQVX";
pub const FORMAT_VERSION: u32 = 1;

const PREAMBLE_LEN: usize = 12;

/// Serialized artifacts of one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedIndex {
    pub vectors: Vec<u8>,
    pub metadata: Vec<u8>,
}

pub fn encode_index(index: &DocumentIndex) -> Result<EncodedIndex> {
    let header = serde_json::to_vec(&IndexHeader::for_index(index))?;
    let header_len = u32::try_from(header.len())
        .map_err(|_| RetrievalError::corrupt(index.document_id().as_str(), "header too large"))?;

    let payload_len = index.len() * index.dimension() * std::mem::size_of::<f16>();
    let mut vectors = Vec::with_capacity(PREAMBLE_LEN + header.len() + payload_len);
    vectors.extend_from_slice(MAGIC);
    vectors.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    vectors.extend_from_slice(&header_len.to_le_bytes());
    vectors.extend_from_slice(&header);
    for vector in index.vectors() {
        if cfg!(target_endian = "little") {
            vectors.extend_from_slice(bytemuck::cast_slice(vector));
        } else {
            for value in vector {
                vectors.extend_from_slice(&value.to_le_bytes());
            }
        }
    }

    let chunks: Vec<&Chunk> = index.chunks().collect();
    let metadata = serde_json::to_vec_pretty(&chunks)?;

    Ok(EncodedIndex { vectors, metadata })
}

/// Parse the preamble and header, returning the header and the vector payload.
pub fn decode_header<'a>(
    document_id: &DocumentId,
    bytes: &'a [u8],
) -> Result<(IndexHeader, &'a [u8])> {
    let corrupt = |message: &str| RetrievalError::corrupt(document_id.as_str(), message);

    if bytes.len() < PREAMBLE_LEN {
        return Err(corrupt("file is truncated"));
    }
    if &bytes[..4] != MAGIC {
        return Err(corrupt("not a vector index file"));
    }
    let version = read_u32(&bytes[4..8]);
    if version != FORMAT_VERSION {
        return Err(RetrievalError::corrupt(
            document_id.as_str(),
            format!("unsupported format version {version}"),
        ));
    }
    let header_len = read_u32(&bytes[8..12]) as usize;
    let rest = &bytes[PREAMBLE_LEN..];
    if rest.len() < header_len {
        return Err(corrupt("header is truncated"));
    }

    let header: IndexHeader = serde_json::from_slice(&rest[..header_len])
        .map_err(|e| RetrievalError::corrupt(document_id.as_str(), format!("bad header: {e}")))?;
    if &header.document_id != document_id {
        return Err(RetrievalError::corrupt(
            document_id.as_str(),
            format!("file belongs to document '{}'", header.document_id),
        ));
    }
    if header.dimension != header.model.dimension {
        return Err(corrupt("header dimension disagrees with model metadata"));
    }
    if header.dimension == 0 {
        return Err(corrupt("header declares zero-dimensional vectors"));
    }

    Ok((header, &rest[header_len..]))
}

/// Decode both artifacts, rejecting them if they were built by another model.
pub fn decode_index(
    document_id: &DocumentId,
    encoded: &EncodedIndex,
    model: &EmbeddingModelMetadata,
) -> Result<DocumentIndex> {
    let (header, payload) = decode_header(document_id, &encoded.vectors)?;
    header.check_compatible(model)?;

    let payload_len = header
        .dimension
        .checked_mul(std::mem::size_of::<f16>())
        .and_then(|row_bytes| header.count.checked_mul(row_bytes))
        .ok_or_else(|| RetrievalError::corrupt(document_id.as_str(), "vector count overflows"))?;
    if payload.len() != payload_len {
        return Err(RetrievalError::corrupt(
            document_id.as_str(),
            format!(
                "expected {} vectors of dimension {}, payload has {} bytes",
                header.count,
                header.dimension,
                payload.len()
            ),
        ));
    }

    let row_bytes = header.dimension * std::mem::size_of::<f16>();
    let vectors: Vec<Vec<f16>> = payload
        .chunks_exact(row_bytes)
        .map(|row| {
            row.chunks_exact(2)
                .map(|b| f16::from_le_bytes([b[0], b[1]]))
                .collect()
        })
        .collect();

    let chunks: Vec<Chunk> = serde_json::from_slice(&encoded.metadata).map_err(|e| {
        RetrievalError::corrupt(document_id.as_str(), format!("bad chunk metadata: {e}"))
    })?;
    if chunks.len() != header.count {
        return Err(RetrievalError::corrupt(
            document_id.as_str(),
            format!(
                "{} chunk records for {} vectors",
                chunks.len(),
                header.count
            ),
        ));
    }

    DocumentIndex::from_parts(
        header.document_id,
        header.source_name,
        header.model,
        header.created_at,
        chunks,
        vectors,
    )
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}
