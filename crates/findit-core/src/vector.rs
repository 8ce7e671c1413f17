//! Flat vector index
//!
//! A brute-force nearest-neighbor scan over L2-normalized vectors, keyed by
//! clip id. Persistable to one file and rebuildable from the embedding blobs
//! stored in `clips.embedding`, which is the property search relies on after
//! a vectors-only reset.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use tracing::info;

use crate::embedding::{decode_embedding, l2_normalize};
use crate::error::{FindItError, Result};
use crate::model::ClipId;
use crate::providers::VectorIndex;

const MAGIC: &[u8; 4] = b"FVI1";

/// In-memory flat index over unit vectors
pub struct FlatVectorIndex {
    dimensions: usize,
    vectors: HashMap<ClipId, Vec<f32>>,
}

impl FlatVectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: HashMap::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Load a previously saved index file
    pub fn load(path: &Path) -> Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(FindItError::InvalidData(format!(
                "not a vector index file: {}",
                path.display()
            )));
        }

        let mut u64_buf = [0u8; 8];
        file.read_exact(&mut u64_buf)?;
        let dimensions = u64::from_le_bytes(u64_buf) as usize;
        file.read_exact(&mut u64_buf)?;
        let count = u64::from_le_bytes(u64_buf) as usize;

        let mut vectors = HashMap::with_capacity(count);
        for _ in 0..count {
            file.read_exact(&mut u64_buf)?;
            let clip_id = i64::from_le_bytes(u64_buf);
            let mut blob = vec![0u8; dimensions * 4];
            file.read_exact(&mut blob)?;
            vectors.insert(clip_id, decode_embedding(&blob)?);
        }

        Ok(Self {
            dimensions,
            vectors,
        })
    }

    /// Rebuild from stored `(clip_id, embedding-blob)` rows
    pub fn rebuild_from_blobs<I>(dimensions: usize, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (ClipId, Vec<u8>)>,
    {
        let mut index = Self::new(dimensions);
        for (clip_id, blob) in rows {
            let vector = decode_embedding(&blob)?;
            if vector.len() == dimensions {
                index.add(clip_id, &vector)?;
            }
        }
        info!("rebuilt vector index with {} entries", index.len());
        Ok(index)
    }
}

impl VectorIndex for FlatVectorIndex {
    fn add(&mut self, clip_id: ClipId, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(FindItError::InvalidData(format!(
                "vector has {} dimensions, index expects {}",
                vector.len(),
                self.dimensions
            )));
        }
        let mut v = vector.to_vec();
        l2_normalize(&mut v);
        self.vectors.insert(clip_id, v);
        Ok(())
    }

    fn remove(&mut self, clip_id: ClipId) {
        self.vectors.remove(&clip_id);
    }

    /// Top-k by cosine similarity, mapped onto [0,1]
    fn search(&self, query: &[f32], k: usize) -> Vec<(ClipId, f32)> {
        if query.len() != self.dimensions || k == 0 {
            return Vec::new();
        }
        let mut q = query.to_vec();
        l2_normalize(&mut q);

        let mut scored: Vec<(ClipId, f32)> = self
            .vectors
            .iter()
            .map(|(&id, v)| {
                let dot: f32 = v.iter().zip(&q).map(|(a, b)| a * b).sum();
                (id, (dot + 1.0) / 2.0)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(path)?;
        file.write_all(MAGIC)?;
        file.write_all(&(self.dimensions as u64).to_le_bytes())?;
        file.write_all(&(self.vectors.len() as u64).to_le_bytes())?;
        for (clip_id, vector) in &self.vectors {
            file.write_all(&clip_id.to_le_bytes())?;
            file.write_all(&crate::embedding::encode_embedding(vector))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_orders_by_similarity() {
        let mut index = FlatVectorIndex::new(2);
        index.add(1, &[1.0, 0.0]).unwrap();
        index.add(2, &[0.0, 1.0]).unwrap();
        index.add(3, &[-1.0, 0.0]).unwrap();

        let hits = index.search(&[1.0, 0.0], 3);
        assert_eq!(hits[0].0, 1);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(hits[2].0, 3);
        assert!(hits[2].1 < 1e-6);
        // All similarities inside [0,1]
        assert!(hits.iter().all(|(_, s)| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut index = FlatVectorIndex::new(3);
        assert!(index.add(1, &[1.0, 0.0]).is_err());
        assert!(index.search(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.idx");

        let mut index = FlatVectorIndex::new(4);
        index.add(10, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        index.add(20, &[0.0, 1.0, 0.0, 0.0]).unwrap();
        index.save(&path).unwrap();

        let loaded = FlatVectorIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimensions(), 4);
        let hits = loaded.search(&[1.0, 0.0, 0.0, 0.0], 1);
        assert_eq!(hits[0].0, 10);
    }

    #[test]
    fn test_rebuild_from_blobs_skips_wrong_width() {
        let rows = vec![
            (1_i64, crate::embedding::encode_embedding(&[1.0, 0.0])),
            (2_i64, crate::embedding::encode_embedding(&[1.0, 0.0, 0.0])),
        ];
        let index = FlatVectorIndex::rebuild_from_blobs(2, rows).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_load_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.idx");
        std::fs::write(&path, b"nope").unwrap();
        assert!(FlatVectorIndex::load(&path).is_err());
    }
}
