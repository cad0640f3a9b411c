//! On-disk classification cache.
//!
//! One bincode file per (depth, move sequence) key. The key is stored inside
//! the file as well and checked on load, so a hash collision reads as a miss.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use chess_core::GameTimeline;

use crate::classifier::Classification;
use crate::error::CacheError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKey {
    pub depth: u32,
    /// FEN of the position before the first move
    pub start_fen: String,
    /// Coordinate moves of the whole game
    pub moves: Vec<String>,
}

impl CacheKey {
    pub fn new(depth: u32, start_fen: impl Into<String>, moves: Vec<String>) -> Self {
        Self {
            depth,
            start_fen: start_fen.into(),
            moves,
        }
    }

    /// Key for a whole loaded game.
    pub fn for_game(depth: u32, timeline: &GameTimeline) -> Self {
        Self::new(depth, timeline.positions()[0].fen.clone(), timeline.uci_moves())
    }

    /// Stable file name: FNV-1a of `"{depth}|{start fen}|{moves joined by space}"`.
    pub fn file_name(&self) -> String {
        let text = format!("{}|{}|{}", self.depth, self.start_fen, self.moves.join(" "));
        format!("{:016x}.bin", fnv1a(text.as_bytes()))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub classifications: Vec<Classification>,
}

/// Read-before-compute, write-after-compute storage for classifications.
pub trait ClassificationStore: Send + Sync {
    fn load(&self, key: &CacheKey) -> Option<Vec<Classification>>;

    fn store(
        &self,
        key: &CacheKey,
        classifications: &[Classification],
    ) -> Result<(), CacheError>;
}

/// Store that never hits and discards writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl ClassificationStore for NoCache {
    fn load(&self, _key: &CacheKey) -> Option<Vec<Classification>> {
        None
    }

    fn store(
        &self,
        _key: &CacheKey,
        _classifications: &[Classification],
    ) -> Result<(), CacheError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn read_entry(path: &Path) -> Result<CacheEntry, CacheError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

impl ClassificationStore for FileCache {
    fn load(&self, key: &CacheKey) -> Option<Vec<Classification>> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(path = %path.display(), "Cache miss");
            return None;
        }
        match Self::read_entry(&path) {
            Ok(entry) if entry.key == *key => {
                debug!(path = %path.display(), "Cache hit");
                Some(entry.classifications)
            }
            Ok(_) => {
                warn!(path = %path.display(), "Cache key mismatch, ignoring entry");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read cache entry");
                None
            }
        }
    }

    fn store(
        &self,
        key: &CacheKey,
        classifications: &[Classification],
    ) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");

        let entry = CacheEntry {
            key: key.clone(),
            classifications: classifications.to_vec(),
        };
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            bincode::serialize_into(&mut writer, &entry)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), moves = key.moves.len(), "Cached classifications");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn key(depth: u32) -> CacheKey {
        CacheKey::new(depth, START, vec!["e2e4".to_string(), "e7e5".to_string()])
    }

    #[test]
    fn test_file_name_stable_and_depth_sensitive() {
        assert_eq!(key(12).file_name(), key(12).file_name());
        assert_ne!(key(12).file_name(), key(14).file_name());
        assert!(key(12).file_name().ends_with(".bin"));
    }

    #[test]
    fn test_start_position_is_part_of_key() {
        let other_start = CacheKey::new(12, "4k3/8/8/8/8/8/8/4K2R w K - 0 1", key(12).moves);
        assert_ne!(other_start, key(12));
        assert_ne!(other_start.file_name(), key(12).file_name());

        let timeline = GameTimeline::from_san_moves(&["e4", "e5"]).unwrap();
        assert_eq!(CacheKey::for_game(12, &timeline), key(12));
    }

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_missing_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        assert!(cache.load(&key(10)).is_none());
    }

    #[test]
    fn test_corrupt_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        fs::write(cache.path_for(&key(10)), b"not bincode").unwrap();
        assert!(cache.load(&key(10)).is_none());
    }

    #[test]
    fn test_key_mismatch_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let other = CacheEntry {
            key: key(99),
            classifications: vec![],
        };
        fs::write(cache.path_for(&key(10)), bincode::serialize(&other).unwrap()).unwrap();
        assert!(cache.load(&key(10)).is_none());
    }

    #[test]
    fn test_store_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("nested").join("reviews"));
        cache.store(&key(8), &[]).unwrap();
        assert_eq!(cache.load(&key(8)), Some(vec![]));
    }
}
