// ============================================================
// Layer 4 — Shard Store
// ============================================================
// The full window collection is partitioned into S shard
// files, written once during the build phase and read many
// times during training.
//
// Assignment is by DOCUMENT position, never window position:
//
//   shard_index = floor(doc_index * S / total_docs)
//
// so every window cut from one document lands in the same
// shard, and re-running the build on an unchanged corpus gives
// the same document → shard mapping.
//
// On-disk layout:
//   data/tokenized/
//     tokenized_train_0.txt    ← one window per line,
//     tokenized_train_1.txt      C space-separated ids
//     ...
//     tokenized_train_{S-1}.txt
//     manifest.json            ← shard count, C, stride, counts
//
// The manifest lets training check that the shards were built
// for the model's context size BEFORE the first step, instead
// of failing on the first short row mid-run.
//
// Reference: Rust Book §12 (I/O and File Handling)
//            Rust Book §9 (Error Handling)

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    ops::Range,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::window::Window;

pub const MANIFEST_FILE: &str = "manifest.json";

/// File name of shard `index`
pub fn shard_file_name(index: usize) -> String {
    format!("tokenized_train_{index}.txt")
}

/// Shard that the document at raw position `doc_index` belongs to.
pub fn shard_of(doc_index: usize, shard_count: usize, total_docs: usize) -> usize {
    ((doc_index as u128 * shard_count as u128) / total_docs.max(1) as u128) as usize
}

/// Raw document positions assigned to shard `index`: exactly the
/// `d` with `shard_of(d) == index`, which is always contiguous.
pub fn shard_doc_range(index: usize, shard_count: usize, total_docs: usize) -> Range<usize> {
    if shard_count == 0 {
        return 0..0;
    }
    // d*S >= i*N  and  d*S < (i+1)*N
    let first = |i: usize| -> usize {
        let num = i as u128 * total_docs as u128;
        let s = shard_count as u128;
        ((num + s - 1) / s) as usize
    };
    first(index).min(total_docs)..first(index + 1).min(total_docs)
}

// ─── Manifest ─────────────────────────────────────────────────────────────────
/// Metadata persisted next to the shard files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardManifest {
    pub shard_count:   usize,
    pub context_size:  usize,
    pub stride:        usize,
    pub pad_id:        u32,
    /// Raw corpus entries, including those dropped by the length filter
    pub total_docs:    usize,
    pub kept_docs:     usize,
    /// Windows written into each shard, indexed by shard
    pub window_counts: Vec<usize>,
    /// Unix seconds at the end of the build
    pub built_at:      u64,
}

impl ShardManifest {
    pub fn total_windows(&self) -> usize {
        self.window_counts.iter().sum()
    }

    /// Refuse to train on shards built for a different shape.
    pub fn validate(&self, context_size: usize, shard_count: usize) -> Result<()> {
        if self.context_size != context_size {
            bail!(
                "Shards were built with context size {} but the model expects {}; \
                 rebuild the shards or fix the model config",
                self.context_size,
                context_size
            );
        }
        if self.shard_count != shard_count {
            bail!(
                "Shard directory holds {} shards but the run is configured for {}",
                self.shard_count,
                shard_count
            );
        }
        if self.window_counts.len() != self.shard_count {
            bail!(
                "Manifest lists {} window counts for {} shards",
                self.window_counts.len(),
                self.shard_count
            );
        }
        Ok(())
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write manifest '{}'", path.display()))?;
        Ok(())
    }

    /// Load the manifest, or `None` when the directory has none.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read manifest '{}'", path.display()))?;
        let manifest = serde_json::from_str(&json)
            .with_context(|| format!("Malformed manifest '{}'", path.display()))?;
        Ok(Some(manifest))
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ─── ShardWriter ──────────────────────────────────────────────────────────────
/// Writes shard files. Each shard is written in a single pass;
/// a failed write aborts the build, nothing is recovered.
pub struct ShardWriter {
    dir:         PathBuf,
    shard_count: usize,
}

impl ShardWriter {
    /// Create the shard directory (like `mkdir -p`).
    pub fn create(dir: impl Into<PathBuf>, shard_count: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create shard directory '{}'", dir.display()))?;
        Ok(Self { dir, shard_count })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// Write all windows of shard `index`, one line per window.
    /// An empty slice still produces an (empty) file.
    pub fn write_shard(&self, index: usize, windows: &[Window]) -> Result<PathBuf> {
        if index >= self.shard_count {
            bail!("Shard index {} out of range 0..{}", index, self.shard_count);
        }

        let path = self.dir.join(shard_file_name(index));
        let file = File::create(&path)
            .with_context(|| format!("Cannot create shard '{}'", path.display()))?;
        let mut out = BufWriter::new(file);

        for window in windows {
            writeln!(out, "{}", window.to_line())
                .with_context(|| format!("Cannot write shard '{}'", path.display()))?;
        }
        out.flush()
            .with_context(|| format!("Cannot flush shard '{}'", path.display()))?;

        tracing::debug!("Wrote {} windows to '{}'", windows.len(), path.display());
        Ok(path)
    }
}

// ─── ShardReader ──────────────────────────────────────────────────────────────
/// Loads one shard's windows back into memory.
pub struct ShardReader {
    dir:          PathBuf,
    context_size: usize,
    vocab_size:   Option<usize>,
}

impl ShardReader {
    pub fn new(dir: impl Into<PathBuf>, context_size: usize) -> Self {
        Self {
            dir: dir.into(),
            context_size,
            vocab_size: None,
        }
    }

    /// Reject ids at or above `vocab_size` when loading.
    pub fn with_vocab_size(mut self, vocab_size: usize) -> Self {
        self.vocab_size = Some(vocab_size);
        self
    }

    pub fn context_size(&self) -> usize {
        self.context_size
    }

    /// Read and parse shard `index`.
    ///
    /// Only the first C fields of each line are used. A line with
    /// fewer than C ids means the shards were built for another
    /// context size, which is fatal. So is an id outside the
    /// vocabulary, when one is set.
    pub fn load(&self, index: usize) -> Result<Vec<Window>> {
        let path = self.dir.join(shard_file_name(index));
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read shard '{}'", path.display()))?;

        let mut rows = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let ids = line
                .split_whitespace()
                .take(self.context_size)
                .map(|field| field.parse::<u32>())
                .collect::<Result<Vec<u32>, _>>()
                .with_context(|| {
                    format!("Shard {} line {}: non-integer token id", index, line_no + 1)
                })?;

            if ids.len() < self.context_size {
                bail!(
                    "Shard {} line {}: {} ids, expected {} (context size changed since build?)",
                    index,
                    line_no + 1,
                    ids.len(),
                    self.context_size
                );
            }

            if let Some(vocab_size) = self.vocab_size {
                if let Some(&id) = ids.iter().find(|&&id| id as usize >= vocab_size) {
                    bail!(
                        "Shard {} line {}: token id {} is outside the model vocabulary of {}",
                        index,
                        line_no + 1,
                        id,
                        vocab_size
                    );
                }
            }

            rows.push(Window::exact(ids, self.context_size)?);
        }

        Ok(rows)
    }

    /// Number of non-empty rows in shard `index`.
    pub fn count_rows(&self, index: usize) -> Result<usize> {
        let path = self.dir.join(shard_file_name(index));
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read shard '{}'", path.display()))?;
        Ok(text.lines().filter(|l| !l.trim().is_empty()).count())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn window(ids: &[u32]) -> Window {
        Window::padded(ids.to_vec(), 4, 0)
    }

    #[test]
    fn test_shard_of_formula() {
        // 10 docs into 4 shards: floor(d*4/10)
        let got: Vec<usize> = (0..10).map(|d| shard_of(d, 4, 10)).collect();
        assert_eq!(got, vec![0, 0, 0, 1, 1, 2, 2, 2, 3, 3]);
    }

    #[test]
    fn test_doc_ranges_agree_with_shard_of() {
        for (s, n) in [(4, 10), (7, 3), (1000, 5), (3, 3000), (1, 1), (5, 0)] {
            let mut covered = 0;
            for i in 0..s {
                let range = shard_doc_range(i, s, n);
                assert_eq!(range.start, covered, "s={s} n={n} i={i}");
                for d in range.clone() {
                    assert_eq!(shard_of(d, s, n), i);
                }
                covered = range.end;
            }
            assert_eq!(covered, n);
        }
    }

    #[test]
    fn test_tiny_corpus_leaves_empty_shards() {
        // One document into 1000 shards: only shard 0 gets it
        assert_eq!(shard_doc_range(0, 1000, 1), 0..1);
        assert!(shard_doc_range(1, 1000, 1).is_empty());
        assert!(shard_doc_range(999, 1000, 1).is_empty());
    }

    #[test]
    fn test_write_then_read_shard() {
        let dir = TempDir::new().unwrap();
        let writer = ShardWriter::create(dir.path(), 2).unwrap();
        writer.write_shard(0, &[window(&[1, 2, 3, 4]), window(&[5])]).unwrap();
        writer.write_shard(1, &[]).unwrap();

        let text = fs::read_to_string(dir.path().join("tokenized_train_0.txt")).unwrap();
        assert_eq!(text, "1 2 3 4\n5 0 0 0\n");

        let reader = ShardReader::new(dir.path(), 4);
        let rows = reader.load(0).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].ids(), &[5, 0, 0, 0]);
        assert!(reader.load(1).unwrap().is_empty());
        assert_eq!(reader.count_rows(0).unwrap(), 2);
    }

    #[test]
    fn test_writer_rejects_out_of_range_index() {
        let dir = TempDir::new().unwrap();
        let writer = ShardWriter::create(dir.path(), 2).unwrap();
        assert!(writer.write_shard(2, &[]).is_err());
    }

    #[test]
    fn test_reader_uses_first_c_fields() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(shard_file_name(0)), "1 2 3 4 5 6\n").unwrap();
        let rows = ShardReader::new(dir.path(), 4).load(0).unwrap();
        assert_eq!(rows[0].ids(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_short_row_is_a_shape_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(shard_file_name(0)), "1 2 3 4\n1 2\n").unwrap();
        let err = ShardReader::new(dir.path(), 4).load(0).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_id_outside_vocabulary_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(shard_file_name(0)), "1 2 3 4\n1 2 9 4\n").unwrap();

        let reader = ShardReader::new(dir.path(), 4).with_vocab_size(9);
        let err = reader.load(0).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
        assert!(err.to_string().contains("token id 9"), "{err}");

        // Without a vocabulary bound the same shard loads
        assert_eq!(ShardReader::new(dir.path(), 4).load(0).unwrap().len(), 2);
        assert_eq!(
            ShardReader::new(dir.path(), 4).with_vocab_size(10).load(0).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_non_integer_id_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(shard_file_name(0)), "1 x 3 4\n").unwrap();
        assert!(ShardReader::new(dir.path(), 4).load(0).is_err());
    }

    #[test]
    fn test_missing_shard_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(ShardReader::new(dir.path(), 4).load(3).is_err());
    }

    #[test]
    fn test_manifest_roundtrip_and_validation() {
        let dir = TempDir::new().unwrap();
        assert!(ShardManifest::load(dir.path()).unwrap().is_none());

        let manifest = ShardManifest {
            shard_count:   2,
            context_size:  4,
            stride:        2,
            pad_id:        0,
            total_docs:    3,
            kept_docs:     2,
            window_counts: vec![3, 1],
            built_at:      unix_now(),
        };
        manifest.save(dir.path()).unwrap();

        let loaded = ShardManifest::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.total_windows(), 4);
        assert!(loaded.validate(4, 2).is_ok());
        assert!(loaded.validate(8, 2).is_err());
        assert!(loaded.validate(4, 3).is_err());
    }
}
