// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the raw corpus file and the tensors the
// model consumes.
//
// Build phase (runs once, sequentially, one shard at a time):
//
//   corpus JSON
//       │
//       ▼
//   JsonCorpusLoader  → reads entries, keeps their raw position
//       │
//       ▼
//   Preprocessor      → newline → separator marker, length filter
//       │
//       ▼
//   Tokenizer         → text → token ids (infra layer)
//       │
//       ▼
//   WindowSplitter    → ids → fixed-length overlapping windows
//       │
//       ▼
//   ShardWriter       → S line-oriented shard files + manifest
//
// Train phase (every epoch, every shard):
//
//   ShardReader       → shard file → Vec<Window>
//       │
//       ▼
//   BatchBuilder      → groups of B windows → input/label pairs
//       │
//       ▼
//   LmBatcher         → pairs → [B, C] integer tensors
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Reads the JSON corpus into Documents
pub mod loader;

/// Newline normalisation
pub mod preprocessor;

/// Cuts token sequences into overlapping fixed-length windows
pub mod windows;

/// Shard files: assignment, writing, reading, manifest
pub mod shard;

/// Input/label derivation and Burn's Batcher implementation
pub mod batcher;
