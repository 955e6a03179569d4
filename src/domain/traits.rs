// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between the pipeline and its collaborators:
//
//   DocumentSource → where raw documents come from
//   TextTokenizer  → text → token ids (the subword tokenizer)
//   StepExecutor   → one optimisation step over one batch
//
// The training loop depends only on StepExecutor. Whether a
// step runs on one device or is replicated across several is
// a detail of the executor, never of the loop.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use std::path::Path;

use anyhow::Result;

use crate::domain::batch::Batch;
use crate::domain::document::Corpus;

// ─── DocumentSource ───────────────────────────────────────────────────────────
/// Any component that can load the document collection.
///
/// Implementations:
///   - JsonCorpusLoader → a JSON array of objects with a text field
pub trait DocumentSource {
    /// Load, normalise and filter all documents.
    fn load_all(&self) -> Result<Corpus>;
}

// ─── TextTokenizer ────────────────────────────────────────────────────────────
/// Maps normalised text to an ordered sequence of token ids.
pub trait TextTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<u32>>;

    /// Number of ids the tokenizer can produce (max id + 1)
    fn vocab_size(&self) -> usize;
}

// ─── StepExecutor ─────────────────────────────────────────────────────────────
/// Runs one complete training step for a batch:
/// forward → backward → optimizer step → scheduler step.
///
/// Implementations:
///   - SingleDevice → whole batch on one device
///   - Replicated   → batch scattered across several devices
pub trait StepExecutor {
    /// Execute the step and return the batch loss
    /// (averaged across replicas when replicated).
    fn forward_backward_step(&mut self, batch: &Batch) -> Result<f64>;

    /// Persist a self-sufficient model snapshot into `dir`.
    fn save_snapshot(&self, dir: &Path) -> Result<()>;

    /// Learning rate the next optimizer step will use.
    fn learning_rate(&self) -> f64;
}
