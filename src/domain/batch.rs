// ============================================================
// Layer 3 — Batch Domain Types
// ============================================================
// One TrainingPair per window:
//
//   label = window                       (C ids)
//   input = [START] ++ window[0 .. C-1]  (C ids)
//
// so label[i] is the target when the model has seen
// input[0..=i]. A Batch is B such pairs; batches are never
// persisted, they are rebuilt from a fresh shuffle each epoch.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingPair {
    pub input: Vec<u32>,
    pub label: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub pairs: Vec<TrainingPair>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Sequence length of every row (0 for an empty batch)
    pub fn context_size(&self) -> usize {
        self.pairs.first().map(|p| p.label.len()).unwrap_or(0)
    }
}
