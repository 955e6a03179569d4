// ============================================================
// Layer 3 — Window Domain Type
// ============================================================
// A Window is one training example: an ordered run of token
// ids whose length is EXACTLY the model's context size.
//
// The length invariant is enforced at construction:
//   - `Window::padded` truncates or right-pads (used when
//     cutting windows out of a document)
//   - `Window::exact` refuses anything of the wrong length
//     (used when reading windows back from a shard file)
//
// Nothing else can build a Window, so every consumer may
// rely on `len() == context_size`.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    ids: Vec<u32>,
}

impl Window {
    /// Post-truncate / post-pad `ids` to exactly `context_size`.
    pub fn padded(mut ids: Vec<u32>, context_size: usize, pad_id: u32) -> Self {
        ids.truncate(context_size);
        ids.resize(context_size, pad_id);
        Self { ids }
    }

    /// Wrap `ids` only if it already has `context_size` tokens.
    pub fn exact(ids: Vec<u32>, context_size: usize) -> Result<Self> {
        if ids.len() != context_size {
            bail!(
                "window has {} tokens, expected context size {}",
                ids.len(),
                context_size
            );
        }
        Ok(Self { ids })
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Encode as one shard-file line: ids separated by single spaces.
    pub fn to_line(&self) -> String {
        self.ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
