// ============================================================
// Layer 3 — Document Domain Type
// ============================================================
// Represents one corpus entry after newline normalisation.
//
// The `index` is the entry's position in the RAW corpus,
// counted before any filtering. Shard assignment is computed
// from this position, so it must never be renumbered after
// short documents are dropped.
//
// Reference: Rust Book §5 (Structs and Methods)

use serde::{Deserialize, Serialize};

/// A normalised corpus document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Position of this entry in the raw corpus (0-based)
    pub index: usize,

    /// Text with internal line breaks replaced by the separator marker
    pub text: String,
}

impl Document {
    /// Create a new Document.
    ///
    /// Example:
    ///   let doc = Document::new(3, "first line [SEP] second line");
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Length in characters (Unicode scalar values, not bytes)
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// A document is windowed only when it is strictly longer
    /// than `min_chars`; anything else is silently dropped.
    pub fn is_trainable(&self, min_chars: usize) -> bool {
        self.char_len() > min_chars
    }
}

/// The result of loading a corpus: the kept documents plus the
/// raw entry count, which shard assignment divides by.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    /// Number of entries in the raw corpus, including dropped ones
    pub total_docs: usize,

    /// Documents that passed the length filter, in corpus order
    pub documents: Vec<Document>,
}

impl Corpus {
    pub fn kept(&self) -> usize {
        self.documents.len()
    }
}
