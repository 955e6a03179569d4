// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Normalises raw corpus text before tokenisation.
//
// Every line break inside a document is replaced with a
// sentence-separator marker (by default " [SEP] "), so the
// tokenizer sees one continuous line and the model still
// learns where the original breaks were. The marker is a
// special token of the tokenizer and maps to a single id.
//
// Example:
//   "first line\nsecond line" → "first line [SEP] second line"
//
// Reference: Rust Book §8 (Strings in Rust)

/// Default separator marker inserted for every '\n'
pub const DEFAULT_SEPARATOR: &str = " [SEP] ";

pub struct Preprocessor {
    separator: String,
}

impl Preprocessor {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    /// Replace every '\n' with the separator marker.
    pub fn normalize(&self, text: &str) -> String {
        text.replace('\n', &self.separator)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}
