// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Loads the raw corpus: a single file holding a JSON array of
// objects, each carrying its text under one field name.
//
//   [
//     {"c": "first document\nwith two lines"},
//     {"c": "second document"},
//     ...
//   ]
//
// For every entry, in order:
//   1. Pull the text field (missing / non-string → fatal)
//   2. Replace line breaks with the separator marker
//   3. Keep it only if it is longer than `min_chars` characters
//
// Kept documents remember their RAW position and the loader
// reports the raw entry count, because shards are assigned by
// raw position (see data::shard).
//
// Malformed input is fatal for the whole load: nothing is
// returned unless every entry parsed.
//
// Reference: serde_json documentation
//            Rust Book §9 (Error Handling)

use std::{fs, path::PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

use crate::data::preprocessor::Preprocessor;
use crate::domain::document::{Corpus, Document};
use crate::domain::traits::DocumentSource;

/// Loads a JSON-array corpus file.
/// Implements the DocumentSource trait from Layer 3.
pub struct JsonCorpusLoader {
    path:         PathBuf,
    text_field:   String,
    preprocessor: Preprocessor,
    min_chars:    usize,
}

impl JsonCorpusLoader {
    pub fn new(
        path:         impl Into<PathBuf>,
        text_field:   impl Into<String>,
        preprocessor: Preprocessor,
        min_chars:    usize,
    ) -> Self {
        Self {
            path:       path.into(),
            text_field: text_field.into(),
            preprocessor,
            min_chars,
        }
    }

    /// Parse corpus JSON that is already in memory.
    pub fn parse(&self, json: &str) -> Result<Corpus> {
        let root: Value = serde_json::from_str(json)
            .with_context(|| format!("Corpus '{}' is not valid JSON", self.path.display()))?;

        let entries = match root {
            Value::Array(entries) => entries,
            _ => bail!(
                "Corpus '{}' must be a JSON array of objects",
                self.path.display()
            ),
        };

        let total_docs = entries.len();
        let mut documents = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            let text = entry
                .as_object()
                .ok_or_else(|| anyhow!("Corpus entry {index} is not an object"))?
                .get(&self.text_field)
                .ok_or_else(|| {
                    anyhow!("Corpus entry {index} has no '{}' field", self.text_field)
                })?
                .as_str()
                .ok_or_else(|| {
                    anyhow!("Corpus entry {index}: '{}' is not a string", self.text_field)
                })?;

            let doc = Document::new(index, self.preprocessor.normalize(text));
            if doc.is_trainable(self.min_chars) {
                documents.push(doc);
            }
        }

        Ok(Corpus { total_docs, documents })
    }
}

impl DocumentSource for JsonCorpusLoader {
    fn load_all(&self) -> Result<Corpus> {
        tracing::info!("Reading corpus from '{}'", self.path.display());

        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read corpus '{}'", self.path.display()))?;

        let corpus = self.parse(&json)?;

        tracing::info!(
            "Corpus has {} entries, {} longer than {} chars",
            corpus.total_docs,
            corpus.kept(),
            self.min_chars
        );
        Ok(corpus)
    }
}
