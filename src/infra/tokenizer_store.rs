// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Provides the tokenizer for the build phase.
//
// Normally a pretrained HuggingFace `tokenizer.json` is placed
// at the configured path and simply loaded. When none exists, a
// word-level vocabulary is built from the corpus itself and
// saved there, so the pipeline can run end to end on any corpus.
//
// Special tokens keep BERT's fixed ids, which the rest of the
// pipeline relies on:
//   [PAD]=0 (window padding)   [CLS]=101 (start of input)
//   [SEP]=102 (line breaks)    [UNK]=1, [MASK]=103
//
// The separator inserted for line breaks is registered as a
// special token, so " [SEP] " always becomes the single id 102.
//
// Words are counted with the tokenizer's own normalizer and
// pre-tokenizer (BERT normalisation, CJK characters split one
// per word, punctuation split off), so every counted word is
// exactly a piece the saved tokenizer will look up.
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper. Writing the tokenizer JSON directly and
// loading it sidesteps that type mismatch.
//
// Reference: HuggingFace tokenizers crate documentation

use std::{collections::HashMap, path::PathBuf, str::FromStr};

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use tokenizers::{
    Normalizer, OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer, Tokenizer,
};

use crate::domain::traits::TextTokenizer;

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const CLS_ID: u32 = 101;
pub const SEP_ID: u32 = 102;

const SPECIAL_TOKENS: [(&str, u32); 5] = [
    ("[PAD]", PAD_ID),
    ("[UNK]", UNK_ID),
    ("[CLS]", CLS_ID),
    ("[SEP]", SEP_ID),
    ("[MASK]", 103),
];

/// First id handed to a corpus word
const FIRST_WORD_ID: u32 = 104;

pub struct TokenizerStore {
    path: PathBuf,
}

impl TokenizerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the tokenizer file, or build one from `texts` if absent.
    pub fn load_or_build(&self, texts: &[&str], vocab_size: usize) -> Result<Tokenizer> {
        if self.path.exists() {
            tracing::info!("Loading tokenizer from '{}'", self.path.display());
            self.load()
        } else {
            tracing::info!("Building word-level tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(texts, vocab_size)
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        Tokenizer::from_file(&self.path)
            .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {}", self.path.display(), e))
    }

    fn build_and_save(&self, texts: &[&str], vocab_size: usize) -> Result<Tokenizer> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }

        // ── Step 1: Count words the way the tokenizer will split them ─────────
        let base = Tokenizer::from_str(&tokenizer_json(special_vocab()).to_string())
            .map_err(|e| anyhow!("Cannot create base tokenizer: {e}"))?;

        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in words_of(&base, text)? {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        // Most frequent first; ties broken alphabetically so the
        // same corpus always yields the same ids
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(FIRST_WORD_ID as usize));

        // ── Step 2: Vocab with BERT special ids ───────────────────────────────
        let mut vocab = special_vocab();
        let mut next_id = FIRST_WORD_ID;
        for (word, _) in &words {
            if vocab.get(word).is_none() {
                vocab[word] = json!(next_id);
                next_id += 1;
            }
        }

        // ── Step 3: Save and reload ───────────────────────────────────────────
        std::fs::write(&self.path, serde_json::to_string_pretty(&tokenizer_json(vocab))?)
            .with_context(|| format!("Cannot write tokenizer '{}'", self.path.display()))?;

        tracing::info!(
            "Tokenizer built with {} ids, saved to '{}'",
            next_id,
            self.path.display()
        );

        self.load()
    }
}

fn special_vocab() -> Value {
    let mut vocab = json!({});
    for (token, id) in SPECIAL_TOKENS {
        vocab[token] = json!(id);
    }
    vocab
}

/// HuggingFace tokenizer JSON: BERT normaliser, whitespace and
/// punctuation pre-tokenizer, word-level model over `vocab`.
fn tokenizer_json(vocab: Value) -> Value {
    let added_tokens: Vec<Value> = SPECIAL_TOKENS
        .iter()
        .map(|(content, id)| {
            json!({
                "id": id, "content": content, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            })
        })
        .collect();

    json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added_tokens,
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": {
            "type": "Whitespace"
        },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "[UNK]"
        }
    })
}

/// The word pieces `tokenizer` would look up for `text`.
///
/// Special tokens are matched on the raw text before
/// normalisation, so they are cut out here and never counted.
fn words_of(tokenizer: &Tokenizer, text: &str) -> Result<Vec<String>> {
    let mut plain = text.to_string();
    for (token, _) in SPECIAL_TOKENS {
        plain = plain.replace(token, " ");
    }

    let mut pre = PreTokenizedString::from(plain.as_str());
    if let Some(normalizer) = tokenizer.get_normalizer() {
        pre.normalize(|s| normalizer.normalize(s))
            .map_err(|e| anyhow!("Normalisation error: {e}"))?;
    }
    if let Some(pre_tokenizer) = tokenizer.get_pre_tokenizer() {
        pre_tokenizer
            .pre_tokenize(&mut pre)
            .map_err(|e| anyhow!("Pre-tokenisation error: {e}"))?;
    }

    Ok(pre
        .get_splits(OffsetReferential::Original, OffsetType::Byte)
        .into_iter()
        .map(|(word, _, _)| word.to_string())
        .collect())
}

/// The tokenizer's [PAD] and [CLS] ids must be the ids the run
/// pads windows with and starts inputs with.
pub fn check_special_ids(tokenizer: &Tokenizer, pad_id: u32, start_id: u32) -> Result<()> {
    for (token, expected, field) in [("[PAD]", pad_id, "pad_id"), ("[CLS]", start_id, "start_id")] {
        match tokenizer.token_to_id(token) {
            Some(id) if id != expected => bail!(
                "Tokenizer maps {token} to {id} but the run config sets {field} = {expected}"
            ),
            Some(_) => {}
            None => tracing::warn!("Tokenizer has no {token} token; using {field} = {expected}"),
        }
    }
    Ok(())
}

impl TextTokenizer for Tokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self
            .encode(text, false)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
        Ok(enc.get_ids().to_vec())
    }

    fn vocab_size(&self) -> usize {
        // Ids need not be contiguous (BERT-style special ids), so
        // the bound is the largest id + 1, not the entry count.
        self.get_vocab(true)
            .values()
            .max()
            .map(|&m| m as usize + 1)
            .unwrap_or(0)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn built(texts: &[&str]) -> (TempDir, Tokenizer) {
        let tmp = TempDir::new().unwrap();
        let store = TokenizerStore::new(tmp.path().join("tokenizer.json"));
        let tok = store.load_or_build(texts, 500).unwrap();
        (tmp, tok)
    }

    #[test]
    fn test_build_then_reload() {
        let tmp = TempDir::new().unwrap();
        let store = TokenizerStore::new(tmp.path().join("tok").join("tokenizer.json"));
        let texts = ["the cat sat", "the dog ran"];

        let built = store.load_or_build(&texts, 500).unwrap();
        assert!(tmp.path().join("tok").join("tokenizer.json").exists());

        // Second call must load the saved file and agree on ids
        let loaded = store.load_or_build(&[], 500).unwrap();
        assert_eq!(
            built.tokenize("the cat").unwrap(),
            loaded.tokenize("the cat").unwrap()
        );
    }

    #[test]
    fn test_separator_is_one_special_id() {
        let (_tmp, tok) = built(&["alpha beta"]);
        let ids = tok.tokenize("alpha [SEP] beta").unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[1], SEP_ID);
        assert!(!tok.get_vocab(true).contains_key("sep"));
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let (_tmp, tok) = built(&["alpha"]);
        assert_eq!(tok.tokenize("zeta").unwrap(), vec![UNK_ID]);
    }

    #[test]
    fn test_cjk_characters_are_in_vocabulary() {
        let (_tmp, tok) = built(&["中文字 测试"]);
        let ids = tok.tokenize("中文字 测试").unwrap();
        assert_eq!(ids.len(), 5);
        assert!(ids.iter().all(|&id| id >= FIRST_WORD_ID), "{ids:?}");
    }

    #[test]
    fn test_punctuation_and_case_follow_the_tokenizer() {
        let (_tmp, tok) = built(&["Don't stop."]);
        let ids = tok.tokenize("don't STOP.").unwrap();
        // don ' t stop .
        assert_eq!(ids.len(), 5);
        assert!(!ids.contains(&UNK_ID), "{ids:?}");
    }

    #[test]
    fn test_vocab_size_is_max_id_plus_one() {
        let (_tmp, tok) = built(&["one two three"]);
        // 104, 105, 106 for the three words
        assert_eq!(TextTokenizer::vocab_size(&tok), 107);
    }

    #[test]
    fn test_special_ids_must_match_run_config() {
        let (_tmp, tok) = built(&["alpha"]);
        assert!(check_special_ids(&tok, PAD_ID, CLS_ID).is_ok());

        let err = check_special_ids(&tok, PAD_ID, 1).unwrap_err();
        assert!(err.to_string().contains("start_id"));
        assert!(check_special_ids(&tok, 5, CLS_ID).is_err());
    }
}
