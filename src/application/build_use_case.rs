// ============================================================
// Layer 2 — BuildUseCase
// ============================================================
// Turns the raw JSON corpus into shard files, in order:
//
//   Step 1: Read model config (context size C)   (Layer 5 - ml)
//   Step 2: Load + normalise + filter documents  (Layer 4 - data)
//   Step 3: Load / build tokenizer               (Layer 6 - infra)
//   Step 4: For each shard:                      (Layer 4 - data)
//             tokenize its documents
//             cut token sequences into windows
//             write tokenized_train_{i}.txt
//   Step 5: Write manifest.json                  (Layer 4 - data)
//
// Documents are assigned to shards by their position in the
// raw corpus, so only one shard's windows are held in memory
// at a time.
//
// Reference: Rust Book §13 (Iterators and Closures)

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::application::config::RunConfig;
use crate::data::{
    loader::JsonCorpusLoader,
    preprocessor::Preprocessor,
    shard::{shard_doc_range, shard_of, unix_now, ShardManifest, ShardWriter},
    windows::WindowSplitter,
};
use crate::domain::document::{Corpus, Document};
use crate::domain::traits::{DocumentSource, TextTokenizer};
use crate::domain::window::Window;
use crate::infra::tokenizer_store::{check_special_ids, TokenizerStore};
use crate::ml::model::LmModelConfig;

pub struct BuildUseCase {
    config: RunConfig,
}

impl BuildUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Execute the whole build and return the written manifest.
    pub fn execute(&self) -> Result<ShardManifest> {
        let cfg = &self.config;

        // ── Step 1: Context size comes from the model ─────────────────────────
        let model_cfg = LmModelConfig::load_file(&cfg.model_config_path)?;
        cfg.validate_context(model_cfg.n_ctx)?;

        // ── Step 2: Load documents ────────────────────────────────────────────
        let loader = JsonCorpusLoader::new(
            &cfg.corpus_path,
            cfg.text_field.as_str(),
            Preprocessor::new(cfg.separator.as_str()),
            cfg.min_doc_chars,
        );
        let corpus = loader.load_all()?;

        // ── Step 3: Tokenizer ─────────────────────────────────────────────────
        let texts: Vec<&str> = corpus.documents.iter().map(|d| d.text.as_str()).collect();
        let tokenizer = TokenizerStore::new(&cfg.tokenizer_path)
            .load_or_build(&texts, cfg.vocab_build_size)?;
        check_special_ids(&tokenizer, cfg.pad_id, cfg.start_id)?;

        let tok_vocab = TextTokenizer::vocab_size(&tokenizer);
        if tok_vocab > model_cfg.vocab_size {
            bail!(
                "Tokenizer produces ids up to {} but the model vocabulary has only {} entries",
                tok_vocab - 1,
                model_cfg.vocab_size
            );
        }

        // ── Steps 4 + 5: Windows → shards → manifest ──────────────────────────
        let splitter = WindowSplitter::new(model_cfg.n_ctx, cfg.stride, cfg.pad_id)?;
        let writer = ShardWriter::create(&cfg.shard_dir, cfg.shard_count)?;
        let manifest = build_shards(&corpus, &tokenizer, &splitter, &writer)?;
        manifest.save(writer.dir())?;

        tracing::info!(
            "Wrote {} windows into {} shards under '{}'",
            manifest.total_windows(),
            manifest.shard_count,
            writer.dir().display()
        );
        Ok(manifest)
    }
}

/// Tokenize, window and write every shard of `corpus`.
///
/// Works with any tokenizer, so tests can drive it without a
/// tokenizer file.
pub fn build_shards<T: TextTokenizer>(
    corpus:    &Corpus,
    tokenizer: &T,
    splitter:  &WindowSplitter,
    writer:    &ShardWriter,
) -> Result<ShardManifest> {
    let shard_count = writer.shard_count();

    // Group kept documents by the shard of their raw index
    let mut groups: Vec<Vec<&Document>> = vec![Vec::new(); shard_count];
    for doc in &corpus.documents {
        groups[shard_of(doc.index, shard_count, corpus.total_docs)].push(doc);
    }

    let pb = ProgressBar::new(shard_count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} shards [{elapsed_precise}] {msg}")?,
    );

    let mut window_counts = Vec::with_capacity(shard_count);
    for (i, docs) in groups.iter().enumerate() {
        let mut windows: Vec<Window> = Vec::new();
        for doc in docs {
            let ids = tokenizer.tokenize(&doc.text)?;
            windows.extend(splitter.split(&ids));
        }

        writer.write_shard(i, &windows)?;
        tracing::debug!(
            "Shard {}: docs {:?}, {} kept, {} windows",
            i,
            shard_doc_range(i, shard_count, corpus.total_docs),
            docs.len(),
            windows.len()
        );

        window_counts.push(windows.len());
        pb.set_message(format!("{} windows", window_counts.iter().sum::<usize>()));
        pb.inc(1);
    }
    pb.finish_with_message("done");

    Ok(ShardManifest {
        shard_count,
        context_size: splitter.context_size(),
        stride:       splitter.stride(),
        pad_id:       splitter.pad_id(),
        total_docs:   corpus.total_docs,
        kept_docs:    corpus.kept(),
        window_counts,
        built_at:     unix_now(),
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::shard::ShardReader;
    use tempfile::TempDir;

    /// One id per whitespace-separated word: the word's length.
    struct LengthTokenizer;

    impl TextTokenizer for LengthTokenizer {
        fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
            Ok(text.split_whitespace().map(|w| w.len() as u32).collect())
        }

        fn vocab_size(&self) -> usize {
            64
        }
    }

    fn corpus(total_docs: usize, kept: &[(usize, usize)]) -> Corpus {
        // (raw index, word count)
        let documents = kept
            .iter()
            .map(|&(index, words)| Document::new(index, vec!["abc"; words].join(" ")))
            .collect();
        Corpus { total_docs, documents }
    }

    #[test]
    fn test_documents_land_in_shard_of_raw_index() {
        let tmp = TempDir::new().unwrap();
        let writer = ShardWriter::create(tmp.path(), 2).unwrap();
        let splitter = WindowSplitter::new(4, 4, 0).unwrap();

        // 4 raw docs, doc 1 dropped: shard 0 ← {0}, shard 1 ← {2, 3}
        let c = corpus(4, &[(0, 3), (2, 3), (3, 3)]);
        let manifest = build_shards(&c, &LengthTokenizer, &splitter, &writer).unwrap();

        // L=3, C=K=4 → 2 windows per document
        assert_eq!(manifest.window_counts, vec![2, 4]);
        assert_eq!(manifest.total_docs, 4);
        assert_eq!(manifest.kept_docs, 3);

        let reader = ShardReader::new(tmp.path(), 4);
        let rows = reader.load(1).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].ids(), &[3, 3, 3, 0]);
        assert_eq!(rows[1].ids(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_every_shard_file_exists_even_when_empty() {
        let tmp = TempDir::new().unwrap();
        let writer = ShardWriter::create(tmp.path(), 5).unwrap();
        let splitter = WindowSplitter::new(4, 2, 0).unwrap();

        let manifest = build_shards(&corpus(1, &[(0, 6)]), &LengthTokenizer, &splitter, &writer)
            .unwrap();

        assert_eq!(manifest.window_counts[1..], [0, 0, 0, 0]);
        for i in 0..5 {
            assert!(tmp.path().join(crate::data::shard::shard_file_name(i)).exists());
        }
    }

    #[test]
    fn test_manifest_records_shape() {
        let tmp = TempDir::new().unwrap();
        let writer = ShardWriter::create(tmp.path(), 1).unwrap();
        let splitter = WindowSplitter::new(8, 6, 7).unwrap();

        let manifest = build_shards(&corpus(1, &[(0, 2)]), &LengthTokenizer, &splitter, &writer)
            .unwrap();
        manifest.save(tmp.path()).unwrap();

        let loaded = ShardManifest::load(tmp.path()).unwrap().unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!((loaded.context_size, loaded.stride, loaded.pad_id), (8, 6, 7));
        assert!(loaded.validate(8, 1).is_ok());
    }

    #[test]
    fn test_start_id_must_match_tokenizer_cls() {
        use burn::config::Config;

        let tmp = TempDir::new().unwrap();
        let model_config_path = tmp.path().join("model_config.json");
        LmModelConfig::new(512, 16, 16, 2, 1).save(&model_config_path).unwrap();

        let corpus_path = tmp.path().join("train.json");
        let text: Vec<String> = (0..40).map(|i| format!("w{i:03}")).collect();
        let corpus = serde_json::json!([{ "c": text.join(" ") }]);
        std::fs::write(&corpus_path, corpus.to_string()).unwrap();

        let cfg = RunConfig {
            corpus_path,
            model_config_path,
            tokenizer_path:   tmp.path().join("tokenizer.json"),
            vocab_build_size: 512,
            shard_dir:        tmp.path().join("tokenized"),
            shard_count:      1,
            stride:           16,
            start_id:         5,
            ..RunConfig::default()
        };

        let err = BuildUseCase::new(cfg.clone()).execute().unwrap_err();
        assert!(err.to_string().contains("start_id"), "{err:#}");
        assert!(!cfg.shard_dir.join(crate::data::shard::shard_file_name(0)).exists());

        // Same run with the tokenizer's [CLS] id goes through
        let ok = RunConfig { start_id: 101, ..cfg };
        assert_eq!(BuildUseCase::new(ok).execute().unwrap().shard_count, 1);
    }
}
