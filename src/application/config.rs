// ============================================================
// Layer 2 — Run Configuration
// ============================================================
// Every knob of a build or training run in one struct.
//
// Loaded once from a JSON file at startup and never changed
// afterwards; the same file drives `build` and `train`, so the
// shard layout both phases see is guaranteed to agree.
//
// Missing fields take their defaults (#[serde(default)]), so a
// config file only needs the values that differ:
//
//   { "corpus_path": "data/wiki.json", "shard_count": 100,
//     "device": { "kind": "wgpu", "count": 2 } }
//
// The context size C is not here: it belongs to the model and
// is read from model_config.json.
//
// Reference: serde documentation (Field attributes: default)

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::preprocessor::DEFAULT_SEPARATOR;

// ─── Device Selection ────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// NdArray backend, exactly one device
    Cpu,
    /// Wgpu backend, one or more GPUs
    Wgpu,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub kind:  DeviceKind,
    /// More than one device means replicated (data parallel) steps
    pub count: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { kind: DeviceKind::Cpu, count: 1 }
    }
}

// ─── RunConfig ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    // ── Corpus ───────────────────────────────────────────────────────────────
    pub corpus_path:       PathBuf,
    pub text_field:        String,
    pub separator:         String,
    /// Documents must be strictly longer than this (in chars)
    pub min_doc_chars:     usize,

    // ── Tokenizer ────────────────────────────────────────────────────────────
    pub tokenizer_path:    PathBuf,
    /// Vocabulary size when a tokenizer has to be built
    pub vocab_build_size:  usize,

    // ── Shards ───────────────────────────────────────────────────────────────
    pub shard_dir:         PathBuf,
    pub shard_count:       usize,
    pub stride:            usize,
    pub pad_id:            u32,
    pub start_id:          u32,

    // ── Training ─────────────────────────────────────────────────────────────
    pub model_config_path: PathBuf,
    pub epochs:            usize,
    pub batch_size:        usize,
    pub learning_rate:     f64,
    pub warmup_fraction:   f64,
    pub log_step:          usize,
    pub checkpoint_dir:    PathBuf,
    pub seed:              Option<u64>,
    pub device:            DeviceConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            corpus_path:       PathBuf::from("data/train.json"),
            text_field:        "c".to_string(),
            separator:         DEFAULT_SEPARATOR.to_string(),
            min_doc_chars:     128,
            tokenizer_path:    PathBuf::from("data/tokenizer.json"),
            vocab_build_size:  21128,
            shard_dir:         PathBuf::from("data/tokenized"),
            shard_count:       1000,
            stride:            128,
            pad_id:            0,
            start_id:          101,
            model_config_path: PathBuf::from("model_config.json"),
            epochs:            5,
            batch_size:        4,
            learning_rate:     1e-4,
            warmup_fraction:   0.1,
            log_step:          50,
            checkpoint_dir:    PathBuf::from("model"),
            seed:              None,
            device:            DeviceConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// The file at `path` if given, built-in defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                tracing::info!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            bail!("shard_count must be at least 1");
        }
        if self.stride == 0 {
            bail!("stride must be at least 1");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.epochs == 0 {
            bail!("epochs must be at least 1");
        }
        if self.log_step == 0 {
            bail!("log_step must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.warmup_fraction) {
            bail!("warmup_fraction must be within [0, 1], got {}", self.warmup_fraction);
        }
        if self.device.count == 0 {
            bail!("device.count must be at least 1");
        }
        Ok(())
    }

    /// Checks that need the model's context size.
    pub fn validate_context(&self, context_size: usize) -> Result<()> {
        if self.stride > context_size {
            bail!(
                "stride {} is larger than the context size {}; tokens between windows would be lost",
                self.stride,
                context_size
            );
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = RunConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.validate_context(128).is_ok());
        assert_eq!(cfg.seed, None);
        assert_eq!(cfg.device.kind, DeviceKind::Cpu);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run.json");
        std::fs::write(
            &path,
            r#"{ "shard_count": 7, "seed": 3, "device": { "kind": "wgpu", "count": 2 } }"#,
        )
        .unwrap();

        let cfg = RunConfig::load(&path).unwrap();
        assert_eq!(cfg.shard_count, 7);
        assert_eq!(cfg.seed, Some(3));
        assert_eq!(cfg.device, DeviceConfig { kind: DeviceKind::Wgpu, count: 2 });
        assert_eq!(cfg.batch_size, 4);
        assert_eq!(cfg.text_field, "c");
    }

    #[test]
    fn test_zero_values_rejected() {
        for field in ["shard_count", "stride", "batch_size", "epochs", "log_step"] {
            let tmp = TempDir::new().unwrap();
            let path = tmp.path().join("run.json");
            std::fs::write(&path, format!(r#"{{ "{field}": 0 }}"#)).unwrap();
            assert!(RunConfig::load(&path).is_err(), "{field} = 0 accepted");
        }
    }

    #[test]
    fn test_stride_may_equal_but_not_exceed_context() {
        let cfg = RunConfig { stride: 128, ..RunConfig::default() };
        assert!(cfg.validate_context(128).is_ok());
        assert!(cfg.validate_context(64).is_err());
    }

    #[test]
    fn test_unknown_device_kind_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run.json");
        std::fs::write(&path, r#"{ "device": { "kind": "tpu", "count": 1 } }"#).unwrap();
        assert!(RunConfig::load(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(RunConfig::load(Path::new("/nonexistent/run.json")).is_err());
    }
}
