// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Persists model snapshots at epoch boundaries.
//
// Directory layout (root = checkpoint_dir, default "model"):
//
//   model/
//     run_config.json          ← the run's full configuration
//     metrics.csv              ← logged losses (infra::metrics)
//     model_epoch0/            ← after epoch 0
//       model.mpk              ← weights (CompactRecorder)
//       model_config.json      ← architecture to rebuild the model
//     model_epoch1/
//     ...
//     final_model/             ← after the last epoch
//
// Every snapshot directory is self-sufficient: the config next
// to the weights is enough to rebuild the model and load them,
// for inference or for further training.
//
// Burn's CompactRecorder:
//   - Serialises model parameters to named MessagePack (.mpk)
//   - Stores floats at half precision for smaller files
//   - Type-safe: loading fails if architecture doesn't match
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::config::RunConfig;
use crate::ml::model::{LmModel, LmModelConfig};

/// Weights file stem; the recorder appends `.mpk`
pub const MODEL_FILE: &str = "model";
pub const MODEL_CONFIG_FILE: &str = "model_config.json";
pub const FINAL_DIR: &str = "final_model";

/// Knows where snapshots go. Saving itself is done by the step
/// executor, which owns the model.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the root directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        &self.dir
    }

    /// Snapshot directory for a completed epoch (0-based)
    pub fn epoch_dir(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("model_epoch{epoch}"))
    }

    pub fn final_dir(&self) -> PathBuf {
        self.dir.join(FINAL_DIR)
    }

    pub fn save_run_config(&self, cfg: &RunConfig) -> Result<()> {
        let path = self.dir.join("run_config.json");
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write run config to '{}'", path.display()))?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }
}

/// Write weights + architecture into `dir` (created if missing).
pub fn save_model<B: Backend>(
    model:  &LmModel<B>,
    config: &LmModelConfig,
    dir:    &Path,
) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create snapshot dir '{}'", dir.display()))?;

    let path = dir.join(MODEL_FILE);
    CompactRecorder::new()
        .record(model.clone().into_record(), path.clone())
        .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

    let cfg_path = dir.join(MODEL_CONFIG_FILE);
    config
        .save(&cfg_path)
        .with_context(|| format!("Cannot write '{}'", cfg_path.display()))?;

    tracing::debug!("Saved snapshot to '{}'", dir.display());
    Ok(())
}

/// Rebuild a model from a snapshot directory.
pub fn load_model<B: Backend>(dir: &Path, device: &B::Device) -> Result<LmModel<B>> {
    let cfg_path = dir.join(MODEL_CONFIG_FILE);
    let config = LmModelConfig::load_file(&cfg_path)?;

    let path = dir.join(MODEL_FILE);
    let record = CompactRecorder::new()
        .load(path.clone(), device)
        .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;

    Ok(config.init::<B>(device).load_record(record))
}
