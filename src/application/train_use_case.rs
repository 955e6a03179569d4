// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run over previously built shards:
//
//   Step 1: Read model config (context size C)   (Layer 5 - ml)
//   Step 2: Check shards against the model       (Layer 4 - data)
//   Step 3: Count steps → LR schedule            (Layer 5 - ml)
//   Step 4: Save run config, open metrics CSV    (Layer 6 - infra)
//   Step 5: Pick backend + devices, build the
//           executor and run the loop            (Layer 5 - ml)
//
// Device selection:
//   cpu  → Autodiff<NdArray>, exactly one device
//   wgpu → Autodiff<Wgpu>, the default adapter for one device,
//          DiscreteGpu(0..n) for n > 1 (replicated steps)
//
// Reference: Burn Book §5 (Training)
//            Burn Book §6 (Backends)

use anyhow::{bail, Result};
use burn::{
    backend::{
        ndarray::NdArrayDevice,
        wgpu::WgpuDevice,
        Autodiff, NdArray, Wgpu,
    },
    tensor::backend::AutodiffBackend,
};

use crate::application::config::{DeviceKind, RunConfig};
use crate::data::{
    batcher::BatchBuilder,
    shard::{ShardManifest, ShardReader},
};
use crate::domain::traits::StepExecutor;
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::{
    executor::{adamw, Replicated, SingleDevice},
    model::{LmModel, LmModelConfig},
    scheduler::WarmupLinearSchedule,
    trainer::{LoopConfig, TrainingLoop, TrainingSummary},
};

pub struct TrainUseCase {
    config: RunConfig,
}

impl TrainUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Execute the full training run end to end
    pub fn execute(&self) -> Result<TrainingSummary> {
        let cfg = &self.config;

        // ── Step 1: Model config ──────────────────────────────────────────────
        let model_cfg = LmModelConfig::load_file(&cfg.model_config_path)?;
        cfg.validate_context(model_cfg.n_ctx)?;
        tracing::info!(
            "Model: n_ctx={}, n_embd={}, n_head={}, n_layer={}, vocab={}",
            model_cfg.n_ctx,
            model_cfg.n_embd,
            model_cfg.n_head,
            model_cfg.n_layer,
            model_cfg.vocab_size
        );

        // ── Step 2: Shards ────────────────────────────────────────────────────
        let reader =
            ShardReader::new(&cfg.shard_dir, model_cfg.n_ctx).with_vocab_size(model_cfg.vocab_size);
        let rows = shard_row_counts(cfg, &reader)?;

        // ── Step 3: Schedule length ───────────────────────────────────────────
        let builder = BatchBuilder::new(cfg.batch_size, model_cfg.n_ctx, cfg.start_id);
        let steps_per_epoch: usize = rows.iter().map(|&r| builder.num_batches(r)).sum();
        let total_steps = steps_per_epoch * cfg.epochs;
        let scheduler =
            WarmupLinearSchedule::with_warmup_fraction(cfg.learning_rate, cfg.warmup_fraction, total_steps);
        tracing::info!(
            "{} rows → {} steps per epoch, {} total, {} warmup",
            rows.iter().sum::<usize>(),
            steps_per_epoch,
            total_steps,
            scheduler.warmup_steps()
        );

        // ── Step 4: Output directory ──────────────────────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.checkpoint_dir)?;
        checkpoints.save_run_config(cfg)?;
        let metrics = MetricsLogger::new(checkpoints.root())?;

        let parts = LoopParts {
            reader,
            builder,
            checkpoints,
            metrics,
            loop_cfg: LoopConfig {
                epochs:      cfg.epochs,
                shard_count: cfg.shard_count,
                log_step:    cfg.log_step,
                seed:        cfg.seed,
            },
        };

        // ── Step 5: Backend dispatch ──────────────────────────────────────────
        let count = cfg.device.count;
        match cfg.device.kind {
            DeviceKind::Cpu => {
                if count != 1 {
                    bail!("The cpu backend has exactly one device, {} requested", count);
                }
                train_on::<Autodiff<NdArray>>(vec![NdArrayDevice::Cpu], &model_cfg, scheduler, parts)
            }
            DeviceKind::Wgpu => {
                let devices = match count {
                    0 => bail!("At least one wgpu device is required"),
                    1 => vec![WgpuDevice::default()],
                    n => (0..n).map(WgpuDevice::DiscreteGpu).collect(),
                };
                train_on::<Autodiff<Wgpu>>(devices, &model_cfg, scheduler, parts)
            }
        }
    }
}

/// Rows per shard, from the manifest when there is one.
///
/// A manifest built for another context size or shard count is
/// fatal. Without a manifest every shard file is counted, which
/// also fails early if one is missing.
fn shard_row_counts(cfg: &RunConfig, reader: &ShardReader) -> Result<Vec<usize>> {
    match ShardManifest::load(&cfg.shard_dir)? {
        Some(manifest) => {
            manifest.validate(reader.context_size(), cfg.shard_count)?;
            Ok(manifest.window_counts)
        }
        None => {
            tracing::warn!(
                "No manifest in '{}', counting rows of {} shard files",
                cfg.shard_dir.display(),
                cfg.shard_count
            );
            (0..cfg.shard_count).map(|i| reader.count_rows(i)).collect()
        }
    }
}

/// Everything the loop needs besides the executor.
struct LoopParts {
    reader:      ShardReader,
    builder:     BatchBuilder,
    checkpoints: CheckpointManager,
    metrics:     MetricsLogger,
    loop_cfg:    LoopConfig,
}

impl LoopParts {
    fn run<E: StepExecutor>(self, executor: E) -> Result<TrainingSummary> {
        TrainingLoop::new(executor, self.reader, self.builder, self.checkpoints, self.loop_cfg)
            .with_metrics(self.metrics)
            .run()
    }
}

fn train_on<B: AutodiffBackend>(
    devices:   Vec<B::Device>,
    model_cfg: &LmModelConfig,
    scheduler: WarmupLinearSchedule,
    parts:     LoopParts,
) -> Result<TrainingSummary> {
    let Some(primary) = devices.first().cloned() else {
        bail!("No training device selected");
    };
    tracing::info!("Training on {:?} ({} device(s))", primary, devices.len());

    let model: LmModel<B> = model_cfg.init(&primary);

    if devices.len() == 1 {
        let executor = SingleDevice::new(model, model_cfg.clone(), adamw::<B>(), scheduler, primary);
        parts.run(executor)
    } else {
        let executor = Replicated::new(model, model_cfg.clone(), adamw::<B>(), scheduler, devices)?;
        parts.run(executor)
    }
}
