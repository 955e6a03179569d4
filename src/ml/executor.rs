// ============================================================
// Layer 5 — Step Executors
// ============================================================
// A step executor owns the model, the optimizer and the LR
// schedule and performs ONE training step per batch:
//
//   tensors → forward → loss → backward → optimizer.step(lr)
//                                       → scheduler.step()
//
// Optimizer first, scheduler second, once per batch, with no
// gradient accumulation across batches.
//
// Two variants behind the same StepExecutor trait:
//
//   SingleDevice — the whole batch on one device.
//
//   Replicated   — data parallel. The batch rows are split
//                  into contiguous chunks, one per device.
//                  Each replica computes loss_i / n and its
//                  gradients; gradients are moved to the
//                  primary device and summed, which yields
//                  the gradient of the mean loss. The
//                  reported loss is the mean of the replica
//                  losses.
//
// Reference: Burn Book §5 (Training), Kingma & Ba (2015) Adam

use std::path::Path;

use anyhow::{bail, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    optim::{AdamWConfig, GradientsAccumulator, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::LmBatcher;
use crate::domain::batch::Batch;
use crate::domain::traits::StepExecutor;
use crate::infra::checkpoint;
use crate::ml::model::{LmModel, LmModelConfig};
use crate::ml::scheduler::WarmupLinearSchedule;

/// AdamW with the settings of the original GPT-2 fine-tuning
/// recipes: no weight decay, eps 1e-6.
pub fn adamw<B: AutodiffBackend>() -> impl Optimizer<LmModel<B>, B> {
    AdamWConfig::new()
        .with_weight_decay(0.0)
        .with_epsilon(1e-6)
        .init()
}

fn check_batch(batch: &Batch, n_ctx: usize) -> Result<()> {
    if batch.is_empty() {
        bail!("empty batch");
    }
    if batch.context_size() != n_ctx {
        bail!(
            "batch rows have {} tokens but the model context is {}",
            batch.context_size(),
            n_ctx
        );
    }
    Ok(())
}

// ─── SingleDevice ─────────────────────────────────────────────────────────────
pub struct SingleDevice<B: AutodiffBackend, O> {
    model:        LmModel<B>,
    model_config: LmModelConfig,
    optim:        O,
    scheduler:    WarmupLinearSchedule,
    batcher:      LmBatcher<B>,
}

impl<B, O> SingleDevice<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<LmModel<B>, B>,
{
    pub fn new(
        model:        LmModel<B>,
        model_config: LmModelConfig,
        optim:        O,
        scheduler:    WarmupLinearSchedule,
        device:       B::Device,
    ) -> Self {
        let model = model.fork(&device);
        Self { model, model_config, optim, scheduler, batcher: LmBatcher::new(device) }
    }
}

impl<B, O> StepExecutor for SingleDevice<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<LmModel<B>, B>,
{
    fn forward_backward_step(&mut self, batch: &Batch) -> Result<f64> {
        check_batch(batch, self.model_config.n_ctx)?;

        let tensors = self.batcher.batch(batch.pairs.clone());
        let loss = self.model.forward_loss(tensors.inputs, tensors.labels);
        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

        // Backward pass + AdamW update, then advance the schedule
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        let lr = self.scheduler.lr();
        self.model = self.optim.step(lr, self.model.clone(), grads);
        self.scheduler.step();

        Ok(loss_val)
    }

    fn save_snapshot(&self, dir: &Path) -> Result<()> {
        checkpoint::save_model(&self.model, &self.model_config, dir)
    }

    fn learning_rate(&self) -> f64 {
        self.scheduler.lr()
    }
}

// ─── Replicated ───────────────────────────────────────────────────────────────
pub struct Replicated<B: AutodiffBackend, O> {
    /// Master copy, lives on `batchers[0].device`
    model:        LmModel<B>,
    model_config: LmModelConfig,
    optim:        O,
    scheduler:    WarmupLinearSchedule,
    /// One batcher per device; index 0 is the primary device
    batchers:     Vec<LmBatcher<B>>,
}

impl<B, O> Replicated<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<LmModel<B>, B>,
{
    pub fn new(
        model:        LmModel<B>,
        model_config: LmModelConfig,
        optim:        O,
        scheduler:    WarmupLinearSchedule,
        devices:      Vec<B::Device>,
    ) -> Result<Self> {
        let Some(primary) = devices.first().cloned() else {
            bail!("replicated execution needs at least one device");
        };
        let model = model.fork(&primary);
        let batchers = devices.into_iter().map(LmBatcher::new).collect();
        Ok(Self { model, model_config, optim, scheduler, batchers })
    }

    pub fn replicas(&self) -> usize {
        self.batchers.len()
    }
}

impl<B, O> StepExecutor for Replicated<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<LmModel<B>, B>,
{
    fn forward_backward_step(&mut self, batch: &Batch) -> Result<f64> {
        check_batch(batch, self.model_config.n_ctx)?;

        // Scatter rows the way data-parallel wrappers do: ceil(B / n) per replica,
        // so small batches may leave trailing devices idle.
        let chunk = batch.len().div_ceil(self.batchers.len());
        let parts: Vec<_> = batch.pairs.chunks(chunk).collect();
        let active = parts.len() as f64;
        let primary = self.batchers[0].device.clone();

        let mut accumulator = GradientsAccumulator::<LmModel<B>>::new();
        let mut loss_sum = 0.0f64;

        for (part, batcher) in parts.iter().zip(&self.batchers) {
            let replica = self.model.clone().fork(&batcher.device);
            let tensors = batcher.batch(part.to_vec());
            let loss = replica.forward_loss(tensors.inputs, tensors.labels);
            loss_sum += loss.clone().into_scalar().elem::<f64>();

            let grads = (loss / active).backward();
            let grads = GradientsParams::from_grads(grads, &replica)
                .to_device(&primary, &self.model);
            accumulator.accumulate(&self.model, grads);
        }

        let grads = accumulator.grads();
        let lr = self.scheduler.lr();
        self.model = self.optim.step(lr, self.model.clone(), grads);
        self.scheduler.step();

        Ok(loss_sum / active)
    }

    fn save_snapshot(&self, dir: &Path) -> Result<()> {
        checkpoint::save_model(&self.model, &self.model_config, dir)
    }

    fn learning_rate(&self) -> f64 {
        self.scheduler.lr()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use crate::domain::batch::TrainingPair;

    type TestBackend = Autodiff<NdArray>;

    fn tiny() -> LmModelConfig {
        LmModelConfig::new(32, 4, 8, 2, 1).with_dropout(0.0)
    }

    fn batch(rows: usize) -> Batch {
        let pairs = (0..rows as u32)
            .map(|r| TrainingPair {
                input: vec![1, 2 + r, 3, 4],
                label: vec![2 + r, 3, 4, 5],
            })
            .collect();
        Batch { pairs }
    }

    #[test]
    fn test_single_device_step_advances_schedule() {
        let device = Default::default();
        let cfg = tiny();
        let model = cfg.init::<TestBackend>(&device);
        let schedule = WarmupLinearSchedule::new(1e-3, 0, 10);
        let mut exec = SingleDevice::new(model, cfg, adamw(), schedule, device);

        let before = exec.learning_rate();
        let loss = exec.forward_backward_step(&batch(2)).unwrap();
        assert!(loss.is_finite() && loss > 0.0);
        assert!(exec.learning_rate() < before);
    }

    #[test]
    fn test_repeated_steps_on_one_batch_reduce_loss() {
        let device = Default::default();
        let cfg = tiny();
        let model = cfg.init::<TestBackend>(&device);
        let schedule = WarmupLinearSchedule::new(1e-2, 0, 1000);
        let mut exec = SingleDevice::new(model, cfg, adamw(), schedule, device);

        let data = batch(2);
        let first = exec.forward_backward_step(&data).unwrap();
        let mut last = first;
        for _ in 0..30 {
            last = exec.forward_backward_step(&data).unwrap();
        }
        assert!(last < first, "loss did not drop: {first} -> {last}");
    }

    #[test]
    fn test_context_mismatch_is_fatal() {
        let device = Default::default();
        let cfg = LmModelConfig::new(32, 8, 8, 2, 1);
        let model = cfg.init::<TestBackend>(&device);
        let schedule = WarmupLinearSchedule::new(1e-3, 0, 10);
        let mut exec = SingleDevice::new(model, cfg, adamw(), schedule, device);
        assert!(exec.forward_backward_step(&batch(1)).is_err());
    }

    #[test]
    fn test_replicated_averages_replica_losses() {
        let device = Default::default();
        let cfg = tiny();
        let model = cfg.init::<TestBackend>(&device);
        let schedule = WarmupLinearSchedule::new(1e-3, 0, 10);
        let mut exec = Replicated::new(
            model, cfg, adamw(), schedule, vec![device; 2],
        ).unwrap();

        assert_eq!(exec.replicas(), 2);
        let loss = exec.forward_backward_step(&batch(3)).unwrap();
        assert!(loss.is_finite() && loss > 0.0);
    }

    #[test]
    fn test_replicated_needs_a_device() {
        let cfg = tiny();
        let model = cfg.init::<TestBackend>(&Default::default());
        let schedule = WarmupLinearSchedule::new(1e-3, 0, 10);
        assert!(Replicated::new(model, cfg, adamw(), schedule, vec![]).is_err());
    }
}
