// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Multi-epoch loop over the shard files:
//
//   for epoch in 0..EPOCHS:
//       order = random permutation of [0, S)
//       for (piece, shard) in order:
//           rows = load(shard); shuffle(rows)
//           for step, batch in batches(rows):
//               loss = executor.step(batch)
//               every LOG_STEP steps → log mean loss
//       snapshot → model_epoch{epoch}
//   snapshot → final_model
//
// The loop never touches tensors. Everything device related
// lives behind the StepExecutor it drives, so the same loop
// runs single-device or replicated training, and tests drive
// it with a fake executor.
//
// Randomness comes from one StdRng: seeded when a seed is
// configured (reproducible shard order and row shuffles),
// from entropy otherwise.
//
// Reference: Burn Book §5 (Training)

use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::batcher::BatchBuilder;
use crate::data::shard::ShardReader;
use crate::domain::traits::StepExecutor;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{LossRecord, MetricsLogger};

// ─── Loop Configuration ──────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub epochs:      usize,
    pub shard_count: usize,
    pub log_step:    usize,
    pub seed:        Option<u64>,
}

// ─── Loop State ──────────────────────────────────────────────────────────────
/// Where the loop currently is. Exposed for logging and tests.
#[derive(Debug, Clone, Default)]
pub struct TrainingState {
    pub epoch:        usize,
    pub shard_order:  Vec<usize>,
    /// Position of the current shard within `shard_order`
    pub piece:        usize,
    /// Sum of losses since the shard was opened or last logged
    pub running_loss: f64,
    /// Optimizer steps taken since the start of the run
    pub global_step:  usize,
}

/// What a finished run produced.
#[derive(Debug, Clone, Default)]
pub struct TrainingSummary {
    pub steps:       usize,
    pub losses:      Vec<LossRecord>,
    pub checkpoints: Vec<PathBuf>,
}

// ─── TrainingLoop ─────────────────────────────────────────────────────────────
pub struct TrainingLoop<E: StepExecutor> {
    executor:    E,
    reader:      ShardReader,
    builder:     BatchBuilder,
    checkpoints: CheckpointManager,
    metrics:     Option<MetricsLogger>,
    cfg:         LoopConfig,
    rng:         StdRng,
    state:       TrainingState,
}

impl<E: StepExecutor> TrainingLoop<E> {
    pub fn new(
        executor:    E,
        reader:      ShardReader,
        builder:     BatchBuilder,
        checkpoints: CheckpointManager,
        cfg:         LoopConfig,
    ) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };
        Self {
            executor,
            reader,
            builder,
            checkpoints,
            metrics: None,
            cfg,
            rng,
            state: TrainingState::default(),
        }
    }

    /// Also append every logged loss to a metrics CSV.
    pub fn with_metrics(mut self, metrics: MetricsLogger) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Run every epoch, then write the final snapshot.
    pub fn run(&mut self) -> Result<TrainingSummary> {
        let mut summary = TrainingSummary::default();

        tracing::info!(
            "Starting training: {} epochs over {} shards",
            self.cfg.epochs,
            self.cfg.shard_count
        );

        for epoch in 0..self.cfg.epochs {
            self.run_epoch(epoch, &mut summary)?;

            // ── Epoch complete → checkpoint ───────────────────────────────────
            let dir = self.checkpoints.epoch_dir(epoch);
            tracing::info!("Saving model for epoch {} to '{}'", epoch, dir.display());
            self.executor
                .save_snapshot(&dir)
                .with_context(|| format!("Checkpoint for epoch {epoch} failed"))?;
            summary.checkpoints.push(dir);
        }

        let dir = self.checkpoints.final_dir();
        self.executor
            .save_snapshot(&dir)
            .context("Final checkpoint failed")?;
        summary.checkpoints.push(dir);

        summary.steps = self.state.global_step;
        tracing::info!("Training finished after {} steps", summary.steps);
        Ok(summary)
    }

    fn run_epoch(&mut self, epoch: usize, summary: &mut TrainingSummary) -> Result<()> {
        // ── Epoch start: fresh shard permutation ─────────────────────────────
        let mut order: Vec<usize> = (0..self.cfg.shard_count).collect();
        order.shuffle(&mut self.rng);
        self.state.epoch = epoch;
        self.state.shard_order = order.clone();

        for (piece, &shard) in order.iter().enumerate() {
            self.state.piece = piece;
            self.run_shard(shard, summary)?;
        }

        tracing::info!("Epoch {}/{} complete", epoch + 1, self.cfg.epochs);
        Ok(())
    }

    fn run_shard(&mut self, shard: usize, summary: &mut TrainingSummary) -> Result<()> {
        // ── Shard loaded: rows shuffled in place ──────────────────────────────
        let mut rows = self.reader.load(shard)?;
        rows.shuffle(&mut self.rng);
        self.state.running_loss = 0.0;

        tracing::debug!(
            "Piece {} (shard {}): {} rows, {} batches",
            self.state.piece,
            shard,
            rows.len(),
            self.builder.num_batches(rows.len())
        );

        for (step, batch) in self.builder.batches(&rows).enumerate() {
            let batch = batch.with_context(|| format!("Shard {shard}, step {step}"))?;

            // Read before the step: the rate this step trains with
            let lr = self.executor.learning_rate();
            let loss = self
                .executor
                .forward_backward_step(&batch)
                .with_context(|| format!("Training step failed in shard {shard}, step {step}"))?;

            self.state.running_loss += loss;
            self.state.global_step += 1;

            if (step + 1) % self.cfg.log_step == 0 {
                let record = LossRecord {
                    epoch:       self.state.epoch + 1,
                    piece:       self.state.piece,
                    step:        step + 1,
                    global_step: self.state.global_step,
                    loss:        self.state.running_loss / self.cfg.log_step as f64,
                    lr,
                };
                tracing::info!(
                    "step {} of piece {} of epoch {}, loss {:.6}",
                    record.step,
                    record.piece,
                    record.epoch,
                    record.loss
                );
                if let Some(metrics) = &self.metrics {
                    metrics.log(&record)?;
                }
                summary.losses.push(record);
                self.state.running_loss = 0.0;
            }
        }
        Ok(())
    }
}
