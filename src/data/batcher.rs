// ============================================================
// Layer 4 — Batch Builder and LM Batcher
// ============================================================
// Two steps turn a shuffled shard into model input:
//
// 1. BatchBuilder (pure Rust, no tensors)
//    Splits the rows into consecutive groups of B, dropping a
//    final group smaller than B, and derives for every row:
//
//      label = row                          [C]
//      input = [START_ID] ++ row[0 .. C-1]  [C]
//
//    Example with C=4, START_ID=101:
//      row   = [ 7,  8,  9, 10]
//      input = [101,  7,  8,  9]
//      label = [ 7,  8,  9, 10]
//
//    label[i] is the token the model must predict after
//    reading input[0..=i].
//
// 2. LmBatcher (Burn)
//    Implements Burn's Batcher trait: flattens B pairs into
//    one Vec and reshapes to [B, C] integer tensors on the
//    target device.
//
// Reference: Burn Book §4 (Batcher)
//            Rust Book §8 (Vectors)

use anyhow::{bail, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::batch::{Batch, TrainingPair};
use crate::domain::window::Window;

// ─── BatchBuilder ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct BatchBuilder {
    batch_size:   usize,
    context_size: usize,
    start_id:     u32,
}

impl BatchBuilder {
    pub fn new(batch_size: usize, context_size: usize, start_id: u32) -> Self {
        Self { batch_size, context_size, start_id }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// How many full batches `rows` rows yield.
    pub fn num_batches(&self, rows: usize) -> usize {
        rows / self.batch_size.max(1)
    }

    /// Consecutive, non-overlapping batches over `rows`.
    /// Each item fails if a row is not exactly C tokens long.
    pub fn batches<'a>(
        &'a self,
        rows: &'a [Window],
    ) -> impl Iterator<Item = Result<Batch>> + 'a {
        rows.chunks_exact(self.batch_size.max(1)).map(move |group| {
            let pairs = group
                .iter()
                .map(|row| self.pair(row))
                .collect::<Result<Vec<_>>>()?;
            Ok(Batch { pairs })
        })
    }

    /// Derive the input/label pair for one row.
    pub fn pair(&self, row: &Window) -> Result<TrainingPair> {
        if row.len() != self.context_size {
            bail!(
                "row has {} tokens, expected {}; shards and model disagree on context size",
                row.len(),
                self.context_size
            );
        }
        let label = row.ids().to_vec();
        let mut input = Vec::with_capacity(self.context_size);
        input.push(self.start_id);
        input.extend_from_slice(&label[..self.context_size - 1]);
        Ok(TrainingPair { input, label })
    }
}

// ─── LmBatch ──────────────────────────────────────────────────────────────────
/// A batch ready for the forward pass. Both tensors: [batch_size, C]
#[derive(Debug, Clone)]
pub struct LmBatch<B: Backend> {
    pub inputs: Tensor<B, 2, Int>,
    pub labels: Tensor<B, 2, Int>,
}

// ─── LmBatcher ────────────────────────────────────────────────────────────────
/// Holds the target device so tensors are created where the
/// forward pass will run.
#[derive(Clone, Debug)]
pub struct LmBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> LmBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn to_tensor(&self, rows: Vec<&[u32]>) -> Tensor<B, 2, Int> {
        let batch_size = rows.len();
        let seq_len    = rows.first().map(|r| r.len()).unwrap_or(0);
        let flat: Vec<i32> = rows
            .iter()
            .flat_map(|r| r.iter().map(|&id| id as i32))
            .collect();

        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len])
    }
}

impl<B: Backend> Batcher<TrainingPair, LmBatch<B>> for LmBatcher<B> {
    fn batch(&self, items: Vec<TrainingPair>) -> LmBatch<B> {
        let inputs = self.to_tensor(items.iter().map(|p| p.input.as_slice()).collect());
        let labels = self.to_tensor(items.iter().map(|p| p.label.as_slice()).collect());
        LmBatch { inputs, labels }
    }
}
