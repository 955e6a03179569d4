// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here (plus the tensor batcher in
// data/batcher.rs). The training loop itself only sees the
// StepExecutor trait.
//
//   model.rs     — Causal transformer language model
//                  • Token + learned position embeddings
//                  • Pre-norm decoder blocks with masked
//                    multi-head self-attention and GELU MLP
//                  • Final layer norm + LM head
//                  • Cross-entropy against the label row
//
//   scheduler.rs — Warmup-linear learning rate schedule
//
//   executor.rs  — One training step per batch:
//                  forward, backward, AdamW step, schedule
//                  step. Single-device and replicated
//                  (data parallel) variants.
//
//   trainer.rs   — Epoch → shard → batch loop, loss
//                  logging and checkpoints
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Radford et al. (2019) GPT-2

/// Causal transformer language model
pub mod model;

/// Warmup-linear learning rate schedule
pub mod scheduler;

/// Single-device and replicated step executors
pub mod executor;

/// Multi-epoch training loop over shards
pub mod trainer;
