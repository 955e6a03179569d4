// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for the two phases of a run:
//
//   build → corpus → tokens → windows → shard files
//   train → shards → batches → steps → checkpoints
//
// Rules for this layer:
//   - No tensor code here (that's Layer 5)
//   - No argument parsing (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Run configuration shared by both phases
pub mod config;

// Corpus → shard files
pub mod build_use_case;

// Shard files → trained model
pub mod train_use_case;
