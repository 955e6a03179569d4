// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns shared by the build and train phases:
//
//   checkpoint.rs      — Model snapshots
//                        Burn's CompactRecorder for the weights,
//                        model_config.json next to them, so every
//                        snapshot directory can rebuild its model.
//                        Also stores the run configuration.
//
//   tokenizer_store.rs — Tokenizer loading
//                        Loads tokenizer.json, or builds a
//                        word-level one from the corpus if none
//                        exists yet.
//
//   metrics.rs         — Loss logging
//                        Appends every logged loss to a CSV file.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model snapshot saving and loading
pub mod checkpoint;

/// Tokenizer loading (or building) and the TextTokenizer impl
pub mod tokenizer_store;

/// Training loss CSV logger
pub mod metrics;
