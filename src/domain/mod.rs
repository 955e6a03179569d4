// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits that define the core concepts
// of the pretraining pipeline.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// The concepts that flow through the whole system:
//   Document → one corpus entry that survived filtering
//   Window   → one fixed-length slice of a document's token ids
//   Batch    → B input/label pairs derived from B windows
//   traits   → the seams to the tokenizer and the step executor
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A normalised corpus document with its raw position
pub mod document;

// A fixed-length token window (one training example)
pub mod window;

// Input/label pairs grouped into one optimisation step
pub mod batch;

// Core abstractions (traits) that other layers implement
pub mod traits;
