// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Every setting lives in the JSON run config, so the commands
// only take the path to it.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Tokenize the corpus and write the shard files
    Build(ConfigArgs),

    /// Train the language model on previously built shards
    Train(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// JSON run config; built-in defaults when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
}
