// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All work is delegated to Layer 2 (application).
//
// Two commands, both driven by the same JSON run config:
//   1. `build` — tokenizes the corpus into shard files
//   2. `train` — trains the language model on the shards
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ConfigArgs};

use crate::application::config::RunConfig;

#[derive(Parser, Debug)]
#[command(
    name = "shard-pretrain",
    version,
    about = "Tokenize a JSON corpus into shards, then pretrain a causal language model on them."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Build(args) => run_build(args),
            Commands::Train(args) => run_train(args),
        }
    }
}

fn run_build(args: ConfigArgs) -> Result<()> {
    use crate::application::build_use_case::BuildUseCase;

    let config = RunConfig::load_or_default(args.config.as_deref())?;
    let manifest = BuildUseCase::new(config).execute()?;

    println!(
        "Build complete: {} windows from {} documents in {} shards.",
        manifest.total_windows(),
        manifest.kept_docs,
        manifest.shard_count
    );
    Ok(())
}

fn run_train(args: ConfigArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let config = RunConfig::load_or_default(args.config.as_deref())?;
    let checkpoint_dir = config.checkpoint_dir.clone();
    let summary = TrainUseCase::new(config).execute()?;

    println!(
        "Training complete after {} steps. Final model saved in '{}'.",
        summary.steps,
        checkpoint_dir.join(crate::infra::checkpoint::FINAL_DIR).display()
    );
    Ok(())
}
