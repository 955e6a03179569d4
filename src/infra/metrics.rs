// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends every logged training loss to a CSV file so learning
// curves can be plotted after (or during) a run.
//
// One row per log line of the training loop, i.e. every
// LOG_STEP steps within a shard:
//
//   epoch,piece,step,global_step,loss,lr
//   1,0,50,50,7.912345,0.000010
//   1,0,100,100,7.203311,0.000020
//   ...
//
// `epoch` is 1-based like the console log, `piece` is the
// position of the shard in this epoch's permutation, `step`
// counts batches within the shard, `global_step` counts
// optimizer steps since the start of the run.
//
// Output file: <checkpoint_dir>/metrics.csv
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

/// One logged mean loss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossRecord {
    pub epoch:       usize,
    pub piece:       usize,
    pub step:        usize,
    pub global_step: usize,
    /// Mean loss over the last LOG_STEP steps
    pub loss:        f64,
    pub lr:          f64,
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the logger. Writes the CSV header only if the file
    /// is new, so repeated runs append to the same log.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "epoch,piece,step,global_step,loss,lr")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, r: &LossRecord) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{},{},{:.6},{:.8}",
            r.epoch, r.piece, r.step, r.global_step, r.loss, r.lr,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(step: usize) -> LossRecord {
        LossRecord { epoch: 1, piece: 0, step, global_step: step, loss: 2.5, lr: 1e-4 }
    }

    #[test]
    fn test_header_written_once_and_rows_appended() {
        let tmp = TempDir::new().unwrap();
        let logger = MetricsLogger::new(tmp.path()).unwrap();
        logger.log(&record(50)).unwrap();

        // A second logger on the same dir must not rewrite the header
        let again = MetricsLogger::new(tmp.path()).unwrap();
        again.log(&record(100)).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "epoch,piece,step,global_step,loss,lr");
        assert!(lines[2].starts_with("1,0,100,100,2.500000"));
    }
}
