use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::monitor;
use crate::stats::StatCounter;

/// Feed a saved monitor trace into the counter. Lines carrying monitor
/// framing (`ts [db addr] "CMD" ...`) keep their real timestamps and go
/// through record mode; bare command lines fall back to line mode, where
/// an unmatched line is skipped and counted.
pub fn analyze_file(path: &Path, counter: &mut StatCounter) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("failed to open trace file {}", path.display()))?;
    let reader = BufReader::new(file);
    for line in reader.lines() {
        let line = line.with_context(|| format!("failed to read trace file {}", path.display()))?;
        match monitor::parse_feed_line(line.trim_end()) {
            Some(record) => counter.ingest_record(&record),
            None => counter.ingest_line(&line),
        }
    }
    info!(
        "replayed {} lines ({} skipped) from {}",
        counter.lines_processed(),
        counter.skipped_lines(),
        path.display()
    );
    Ok(())
}
