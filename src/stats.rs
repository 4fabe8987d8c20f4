use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::parser;
use crate::record::{Entry, GapRecord, MonitorRecord};

/// Knobs the analysis core accepts. Connection parameters and the capture
/// count belong to the acquisition side, not here.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub prefix_delimiter: String,
    pub top_n: usize,
    pub max_args_to_show: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            prefix_delimiter: ":".to_string(),
            top_n: 8,
            max_args_to_show: 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("non-finite timestamp {0}")]
    BadTimestamp(f64),
}

/// Single-writer accumulator for one capture. Ingestion mutates it one
/// record at a time; `finalize` consumes it and hands back the read-only
/// summary the report is drawn from.
#[derive(Debug)]
pub struct StatCounter {
    config: AnalyzerConfig,
    lines_processed: u64,
    skipped_lines: u64,
    commands: IndexMap<String, u64>,
    keys: IndexMap<String, u64>,
    prefixes: IndexMap<String, u64>,
    gaps: Vec<GapRecord>,
    start_micros: Option<i64>,
    last_micros: Option<i64>,
    last_entry: Option<Entry>,
}

impl StatCounter {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            lines_processed: 0,
            skipped_lines: 0,
            commands: IndexMap::new(),
            keys: IndexMap::new(),
            prefixes: IndexMap::new(),
            gaps: Vec::new(),
            start_micros: None,
            last_micros: None,
            last_entry: None,
        }
    }

    pub fn lines_processed(&self) -> u64 {
        self.lines_processed
    }

    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines
    }

    /// Record mode: the unit counts as processed even when its embedded
    /// command text matches no grammar tier. Line mode skips such units
    /// instead; the asymmetry is intentional.
    pub fn ingest_record(&mut self, record: &MonitorRecord) {
        self.lines_processed += 1;
        match parser::parse_record(record) {
            Ok(entry) => {
                if let Err(err) = self.process_entry(entry) {
                    warn!(command = %record.command_text, %err, "failed to process entry");
                }
            }
            Err(err) => warn!(%err, "monitor record matched no grammar"),
        }
    }

    /// Line mode: an unmatched line is skipped and counted, never fatal.
    /// Bare lines carry no timestamp, so entries ingest at t=0 and the
    /// gap and throughput sections degrade to n/a.
    pub fn ingest_line(&mut self, line: &str) {
        match parser::parse_command_text(line.trim_end()) {
            Ok(parsed) => {
                self.lines_processed += 1;
                let entry = parsed.into_entry(0.0);
                if let Err(err) = self.process_entry(entry) {
                    warn!(line, %err, "failed to process entry");
                }
            }
            Err(_) => {
                self.skipped_lines += 1;
                debug!(line, "skipped unmatched line");
            }
        }
    }

    fn process_entry(&mut self, entry: Entry) -> Result<(), ProcessError> {
        self.record_duration(entry.clone())?;
        *self.commands.entry(entry.command).or_insert(0) += 1;
        if let Some(key) = entry.key {
            self.record_key(&key);
        }
        Ok(())
    }

    fn record_duration(&mut self, entry: Entry) -> Result<(), ProcessError> {
        if !entry.timestamp.is_finite() {
            return Err(ProcessError::BadTimestamp(entry.timestamp));
        }
        let micros = (entry.timestamp * 1_000_000.0).round() as i64;
        let last = match self.last_micros {
            Some(last) => last,
            None => {
                // First entry anchors the capture; never overwritten.
                self.start_micros = Some(micros);
                micros
            }
        };
        // Negative gaps are permitted: out-of-order input degrades the
        // percentiles, it does not error.
        let gap = micros - last;
        let previous = self.last_entry.replace(entry);
        if let Some(previous) = previous {
            if gap != 0 {
                self.gaps.push(GapRecord {
                    micros: gap,
                    entry: previous,
                });
            }
        }
        self.last_micros = Some(micros);
        Ok(())
    }

    fn record_key(&mut self, key: &str) {
        *self.keys.entry(key.to_string()).or_insert(0) += 1;
        if let Some((prefix, _)) = key.split_once(&self.config.prefix_delimiter) {
            *self.prefixes.entry(prefix.to_string()).or_insert(0) += 1;
        }
    }

    /// Consume the counter and build the immutable snapshot all report
    /// queries run against. The ascending gap view is sorted exactly once
    /// here; further ingestion is impossible by construction.
    pub fn finalize(self) -> TraceSummary {
        let mut sorted_gaps = self.gaps.clone();
        sorted_gaps.sort_by_key(|gap| gap.micros);
        TraceSummary {
            config: self.config,
            lines_processed: self.lines_processed,
            skipped_lines: self.skipped_lines,
            commands: self.commands,
            keys: self.keys,
            prefixes: self.prefixes,
            gaps: self.gaps,
            sorted_gaps,
            start_micros: self.start_micros,
            last_micros: self.last_micros,
        }
    }
}

/// Finalized, read-only aggregates for one capture.
#[derive(Debug)]
pub struct TraceSummary {
    pub config: AnalyzerConfig,
    pub lines_processed: u64,
    pub skipped_lines: u64,
    pub commands: IndexMap<String, u64>,
    pub keys: IndexMap<String, u64>,
    pub prefixes: IndexMap<String, u64>,
    /// Gap records in arrival order.
    pub gaps: Vec<GapRecord>,
    /// The same records sorted ascending by duration.
    pub sorted_gaps: Vec<GapRecord>,
    pub start_micros: Option<i64>,
    pub last_micros: Option<i64>,
}

impl TraceSummary {
    /// Capture duration in seconds, None until two distinct timestamps
    /// have been observed.
    pub fn elapsed_seconds(&self) -> Option<f64> {
        let (start, last) = (self.start_micros?, self.last_micros?);
        let elapsed = (last - start) as f64 / 1_000_000.0;
        if elapsed == 0.0 { None } else { Some(elapsed) }
    }
}
