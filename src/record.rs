/// One event drained from a MONITOR feed before grammar parsing: the
/// server-side timestamp plus the command text exactly as reassembled from
/// the feed line.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorRecord {
    pub timestamp: f64, // seconds since epoch
    pub command_text: String,
}

/// One parsed command occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub timestamp: f64, // seconds since epoch
    pub command: String,
    pub key: Option<String>,
    pub args: Option<String>,
}

/// Inter-arrival gap attributed to the entry that *preceded* it.
///
/// The monitor feed carries no execution times, so the elapsed time until
/// the next command arrived stands in for a command's latency. That the gap
/// belongs to the preceding entry, not the current one, is the intended
/// model and must not be reattributed.
#[derive(Debug, Clone, PartialEq)]
pub struct GapRecord {
    pub micros: i64, // negative when input arrives out of order
    pub entry: Entry,
}
