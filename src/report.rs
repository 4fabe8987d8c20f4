use indexmap::IndexMap;

use crate::record::{Entry, GapRecord};
use crate::stats::TraceSummary;

type Row = (String, String);

/// Gap-duration percentiles drawn from the sorted view, no interpolation.
#[derive(Debug, PartialEq)]
pub struct Percentiles {
    pub median: i64,
    pub p75: i64,
    pub p90: i64,
    pub p99: i64,
}

/// Rank indices are `floor(n * p)`; for small n they collapse onto the
/// same element, which is expected. Returns None for an empty view.
pub fn percentiles(sorted_gaps: &[GapRecord]) -> Option<Percentiles> {
    if sorted_gaps.is_empty() {
        return None;
    }
    let n = sorted_gaps.len();
    let rank = |p: f64| sorted_gaps[((n as f64 * p) as usize).min(n - 1)].micros;
    Some(Percentiles {
        median: rank(0.50),
        p75: rank(0.75),
        p90: rank(0.90),
        p99: rank(0.99),
    })
}

/// Overall command throughput, None when no time elapsed.
pub fn commands_per_sec(summary: &TraceSummary) -> Option<f64> {
    let elapsed = summary.elapsed_seconds()?;
    Some(summary.lines_processed as f64 / elapsed)
}

/// Highest-count entries, count descending. The sort is stable, so ties
/// keep the map's first-seen insertion order.
pub fn top_n<V: Copy + Ord>(map: &IndexMap<String, V>, n: usize) -> Vec<(String, V)> {
    let mut items: Vec<(String, V)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    items.sort_by(|a, b| b.1.cmp(&a.1));
    items.truncate(n);
    items
}

/// Sum gap durations by the preceding entry's command, then rank the sums.
/// Grouping walks the arrival-order view so tie-breaks stay first-seen.
pub fn heaviest_by_command(summary: &TraceSummary, n: usize) -> Vec<(String, i64)> {
    let mut by_command: IndexMap<String, i64> = IndexMap::new();
    for gap in &summary.gaps {
        *by_command.entry(gap.entry.command.clone()).or_insert(0) += gap.micros;
    }
    top_n(&by_command, n)
}

/// The n largest gaps, largest first.
pub fn slowest(summary: &TraceSummary, n: usize) -> Vec<&GapRecord> {
    summary.sorted_gaps.iter().rev().take(n).collect()
}

/// Fixed rendering for one slow command: quoted command, quoted key if
/// present, then at most `max_args` arg tokens with an ellipsis marker
/// when more were truncated.
pub fn format_entry(entry: &Entry, max_args: usize) -> String {
    let mut out = format!("\"{}\"", entry.command);
    if let Some(key) = &entry.key {
        out.push_str(&format!(" \"{key}\""));
    }
    if let Some(args) = &entry.args {
        let parts: Vec<&str> = args.split(' ').collect();
        out.push(' ');
        out.push_str(&parts[..parts.len().min(max_args)].join(" "));
        if parts.len() > max_args {
            out.push_str(" ...");
        }
    }
    out
}

/// Render the full report in its fixed section order. Every section is
/// computed independently from the finalized summary; an empty aggregate
/// renders as `n/a` without disturbing the others.
pub fn render_report(summary: &TraceSummary) -> String {
    let n = summary.config.top_n;
    let mut out = String::new();
    write_section(&mut out, "General", &general_rows(summary), false);
    write_section(&mut out, "Latency Distribution", &latency_rows(summary), false);
    write_section(
        &mut out,
        "Biggest Contributors to Latency",
        &sum_rows(heaviest_by_command(summary, n)),
        false,
    );
    write_section(
        &mut out,
        "Command Breakdown",
        &count_rows(top_n(&summary.commands, n)),
        false,
    );
    write_section(
        &mut out,
        "Key Breakdown",
        &count_rows(top_n(&summary.keys, n)),
        false,
    );
    write_section(
        &mut out,
        "Prefix Breakdown",
        &count_rows(top_n(&summary.prefixes, n)),
        false,
    );
    write_section(&mut out, "Slowest Commands", &slowest_rows(summary), false);
    out
}

fn general_rows(summary: &TraceSummary) -> Vec<Row> {
    match commands_per_sec(summary) {
        Some(rate) => vec![
            (
                "Lines Processed".to_string(),
                summary.lines_processed.to_string(),
            ),
            ("Commands/Sec".to_string(), format!("{rate:.2}")),
        ],
        None => Vec::new(),
    }
}

fn latency_rows(summary: &TraceSummary) -> Vec<Row> {
    match percentiles(&summary.sorted_gaps) {
        Some(stats) => vec![
            ("Median".to_string(), stats.median.to_string()),
            ("75%".to_string(), stats.p75.to_string()),
            ("90%".to_string(), stats.p90.to_string()),
            ("99%".to_string(), stats.p99.to_string()),
        ],
        None => Vec::new(),
    }
}

fn slowest_rows(summary: &TraceSummary) -> Vec<Row> {
    slowest(summary, summary.config.top_n)
        .into_iter()
        .map(|gap| {
            (
                gap.micros.to_string(),
                format_entry(&gap.entry, summary.config.max_args_to_show),
            )
        })
        .collect()
}

fn count_rows(items: Vec<(String, u64)>) -> Vec<Row> {
    items
        .into_iter()
        .map(|(name, count)| (name, count.to_string()))
        .collect()
}

fn sum_rows(items: Vec<(String, i64)>) -> Vec<Row> {
    items
        .into_iter()
        .map(|(name, total)| (name, total.to_string()))
        .collect()
}

/// Title, underline, then column-aligned `key: value` rows, or `n/a` when
/// the section has nothing to show. The percentage mode suffixes values
/// with `%`; no current section uses it but the capability stays general.
fn write_section(out: &mut String, title: &str, rows: &[Row], percentages: bool) {
    out.push_str(title);
    out.push('\n');
    out.push_str(&"=".repeat(40));
    out.push('\n');
    if rows.is_empty() {
        out.push_str("n/a\n\n");
        return;
    }
    let key_width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let val_width = rows.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
    for (key, val) in rows {
        if percentages {
            out.push_str(&format!("{key:<key_width$}: {val}%\n"));
        } else {
            out.push_str(&format!("{key:<key_width$}: {val:<val_width$}\n"));
        }
    }
    out.push('\n');
}
