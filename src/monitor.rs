use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tracing::{debug, info, warn};

use crate::record::MonitorRecord;

/// Connection parameters for a live capture. These belong to the
/// acquisition side; the analysis core never sees them.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: u32,
    pub count: u64,
}

/// Connect to the server, enter MONITOR mode and drain exactly
/// `config.count` feed events (fewer if the server closes the stream).
pub async fn capture(config: &MonitorConfig) -> Result<Vec<MonitorRecord>> {
    let addr = format!("{}:{}", config.host, config.port);
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    if let Some(password) = &config.password {
        let args: Vec<&str> = match &config.username {
            Some(username) => vec!["AUTH", username, password],
            None => vec!["AUTH", password],
        };
        send_command(&mut write_half, &args).await?;
        expect_ok(&mut reader, "AUTH").await?;
    }
    if config.db != 0 {
        let db = config.db.to_string();
        send_command(&mut write_half, &["SELECT", &db]).await?;
        expect_ok(&mut reader, "SELECT").await?;
    }
    send_command(&mut write_half, &["MONITOR"]).await?;
    expect_ok(&mut reader, "MONITOR").await?;

    info!("monitoring {}, capturing {} commands", addr, config.count);
    let mut records = Vec::with_capacity(config.count as usize);
    let mut line = String::new();
    while (records.len() as u64) < config.count {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .await
            .context("error reading monitor stream")?;
        if read == 0 {
            warn!("monitor stream closed after {} records", records.len());
            break;
        }
        match parse_feed_line(line.trim_end()) {
            Some(record) => records.push(record),
            None => debug!(line = line.trim_end(), "ignoring unframed monitor line"),
        }
    }
    Ok(records)
}

async fn send_command(stream: &mut (impl AsyncWriteExt + Unpin), args: &[&str]) -> Result<()> {
    let mut buf = format!("*{}\r\n", args.len());
    for arg in args {
        buf.push_str(&format!("${}\r\n{arg}\r\n", arg.len()));
    }
    stream
        .write_all(buf.as_bytes())
        .await
        .with_context(|| format!("failed to send {}", args[0]))?;
    Ok(())
}

async fn expect_ok(reader: &mut BufReader<OwnedReadHalf>, what: &str) -> Result<()> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .with_context(|| format!("no reply to {what}"))?;
    let reply = line.trim_end();
    if let Some(err) = reply.strip_prefix('-') {
        bail!("{what} rejected by server: {err}");
    }
    if !reply.starts_with('+') {
        bail!("unexpected reply to {what}: {reply:?}");
    }
    Ok(())
}

/// Parse one monitor feed event. Events are RESP simple strings shaped
/// like `+1682369495.615616 [0 172.20.0.1:53714] "GET" "foo" "bar"`; the
/// quoted tokens are unescaped and rejoined into plain command text.
/// Returns None for anything else on the wire (e.g. the leading `+OK`).
pub fn parse_feed_line(line: &str) -> Option<MonitorRecord> {
    let line = line.strip_prefix('+').unwrap_or(line);
    let (ts_token, rest) = line.split_once(' ')?;
    let timestamp: f64 = ts_token.parse().ok()?;
    let rest = rest.trim_start();
    let rest = match rest.strip_prefix('[') {
        Some(tail) => tail.split_once(']')?.1.trim_start(),
        None => rest,
    };
    let command_text = unquote_command(rest);
    if command_text.is_empty() {
        return None;
    }
    Some(MonitorRecord {
        timestamp,
        command_text,
    })
}

/// Rejoin the feed's quoted tokens with single spaces, resolving the
/// escapes the server emits inside them.
fn unquote_command(text: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    parts.push(std::mem::take(&mut current));
                }
                in_quotes = !in_quotes;
            }
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    current.push(match escaped {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        other => other,
                    });
                }
            }
            _ if in_quotes => current.push(ch),
            _ => {}
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_framed_feed_line() {
        let record = parse_feed_line(
            "+1682369495.615616 [0 172.20.0.1:53714] \"GET\" \"user:1000\"",
        )
        .unwrap();
        assert_eq!(record.timestamp, 1682369495.615616);
        assert_eq!(record.command_text, "GET user:1000");
    }

    #[test]
    fn parses_line_without_resp_prefix() {
        let record =
            parse_feed_line("1683239297.423577 [0 lua] \"SCAN\" \"0\" \"COUNT\" \"1000\"").unwrap();
        assert_eq!(record.command_text, "SCAN 0 COUNT 1000");
    }

    #[test]
    fn rejects_status_and_garbage_lines() {
        assert!(parse_feed_line("+OK").is_none());
        assert!(parse_feed_line("").is_none());
        assert!(parse_feed_line("not a feed line").is_none());
        assert!(parse_feed_line("1682369495.615616 [0 client]").is_none());
    }

    #[test]
    fn unescapes_quoted_tokens() {
        let record =
            parse_feed_line("1.0 [0 c] \"SET\" \"k\" \"a\\\"b\\tc\"").unwrap();
        assert_eq!(record.command_text, "SET k a\"b\tc");
    }
}
