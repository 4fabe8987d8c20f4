use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

mod monitor;
mod parser;
mod record;
mod replay;
mod report;
mod stats;

use monitor::MonitorConfig;
use stats::{AnalyzerConfig, StatCounter};

#[derive(Parser, Debug)]
#[command(name = "redis-monitor-stats")]
#[command(about = "Capture a slice of a Redis MONITOR feed and report command statistics")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Delimiter separating a key's prefix from the rest of the key
    #[arg(long, default_value = ":", global = true)]
    prefix_delimiter: String,

    /// Number of entries shown in each top-N section
    #[arg(long, default_value = "8", global = true)]
    top: usize,

    /// Maximum argument tokens shown per slowest-command line
    #[arg(long, default_value = "5", global = true)]
    max_args: usize,

    /// Verbose logging (default: false)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture commands from a live MONITOR feed and analyze them
    Live {
        /// Redis hostname
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Redis port
        #[arg(long, default_value = "6379")]
        port: u16,

        /// Redis username (ACL)
        #[arg(long)]
        username: Option<String>,

        /// Redis password
        #[arg(long)]
        password: Option<String>,

        /// Redis db index
        #[arg(long, default_value = "0")]
        db: u32,

        /// Number of commands to capture
        #[arg(short = 'n', long, default_value = "500")]
        count: u64,
    },
    /// Analyze a saved monitor trace file
    Replay {
        /// Path to the trace file
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    let config = AnalyzerConfig {
        prefix_delimiter: args.prefix_delimiter.clone(),
        top_n: args.top,
        max_args_to_show: args.max_args,
    };
    let mut counter = StatCounter::new(config);

    match &args.command {
        Commands::Live {
            host,
            port,
            username,
            password,
            db,
            count,
        } => {
            let monitor_config = MonitorConfig {
                host: host.clone(),
                port: *port,
                username: username.clone(),
                password: password.clone(),
                db: *db,
                count: *count,
            };
            let records = monitor::capture(&monitor_config).await?;
            info!("captured {} records, analyzing", records.len());
            for record in &records {
                counter.ingest_record(record);
            }
        }
        Commands::Replay { file } => {
            info!("replaying trace file {}", file.display());
            replay::analyze_file(file, &mut counter)?;
        }
    }

    let summary = counter.finalize();
    print!("{}", report::render_report(&summary));
    Ok(())
}
