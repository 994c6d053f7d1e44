//! Breakscan CLI: breakout scans and snapshot inspection.
//!
//! Commands:
//! - `scan`: scan a universe of symbols from CSV files (or synthetic bars)
//! - `snapshot inspect`: print the contents of a detector snapshot file
//! - `config`: print the default scan configuration as TOML

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use breakscan_core::domain::PeakStatus;
use breakscan_runner::report::{write_breakouts_jsonl, write_summary};
use breakscan_runner::scan::read_snapshot;
use breakscan_runner::{
    ranked_rows, scan_universe, summarize, BreakoutRow, ScanConfig, ScanOptions, ScanSummary,
};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "breakscan", about = "Breakscan CLI: peak/breakout screener")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan symbols for breakouts and score them.
    Scan {
        /// Path to a TOML scan config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory of <SYMBOL>.csv files (date,open,high,low,close,volume).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Symbols to scan; overrides the config's universe.
        #[arg(long, num_args = 1..)]
        symbols: Vec<String>,

        /// Generate N synthetic bars for symbols without a CSV file.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Directory for per-symbol snapshots; enables warm restarts.
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,

        /// Write scored breakouts as JSONL.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the per-symbol summary as JSON.
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Leave out breakouts scoring below this.
        #[arg(long)]
        min_score: Option<f64>,

        /// Scan thread count. Defaults to one per core.
        #[arg(long)]
        threads: Option<usize>,

        /// Breakouts to print, highest score first.
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    /// Snapshot file commands.
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
    /// Print the default scan configuration as TOML.
    Config,
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Print schema version, history extent and active peaks of a snapshot.
    Inspect {
        /// Path to a <SYMBOL>.snapshot.json file.
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "breakscan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            config,
            data_dir,
            symbols,
            synthetic,
            snapshot_dir,
            output,
            summary,
            min_score,
            threads,
            top,
        } => {
            let mut scan_config = match config {
                Some(path) => ScanConfig::from_file(&path)
                    .with_context(|| format!("failed to load {}", path.display()))?,
                None => ScanConfig::default(),
            };
            if data_dir.is_some() {
                scan_config.universe.data_dir = data_dir;
            }
            if !symbols.is_empty() {
                scan_config.universe.symbols = symbols;
            }
            if synthetic.is_some() {
                scan_config.universe.synthetic_bars = synthetic;
            }
            if snapshot_dir.is_some() {
                scan_config.scan.snapshot_dir = snapshot_dir;
            }
            if min_score.is_some() {
                scan_config.scan.min_score = min_score;
            }
            if threads.is_some() {
                scan_config.scan.threads = threads;
            }
            run_scan(&scan_config, output.as_deref(), summary.as_deref(), top)
        }
        Commands::Snapshot { action } => match action {
            SnapshotAction::Inspect { file } => run_snapshot_inspect(&file),
        },
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&ScanConfig::default())?);
            Ok(())
        }
    }
}

fn run_scan(config: &ScanConfig, output: Option<&Path>, summary_path: Option<&Path>, top: usize) -> Result<()> {
    config.validate()?;
    if config.universe.data_dir.is_none() && config.universe.synthetic_bars.is_none() {
        bail!("one of --data-dir or --synthetic is required");
    }

    let opts = ScanOptions {
        load: config.universe.load_options(),
        snapshot_dir: config.scan.snapshot_dir.clone(),
        threads: config.scan.threads,
    };
    let report = scan_universe(&config.universe.symbols, &config.screener, &opts)?;

    let min_score = config.scan.min_score;
    let summary = summarize(&report, min_score);
    let rows = ranked_rows(&report, min_score);

    print_summary(&summary);
    print_top(&rows, top);

    for (symbol, error) in report.failures() {
        eprintln!("Error for {symbol}: {error}");
    }

    if let Some(path) = output {
        let written = write_breakouts_jsonl(path, &rows)?;
        info!("Wrote {} breakout(s) to {}", written, path.display());
    }
    if let Some(path) = summary_path {
        write_summary(path, &summary)?;
        info!("Wrote summary to {}", path.display());
    }

    if summary.scanned == 0 {
        bail!("every symbol failed");
    }
    Ok(())
}

fn print_summary(summary: &ScanSummary) {
    println!(
        "Symbols: {} scanned, {} failed{}",
        summary.scanned,
        summary.failed,
        if summary.synthetic { " (synthetic data)" } else { "" }
    );
    println!();
    println!(
        "{:<10} {:>7} {:>6} {:>10} {:>6} {:>8} {:<12}",
        "Symbol", "Bars", "New", "Breakouts", "Peaks", "Best", "Last"
    );
    println!("{}", "-".repeat(65));
    for s in &summary.per_symbol {
        if let Some(err) = &s.error {
            println!("{:<10} {}", s.symbol, truncate(err, 54));
            continue;
        }
        println!(
            "{:<10} {:>7} {:>6} {:>10} {:>6} {:>8} {:<12}",
            s.symbol,
            s.total_bars,
            s.new_bars,
            s.breakouts,
            s.active_peaks,
            s.best_score.map_or("-".to_string(), |v| format!("{v:.1}")),
            s.last_breakout.map_or("-".to_string(), |d| d.to_string()),
        );
    }
}

fn print_top(rows: &[BreakoutRow], top: usize) {
    if rows.is_empty() || top == 0 {
        return;
    }
    println!();
    println!("Top {} breakout(s):", top.min(rows.len()));
    for row in rows.iter().take(top) {
        println!(
            "  {:<8} {} @ {:.2}  {} peak(s)  {}",
            row.symbol,
            row.date,
            row.price,
            row.peaks_broken,
            row.formula.as_deref().unwrap_or("-")
        );
    }
}

fn run_snapshot_inspect(path: &Path) -> Result<()> {
    let snapshot = read_snapshot("?", path)?;

    println!("Snapshot: {}", path.display());
    println!("Symbol: {}", snapshot.symbol);
    println!("Schema version: {}", snapshot.schema_version);
    println!("Config fingerprint: {}", snapshot.config_fingerprint);
    match (snapshot.bars.first(), snapshot.bars.last()) {
        (Some(first), Some(last)) => println!(
            "Bars: {} ({} to {})",
            snapshot.bars.len(),
            first.date,
            last.date
        ),
        _ => println!("Bars: 0"),
    }
    println!("Next peak id: {}", snapshot.next_peak_id);
    println!("Pending candidates: {}", snapshot.pending.len());
    println!("Breakout history: {}", snapshot.history.len());
    if snapshot.halted {
        println!("Status: HALTED by a data fault");
    }

    if snapshot.peaks.is_empty() {
        println!("Active peaks: none");
        return Ok(());
    }
    println!();
    println!(
        "{:<6} {:>7} {:<12} {:>10} {:>8} {:>5} {:>5} {:<7}",
        "Id", "Index", "Date", "Price", "Height", "Left", "Right", "Status"
    );
    println!("{}", "-".repeat(68));
    for peak in &snapshot.peaks {
        let status = match peak.status {
            PeakStatus::Active => "active",
            PeakStatus::Tested => "tested",
            PeakStatus::Superseded => "superseded",
        };
        println!(
            "{:<6} {:>7} {:<12} {:>10.2} {:>7.1}% {:>5} {:>5} {:<7}",
            peak.id.to_string(),
            peak.index,
            peak.date.to_string(),
            peak.price,
            peak.relative_height * 100.0,
            peak.left_confirmation_bars,
            peak.right_confirmation_bars,
            status
        );
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
