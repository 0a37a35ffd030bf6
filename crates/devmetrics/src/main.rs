//! devmetrics - Device telemetry report builder.
//!
//! Builds one telemetry report from /proc (or a replayed capture) and prints
//! it as JSON or hex, or writes the raw encoded bytes.

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{Level, debug, error, info};
use tracing_subscriber::EnvFilter;

#[cfg(not(target_os = "linux"))]
use devmetrics_core::collector::MockFs;
#[cfg(target_os = "linux")]
use devmetrics_core::collector::RealFs;
use devmetrics_core::collector::{ProcfsSource, StatsSource};
use devmetrics_core::encoder::decode::decode_document;
use devmetrics_core::metrics::{MetricsFlagStore, MetricsGroup, kernel, tcp};
use devmetrics_core::report::{BuilderConfig, ReportBuilder, TagStyle};
use devmetrics_core::storage::StatsCapture;

/// Device telemetry report builder.
#[derive(Parser)]
#[command(name = "devmetrics", about = "Device telemetry report builder", version)]
struct Args {
    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// TCP connection metrics to report (comma separated).
    #[arg(long, value_enum, value_delimiter = ',', default_value = "all")]
    tcp: Vec<TcpMetric>,

    /// Report kernel runtime statistics. Disable with --kernel=false.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    kernel: bool,

    /// Key naming of the encoded report. Defaults to the build's tag style.
    #[arg(long, value_enum)]
    tags: Option<TagKeys>,

    /// Device type reported with kernel statistics. Defaults to the host OS.
    #[arg(long)]
    device_type: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Write output to a file instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Largest report to allocate (e.g., "64K", "1M", "4096").
    #[arg(long, value_parser = parse_size)]
    max_report_size: Option<u64>,

    /// Store the current statistics to a capture file instead of building a report.
    #[arg(long, value_name = "PATH", conflicts_with = "replay")]
    capture: Option<PathBuf>,

    /// Build the report from a capture file instead of /proc.
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TcpMetric {
    Established,
    Connections,
    Total,
    RemoteAddr,
    All,
    None,
}

impl TcpMetric {
    fn mask(self) -> u32 {
        match self {
            TcpMetric::Established => tcp::ESTABLISHED,
            TcpMetric::Connections => tcp::CONNECTIONS,
            TcpMetric::Total => tcp::TOTAL,
            TcpMetric::RemoteAddr => tcp::REMOTE_ADDR,
            TcpMetric::All => tcp::ALL,
            TcpMetric::None => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TagKeys {
    /// Descriptive keys, e.g. `tcp_connections`.
    Long,
    /// Terse keys, e.g. `tc`.
    Short,
}

impl From<TagKeys> for TagStyle {
    fn from(keys: TagKeys) -> Self {
        match keys {
            TagKeys::Long => TagStyle::Long,
            TagKeys::Short => TagStyle::Short,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Decoded report as pretty-printed JSON.
    Json,
    /// Encoded bytes as a hex dump.
    Hex,
    /// Encoded bytes as they are.
    Raw,
}

/// Parses a human-readable size string (e.g., "1M", "64K", "1024") into bytes.
fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".to_string());
    }

    let (num_str, multiplier) = if let Some(num) = s.strip_suffix('M') {
        (num, 1024 * 1024)
    } else if let Some(num) = s.strip_suffix('K') {
        (num, 1024)
    } else {
        (s, 1)
    };

    num_str
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid size '{}': {}", s, e))?
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size '{}' is too large", s))
}

fn tcp_mask(metrics: &[TcpMetric]) -> u32 {
    metrics.iter().fold(0, |mask, m| mask | m.mask())
}

/// Formats bytes as hex, 16 per line.
fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, line) in bytes.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
        out.push_str(&format!("{:08x}  {}\n", i * 16, hex.join(" ")));
    }
    out
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["devmetrics", "devmetrics_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    // stdout carries the report
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn live_source(proc_path: &str) -> Box<dyn StatsSource> {
    #[cfg(target_os = "linux")]
    let source = ProcfsSource::new(RealFs::new(), proc_path);
    #[cfg(not(target_os = "linux"))]
    let source = ProcfsSource::new(MockFs::typical_device(), proc_path);
    Box::new(source)
}

fn write_output(args: &Args, bytes: &[u8]) -> std::io::Result<()> {
    match &args.output {
        Some(path) => std::fs::write(path, bytes),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let mut source = match &args.replay {
        Some(path) => {
            let capture = StatsCapture::read(path)?;
            info!("Replaying capture from {}", path.display());
            Box::new(capture) as Box<dyn StatsSource>
        }
        None => live_source(&args.proc_path),
    };

    if let Some(path) = &args.capture {
        let capture = StatsCapture::collect(&mut source)?;
        capture.write(path)?;
        info!(
            "Captured {} connections and {} tasks to {}",
            capture.connections.len(),
            capture.kernel.tasks.len(),
            path.display()
        );
        return Ok(());
    }

    let store = Arc::new(MetricsFlagStore::new());
    store.set_flags(MetricsGroup::TcpConnections, tcp_mask(&args.tcp));
    if args.kernel {
        store.set_flags(MetricsGroup::KernelRuntimeStats, kernel::ALL);
    }

    let mut config = BuilderConfig::default();
    if let Some(keys) = args.tags {
        config.tag_style = keys.into();
    }
    if let Some(device_type) = &args.device_type {
        config.device_type = device_type.clone();
    }
    config.max_report_size = args
        .max_report_size
        .map(usize::try_from)
        .transpose()
        .map_err(|_| "max report size does not fit in memory")?;

    let mut builder = ReportBuilder::new(store, source, config);
    let report = builder.create_report()?;
    info!("Built report {} ({} bytes)", report.id(), report.len());

    match args.format {
        OutputFormat::Json => {
            let document = decode_document(report.as_bytes())?;
            let mut json = serde_json::to_string_pretty(&document)?;
            json.push('\n');
            write_output(args, json.as_bytes())?;
        }
        OutputFormat::Hex => write_output(args, hex_dump(report.as_bytes()).as_bytes())?,
        OutputFormat::Raw => write_output(args, report.as_bytes())?,
    }

    if let Some(timing) = builder.last_timing() {
        debug!(
            "Timing: sizing={:?}, writing={:?}, total={:?}, attempts={}",
            timing.sizing, timing.writing, timing.total, timing.attempts
        );
    }
    builder.delete_report();
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size("64K"), Ok(64 * 1024));
        assert_eq!(parse_size(" 1M "), Ok(1024 * 1024));
        assert!(parse_size("").is_err());
        assert!(parse_size("lots").is_err());
        assert!(parse_size(&format!("{}M", u64::MAX)).is_err());
    }

    #[test]
    fn test_tcp_mask() {
        assert_eq!(tcp_mask(&[TcpMetric::All]), tcp::ALL);
        assert_eq!(tcp_mask(&[TcpMetric::None]), 0);
        assert_eq!(
            tcp_mask(&[TcpMetric::Established, TcpMetric::Total]),
            tcp::ESTABLISHED | tcp::TOTAL
        );
    }

    #[test]
    fn test_args_parse_flag_lists() {
        let args = Args::parse_from([
            "devmetrics",
            "--tcp",
            "established,remote-addr",
            "--kernel=false",
            "--format",
            "hex",
        ]);
        assert_eq!(args.tcp, vec![TcpMetric::Established, TcpMetric::RemoteAddr]);
        assert!(!args.kernel);
        assert_eq!(args.format, OutputFormat::Hex);
        assert!(Args::try_parse_from(["devmetrics", "--capture", "a", "--replay", "b"]).is_err());
    }

    #[test]
    fn test_tags_select_either_style() {
        let args = Args::parse_from(["devmetrics"]);
        assert_eq!(args.tags, None);

        let args = Args::parse_from(["devmetrics", "--tags", "long"]);
        assert_eq!(args.tags.map(TagStyle::from), Some(TagStyle::Long));

        let args = Args::parse_from(["devmetrics", "--tags", "short"]);
        assert_eq!(args.tags.map(TagStyle::from), Some(TagStyle::Short));
    }

    #[test]
    fn test_hex_dump() {
        let bytes: Vec<u8> = (0u8..18).collect();
        let dump = hex_dump(&bytes);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000  00 01 02"));
        assert_eq!(lines[1], "00000010  10 11");
    }
}
