use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use xrec_srec::format::DEFAULT_LINE_WIDTH;
use xrec_srec::{convert, ConversionReport, EncoderConfig};

/// Exit status for `--strict` runs whose input was not clean
const STRICT_FAILURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "xrec2srec",
    about = "Convert an SWTPC X-record binary load file to Motorola S-records on stdout."
)]
struct Args {
    /// Input X-record file
    input: PathBuf,

    /// Maximum data bytes per S1 line
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_LINE_WIDTH)]
    line_width: usize,

    /// Exit with status 2 on unknown records, bad checksums, truncation or a missing termination record
    #[arg(long, action = clap::ArgAction::SetTrue)]
    strict: bool,

    /// Print the conversion report as JSON on stderr (needs the `serde` feature)
    #[arg(long, action = clap::ArgAction::SetTrue)]
    json_report: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);
    run(args)
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = EncoderConfig::new(args.line_width).context("invalid --line-width")?;
    let data = std::fs::read(&args.input)
        .with_context(|| format!("Unable to open {}", args.input.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let report = convert(&data, &mut out, config).context("writing S-records")?;

    // Warnings go after the record stream, never interleaved with it
    for warning in report.warnings() {
        writeln!(out, "\nWarning: {}", warning)?;
    }
    out.flush()?;

    if args.json_report {
        print_report(&report)?;
    }

    if args.strict && !report.is_strict_clean() {
        return Ok(ExitCode::from(STRICT_FAILURE));
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(feature = "serde")]
fn print_report(report: &ConversionReport) -> anyhow::Result<()> {
    eprintln!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[cfg(not(feature = "serde"))]
fn print_report(_: &ConversionReport) -> anyhow::Result<()> {
    tracing::warn!("--json-report ignored: built without the `serde` feature");
    Ok(())
}
