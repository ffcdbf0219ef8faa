mod config;
mod fill;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

use blankfill_core::{
    rewrite_bytes, scan_document, Document, PayloadMode, ResponsesPayload, ScanOptions, SlotPolicy,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use config::{Config, OracleProvider};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "BLANKFILL_LOG";

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Shape of a responses file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// A list of {id, label, value}, one per placeholder in scan order
    Ordered,
    /// A map from label to value
    Labeled,
}

impl From<ModeArg> for PayloadMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Ordered => PayloadMode::Ordered,
            ModeArg::Labeled => PayloadMode::Labeled,
        }
    }
}

/// Find and fill the placeholders of .docx templates.
#[derive(Parser)]
#[command(
    name = "blankfill",
    version,
    about = "Find and fill the placeholders of .docx templates"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log debug details to stderr
    #[arg(long, global = true)]
    verbose: bool,

    /// Path to a blankfill.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the placeholders of a document, with their context
    Scan {
        /// Path to the .docx template
        document: PathBuf,
        /// Words of context kept on each side of a placeholder
        #[arg(long)]
        radius: Option<usize>,
    },

    /// Resolve every placeholder interactively, then write the filled document
    Fill {
        /// Path to the .docx template
        document: PathBuf,
        /// Where to write the filled document
        #[arg(long)]
        out: PathBuf,
        /// Decision oracle to use
        #[arg(long, value_enum)]
        oracle: Option<OracleProvider>,
        /// Model name for an LLM oracle
        #[arg(long)]
        model: Option<String>,
        /// Also write the resolved values as an ordered responses file
        #[arg(long)]
        save_responses: Option<PathBuf>,
        /// Fail instead of filling partially when values and placeholders disagree
        #[arg(long)]
        strict: bool,
    },

    /// Write a filled document from a responses file
    Rewrite {
        /// Path to the .docx template
        document: PathBuf,
        /// Responses file (JSON), or - for stdin
        #[arg(long)]
        responses: PathBuf,
        /// How the responses are keyed
        #[arg(long, value_enum, default_value = "ordered")]
        mode: ModeArg,
        /// Where to write the filled document
        #[arg(long)]
        out: PathBuf,
        /// Fail instead of filling partially when values and placeholders disagree
        #[arg(long)]
        strict: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&format!("error loading config: {}", e), cli.output, cli.quiet);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Scan { document, radius } => {
            let mut scan = config.scan;
            if let Some(radius) = radius {
                scan.context_radius = radius;
            }
            cmd_scan(&document, &scan, cli.output, cli.quiet);
        }
        Commands::Fill {
            document,
            out,
            oracle,
            model,
            save_responses,
            strict,
        } => {
            let Config {
                scan,
                oracle: mut oracle_settings,
                rewrite,
            } = config;
            if let Some(provider) = oracle {
                oracle_settings.provider = provider;
            }
            if model.is_some() {
                oracle_settings.model = model;
            }
            fill::cmd_fill(fill::FillOptions {
                document: &document,
                out: &out,
                save_responses: save_responses.as_deref(),
                scan,
                oracle: oracle_settings,
                policy: slot_policy(strict, rewrite.slot_policy),
                output: cli.output,
                quiet: cli.quiet,
            });
        }
        Commands::Rewrite {
            document,
            responses,
            mode,
            out,
            strict,
        } => {
            cmd_rewrite(
                &document,
                &responses,
                mode.into(),
                &out,
                slot_policy(strict, config.rewrite.slot_policy),
                cli.output,
                cli.quiet,
            );
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn slot_policy(strict: bool, configured: SlotPolicy) -> SlotPolicy {
    if strict {
        SlotPolicy::Strict
    } else {
        configured
    }
}

fn read_document(path: &Path, output: OutputFormat, quiet: bool) -> Vec<u8> {
    match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            let msg = format!("error reading '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_scan(path: &Path, options: &ScanOptions, output: OutputFormat, quiet: bool) {
    let bytes = read_document(path, output, quiet);
    let document = match Document::from_bytes(&bytes) {
        Ok(d) => d,
        Err(e) => {
            let msg = format!("error opening '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let report = scan_document(&document, options);

    match output {
        OutputFormat::Json => {
            let pretty = serde_json::to_string_pretty(&report)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            if report.occurrences.is_empty() {
                if !quiet {
                    println!("no placeholders found");
                }
                return;
            }
            for occ in &report.occurrences {
                println!("{:>4}  {:<28} {}", occ.id, occ.label, occ.raw);
                if !quiet {
                    println!("      {}", report.context(occ.id));
                }
            }
            if !quiet {
                let distinct: std::collections::BTreeSet<&str> =
                    report.occurrences.iter().map(|o| o.label.as_str()).collect();
                println!();
                println!(
                    "{} placeholders, {} distinct labels",
                    report.occurrences.len(),
                    distinct.len()
                );
            }
        }
    }
}

fn cmd_rewrite(
    document: &Path,
    responses: &Path,
    mode: PayloadMode,
    out: &Path,
    policy: SlotPolicy,
    output: OutputFormat,
    quiet: bool,
) {
    let bytes = read_document(document, output, quiet);

    let raw = if responses == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map(|_| buf)
            .map_err(|e| format!("error reading responses from stdin: {}", e))
    } else {
        std::fs::read_to_string(responses)
            .map_err(|e| format!("error reading '{}': {}", responses.display(), e))
    };
    let raw = match raw {
        Ok(r) => r,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let payload = match ResponsesPayload::parse(&raw, mode) {
        Ok(p) => p,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let (filled, summary) = match rewrite_bytes(&bytes, &payload, policy) {
        Ok(r) => r,
        Err(e) => {
            report_error(&format!("rewrite failed: {}", e), output, quiet);
            process::exit(1);
        }
    };
    if let Err(e) = std::fs::write(out, filled) {
        let msg = format!("error writing '{}': {}", out.display(), e);
        report_error(&msg, output, quiet);
        process::exit(1);
    }

    match output {
        OutputFormat::Text => {
            if !quiet {
                println!(
                    "wrote {} ({} of {} placeholders filled)",
                    out.display(),
                    summary.replacements,
                    summary.placeholders_found
                );
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "output": out.display().to_string(),
                "report": summary,
            });
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
    }
}

/// Report an error in the requested output format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
