use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use table_recon::io::dataset_read;
use table_recon::logging::init_logging;
use table_recon::{ExportFormat, ReconConfig, Reconciler, Result, StringPolicy};
use tracing::warn;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose)?;
    match cli.command {
        Command::Compare(args) => execute_compare(args),
    }
}

fn execute_compare(args: CompareArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ReconConfig::load(path)?,
        None => ReconConfig::default(),
    };
    args.apply_overrides(&mut config)?;
    config.validate()?;

    let source = dataset_read::read_dataset(&args.source, args.source_sheet.as_deref())?;
    let target = dataset_read::read_dataset(&args.target, args.target_sheet.as_deref())?;

    let reconciler = Reconciler::new();
    let result = match config.numeric_tolerance {
        Some(threshold) => reconciler.compare_with_numeric_tolerance(
            &args.name,
            &source,
            &target,
            threshold,
            &config.options,
        )?,
        None => reconciler.compare(&args.name, &source, &target, &config.options)?,
    };

    let summary = &result.summary;
    println!(
        "{}: {:.2}% match, {} differences ({} field, {} missing in target, {} missing in source), \
         {} source / {} target rows",
        result.name,
        summary.match_percentage,
        summary.total_differences,
        summary.field_differences,
        summary.missing_in_target,
        summary.missing_in_source,
        summary.source_rows,
        summary.target_rows,
    );
    for warning in &result.metadata.warnings {
        warn!(comparison = %result.name, "{warning}");
    }

    if let Some(directory) = &config.output_dir {
        let files = reconciler.export(&result.name, config.format()?, directory)?;
        for file in files {
            println!("exported {}", file.display());
        }
    }

    if let Some(allowed) = config.max_differences {
        result.ensure_at_most(allowed)?;
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Reconcile two tabular datasets and report their differences."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare a source dataset against a target dataset.
    Compare(CompareArgs),
}

#[derive(clap::Args)]
struct CompareArgs {
    /// Source dataset (.json, .csv or .xlsx).
    #[arg(long)]
    source: PathBuf,

    /// Target dataset (.json, .csv or .xlsx).
    #[arg(long)]
    target: PathBuf,

    /// Worksheet to read from an .xlsx source.
    #[arg(long)]
    source_sheet: Option<String>,

    /// Worksheet to read from an .xlsx target.
    #[arg(long)]
    target_sheet: Option<String>,

    /// Key columns, comma separated. Inferred when omitted.
    #[arg(long, value_delimiter = ',')]
    key: Vec<String>,

    /// Columns excluded from field comparison, comma separated.
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Per-column numeric tolerance as COLUMN=VALUE. Repeatable.
    #[arg(long, value_parser = parse_tolerance)]
    tolerance: Vec<(String, f64)>,

    /// One tolerance for every numeric column.
    #[arg(long)]
    numeric_tolerance: Option<f64>,

    /// Compare strings byte-for-byte instead of trimmed and case-insensitive.
    #[arg(long)]
    exact_strings: bool,

    /// Name of the comparison, used in reports.
    #[arg(long, default_value = "comparison")]
    name: String,

    /// JSON file with comparison settings. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report format.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Directory to write the report into.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Exit with an error when more differences are found.
    #[arg(long)]
    max_differences: Option<usize>,
}

impl CompareArgs {
    fn apply_overrides(&self, config: &mut ReconConfig) -> Result<()> {
        if !self.key.is_empty() {
            config.options.key_columns = self.key.clone();
        }
        if !self.exclude.is_empty() {
            config.options.exclude_columns = self.exclude.clone();
        }
        config.options.tolerance = config.options.tolerance.canonicalized()?;
        for (column, threshold) in &self.tolerance {
            config.options.tolerance.set_numeric(column, *threshold)?;
        }
        if let Some(threshold) = self.numeric_tolerance {
            config.numeric_tolerance = Some(threshold);
        }
        if self.exact_strings {
            config.options.tolerance.strings = StringPolicy::Exact;
        }
        if let Some(format) = self.format {
            config.export_format = Some(ExportFormat::from(format).to_string());
        }
        if let Some(output) = &self.output {
            config.output_dir = Some(output.clone());
        }
        if let Some(allowed) = self.max_differences {
            config.max_differences = Some(allowed);
        }
        Ok(())
    }
}

fn parse_tolerance(raw: &str) -> std::result::Result<(String, f64), String> {
    let (column, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=VALUE, got '{raw}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|err| format!("invalid tolerance '{value}': {err}"))?;
    Ok((column.trim().to_string(), value))
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatArg {
    Xlsx,
    Csv,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Xlsx => ExportFormat::Xlsx,
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}
