//! Census CLI - Clean and summarize the South Sudan 2008 census
//!
//! # Main Commands
//!
//! ```bash
//! census run ss-census.csv --summary-by former_region   # Clean + summarize
//! census clean ss-census.csv --by state,gender          # Cleaner only
//! census summarize cleaned.json --by state              # Summarizer only
//! census serve                                          # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! census parse ss-census.csv       # Just parse CSV to JSON
//! census validate cleaned.json     # Validate JSON against the output schema
//! census mappings                  # Show age buckets and region rules
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use census::{
    api::logs::set_echo, parse_csv_file, parse_csv_file_auto, pipeline::format_delimiter, process_csv,
    summarize_census, tweak_census, validate_cleaned_record, validate_summary_record, CensusTable, Condition,
    PipelineOptions, PipelineOutput, RawTable, Settings, AGE_BUCKETS, REGION_RULES,
};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "census")]
#[command(about = "Clean and summarize the South Sudan 2008 census", long_about = None)]
struct Cli {
    /// Don't echo pipeline logs on stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Clean raw census rows into grouped totals
    Clean {
        /// Input CSV file
        input: PathBuf,

        /// Grouping columns (state, gender, category, former_region)
        #[arg(short, long, value_delimiter = ',')]
        by: Vec<String>,

        /// Condition clause, e.g. "state != Lakes" (repeatable, ANDed)
        #[arg(short = 'w', long = "where")]
        clauses: Vec<String>,

        /// JSON condition file
        #[arg(short, long)]
        condition: Option<PathBuf>,

        /// Keep the pre-aggregated Total rows
        #[arg(long)]
        keep_totals: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize a saved census table (JSON or CSV with a total column)
    Summarize {
        /// Input JSON or CSV file
        input: PathBuf,

        /// Grouping columns
        #[arg(short, long, value_delimiter = ',', required = true)]
        by: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full pipeline: CSV → cleaned table → summary
    Run {
        /// Input CSV file
        input: PathBuf,

        /// Pipeline options JSON file
        #[arg(long)]
        options: Option<PathBuf>,

        /// Cleaner grouping columns
        #[arg(short, long, value_delimiter = ',')]
        by: Vec<String>,

        /// Summarizer grouping columns
        #[arg(short, long, value_delimiter = ',')]
        summary_by: Vec<String>,

        /// Condition clause (repeatable, ANDed)
        #[arg(short = 'w', long = "where")]
        clauses: Vec<String>,

        /// Keep the pre-aggregated Total rows
        #[arg(long)]
        keep_totals: bool,

        /// Skip validation
        #[arg(long)]
        no_validate: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: Format,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate JSON records against the output schema
    Validate {
        /// Input JSON file (array of records)
        input: PathBuf,

        /// Use the summary schema (requires labels)
        #[arg(long)]
        summary: bool,
    },

    /// Show age buckets and former-region rules
    Mappings,

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: CENSUS_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };
    set_echo(!(cli.quiet || settings.quiet));

    let result = match cli.command {
        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, delimiter, output.as_deref()),

        Commands::Clean {
            input,
            by,
            clauses,
            condition,
            keep_totals,
            format,
            output,
        } => clean_options(&settings, by, &clauses, condition.as_deref(), keep_totals)
            .and_then(|options| cmd_clean(&input, &options, format, output.as_deref())),

        Commands::Summarize {
            input,
            by,
            format,
            output,
        } => cmd_summarize(&input, &by, format, output.as_deref()),

        Commands::Run {
            input,
            options,
            by,
            summary_by,
            clauses,
            keep_totals,
            no_validate,
            format,
            output,
        } => run_options(&settings, options.as_deref(), by, summary_by, &clauses, keep_totals, no_validate)
            .and_then(|opts| cmd_run(&input, &opts, format, output.as_deref())),

        Commands::Validate { input, summary } => cmd_validate(&input, summary),

        Commands::Mappings => cmd_mappings(),

        Commands::Serve { port } => {
            let defaults = PipelineOptions::from_settings(&settings);
            cmd_serve(port.unwrap_or(settings.port), defaults).await
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn override_columns(target: &mut Vec<String>, cols: Vec<String>) {
    let cols: Vec<String> = cols.into_iter().map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect();
    if !cols.is_empty() {
        *target = cols;
    }
}

fn clean_options(
    settings: &Settings,
    by: Vec<String>,
    clauses: &[String],
    condition: Option<&Path>,
    keep_totals: bool,
) -> Result<PipelineOptions, Box<dyn std::error::Error>> {
    let mut options = PipelineOptions::from_settings(settings);
    override_columns(&mut options.grouping, by);
    options.keep_totals |= keep_totals;
    options.condition = load_condition(condition, clauses)?;
    Ok(options)
}

/// Options file (or settings), then command-line flags on top.
fn run_options(
    settings: &Settings,
    options_file: Option<&Path>,
    by: Vec<String>,
    summary_by: Vec<String>,
    clauses: &[String],
    keep_totals: bool,
    no_validate: bool,
) -> Result<PipelineOptions, Box<dyn std::error::Error>> {
    let mut options = match options_file {
        Some(path) => PipelineOptions::from_file(path)?,
        None => PipelineOptions::from_settings(settings),
    };
    override_columns(&mut options.grouping, by);
    if let Some(summary) = options.summary_grouping.as_mut() {
        override_columns(summary, summary_by);
    } else {
        let mut summary = Vec::new();
        override_columns(&mut summary, summary_by);
        if !summary.is_empty() {
            options.summary_grouping = Some(summary);
        }
    }
    options.keep_totals |= keep_totals;
    options.skip_validation |= no_validate;
    if let Some(extra) = load_condition(None, clauses)? {
        options.condition = Some(match options.condition.take() {
            Some(existing) => Condition::all_of(vec![existing, extra]),
            None => extra,
        });
    }
    Ok(options)
}

/// Build the extra condition from a JSON file and/or text clauses.
fn load_condition(path: Option<&Path>, clauses: &[String]) -> Result<Option<Condition>, Box<dyn std::error::Error>> {
    let mut parts = Vec::new();
    if let Some(path) = path {
        parts.push(Condition::from_json(&fs::read_to_string(path)?)?);
    }
    if !clauses.is_empty() {
        parts.push(Condition::parse_all(clauses)?);
    }
    Ok(if parts.is_empty() { None } else { Some(Condition::all_of(parts)) })
}

fn cmd_parse(
    input: &Path,
    delimiter: Option<char>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = match delimiter {
        Some(d) => parse_csv_file(input, d)?,
        None => parse_csv_file_auto(input)?,
    };

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(result.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.records.len());

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_clean(
    input: &Path,
    options: &PipelineOptions,
    format: Format,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🧹 Cleaning: {}", input.display());

    let raw = RawTable::from(parse_csv_file_auto(input)?);
    let condition = options.effective_condition();
    eprintln!("   Grouping: {}", options.grouping.join(", "));
    eprintln!("   Condition: {}", condition);

    let table = tweak_census(&raw, &options.grouping, &condition)?;
    eprintln!("✅ {} groups, population {}", table.len(), table.grand_total());

    write_output(&render_table(&table, format)?, output)
}

fn cmd_summarize(
    input: &Path,
    by: &[String],
    format: Format,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📊 Summarizing: {}", input.display());

    let records: Vec<Value> = if is_json(input) {
        serde_json::from_str(&fs::read_to_string(input)?)?
    } else {
        parse_csv_file_auto(input)?.records
    };
    let table = CensusTable::from_records(&records)?;
    eprintln!("   {} rows, columns: {}", table.len(), table.columns().join(", "));

    let summary = summarize_census(&table, by)?;
    eprintln!("✅ {} groups", summary.len());

    write_output(&render_table(&summary, format)?, output)
}

fn cmd_run(
    input: &Path,
    options: &PipelineOptions,
    format: Format,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let result = process_csv(input, options)?;

    eprintln!("   Encoding: {}", result.csv_info.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(result.csv_info.delimiter));
    eprintln!("   Rows: {}", result.csv_info.row_count);
    eprintln!(
        "   Kept: {} (filtered {}, dropped {})",
        result.stats.rows_kept(),
        result.stats.rows_filtered,
        result.stats.rows_dropped
    );

    print_validation(&result);

    let content = match format {
        Format::Json => serde_json::to_string_pretty(&json!({
            "cleaned": result.cleaned,
            "summary": result.summary,
        }))?,
        // CSV carries one table: the summary when there is one
        Format::Csv => render_table(result.summary.as_ref().unwrap_or(&result.cleaned), Format::Csv)?,
        Format::Table => match result.summary {
            Some(ref summary) => format!("{}\n{}", result.cleaned, summary),
            None => result.cleaned.to_string(),
        },
    };
    write_output(&content, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

fn print_validation(result: &PipelineOutput) {
    let reports = [("cleaned", &result.validation), ("summary", &result.summary_validation)];
    for (name, report) in reports {
        let Some(report) = report else { continue };
        if report.is_clean() {
            eprintln!("   ✅ All {} {} rows valid!", report.valid, name);
        } else {
            eprintln!("   ❌ {} invalid {} rows", report.invalid, name);
            for (i, errors) in report.errors.iter().take(5) {
                eprintln!("     Row {}: {}", i, errors.join("; "));
            }
        }
    }
}

fn cmd_validate(input: &Path, summary: bool) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let content = fs::read_to_string(input)?;
    let records: Vec<Value> = serde_json::from_str(&content)?;
    let check = if summary { validate_summary_record } else { validate_cleaned_record };

    let mut valid = 0;
    let mut invalid = 0;

    for (i, record) in records.iter().enumerate() {
        match check(record) {
            Ok(()) => valid += 1,
            Err(errors) => {
                invalid += 1;
                if invalid <= 5 {
                    eprintln!("\n❌ Record {} invalid:", i);
                    for err in errors.iter().take(3) {
                        eprintln!("   - {}", err);
                    }
                }
            }
        }
    }

    eprintln!("\n📊 Results: {} valid, {} invalid", valid, invalid);

    if invalid > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_mappings() -> Result<(), Box<dyn std::error::Error>> {
    println!("Age buckets (Age Name → category):");
    for (bracket, category) in AGE_BUCKETS {
        println!("  {:<10} → {}", bracket, category);
    }
    println!("  (anything else passes through unchanged)");
    println!();
    println!("Former regions (first match wins):");
    for (i, rule) in REGION_RULES.iter().enumerate() {
        println!("  {}. {:<40} → {}", i + 1, rule.description, rule.region);
    }
    println!("  {}. {:<40} → {}", REGION_RULES.len() + 1, "otherwise", census::models::DEFAULT_REGION);
    Ok(())
}

async fn cmd_serve(port: u16, defaults: PipelineOptions) -> Result<(), Box<dyn std::error::Error>> {
    census::server::start_server(port, defaults).await
}

fn render_table(table: &CensusTable, format: Format) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        Format::Json => serde_json::to_string_pretty(table)?,
        Format::Csv => {
            let mut buf = Vec::new();
            table.write_csv(&mut buf)?;
            String::from_utf8(buf)?
        }
        Format::Table => table.to_string(),
    })
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
