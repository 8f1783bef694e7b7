//! afpx - Analyze AFP print streams and extract page ranges
//!
//! This tool decodes MO:DCA structured fields from AFP files, reports
//! document structure, and re-encodes selected pages into new files.

use afpx_core::scanner::Termination;
use afpx_core::{
    analyze, analyze_file, extract_pages, parse_page_range, Analysis, Document, ParseOrigin,
};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Analyze AFP print streams and extract page ranges
#[derive(Parser, Debug)]
#[command(name = "afpx")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Survey AFP files and report their structure
    Analyze(AnalyzeArgs),
    /// Extract pages from an AFP document into a new file
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[command(flatten)]
    input: InputMode,

    /// List the leading structured fields of each file
    #[arg(long)]
    fields: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single AFP file to analyze
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of AFP files to analyze
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Input AFP file
    input: PathBuf,

    /// Output AFP file
    output: PathBuf,

    /// Pages to keep: 1-based, e.g. '1:3,7', '5:', or ':' for all
    pages: String,

    /// Overwrite the output file if it exists
    #[arg(long)]
    force: bool,

    /// Don't write the output, just report what would be extracted
    #[arg(long)]
    dry_run: bool,
}

/// Tracks content hashes across a directory walk so identical spool
/// copies are only analyzed once
#[derive(Default)]
struct StreamRegistry {
    /// Content hash -> first path seen with that content
    seen: HashMap<String, PathBuf>,
    stats: RegistryStats,
}

#[derive(Default)]
struct RegistryStats {
    files_scanned: usize,
    afp_documents: usize,
    damaged: usize,
    duplicates_skipped: usize,
    total_pages: usize,
}

impl StreamRegistry {
    fn new() -> Self {
        Self::default()
    }

    /// Compute a short hash of the content (first 16 chars of blake3)
    fn content_hash(data: &[u8]) -> String {
        let hash = blake3::hash(data);
        hash.to_hex()[..16].to_string()
    }

    /// Record a file's hash, returning the first path seen with the same
    /// content when this one is a duplicate
    fn register(&mut self, hash: String, path: &Path) -> Option<PathBuf> {
        match self.seen.entry(hash) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(path.to_path_buf());
                None
            }
        }
    }

    fn print_summary(&self) {
        info!(
            "Summary: {} files scanned, {} AFP documents ({} with warnings), {} duplicates skipped, {} pages total",
            self.stats.files_scanned,
            self.stats.afp_documents,
            self.stats.damaged,
            self.stats.duplicates_skipped,
            self.stats.total_pages
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match &cli.command {
        Command::Analyze(args) => cmd_analyze(args),
        Command::Extract(args) => cmd_extract(args),
    }
}

fn cmd_analyze(args: &AnalyzeArgs) -> Result<()> {
    if let Some(ref file) = args.input.file {
        analyze_single_file(args, file)
    } else if let Some(ref directory) = args.input.directory {
        analyze_directory(args, directory)
    } else {
        bail!("Either --file or --directory must be specified")
    }
}

/// Analyze a single AFP file, failing when it is not one
fn analyze_single_file(args: &AnalyzeArgs, file: &Path) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    let analysis = analyze_file(file)
        .with_context(|| format!("Failed to analyze: {}", file.display()))?;
    print_analysis(file, &analysis, args.fields);

    if !analysis.is_afp {
        bail!("not an AFP document: {}", file.display());
    }
    Ok(())
}

/// Analyze a directory of AFP files recursively
fn analyze_directory(args: &AnalyzeArgs, directory: &Path) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut registry = StreamRegistry::new();

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        // Skip directories
        if !path.is_file() {
            continue;
        }

        // Skip hidden files
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            continue;
        }

        if !is_likely_afp(path) {
            trace!("Skipping non-AFP file: {}", path.display());
            continue;
        }

        debug!("Analyzing: {}", path.display());
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                // Log error but continue with other files
                warn!("Error reading {}: {}", path.display(), e);
                continue;
            }
        };
        registry.stats.files_scanned += 1;

        let hash = StreamRegistry::content_hash(&data);
        if let Some(original) = registry.register(hash, path) {
            debug!(
                "Skipping duplicate of {}: {}",
                original.display(),
                path.display()
            );
            registry.stats.duplicates_skipped += 1;
            continue;
        }

        let analysis = analyze(data);
        if !analysis.is_afp {
            trace!("Not an AFP document: {}", path.display());
            continue;
        }

        registry.stats.afp_documents += 1;
        registry.stats.total_pages += analysis.page_fields;
        if analysis.total_warnings > 0 {
            registry.stats.damaged += 1;
        }
        print_analysis(path, &analysis, args.fields);
    }

    registry.print_summary();
    Ok(())
}

/// Render one file's analysis report
fn print_analysis(path: &Path, analysis: &Analysis, show_fields: bool) {
    println!("{}: {} bytes", path.display(), analysis.size);

    if !analysis.is_afp {
        println!(
            "  not an AFP document ({} fields decoded, none recognized)",
            analysis.total_fields
        );
        return;
    }

    match analysis.recovered {
        Some(start) => println!(
            "  AFP stream recovered at offset {} ({} signature)",
            start.offset, start.signature
        ),
        None => println!("  AFP stream from offset 0"),
    }
    println!(
        "  {} fields decoded, {} recognized, {} pages",
        analysis.total_fields, analysis.recognized_fields, analysis.page_fields
    );
    if analysis.total_warnings > 0 {
        println!(
            "  {} warnings ({})",
            analysis.total_warnings,
            describe_termination(analysis.termination)
        );
        for warning in &analysis.warnings {
            println!("    {}", warning);
        }
        if analysis.warnings.len() < analysis.total_warnings {
            println!(
                "    ... {} more warnings",
                analysis.total_warnings - analysis.warnings.len()
            );
        }
    }

    if show_fields {
        println!("  {:>10}  {:6}  {:>7}  marker", "offset", "code", "payload");
        for field in &analysis.fields {
            let label = field
                .marker
                .map(|marker| marker.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:>10}  {}  {:>7}  {}",
                field.offset, field.code, field.payload_len, label
            );
        }
        if analysis.fields.len() < analysis.total_fields {
            println!(
                "  ... {} more fields",
                analysis.total_fields - analysis.fields.len()
            );
        }
    }
}

fn describe_termination(termination: Termination) -> &'static str {
    match termination {
        Termination::EndOfBuffer => "scanned to end of file",
        Termination::Truncated => "stopped at truncated record",
        Termination::ErrorBudget => "aborted after too many errors",
    }
}

/// Heuristic to determine if a file is likely an AFP print stream
fn is_likely_afp(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if ext.eq_ignore_ascii_case("afp") {
            return true;
        }
    }

    // Probe the leading bytes for structured-field framing
    let Ok(mut file) = fs::File::open(path) else {
        return false;
    };
    use std::io::Read;
    let mut magic = [0u8; 5];
    if file.read_exact(&mut magic).is_err() {
        return false;
    }

    // A plausible length prefix followed by the 0xD3 class byte
    let length = u16::from_be_bytes([magic[0], magic[1]]) as usize;
    if (5..=32767).contains(&length) && magic[2] == 0xD3 {
        return true;
    }

    // Carriage-control variant: a 0x5A prefix shifts the header one byte
    magic[0] == 0x5A && magic[3] == 0xD3
}

/// Extract the requested pages into a new AFP file
fn cmd_extract(args: &ExtractArgs) -> Result<()> {
    let document = Document::parse_file(&args.input)
        .with_context(|| format!("Failed to parse: {}", args.input.display()))?;

    if let ParseOrigin::Recovered(start) = document.origin() {
        warn!(
            "Input did not decode from offset 0; recovered at offset {} ({} signature)",
            start.offset, start.signature
        );
    }
    if !document.warnings().is_empty() {
        warn!(
            "{} scan warning(s) in {}",
            document.warnings().len(),
            args.input.display()
        );
        for warning in document.warnings() {
            debug!("{}", warning);
        }
    }

    info!(
        "{} pages in {}",
        document.page_count(),
        args.input.display()
    );

    let pages: Vec<usize> = parse_page_range(&args.pages, document.page_count())?
        .into_iter()
        .collect();
    let extraction = extract_pages(&document, &pages)?;

    for warning in &extraction.warnings {
        warn!("{}", warning);
    }
    if !extraction.skipped.is_empty() {
        warn!(
            "Skipped {} nonexistent page(s): {}",
            extraction.skipped.len(),
            format_pages(&extraction.skipped)
        );
    }

    if args.dry_run {
        println!(
            "Would write {} ({} bytes, pages {})",
            args.output.display(),
            extraction.data.len(),
            format_pages(&extraction.pages)
        );
        return Ok(());
    }

    write_output(&args.output, &extraction.data, args.force)?;
    println!(
        "Wrote {} ({} bytes, pages {})",
        args.output.display(),
        extraction.data.len(),
        format_pages(&extraction.pages)
    );
    Ok(())
}

/// Formats 0-based page indices as a 1-based list for display
fn format_pages(pages: &[usize]) -> String {
    pages
        .iter()
        .map(|page| (page + 1).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Write the extracted stream to disk, refusing to clobber without --force
fn write_output(output_path: &Path, data: &[u8], force: bool) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    if output_path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            output_path.display()
        );
    }

    fs::write(output_path, data)
        .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

    Ok(())
}
