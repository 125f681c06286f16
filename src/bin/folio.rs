//! CLI binary for folio-pipeline.
//!
//! A thin shim over the library crate: `import` turns a PDF into folios
//! JSON, `export` sends folios JSON to a render backend, `inspect` prints
//! the document information dictionary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use folio_pipeline::{
    create_folios, folio_summary, folios_to_html, CancelToken, DataSource, ExportConfig,
    ExportOptions, ExportProgress, Folio, FolioOptions, ImportOptions,
    ImportProgressCallback, PageExtractor, PageRange, PdfExportService, ScannedPageMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Import progress using indicatif ──────────────────────────────────────────

/// Terminal import callback: a page counter bar plus one log line per page.
struct CliImportProgress {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliImportProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Opening");
        bar.set_message("Loading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl ImportProgressCallback for CliImportProgress {
    fn on_import_start(&self, total_pages: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_pages as u64);
        self.bar.set_prefix("Importing");
    }

    fn on_page_extracted(&self, page_num: usize, total_pages: usize, char_count: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{char_count:>6} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_import_complete(&self, total_pages: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total_pages.saturating_sub(success_count);
        if failed == 0 {
            eprintln!("{} {} pages imported", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages imported  ({} failed)",
                if failed == total_pages { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

// ── CLI definition ───────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Import a PDF into folios JSON
  folio import contract.pdf -o contract.folios.json

  # Import pages 2-6, rasterising every page, with an HTML preview
  folio import --pages 2-6 --render-images --preview preview.html scan.pdf -o scan.json

  # Export folios through the render backend
  folio export contract.folios.json -o contract.pdf --title "Contract"

  # Supply slot data: user overrides, data sources, context metadata
  folio export doc.json --values values.json --sources sources.json --context ctx.json

  # Print PDF metadata
  folio inspect contract.pdf --json

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Directory containing the pdfium shared library
  FOLIO_EXPORT_ENDPOINT   Render backend URL
  FOLIO_EXPORT_TOKEN      Bearer token for the render backend
  RUST_LOG                Override log filtering (e.g. folio_pipeline=debug)
"#;

/// Import PDFs into folios and export folios to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "folio",
    version,
    about = "Import PDFs into folios and export folios to PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FOLIO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FOLIO_QUIET")]
    quiet: bool,

    /// Disable progress bars.
    #[arg(long, global = true, env = "FOLIO_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract pages from a PDF and write folios JSON.
    Import(ImportArgs),
    /// Resolve slots and render folios JSON to PDF.
    Export(ExportArgs),
    /// Print document metadata.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// PDF file to import.
    input: PathBuf,

    /// Write folios JSON here instead of stdout.
    #[arg(short, long, env = "FOLIO_OUTPUT")]
    output: Option<PathBuf>,

    /// Page range, e.g. 3-15 or 4.
    #[arg(long, env = "FOLIO_PAGES")]
    pages: Option<String>,

    /// Skip text extraction.
    #[arg(long)]
    no_text: bool,

    /// Rasterise every page, not only scanned ones.
    #[arg(long, env = "FOLIO_RENDER_IMAGES")]
    render_images: bool,

    /// Raster scale relative to page size (0.1–8.0).
    #[arg(long, env = "FOLIO_IMAGE_SCALE", default_value_t = 1.5)]
    scale: f32,

    /// Scanned pages go to OCR downstream; don't rasterise them.
    #[arg(long)]
    ocr: bool,

    /// What to do with scanned pages.
    #[arg(long, env = "FOLIO_SCANNED", value_enum, default_value = "image")]
    scanned: ScannedArg,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "FOLIO_PASSWORD")]
    password: Option<String>,

    /// Write an HTML preview of the first folios here.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Number of folios in the preview.
    #[arg(long, default_value_t = 5)]
    preview_limit: usize,

    /// Write the full import result (pages, metadata, warnings) instead of folios.
    #[arg(long)]
    raw: bool,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Folios JSON produced by `folio import` or the editor.
    input: PathBuf,

    /// Output file. Default: the filename chosen by the backend.
    #[arg(short, long, env = "FOLIO_EXPORT_OUTPUT")]
    output: Option<PathBuf>,

    /// Render backend endpoint.
    #[arg(long, env = "FOLIO_EXPORT_ENDPOINT", default_value = "http://localhost:3000/api/export/pdf")]
    endpoint: String,

    /// Bearer token for the render backend.
    #[arg(long, env = "FOLIO_EXPORT_TOKEN")]
    token: Option<String>,

    /// Retries after a failed submission.
    #[arg(long, env = "FOLIO_EXPORT_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Backoff unit in milliseconds (retry n waits n × this).
    #[arg(long, env = "FOLIO_EXPORT_BACKOFF_MS", default_value_t = 1000)]
    backoff_ms: u64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "FOLIO_EXPORT_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Folio index range (0-based, inclusive), e.g. 0-3.
    #[arg(long)]
    pages: Option<String>,

    /// Document title.
    #[arg(long)]
    title: Option<String>,

    /// Document author.
    #[arg(long)]
    author: Option<String>,

    /// Output filename sent to the backend.
    #[arg(long)]
    filename: Option<String>,

    /// Document id exposed to slots.
    #[arg(long, default_value = "")]
    document_id: String,

    /// Leave slots unresolved.
    #[arg(long)]
    no_slots: bool,

    /// JSON object of slot id → value overrides.
    #[arg(long)]
    values: Option<PathBuf>,

    /// JSON array of data sources.
    #[arg(long)]
    sources: Option<PathBuf>,

    /// JSON object of context metadata.
    #[arg(long)]
    context: Option<PathBuf>,

    /// Include comments in the export.
    #[arg(long)]
    comments: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// PDF file to inspect.
    input: PathBuf,

    /// Print JSON.
    #[arg(long)]
    json: bool,

    /// PDF user password.
    #[arg(long, env = "FOLIO_PASSWORD")]
    password: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ScannedArg {
    Image,
    Placeholder,
    Skip,
}

impl From<ScannedArg> for ScannedPageMode {
    fn from(v: ScannedArg) -> Self {
        match v {
            ScannedArg::Image => ScannedPageMode::Image,
            ScannedArg::Placeholder => ScannedPageMode::Placeholder,
            ScannedArg::Skip => ScannedPageMode::Skip,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are noise while a progress bar is drawing.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Import(ref args) => run_import(args, &cli).await,
        Command::Export(ref args) => run_export(args, &cli).await,
        Command::Inspect(ref args) => run_inspect(args).await,
    }
}

// ── import ───────────────────────────────────────────────────────────────────

async fn run_import(args: &ImportArgs, cli: &Cli) -> Result<()> {
    let show_progress = !cli.quiet && !cli.no_progress;

    let mut builder = ImportOptions::builder()
        .extract_text(!args.no_text)
        .render_as_images(args.render_images)
        .image_scale(args.scale)
        .use_ocr(args.ocr);
    if let Some(ref pages) = args.pages {
        builder = builder.page_range(parse_range(pages, 1)?);
    }
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd.clone());
    }
    let options = builder.build().context("Invalid import options")?;

    let mut extractor = PageExtractor::pdfium().context("Failed to load the pdfium library")?;
    if show_progress {
        extractor = extractor.with_progress(CliImportProgress::new());
    }

    let result = extractor
        .import_file(&args.input, &options)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    if !result.success {
        anyhow::bail!(
            "Import failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    if !cli.quiet {
        for w in &result.warnings {
            eprintln!("  {} {}", cyan("⚠"), w);
        }
    }

    let folio_options = FolioOptions {
        scanned_page_mode: args.scanned.clone().into(),
    };
    let folios = create_folios(&result.pages, &folio_options);

    if let Some(ref preview) = args.preview {
        let html = folios_to_html(&folios, args.preview_limit);
        tokio::fs::write(preview, html)
            .await
            .with_context(|| format!("Failed to write preview {}", preview.display()))?;
    }

    let json = if args.raw {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string_pretty(&folios)
    }
    .context("Failed to serialise output")?;

    match args.output {
        Some(ref path) => write_atomic(path, json.as_bytes()).await?,
        None => println!("{json}"),
    }

    if !cli.quiet {
        let s = folio_summary(&folios);
        eprintln!(
            "{}  {} folios  {}  {}",
            green("✔"),
            bold(&folios.len().to_string()),
            dim(&format!("{} portrait / {} landscape", s.portrait, s.landscape)),
            dim(&format!("{} text / {} image", s.text_based, s.image_based)),
        );
    }
    Ok(())
}

// ── export ───────────────────────────────────────────────────────────────────

async fn run_export(args: &ExportArgs, cli: &Cli) -> Result<()> {
    let show_progress = !cli.quiet && !cli.no_progress;

    let folios: Vec<Folio> = read_json(&args.input).await?;

    let mut config = ExportConfig::builder()
        .endpoint(args.endpoint.clone())
        .max_retries(args.max_retries)
        .retry_backoff_ms(args.backoff_ms)
        .request_timeout_secs(args.timeout);
    if let Some(ref token) = args.token {
        config = config.auth_token(token.clone());
    }
    let config = config.build().context("Invalid export configuration")?;

    let mut builder = ExportOptions::builder()
        .resolve_slots(!args.no_slots)
        .include_comments(args.comments)
        .document_id(args.document_id.clone());
    if let Some(ref pages) = args.pages {
        builder = builder.page_range(parse_range(pages, 0)?);
    }
    if let Some(ref title) = args.title {
        builder = builder.title(title.clone());
    }
    if let Some(ref author) = args.author {
        builder = builder.author(author.clone());
    }
    if let Some(ref filename) = args.filename {
        builder = builder.filename(filename.clone());
    }
    if let Some(ref path) = args.values {
        let values: HashMap<String, String> = read_json(path).await?;
        for (slot_id, value) in values {
            builder = builder.user_value(slot_id, value);
        }
    }
    if let Some(ref path) = args.sources {
        let sources: Vec<DataSource> = read_json(path).await?;
        for source in sources {
            builder = builder.data_source(source);
        }
    }
    if let Some(ref path) = args.context {
        let context: HashMap<String, Value> = read_json(path).await?;
        for (key, value) in context {
            builder = builder.context_value(key, value);
        }
    }
    let options = builder.build().context("Invalid export options")?;

    let service = PdfExportService::new(config).context("Failed to set up export")?;

    // Ctrl-C cancels the export instead of killing the process mid-write.
    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let bar = if show_progress {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(TICKS),
        );
        bar.set_prefix("Exporting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    let sink = {
        let bar = bar.clone();
        move |p: &ExportProgress| {
            if let Some(ref bar) = bar {
                bar.set_position(p.percentage as u64);
                bar.set_message(p.message.clone());
                if p.status.is_terminal() {
                    bar.finish_and_clear();
                }
            }
        }
    };

    let outcome = service
        .export_with_cancel(&folios, &options, &sink, &cancel)
        .await;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    let outcome = outcome.context("Export failed")?;

    let path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&outcome.filename));
    outcome
        .write_to(&path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if !cli.quiet {
        eprintln!(
            "{}  {} pages  →  {}{}",
            green("✔"),
            outcome.page_count,
            bold(&path.display().to_string()),
            if outcome.client_rendered {
                dim("  (client-rendered: open and print to PDF)")
            } else {
                String::new()
            }
        );
    }
    Ok(())
}

// ── inspect ──────────────────────────────────────────────────────────────────

async fn run_inspect(args: &InspectArgs) -> Result<()> {
    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let extractor = PageExtractor::pdfium().context("Failed to load the pdfium library")?;
    let meta = extractor
        .inspect(bytes, args.password.clone())
        .await
        .context("Failed to inspect PDF")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
        );
        return Ok(());
    }

    println!("File:         {}", args.input.display());
    if let Some(ref t) = meta.title {
        println!("Title:        {}", t);
    }
    if let Some(ref a) = meta.author {
        println!("Author:       {}", a);
    }
    if let Some(ref s) = meta.subject {
        println!("Subject:      {}", s);
    }
    if !meta.keywords.is_empty() {
        println!("Keywords:     {}", meta.keywords.join(", "));
    }
    println!("Pages:        {}", meta.page_count);
    if let Some(ref c) = meta.creator {
        println!("Creator:      {}", c);
    }
    if let Some(ref p) = meta.producer {
        println!("Producer:     {}", p);
    }
    if let Some(d) = meta.creation_date {
        println!("Created:      {}", d.to_rfc3339());
    }
    if let Some(d) = meta.modification_date {
        println!("Modified:     {}", d.to_rfc3339());
    }
    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Parse `N` or `A-B` into a range; `min` is the smallest allowed bound.
fn parse_range(s: &str, min: usize) -> Result<PageRange> {
    let s = s.trim();
    let (start, end) = match s.split_once('-') {
        Some((a, b)) => (
            a.trim().parse::<usize>().context("Invalid range start")?,
            b.trim().parse::<usize>().context("Invalid range end")?,
        ),
        None => {
            let n = s.parse::<usize>().context("Invalid page number")?;
            (n, n)
        }
    };
    if start < min {
        anyhow::bail!("Range starts at {} (got {})", min, start);
    }
    if start > end {
        anyhow::bail!("Invalid range '{}-{}': start must be <= end", start, end);
    }
    Ok(PageRange::new(start, end))
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Write via a temp file and rename so readers never see partial output.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move output into {}", path.display()))?;
    Ok(())
}
