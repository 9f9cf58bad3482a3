//! CLI binary for notemark.
//!
//! A thin shim over the library crate that maps CLI flags to `BatchConfig`,
//! rasterises PDF inputs, and prints the job summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use notemark::{
    get_summary, init_active_prompt, rasterize, run_batch, BatchConfig, BatchProgressCallback,
    ProgressCallback,
};
use std::io::{self, Write};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-page log
/// lines using [indicatif]. Pages complete out-of-order under concurrent
/// dispatch, so every log line carries the page's filename.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_batch_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_pages: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transcribing");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, filename: &str) {
        self.bar.set_message(filename.to_string());
    }

    fn on_page_complete(&self, filename: &str, content_len: usize) {
        self.bar.println(format!(
            "  {} {:<20}  {}",
            green("✓"),
            filename,
            dim(&format!("{content_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, filename: &str, error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = truncate_for_log(&error, 80);
        self.bar
            .println(format!("  {} {:<20}  {}", red("✗"), filename, red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages transcribed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages transcribed  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

/// Truncate long error messages to keep output tidy.
///
/// Counts chars, not bytes: service error messages arrive verbatim from the
/// endpoint and may contain multibyte text, so a byte slice could land inside
/// a character.
fn truncate_for_log(msg: &str, max_chars: usize) -> String {
    if msg.chars().count() > max_chars {
        let mut out: String = msg.chars().take(max_chars.saturating_sub(1)).collect();
        out.push('\u{2026}');
        out
    } else {
        msg.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Transcribe a PDF of handwritten notes
  notemark lecture.pdf

  # Transcribe page photos directly
  notemark photo_1.jpg photo_2.jpg photo_3.jpg

  # Custom output directory and job id
  notemark -o ~/notes --job-id physics-week3 lecture.pdf

  # Re-print the summary of a finished job
  notemark --show physics-week3 -o ~/notes

  # Use a custom prompt configuration
  notemark --prompt-file my_prompt.json lecture.pdf

  # JSON summary on stdout (for scripting)
  notemark --json lecture.pdf > summary.json

ENVIRONMENT VARIABLES:
  DASHSCOPE_API_KEY     API key for the inference endpoint (required)
  NOTEMARK_MODEL        Override the model ID (default: qwen-vl-plus)
  NOTEMARK_OUTPUT       Override the output root directory
  PDFIUM_LIB_PATH       Directory containing an existing libpdfium

OUTPUT LAYOUT:
  <output>/<job-id>/page_1.md      one Markdown file per successful page
  <output>/<job-id>/summary.json   per-page results and counts
"#;

/// Transcribe document pages into structured Markdown notes.
#[derive(Parser, Debug)]
#[command(
    name = "notemark",
    version,
    about = "Transcribe document pages into structured Markdown notes using a vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF documents and/or page images (PNG/JPEG), processed as one job.
    #[arg(required_unless_present = "show")]
    inputs: Vec<PathBuf>,

    /// Root directory for job output.
    #[arg(short, long, env = "NOTEMARK_OUTPUT", default_value = "output")]
    output: PathBuf,

    /// Job identifier; generated when omitted.
    #[arg(long)]
    job_id: Option<String>,

    /// API key for the inference endpoint.
    #[arg(long, env = "DASHSCOPE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID.
    #[arg(long, env = "NOTEMARK_MODEL")]
    model: Option<String>,

    /// Number of concurrent inference calls.
    #[arg(short, long, env = "NOTEMARK_CONCURRENCY", default_value_t = 3)]
    concurrency: usize,

    /// Max output tokens per page.
    #[arg(long, env = "NOTEMARK_MAX_TOKENS", default_value_t = 3000)]
    max_tokens: u32,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "NOTEMARK_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Per-page API call timeout in seconds.
    #[arg(long, env = "NOTEMARK_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Path to a JSON prompt configuration file.
    #[arg(long, env = "NOTEMARK_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Print a finished job's summary instead of running a new job.
    #[arg(long, value_name = "JOB_ID")]
    show: Option<String>,

    /// Print the summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "NOTEMARK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Suppress INFO-level library logs while the progress bar is active; the
    // bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.show.is_none();
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

    // ── Show mode: read back a persisted summary, no new job ─────────────
    if let Some(ref job_id) = cli.show {
        let summary = get_summary(&cli.output, job_id)
            .with_context(|| format!("No summary for job '{job_id}'"))?;
        print_summary(&cli, job_id, &summary)?;
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    if let Some(ref path) = cli.prompt_file {
        init_active_prompt(path).context("Failed to load prompt configuration")?;
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let mut builder = BatchConfig::builder()
        .concurrency(cli.concurrency)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout)
        .output_root(cli.output.clone());
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let job_id = cli
        .job_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // ── Collect pages: rasterise PDFs, pass images through ───────────────
    let pages = collect_pages(&cli.inputs, &cli.output, &job_id).await?;
    if pages.is_empty() {
        anyhow::bail!("No pages to process");
    }

    // ── Run the batch ────────────────────────────────────────────────────
    let summary = run_batch(&job_id, &pages, &config)
        .await
        .context("Batch failed")?;

    print_summary(&cli, &job_id, &summary)?;
    if summary.success == 0 && summary.total > 0 {
        anyhow::bail!("All {} pages failed", summary.total);
    }
    Ok(())
}

/// Expand the input list into page image paths, rasterising any PDFs into
/// the job's pages directory.
async fn collect_pages(
    inputs: &[PathBuf],
    output_root: &Path,
    job_id: &str,
) -> Result<Vec<PathBuf>> {
    let mut pages = Vec::new();
    for input in inputs {
        let is_pdf = input
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf {
            let pages_dir = output_root.join(job_id).join("pages");
            let rendered = rasterize(input, &pages_dir)
                .await
                .with_context(|| format!("Failed to rasterise {}", input.display()))?;
            pages.extend(rendered);
        } else {
            anyhow::ensure!(input.exists(), "Input not found: {}", input.display());
            pages.push(input.clone());
        }
    }
    Ok(pages)
}

fn print_summary(cli: &Cli, job_id: &str, summary: &notemark::JobSummary) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(summary).context("Failed to serialise summary")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(json.as_bytes())?;
        handle.write_all(b"\n")?;
        return Ok(());
    }

    if cli.quiet {
        return Ok(());
    }

    eprintln!(
        "{}  job {}  {}/{} pages  →  {}",
        if summary.failed.is_empty() {
            green("✔")
        } else {
            cyan("⚠")
        },
        bold(job_id),
        summary.success,
        summary.total,
        bold(&cli.output.join(job_id).display().to_string()),
    );
    for name in &summary.failed {
        eprintln!("   {} {}", red("✗"), name);
    }
    let tokens: u64 = summary
        .results
        .iter()
        .filter_map(|r| match &r.outcome {
            notemark::PageOutcome::Success { tokens, .. } => Some(*tokens),
            _ => None,
        })
        .sum();
    eprintln!("   {}", dim(&format!("{tokens} tokens billed")));
    Ok(())
}
