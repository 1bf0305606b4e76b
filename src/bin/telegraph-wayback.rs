//! CLI binary for telegraph-wayback.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ArchiveConfig` and prints one `orig => result` line per URL.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use telegraph_wayback::config::debug_requested;
use telegraph_wayback::{
    ArchiveConfig, ArchiveProgressCallback, Archiver, CaptureOptions, ProgressCallback,
    PublishResult,
};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar with one log line per finished URL. Jobs finish in any
/// order, so start times are keyed by URL.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    failures: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Capturing");
        bar.set_message("rendering pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            failures: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self, url: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(url))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ArchiveProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, valid: usize, invalid: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(valid as u64);
        self.bar.set_style(style);
        if invalid > 0 {
            self.bar
                .println(format!("  {} {invalid} invalid URL(s) skipped", red("✗")));
        }
    }

    fn on_job_start(&self, url: &str) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(url.to_string(), Instant::now());
        }
        self.bar.set_prefix("Publishing");
        self.bar.set_message(url.to_string());
    }

    fn on_job_complete(&self, url: &str, result: &PublishResult) {
        let secs = self.elapsed(url);
        let mark = if result.is_published() {
            green("✓")
        } else {
            self.failures.fetch_add(1, Ordering::SeqCst);
            red("✗")
        };
        self.bar
            .println(format!("  {mark} {url}  {}", dim(&format!("{secs:.1}s"))));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, published: usize, failed: usize) {
        self.bar.finish_and_clear();
        let failed_jobs = self.failures.load(Ordering::SeqCst);
        eprintln!(
            "{} {} published, {} failed",
            if failed_jobs == 0 { green("✔") } else { red("⚠") },
            bold(&published.to_string()),
            failed
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Archive one page
  telegraph-wayback https://example.org

  # Archive several pages, JSON output
  telegraph-wayback --json https://example.org https://www.rust-lang.org

  # Give slow pages more time and bound publishing
  telegraph-wayback --capture-timeout 300 --publish-timeout 600 https://example.org

ENVIRONMENT VARIABLES:
  DEBUG                   true / 1 / on enables debug logging
  RUST_LOG                Full tracing filter; overrides DEBUG and --verbose
  IMGBB_API_KEY           Enables imgbb as the fallback image host
"#;

/// Archive web pages to Telegraph.
#[derive(Parser, Debug)]
#[command(
    name = "telegraph-wayback",
    version,
    about = "Archive web pages to Telegraph with rehosted images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// HTTP/HTTPS URLs to archive.
    #[arg(required = true)]
    urls: Vec<String>,

    /// Shared capture deadline for the whole batch, in seconds.
    #[arg(long, env = "TELEGRAPH_WAYBACK_CAPTURE_TIMEOUT", default_value_t = 120)]
    capture_timeout: u64,

    /// Per-page publish deadline in seconds (unbounded when omitted).
    #[arg(long, env = "TELEGRAPH_WAYBACK_PUBLISH_TIMEOUT")]
    publish_timeout: Option<u64>,

    /// Media download timeout in seconds.
    #[arg(long, env = "TELEGRAPH_WAYBACK_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Concurrent media rehost calls per page.
    #[arg(short, long, env = "TELEGRAPH_WAYBACK_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Retries for media downloads and uploads.
    #[arg(long, env = "TELEGRAPH_WAYBACK_MAX_RETRIES", default_value_t = 10)]
    max_retries: u32,

    /// Maximum screenshot slice height in pixels (0 disables splitting).
    #[arg(long, env = "TELEGRAPH_WAYBACK_SPLIT_HEIGHT", default_value_t = 8000)]
    split_height: u32,

    /// Screenshot scale factor forwarded to the capture service.
    #[arg(long, env = "TELEGRAPH_WAYBACK_SCALE", default_value_t = 1.0)]
    scale: f64,

    /// Screenshot quality (1–100) forwarded to the capture service.
    #[arg(long, env = "TELEGRAPH_WAYBACK_QUALITY", default_value_t = 100,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Author name attached to every page.
    #[arg(long, env = "TELEGRAPH_WAYBACK_AUTHOR", default_value = "Source")]
    author: String,

    /// imgbb API key for the fallback image host.
    #[arg(long, env = "IMGBB_API_KEY", hide_env_values = true)]
    imgbb_key: Option<String>,

    /// Output the result map as JSON.
    #[arg(long, env = "TELEGRAPH_WAYBACK_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TELEGRAPH_WAYBACK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TELEGRAPH_WAYBACK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, env = "TELEGRAPH_WAYBACK_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let verbose = cli.verbose || debug_requested();
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !verbose;
    let filter = if verbose {
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ArchiveProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let archiver = Archiver::new(config).context("Failed to set up archiver")?;
    let cancel = archiver.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let report = archiver
        .archive_batch(&cli.urls)
        .await
        .context("Archiving failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else {
        for (orig, result) in &report {
            println!("{orig} => {result}");
        }
    }

    Ok(())
}

/// Map CLI args to `ArchiveConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ArchiveConfig> {
    let mut builder = ArchiveConfig::builder()
        .batch_capture_timeout_secs(cli.capture_timeout)
        .download_timeout_secs(cli.download_timeout)
        .media_concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .screenshot_split_height((cli.split_height > 0).then_some(cli.split_height))
        .author_name(cli.author.as_str())
        .capture(CaptureOptions {
            scale_factor: cli.scale,
            quality: cli.quality,
            ..CaptureOptions::default()
        });

    if let Some(secs) = cli.publish_timeout {
        builder = builder.publish_timeout_secs(secs);
    }
    if cli.imgbb_key.is_some() {
        builder = builder.imgbb_api_key(cli.imgbb_key.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_maps_onto_config() {
        let cli = Cli::parse_from([
            "telegraph-wayback",
            "--split-height",
            "0",
            "--publish-timeout",
            "30",
            "https://example.org",
        ]);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.screenshot_split_height, None);
        assert_eq!(config.publish_timeout_secs, Some(30));
        assert_eq!(cli.urls, vec!["https://example.org".to_string()]);
    }
}
