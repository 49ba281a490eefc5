//! drive-to-release - move Drive-hosted videos into GitHub Release assets.
//!
//! Reads the link list, migrates every Drive link, rewrites the list with the
//! published URLs and leaves a report of whatever failed.

use clap::Parser;
use drive_to_release::links::{LinkKind, classify_lines, extract_file_id};
use drive_to_release::migrator::RunReport;
use drive_to_release::types::{DownloadMethod, Event, Stage};
use drive_to_release::utils::format_mib;
use drive_to_release::{Config, Migrator, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "drive-to-release", version)]
#[command(about = "Migrate Google Drive video links to GitHub Release assets")]
struct Args {
    /// Link list to read and rewrite
    #[arg(long, value_name = "FILE")]
    links: Option<PathBuf>,

    /// Where to write the failure report
    #[arg(long, value_name = "FILE")]
    failed_report: Option<PathBuf>,

    /// Working directory for downloads
    #[arg(long, value_name = "DIR")]
    temp_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Classify the link list and print the plan without any network call
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "warn,drive_to_release=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .compact()
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(links) = args.links {
        config.files.link_file = links;
    }
    if let Some(report) = args.failed_report {
        config.files.failure_report = report;
    }
    if let Some(temp_dir) = args.temp_dir {
        config.files.temp_dir = temp_dir;
    }

    if args.dry_run {
        return dry_run(&config).await;
    }

    let migrator = Migrator::new(config)?;
    println!("🚀 Starting Google Drive to GitHub Release migration");
    println!("📦 Repository: {}", migrator.config().github.repository);

    let printer = tokio::spawn(print_events(migrator.subscribe()));
    let result = migrator.run().await;

    // Dropping the migrator closes the event channel and ends the printer
    drop(migrator);
    printer.await.ok();

    print_summary(&result?);
    Ok(())
}

async fn dry_run(config: &Config) -> Result<()> {
    let content = tokio::fs::read_to_string(&config.files.link_file).await?;
    let entries = classify_lines(content.lines());

    println!("🔍 Dry run for {}", config.files.link_file.display());
    let mut migratable = 0;
    for entry in &entries {
        match entry.kind {
            LinkKind::Skip => {}
            LinkKind::AlreadyMigrated => println!("  keep     {}", entry.url),
            LinkKind::Foreign => println!("  drop     {}", entry.url),
            LinkKind::Migratable => {
                migratable += 1;
                match extract_file_id(&entry.url) {
                    Some(id) => println!("  migrate  {}  (id {})", entry.url, id),
                    None => println!("  invalid  {}", entry.url),
                }
            }
        }
    }
    println!("📊 {} Drive link(s) would be migrated", migratable);
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(event) => print_event(&event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "console fell behind, skipped events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_event(event: &Event) {
    let rule = "─".repeat(80);
    match event {
        Event::RunStarted { drive_links } => {
            println!("📊 Found {} Google Drive links to process", drive_links);
        }
        Event::Kept { line_number } => {
            println!("✓ Line {}: already a GitHub link, keeping", line_number);
        }
        Event::Ignored { line_number } => {
            println!("⚠️  Line {}: not a Drive or GitHub link, dropping", line_number);
        }
        Event::EntryStarted { index, total, url } => {
            println!("\n{}", "=".repeat(80));
            println!("🎬 [{}/{}] Processing Drive URL", index, total);
            println!("🔗 URL: {}", url);
        }
        Event::Resolved {
            file_id, file_name, ..
        } => {
            println!("🆔 File ID: {}", file_id);
            println!("📝 Filename: {}", file_name);
        }
        Event::StageStarted { stage, .. } => {
            println!("\n{rule}");
            println!(
                "{} STEP {}/{}: {}",
                stage_icon(*stage),
                stage.number(),
                Stage::COUNT,
                stage
            );
            println!("{rule}");
        }
        Event::FallbackStarted { .. } => {
            println!("🔄 Trying alternative download method...");
        }
        Event::DownloadProgress { downloaded, total } => match total {
            Some(total) if *total > 0 => println!(
                "   Progress: {:.1}% ({}/{})",
                *downloaded as f64 * 100.0 / *total as f64,
                format_mib(*downloaded),
                format_mib(*total)
            ),
            _ => println!("   Downloaded: {}", format_mib(*downloaded)),
        },
        Event::Downloaded { bytes, method, .. } => {
            let via = match method {
                DownloadMethod::Primary => "",
                DownloadMethod::Fallback => " (alternative method)",
            };
            println!("✓ Downloaded {}{}", format_mib(*bytes), via);
        }
        Event::ReleaseCreated { tag, .. } => println!("✓ Created release: {}", tag),
        Event::Published { index, url } => {
            println!("🔗 {}", url);
            println!("\n✅ SUCCESS! Video {} completed", index);
        }
        Event::Failed { reason, .. } => println!("✗ {}", reason),
        Event::RunFinished { .. } => {}
    }
}

fn stage_icon(stage: Stage) -> &'static str {
    match stage {
        Stage::Download => "📥",
        Stage::CreateRelease => "📦",
        Stage::Upload => "☁️ ",
    }
}

fn print_summary(report: &RunReport) {
    let summary = &report.summary;
    let rule = "=".repeat(80);

    if let Some(path) = &report.report_path {
        println!("\n📝 Failed links saved to: {}", path.display());
    }

    println!("\n{rule}");
    println!("📊 FINAL SUMMARY");
    println!("{rule}");
    println!("✅ Total Drive links found:      {}", summary.drive_links);
    println!("✅ Successfully converted:       {}", summary.converted);
    println!("❌ Failed to convert:            {}", summary.failed);
    println!("📦 Total GitHub links in file:   {}", summary.output_links);

    if summary.failed > 0 {
        println!("\n⚠️  {} link(s) failed", summary.failed);
        if let Some(path) = &report.report_path {
            println!("📄 Check '{}' for details and retry", path.display());
        }
        println!("\n💡 Common fixes:");
        println!("   • Make sure Drive files are set to 'Anyone with the link can view'");
        println!("   • Check that the URL points at a file, not a folder");
        println!("   • Re-run later if GitHub or Drive was rate limiting");
    } else {
        println!("\n🎉 All links processed successfully!");
    }
    println!("{rule}");
}
