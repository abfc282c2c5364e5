mod dates;
mod error;
mod output;
mod parser;
mod record;
mod render;
mod scraper;
mod settings;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate, SecondsFormat, Utc};
use clap::{Parser, Subcommand};

use settings::Settings;

#[derive(Parser)]
#[command(name = "meeting_notes", about = "Meeting notes crawler and per-date normalizer")]
struct Cli {
    /// Settings file (TOML); MEETINGS_* env vars override it
    #[arg(short, long, global = true, default_value = settings::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every enabled category into one intermediate document
    Crawl {
        /// Reference date for "Last <weekday>" (default: today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Only crawl this category
        #[arg(long)]
        category: Option<String>,
        /// Keep only meetings dated on the reference date
        #[arg(long)]
        only_today: bool,
    },
    /// Split an intermediate document into per-date files
    Convert {
        input: PathBuf,
        /// Output root (default: output_root from settings)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Crawl, then convert the fresh intermediate document
    Run {
        #[arg(short, long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        only_today: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the records of an intermediate document as JSON lines
    Inspect { input: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Crawl {
            date,
            category,
            only_today,
        } => {
            let mut settings = Settings::load(&cli.config)?;
            settings.crawl.only_reference_date |= only_today;
            crawl(&settings, date, category.as_deref()).await.map(|_| ())
        }
        Commands::Convert { input, output } => {
            let settings = Settings::load(&cli.config)?;
            let root = output.unwrap_or_else(|| settings.output_root.clone());
            convert(&input, &root)
        }
        Commands::Run {
            date,
            category,
            only_today,
            output,
        } => {
            let mut settings = Settings::load(&cli.config)?;
            settings.crawl.only_reference_date |= only_today;
            let path = crawl(&settings, date, category.as_deref()).await?;
            let root = output.unwrap_or_else(|| settings.output_root.clone());
            convert(&path, &root)
        }
        Commands::Inspect { input } => {
            let doc = fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            for record in parser::intermediate::parse(&doc) {
                println!("{}", serde_json::to_string(&record)?);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn crawl(
    settings: &Settings,
    date: Option<NaiveDate>,
    category: Option<&str>,
) -> anyhow::Result<PathBuf> {
    let today = date.unwrap_or_else(|| Local::now().date_naive());
    let categories = settings.enabled_categories(category);
    if categories.is_empty() {
        match category {
            Some(name) => bail!("No enabled category named {:?}", name),
            None => bail!("No enabled categories configured"),
        }
    }

    let mut source = scraper::SpiderSource::from_env()?;
    println!(
        "Crawling {} categories (reference date {})...",
        categories.len(),
        today
    );
    let report = scraper::crawl(&mut source, &categories, &settings.crawl, today).await;

    let doc = render::intermediate(&report.records, today);
    fs::create_dir_all(&settings.intermediate_dir)
        .with_context(|| format!("creating {}", settings.intermediate_dir.display()))?;
    let path = settings
        .intermediate_dir
        .join(format!("meetings_{}.md", today.format("%Y-%m-%d")));
    fs::write(&path, doc).with_context(|| format!("writing {}", path.display()))?;

    println!(
        "Saved {} records from {} pages to {}",
        report.records.len(),
        report.pages,
        path.display()
    );
    if !report.failures.is_empty() {
        println!("{} pages failed:", report.failures.len());
        for (label, reason) in &report.failures {
            println!("  {}: {}", label, reason);
        }
    }
    Ok(path)
}

fn convert(input: &Path, root: &Path) -> anyhow::Result<()> {
    let doc =
        fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let records = parser::intermediate::parse(&doc);
    println!("Parsed {} records from {}", records.len(), input.display());

    let crawled_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let report = output::write_records(root, &records, &crawled_at);

    println!(
        "Wrote {} files under {} ({} without date, {} without category, {} failed).",
        report.written.len(),
        root.display(),
        report.skipped_undated.len(),
        report.skipped_uncategorized.len(),
        report.failed
    );
    for title in &report.skipped_undated {
        println!("  skipped (no date): {}", truncate(title, 40));
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
