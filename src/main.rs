mod clean;
mod config;
mod db;
mod export;
mod extract;
mod fetch;
mod model;
mod patterns;
mod pipeline;
mod sitemap;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::extract::SiteProfile;
use crate::fetch::AnyFetcher;
use crate::pipeline::BatchSummary;

#[derive(Parser)]
#[command(name = "moto_scraper", about = "Motorcycle specification scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the given detail pages
    Scrape {
        /// Site profile (cycleworld, motorcycle-com)
        #[arg(short, long)]
        site: String,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Discover detail pages from the site's listings, then scrape them
    Crawl {
        #[arg(short, long)]
        site: String,
        /// Restrict listings to one category
        #[arg(short, long)]
        category: Option<String>,
        /// Max detail pages to scrape
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Also take detail pages from this sitemap
        #[arg(long)]
        sitemap: Option<String>,
    },
    /// Query stored motorcycles
    Search {
        /// Brand substring (case-insensitive)
        #[arg(short, long)]
        brand: Option<String>,
        /// Model substring (case-insensitive)
        #[arg(short, long)]
        model: Option<String>,
        #[arg(short, long)]
        year: Option<i32>,
        #[arg(short, long)]
        category: Option<String>,
        /// Print full records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record counts by brand, year and category
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Write all stored records to a file
    Export {
        #[arg(short, long, value_enum)]
        format: export::Format,
        #[arg(short, long)]
        out: PathBuf,
    },
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
    let settings = config::load()?;

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;

    let result = match cli.command {
        Commands::Scrape { site, urls } => {
            let profile = site_profile(&site)?;
            let fetcher = AnyFetcher::from_settings(&settings)?;
            let stop = interrupt_flag();
            println!("Scraping {} pages from {}...", urls.len(), profile.name());
            let summary =
                pipeline::run_batch(&fetcher, profile.as_ref(), &conn, &urls, &stop).await?;
            print_summary(&summary);
            Ok(())
        }
        Commands::Crawl {
            site,
            category,
            limit,
            sitemap,
        } => {
            let profile = site_profile(&site)?;
            let fetcher = AnyFetcher::from_settings(&settings)?;
            let stop = interrupt_flag();
            let urls = pipeline::discover(
                &fetcher,
                profile.as_ref(),
                category.as_deref(),
                sitemap.as_deref(),
                limit,
                &stop,
            )
            .await;
            if urls.is_empty() {
                println!("No detail pages found.");
                return Ok(());
            }
            println!("Scraping {} discovered pages...", urls.len());
            let summary =
                pipeline::run_batch(&fetcher, profile.as_ref(), &conn, &urls, &stop).await?;
            print_summary(&summary);
            Ok(())
        }
        Commands::Search {
            brand,
            model,
            year,
            category,
            json,
        } => {
            let filter = db::SearchFilter {
                brand,
                model,
                year,
                category,
            };
            let vehicles = db::search(&conn, &filter)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&vehicles)?);
                return Ok(());
            }
            if vehicles.is_empty() {
                println!("No motorcycles found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<16} | {:<32} | {:>4} | {:<10} | {:>6} | {:>5}",
                "#", "Brand", "Model", "Year", "Category", "cc", "hp"
            );
            println!("{}", "-".repeat(94));
            for (i, v) in vehicles.iter().enumerate() {
                let cc = v
                    .engine
                    .as_ref()
                    .and_then(|e| e.displacement)
                    .map(|d| format!("{:.0}", d))
                    .unwrap_or_else(|| "-".into());
                let hp = v
                    .performance
                    .as_ref()
                    .and_then(|p| p.power_hp)
                    .map(|h| format!("{:.0}", h))
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:>3} | {:<16} | {:<32} | {:>4} | {:<10} | {:>6} | {:>5}",
                    i + 1,
                    truncate(&v.brand, 16),
                    truncate(&v.model, 32),
                    v.year,
                    truncate(v.category.as_deref().unwrap_or("-"), 10),
                    cc,
                    hp
                );
            }
            println!("\n{} motorcycles", vehicles.len());
            Ok(())
        }
        Commands::Stats { json } => {
            let s = db::get_stats(&conn)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&s)?);
                return Ok(());
            }
            println!("Total: {}", s.total);
            println!("\n--- By brand ---");
            for (brand, n) in &s.by_brand {
                println!("  {:<20} {:>5}", brand, n);
            }
            println!("\n--- By year ---");
            for (year, n) in &s.by_year {
                println!("  {:<20} {:>5}", year, n);
            }
            println!("\n--- By category ---");
            for (category, n) in &s.by_category {
                println!("  {:<20} {:>5}", category, n);
            }
            Ok(())
        }
        Commands::Export { format, out } => {
            let n = export::export(&conn, format, &out)
                .with_context(|| format!("Export to {} failed", out.display()))?;
            println!("Exported {} motorcycles to {}", n, out.display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn site_profile(name: &str) -> anyhow::Result<Box<dyn SiteProfile>> {
    extract::profile_for(name).ok_or_else(|| {
        anyhow!(
            "Unknown site '{}' (expected one of: {})",
            name,
            extract::PROFILE_NAMES.join(", ")
        )
    })
}

/// Set once Ctrl-C is received; batches stop starting new pages.
fn interrupt_flag() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current page");
            flag.store(true, Ordering::SeqCst);
        }
    });
    stop
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "Done: {} stored ({} new, {} updated), {} failed.",
        summary.succeeded(),
        summary.inserted,
        summary.updated,
        summary.failed
    );
    if summary.skipped > 0 {
        println!("Interrupted: {} pages not attempted.", summary.skipped);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
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
