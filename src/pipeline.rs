use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::clean::clean_vehicle;
use crate::db::{self, UpsertOutcome};
use crate::extract::document::Document;
use crate::extract::SiteProfile;
use crate::fetch::Fetcher;
use crate::model::Vehicle;
use crate::sitemap;

/// Parse, extract and clean one page. `None` when the page yields no usable record.
pub fn extract_vehicle(profile: &dyn SiteProfile, html: &str, url: &str) -> Option<Vehicle> {
    let doc = Document::parse(html);
    let mut raw = profile.extract(&doc, url)?;
    raw.scraped_at.get_or_insert_with(Utc::now);

    let vehicle = clean_vehicle(raw);
    if vehicle.brand.is_empty() {
        warn!("No known brand in title on {}", url);
        return None;
    }
    Some(vehicle)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
    /// Not attempted because the run was interrupted.
    pub skipped: usize,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.inserted + self.updated
    }
}

enum PageOutcome {
    Stored(UpsertOutcome),
    Failed,
}

async fn process_page<F: Fetcher>(
    fetcher: &F,
    profile: &dyn SiteProfile,
    conn: &Connection,
    url: &str,
) -> PageOutcome {
    let html = match fetcher.fetch(url).await {
        Ok(html) => html,
        Err(e) => {
            warn!("Fetch failed for {}: {}", url, e);
            return PageOutcome::Failed;
        }
    };
    let Some(vehicle) = extract_vehicle(profile, &html, url) else {
        return PageOutcome::Failed;
    };
    match db::upsert_vehicle(conn, &vehicle) {
        Ok(outcome) => {
            debug!(
                "{} {} {} {:?}",
                vehicle.year, vehicle.brand, vehicle.model, outcome
            );
            PageOutcome::Stored(outcome)
        }
        Err(e) => {
            warn!("Failed to store {}: {:#}", url, e);
            PageOutcome::Failed
        }
    }
}

/// Fetch, extract, clean and store each URL in order. Per-page failures are counted,
/// never raised. Once `stop` is set no new page is started.
pub async fn run_batch<F: Fetcher>(
    fetcher: &F,
    profile: &dyn SiteProfile,
    conn: &Connection,
    urls: &[String],
    stop: &AtomicBool,
) -> Result<BatchSummary> {
    let pb = ProgressBar::new(urls.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta}) {msg}")?
            .progress_chars("=> "),
    );

    let mut summary = BatchSummary::default();
    for (i, url) in urls.iter().enumerate() {
        if stop.load(Ordering::SeqCst) {
            summary.skipped = urls.len() - i;
            warn!("Interrupted, {} pages not attempted", summary.skipped);
            break;
        }
        pb.set_message(url.clone());
        match process_page(fetcher, profile, conn, url).await {
            PageOutcome::Stored(UpsertOutcome::Inserted(_)) => summary.inserted += 1,
            PageOutcome::Stored(UpsertOutcome::Updated(_)) => summary.updated += 1,
            PageOutcome::Failed => summary.failed += 1,
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "{}: {} pages ({} new, {} updated, {} failed)",
        profile.name(),
        urls.len(),
        summary.inserted,
        summary.updated,
        summary.failed
    );
    Ok(summary)
}

/// Detail-page URLs from the profile's listing pages and, optionally, a sitemap.
/// Unreachable listings are logged and skipped.
pub async fn discover<F: Fetcher>(
    fetcher: &F,
    profile: &dyn SiteProfile,
    category: Option<&str>,
    sitemap_url: Option<&str>,
    limit: Option<usize>,
    stop: &AtomicBool,
) -> Vec<String> {
    let limit = limit.unwrap_or(usize::MAX);
    let mut urls: Vec<String> = Vec::new();

    for listing in profile.listing_urls(category) {
        if urls.len() >= limit || stop.load(Ordering::SeqCst) {
            break;
        }
        let html = match fetcher.fetch(&listing).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Listing {} unavailable: {}", listing, e);
                continue;
            }
        };
        let found = profile.detail_urls(&Document::parse(&html), &listing);
        info!("{}: {} detail links", listing, found.len());
        push_unique(&mut urls, found, limit);
    }

    if let Some(sitemap_url) = sitemap_url {
        if urls.len() < limit && !stop.load(Ordering::SeqCst) {
            let base = profile.base_url();
            match sitemap::fetch_page_urls(fetcher, sitemap_url, |u| u.starts_with(base)).await {
                Ok(found) => push_unique(&mut urls, found, limit),
                Err(e) => warn!("Sitemap skipped: {:#}", e),
            }
        }
    }

    info!("Discovered {} detail pages", urls.len());
    urls
}

fn push_unique(urls: &mut Vec<String>, found: Vec<String>, limit: usize) {
    for url in found {
        if urls.len() >= limit {
            break;
        }
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
}
