use anyhow::{Context, Result};
use quick_xml::events::Event;
use tracing::{info, warn};

use crate::fetch::Fetcher;

/// Contents of a sitemap document.
#[derive(Debug, PartialEq)]
pub enum Sitemap {
    /// `<urlset>`: page URLs.
    Pages(Vec<String>),
    /// `<sitemapindex>`: URLs of further sitemaps.
    Index(Vec<String>),
}

/// Fetch a sitemap (following one level of sitemap index) and return the page URLs
/// accepted by `keep`.
pub async fn fetch_page_urls<F, K>(fetcher: &F, sitemap_url: &str, keep: K) -> Result<Vec<String>>
where
    F: Fetcher,
    K: Fn(&str) -> bool,
{
    info!("Fetching sitemap: {}", sitemap_url);
    let xml = fetcher
        .fetch(sitemap_url)
        .await
        .with_context(|| format!("Failed to fetch sitemap {}", sitemap_url))?;

    let mut all_urls = Vec::new();
    match parse_sitemap(&xml)? {
        Sitemap::Pages(urls) => all_urls.extend(urls),
        Sitemap::Index(children) => {
            info!("Sitemap index with {} children", children.len());
            for child in children {
                let xml = match fetcher.fetch(&child).await {
                    Ok(xml) => xml,
                    Err(e) => {
                        warn!("Skipping sitemap {}: {}", child, e);
                        continue;
                    }
                };
                match parse_sitemap(&xml) {
                    Ok(Sitemap::Pages(urls)) => all_urls.extend(urls),
                    Ok(Sitemap::Index(_)) => warn!("Skipping nested sitemap index {}", child),
                    Err(e) => warn!("Skipping unreadable sitemap {}: {}", child, e),
                }
            }
        }
    }
    info!("Total URLs in sitemap: {}", all_urls.len());

    let mut filtered: Vec<String> = Vec::new();
    for url in all_urls {
        if keep(&url) && !filtered.contains(&url) {
            filtered.push(url);
        }
    }
    info!("Pages after filtering: {}", filtered.len());
    Ok(filtered)
}

/// Parse a `<urlset>` or `<sitemapindex>` document and return its `<loc>` URLs.
pub fn parse_sitemap(xml: &str) -> Result<Sitemap> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut urls = Vec::new();
    let mut is_index = false;
    let mut in_entry = false;
    let mut in_loc = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sitemapindex" => is_index = true,
                b"url" | b"sitemap" => in_entry = true,
                b"loc" if in_entry => in_loc = true,
                _ => {}
            },
            Ok(Event::Text(e)) if in_loc => {
                let loc = e.unescape()?.trim().to_string();
                if !loc.is_empty() {
                    urls.push(loc);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"loc" => in_loc = false,
                b"url" | b"sitemap" => in_entry = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    Ok(if is_index {
        Sitemap::Index(urls)
    } else {
        Sitemap::Pages(urls)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://www.motorcycle.com/review/a</loc><lastmod>2024-01-01</lastmod></url>
          <url><loc> https://www.motorcycle.com/news/b </loc></url>
          <url><loc>https://www.motorcycle.com/review/c?x=1&amp;y=2</loc></url>
        </urlset>"#;

    const INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <sitemap><loc>https://www.motorcycle.com/sitemap-1.xml</loc></sitemap>
          <sitemap><loc>https://www.motorcycle.com/sitemap-missing.xml</loc></sitemap>
        </sitemapindex>"#;

    #[test]
    fn parses_urlset() {
        let Sitemap::Pages(urls) = parse_sitemap(URLSET).unwrap() else {
            panic!("expected a urlset");
        };
        assert_eq!(
            urls,
            vec![
                "https://www.motorcycle.com/review/a",
                "https://www.motorcycle.com/news/b",
                "https://www.motorcycle.com/review/c?x=1&y=2",
            ]
        );
    }

    #[test]
    fn parses_index() {
        assert_eq!(
            parse_sitemap(INDEX).unwrap(),
            Sitemap::Index(vec![
                "https://www.motorcycle.com/sitemap-1.xml".to_string(),
                "https://www.motorcycle.com/sitemap-missing.xml".to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn follows_index_and_filters() {
        let fetcher = MemoryFetcher::default()
            .with("https://www.motorcycle.com/sitemap.xml", INDEX)
            .with("https://www.motorcycle.com/sitemap-1.xml", URLSET);
        let urls = fetch_page_urls(&fetcher, "https://www.motorcycle.com/sitemap.xml", |u| {
            u.contains("/review/")
        })
        .await
        .unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls.iter().all(|u| u.contains("/review/")));
    }

    #[tokio::test]
    async fn unreachable_sitemap_is_an_error() {
        let fetcher = MemoryFetcher::default();
        assert!(fetch_page_urls(&fetcher, "https://x.test/sitemap.xml", |_| true)
            .await
            .is_err());
    }
}
