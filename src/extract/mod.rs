pub mod cycleworld;
pub mod document;
pub mod motorcycle_com;

use regex::Regex;
use scraper::Selector;
use url::Url;

use crate::clean::current_year;
use crate::model::{RawPrice, RawVehicle};
use document::{attr, inline_text, Document};

pub use cycleworld::CycleWorld;
pub use motorcycle_com::MotorcycleDotCom;

/// Extraction rules for one source website.
pub trait SiteProfile {
    /// Short name used on the command line.
    fn name(&self) -> &'static str;

    fn base_url(&self) -> &'static str;

    /// Raw fields from a detail page, or `None` when the page has no title node.
    fn extract(&self, doc: &Document, source_url: &str) -> Option<RawVehicle>;

    /// Listing pages that link to detail pages.
    fn listing_urls(&self, category: Option<&str>) -> Vec<String>;

    /// Absolute detail-page URLs found on a listing page.
    fn detail_urls(&self, doc: &Document, listing_url: &str) -> Vec<String>;
}

pub const PROFILE_NAMES: &[&str] = &[cycleworld::NAME, motorcycle_com::NAME];

pub fn profile_for(name: &str) -> Option<Box<dyn SiteProfile>> {
    match name {
        cycleworld::NAME => Some(Box::new(CycleWorld)),
        motorcycle_com::NAME => Some(Box::new(MotorcycleDotCom)),
        _ => None,
    }
}

// ── Shared helpers ──

/// Case-insensitive whole-word containment.
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    word_regex(needle)
        .map(|re| re.is_match(haystack))
        .unwrap_or(false)
}

/// Remove every case-insensitive whole-word occurrence of `word`.
pub fn remove_word(text: &str, word: &str) -> String {
    match word_regex(word) {
        Some(re) if !word.is_empty() => re.replace_all(text, "").into_owned(),
        _ => text.to_string(),
    }
}

fn word_regex(word: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))).ok()
}

/// First brand of `brands` (in list order) that appears in `title` as a whole word.
pub fn find_brand(title: &str, brands: &[&'static str]) -> Option<&'static str> {
    brands.iter().copied().find(|b| contains_word(title, b))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Category with the most keyword hits in `text`; ties go to the earlier entry.
pub fn infer_category(text: &str, table: &[(&'static str, &[&str])]) -> Option<&'static str> {
    let mut best: Option<(&'static str, usize)> = None;
    for (category, keywords) in table {
        let score = keywords.iter().filter(|kw| text.contains(*kw)).count();
        if score > 0 && best.map_or(true, |(_, top)| score > top) {
            best = Some((*category, score));
        }
    }
    best.map(|(category, _)| category)
}

/// Resolve `href` against `base`; only absolute http(s) URLs with a host survive.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    let url = match Url::parse(base) {
        Ok(base) => base.join(href).ok()?,
        Err(_) => Url::parse(href).ok()?,
    };
    let valid = matches!(url.scheme(), "http" | "https") && url.host_str().is_some();
    valid.then(|| url.to_string())
}

/// Image URLs from the first `cap` candidate nodes, in first-seen order.
pub fn collect_images(
    doc: &Document,
    selectors: &[Selector],
    cap: usize,
    attrs: &[&str],
    skip: &[&str],
    base_url: &str,
) -> Vec<String> {
    let mut images: Vec<String> = Vec::new();
    for el in doc.select_all(selectors).into_iter().take(cap) {
        let Some(src) = attrs.iter().find_map(|a| attr(&el, a)) else {
            continue;
        };
        let lower = src.to_lowercase();
        if skip.iter().any(|s| lower.contains(s)) {
            continue;
        }
        if let Some(url) = resolve_url(base_url, src) {
            if !images.contains(&url) {
                images.push(url);
            }
        }
    }
    images
}

/// Node texts accepted by `accept`, deduplicated, stopping at `cap`.
pub fn collect_texts<F>(doc: &Document, selectors: &[Selector], cap: usize, accept: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let mut out: Vec<String> = Vec::new();
    for el in doc.select_all(selectors) {
        if out.len() >= cap {
            break;
        }
        let text = inline_text(&el);
        if accept(&text) && !out.contains(&text) {
            out.push(text);
        }
    }
    out
}

/// Absolute links from `selectors`, deduplicated, filtered by `keep`.
pub fn collect_links<F>(doc: &Document, selectors: &[Selector], listing_url: &str, keep: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    let mut urls: Vec<String> = Vec::new();
    for el in doc.select_all(selectors) {
        let Some(href) = attr(&el, "href") else {
            continue;
        };
        if let Some(url) = resolve_url(listing_url, href) {
            if keep(&url) && !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

/// Price block for a USD list price seen this year.
pub fn usd_price(msrp: f64) -> RawPrice {
    RawPrice {
        msrp: Some(msrp.into()),
        currency: Some("USD".to_string()),
        year: Some(current_year().into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_word_brand_match() {
        let brands = ["Honda", "BMW", "MV Agusta", "Harley-Davidson"];
        assert_eq!(find_brand("2023 honda cbr", &brands), Some("Honda"));
        assert_eq!(find_brand("Hondamatic special", &brands), None);
        assert_eq!(find_brand("The MV Agusta Brutale", &brands), Some("MV Agusta"));
        assert_eq!(find_brand("Harley-Davidson Street Glide", &brands), Some("Harley-Davidson"));
    }

    #[test]
    fn brand_list_order_wins() {
        let brands = ["Honda", "BMW"];
        assert_eq!(find_brand("BMW vs Honda", &brands), Some("Honda"));
    }

    #[test]
    fn word_removal_is_case_insensitive() {
        assert_eq!(remove_word("HONDA Gold Wing honda", "Honda"), " Gold Wing ");
    }

    #[test]
    fn category_scoring() {
        let table: &[(&'static str, &[&str])] = &[
            ("sport", &["track", "racing"]),
            ("touring", &["highway", "luggage"]),
        ];
        assert_eq!(infer_category("highway luggage track", table), Some("touring"));
        assert_eq!(infer_category("track highway", table), Some("sport"));
        assert_eq!(infer_category("nothing here", table), None);
    }

    #[test]
    fn url_resolution() {
        let base = "https://www.example.com/reviews/cbr";
        assert_eq!(
            resolve_url(base, "/img/a.jpg").as_deref(),
            Some("https://www.example.com/img/a.jpg")
        );
        assert_eq!(
            resolve_url(base, "https://cdn.example.com/b.png").as_deref(),
            Some("https://cdn.example.com/b.png")
        );
        assert_eq!(resolve_url(base, "mailto:a@b.com"), None);
        assert_eq!(resolve_url("not a url", "also not"), None);
    }

    #[test]
    fn profiles_by_name() {
        for name in PROFILE_NAMES {
            assert_eq!(profile_for(name).unwrap().name(), *name);
        }
        assert!(profile_for("nope").is_none());
    }
}
