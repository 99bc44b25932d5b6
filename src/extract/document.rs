use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// Compile a selector list, skipping (and logging) any that fail to parse.
pub fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(sel) => Some(sel),
            Err(e) => {
                warn!("Failed to compile selector '{}': {:?}", s, e);
                None
            }
        })
        .collect()
}

/// A parsed page.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Document {
            html: Html::parse_document(html),
        }
    }

    /// First node matched by the first selector (in list order) that matches anything.
    pub fn select_one(&self, selectors: &[Selector]) -> Option<ElementRef<'_>> {
        selectors
            .iter()
            .find_map(|sel| self.html.select(sel).next())
    }

    /// All nodes matched by any selector, in selector order, each node once.
    pub fn select_all(&self, selectors: &[Selector]) -> Vec<ElementRef<'_>> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for sel in selectors {
            for el in self.html.select(sel) {
                if seen.insert(el.id()) {
                    nodes.push(el);
                }
            }
        }
        nodes
    }

    /// Text of the whole page, one text node per line.
    pub fn page_text(&self) -> String {
        node_text(&self.html.root_element())
    }
}

/// Text nodes under `el`, trimmed, one per line. Keeps label/value rows of spec
/// tables on separate lines so rest-of-line captures stay inside one row.
pub fn node_text(el: &ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text under `el` on a single line with whitespace collapsed.
pub fn inline_text(el: &ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn attr<'a>(el: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value().attr(name).filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <h1 class="title">2023 <b>Honda</b>   CBR600RR</h1>
        <div class="specs"><ul><li><b>Engine:</b> 599cc</li><li>Bore: 67 mm</li></ul></div>
        <img src="/a.jpg" data-src="/b.jpg">
    </body></html>"#;

    #[test]
    fn select_one_respects_selector_order() {
        let doc = Document::parse(PAGE);
        let sels = compile(&[".missing", ".specs", "h1"]);
        let el = doc.select_one(&sels).unwrap();
        assert_eq!(el.value().name(), "div");
    }

    #[test]
    fn select_all_dedups_nodes() {
        let doc = Document::parse(PAGE);
        let sels = compile(&[".specs li", "ul li", "li"]);
        assert_eq!(doc.select_all(&sels).len(), 2);
    }

    #[test]
    fn text_helpers() {
        let doc = Document::parse(PAGE);
        let h1 = doc.select_one(&compile(&["h1"])).unwrap();
        assert_eq!(inline_text(&h1), "2023 Honda CBR600RR");
        let specs = doc.select_one(&compile(&[".specs"])).unwrap();
        assert_eq!(node_text(&specs), "Engine:\n599cc\nBore: 67 mm");
    }

    #[test]
    fn bad_selector_is_skipped() {
        assert_eq!(compile(&["h1", "[[["]).len(), 1);
    }

    #[test]
    fn attribute_lookup() {
        let doc = Document::parse(PAGE);
        let img = doc.select_one(&compile(&["img"])).unwrap();
        assert_eq!(attr(&img, "src"), Some("/a.jpg"));
        assert_eq!(attr(&img, "data-original"), None);
    }
}
