//! CycleWorld profile: loose keyword rules, units optional.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;
use tracing::warn;

use super::document::{compile, inline_text, node_text, Document};
use super::{
    collapse_whitespace, collect_images, collect_links, collect_texts, find_brand,
    infer_category, remove_word, usd_price, SiteProfile,
};
use crate::model::{
    RawDimensions, RawEngine, RawPerformance, RawPrice, RawRating, RawValue, RawVehicle,
    DEFAULT_RATING_SCALE,
};
use crate::patterns::{extract_number, NumberRule, TextRule};

pub const NAME: &str = "cycleworld";
const BASE_URL: &str = "https://www.cycleworld.com";

const MAX_IMAGES: usize = 10;
const MAX_FEATURES: usize = 10;

const BRANDS: &[&str] = &[
    "Honda",
    "Yamaha",
    "Kawasaki",
    "Suzuki",
    "Ducati",
    "BMW",
    "KTM",
    "Aprilia",
    "Triumph",
    "Harley-Davidson",
    "Indian",
    "MV Agusta",
];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("sport", &["sport", "supersport", "sportbike", "racing"]),
    ("cruiser", &["cruiser", "touring", "bagger"]),
    ("naked", &["naked", "streetfighter", "standard"]),
    ("adventure", &["adventure", "adv", "dual-sport", "enduro"]),
    ("dirt", &["dirt", "motocross", "mx", "off-road"]),
    ("scooter", &["scooter", "automatic"]),
];

const LISTING_PATHS: &[&str] = &["/reviews", "/motorcycles", "/bikes"];

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20\d{2}|19\d{2})\b").unwrap());

struct Selectors {
    title: Vec<Selector>,
    specs: Vec<Selector>,
    performance: Vec<Selector>,
    price: Vec<Selector>,
    rating: Vec<Selector>,
    images: Vec<Selector>,
    description: Vec<Selector>,
    features: Vec<Selector>,
    links: Vec<Selector>,
}

static SELECTORS: LazyLock<Selectors> = LazyLock::new(|| Selectors {
    title: compile(&["h1", ".title", ".motorcycle-title"]),
    specs: compile(&[".specifications", ".specs", ".spec-table"]),
    performance: compile(&[".performance", ".perf-data"]),
    price: compile(&[".price", ".msrp"]),
    rating: compile(&[".rating", ".score"]),
    images: compile(&[r#"img[src*="motorcycle"]"#, ".gallery img"]),
    description: compile(&[".description", ".summary", ".intro"]),
    features: compile(&[".features li", ".highlights li", "ul li"]),
    links: compile(&[
        r#"a[href*="/review"]"#,
        r#"a[href*="/motorcycle"]"#,
        r#"a[href*="/bike"]"#,
        ".motorcycle-card a",
        ".bike-card a",
    ]),
});

struct Rules {
    displacement: NumberRule,
    bore: NumberRule,
    stroke: NumberRule,
    compression: TextRule,
    cooling: TextRule,
    fuel_system: TextRule,
    engine_type: TextRule,
    power_hp: NumberRule,
    power_kw: NumberRule,
    torque_nm: NumberRule,
    torque_lbft: NumberRule,
    top_speed_mph: NumberRule,
    acceleration: NumberRule,
    quarter_mile: NumberRule,
    length: NumberRule,
    width: NumberRule,
    height: NumberRule,
    wheelbase: NumberRule,
    ground_clearance: NumberRule,
    seat_height: NumberRule,
    dry_weight: NumberRule,
    wet_weight: NumberRule,
    fuel_capacity: NumberRule,
}

static RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    displacement: NumberRule::keywords(&["displacement", "cc", "engine"], "cc").unwrap(),
    bore: NumberRule::keywords(&["bore"], "mm").unwrap(),
    stroke: NumberRule::keywords(&["stroke"], "mm").unwrap(),
    compression: TextRule::keywords(&["compression ratio", "compression"]).unwrap(),
    cooling: TextRule::keywords(&["cooling", "cooled"]).unwrap(),
    fuel_system: TextRule::keywords(&["fuel injection", "carburetor", "fuel"]).unwrap(),
    engine_type: TextRule::keywords(&["engine type", "configuration"]).unwrap(),
    power_hp: NumberRule::keywords(&["horsepower", "hp", "power"], "hp").unwrap(),
    power_kw: NumberRule::keywords(&["kilowatt", "kw"], "kw").unwrap(),
    torque_nm: NumberRule::keywords(&["torque", "nm"], "nm").unwrap(),
    torque_lbft: NumberRule::keywords(&["lb-ft", "lbft", "ft-lb"], "lb-ft").unwrap(),
    top_speed_mph: NumberRule::keywords(&["top speed", "max speed"], "mph").unwrap(),
    acceleration: NumberRule::keywords(&["0-60", "0 to 60", "acceleration"], "sec").unwrap(),
    quarter_mile: NumberRule::keywords(&["quarter mile", "1/4 mile"], "sec").unwrap(),
    length: NumberRule::keywords(&["length"], "mm").unwrap(),
    width: NumberRule::keywords(&["width"], "mm").unwrap(),
    height: NumberRule::keywords(&["height"], "mm").unwrap(),
    wheelbase: NumberRule::keywords(&["wheelbase"], "mm").unwrap(),
    ground_clearance: NumberRule::keywords(&["ground clearance", "clearance"], "mm").unwrap(),
    seat_height: NumberRule::keywords(&["seat height"], "mm").unwrap(),
    dry_weight: NumberRule::keywords(&["dry weight", "curb weight"], "kg").unwrap(),
    wet_weight: NumberRule::keywords(&["wet weight", "weight"], "kg").unwrap(),
    fuel_capacity: NumberRule::keywords(&["fuel capacity", "tank"], "l").unwrap(),
});

pub struct CycleWorld;

impl SiteProfile for CycleWorld {
    fn name(&self) -> &'static str {
        NAME
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn extract(&self, doc: &Document, source_url: &str) -> Option<RawVehicle> {
        let sel = &*SELECTORS;
        let Some(title_el) = doc.select_one(&sel.title) else {
            warn!("No title element on {}", source_url);
            return None;
        };
        let (brand, model, year) = parse_title(&inline_text(&title_el));

        let specs = doc
            .select_one(&sel.specs)
            .map(|el| node_text(&el).to_lowercase());
        let perf = doc
            .select_one(&sel.performance)
            .map(|el| node_text(&el).to_lowercase())
            .or_else(|| specs.clone());
        let page = doc.page_text().to_lowercase();

        Some(RawVehicle {
            brand: brand.map(str::to_string),
            model: Some(model),
            year: year.map(RawValue::from),
            category: infer_category(&page, CATEGORIES).map(str::to_string),
            engine: specs.as_deref().and_then(engine),
            performance: perf.as_deref().and_then(performance),
            dimensions: specs.as_deref().and_then(dimensions),
            price: price(doc),
            rating: rating(doc),
            source_url: source_url.to_string(),
            images: collect_images(doc, &sel.images, MAX_IMAGES, &["src", "data-src"], &[], source_url),
            description: doc
                .select_one(&sel.description)
                .map(|el| inline_text(&el))
                .filter(|d| !d.is_empty()),
            features: collect_texts(doc, &sel.features, MAX_FEATURES, |t| {
                let len = t.chars().count();
                len > 5 && len < 100
            }),
            ..Default::default()
        })
    }

    fn listing_urls(&self, category: Option<&str>) -> Vec<String> {
        LISTING_PATHS
            .iter()
            .map(|path| match category {
                Some(c) => format!("{}{}/{}", BASE_URL, path, c),
                None => format!("{}{}", BASE_URL, path),
            })
            .collect()
    }

    fn detail_urls(&self, doc: &Document, listing_url: &str) -> Vec<String> {
        collect_links(doc, &SELECTORS.links, listing_url, |_| true)
    }
}

fn parse_title(title: &str) -> (Option<&'static str>, String, Option<i32>) {
    let year = YEAR_RE.captures(title).map(|c| c[1].to_string());
    let brand = find_brand(title, BRANDS);

    let mut model = title.to_string();
    if let Some(b) = brand {
        model = remove_word(&model, b);
    }
    if let Some(y) = &year {
        model = remove_word(&model, y);
    }
    (brand, collapse_whitespace(&model), year.and_then(|y| y.parse().ok()))
}

fn engine(text: &str) -> Option<RawEngine> {
    let r = &*RULES;
    let engine = RawEngine {
        kind: r.engine_type.find(text),
        displacement: r.displacement.find(text).map(RawValue::from),
        bore: r.bore.find(text).map(RawValue::from),
        stroke: r.stroke.find(text).map(RawValue::from),
        compression_ratio: r.compression.find(text),
        cooling: r.cooling.find(text),
        fuel_system: r.fuel_system.find(text),
    };
    (engine != RawEngine::default()).then_some(engine)
}

fn performance(text: &str) -> Option<RawPerformance> {
    let r = &*RULES;
    let perf = RawPerformance {
        power_hp: r.power_hp.find(text).map(RawValue::from),
        power_kw: r.power_kw.find(text).map(RawValue::from),
        torque_nm: r.torque_nm.find(text).map(RawValue::from),
        torque_lbft: r.torque_lbft.find(text).map(RawValue::from),
        top_speed_mph: r.top_speed_mph.find(text).map(RawValue::from),
        top_speed_kmh: None,
        acceleration_0_60: r.acceleration.find(text).map(RawValue::from),
        quarter_mile: r.quarter_mile.find(text).map(RawValue::from),
    };
    (perf != RawPerformance::default()).then_some(perf)
}

fn dimensions(text: &str) -> Option<RawDimensions> {
    let r = &*RULES;
    let dims = RawDimensions {
        length: r.length.find(text).map(RawValue::from),
        width: r.width.find(text).map(RawValue::from),
        height: r.height.find(text).map(RawValue::from),
        wheelbase: r.wheelbase.find(text).map(RawValue::from),
        ground_clearance: r.ground_clearance.find(text).map(RawValue::from),
        seat_height: r.seat_height.find(text).map(RawValue::from),
        dry_weight: r.dry_weight.find(text).map(RawValue::from),
        wet_weight: r.wet_weight.find(text).map(RawValue::from),
        fuel_capacity: r.fuel_capacity.find(text).map(RawValue::from),
    };
    (dims != RawDimensions::default()).then_some(dims)
}

fn price(doc: &Document) -> Option<RawPrice> {
    let el = doc.select_one(&SELECTORS.price)?;
    let value = extract_number(&inline_text(&el))?;
    (value > 0.0).then(|| usd_price(value))
}

fn rating(doc: &Document) -> Option<RawRating> {
    let el = doc.select_one(&SELECTORS.rating)?;
    let overall = extract_number(&inline_text(&el))?;
    (overall > 0.0).then(|| RawRating {
        overall: Some(overall.into()),
        scale: Some(DEFAULT_RATING_SCALE.into()),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.cycleworld.com/reviews/2021-kawasaki-ninja-zx-10r";

    const PAGE: &str = r#"<html><body>
        <h1>2021 Kawasaki Ninja ZX-10R</h1>
        <div class="specs"><table>
            <tr><td>Displacement:</td><td>998 cc</td></tr>
            <tr><td>Bore:</td><td>76 mm</td></tr>
            <tr><td>Cooling:</td><td>Liquid</td></tr>
            <tr><td>Seat Height:</td><td>835 mm</td></tr>
        </table></div>
        <div class="performance"><p>Horsepower: 203 hp</p><p>Top Speed: 186 mph</p></div>
        <span class="price">$17,399</span>
        <div class="rating">Score: 9.1</div>
        <div class="gallery">
            <img src="/img/zx10r.jpg">
            <img data-src="/img/zx10r.jpg">
            <img src="https://cdn.example.com/side.png">
        </div>
        <p class="summary">Track-bred supersport.</p>
        <ul class="features"><li>Quick shifter</li><li>Cornering ABS</li><li>TFT</li></ul>
    </body></html>"#;

    fn extract(html: &str) -> Option<RawVehicle> {
        CycleWorld.extract(&Document::parse(html), URL)
    }

    #[test]
    fn identity_from_title() {
        let raw = extract(PAGE).unwrap();
        assert_eq!(raw.brand.as_deref(), Some("Kawasaki"));
        assert_eq!(raw.model.as_deref(), Some("Ninja ZX-10R"));
        assert_eq!(raw.year, Some(RawValue::Number(2021.0)));
        assert_eq!(raw.category.as_deref(), Some("sport"));
        assert_eq!(raw.source_url, URL);
    }

    #[test]
    fn spec_sections() {
        let raw = extract(PAGE).unwrap();
        let engine = raw.engine.unwrap();
        assert_eq!(engine.displacement, Some(RawValue::Number(998.0)));
        assert_eq!(engine.bore, Some(RawValue::Number(76.0)));
        assert_eq!(engine.cooling.as_deref(), Some("liquid"));
        assert_eq!(engine.stroke, None);

        let perf = raw.performance.unwrap();
        assert_eq!(perf.power_hp, Some(RawValue::Number(203.0)));
        assert_eq!(perf.top_speed_mph, Some(RawValue::Number(186.0)));
        assert_eq!(perf.torque_nm, None);

        let dims = raw.dimensions.unwrap();
        assert_eq!(dims.seat_height, Some(RawValue::Number(835.0)));
    }

    #[test]
    fn performance_falls_back_to_specs() {
        let html = r#"<h1>2020 Honda Rebel 500</h1>
            <div class="specs"><p>Engine: 471 cc</p><p>Power: 46 hp</p></div>"#;
        let perf = extract(html).unwrap().performance.unwrap();
        assert_eq!(perf.power_hp, Some(RawValue::Number(46.0)));
    }

    #[test]
    fn price_rating_and_media() {
        let raw = extract(PAGE).unwrap();
        assert_eq!(raw.price.unwrap().msrp, Some(RawValue::Number(17399.0)));
        let rating = raw.rating.unwrap();
        assert_eq!(rating.overall, Some(RawValue::Number(9.1)));
        assert_eq!(rating.scale, Some(RawValue::Number(10.0)));
        assert_eq!(
            raw.images,
            vec![
                "https://www.cycleworld.com/img/zx10r.jpg".to_string(),
                "https://cdn.example.com/side.png".to_string(),
            ]
        );
        assert_eq!(raw.description.as_deref(), Some("Track-bred supersport."));
        assert_eq!(raw.features, vec!["Quick shifter", "Cornering ABS"]);
    }

    #[test]
    fn missing_sections_are_absent() {
        let raw = extract("<h1>Yamaha MT-07</h1>").unwrap();
        assert_eq!(raw.brand.as_deref(), Some("Yamaha"));
        assert_eq!(raw.year, None);
        assert!(raw.engine.is_none());
        assert!(raw.performance.is_none());
        assert!(raw.dimensions.is_none());
        assert!(raw.price.is_none());
        assert!(raw.rating.is_none());
    }

    #[test]
    fn no_title_is_not_extractable() {
        assert!(extract("<div class='specs'>Displacement: 998 cc</div>").is_none());
    }

    #[test]
    fn listing_and_links() {
        assert_eq!(
            CycleWorld.listing_urls(Some("sport")),
            vec![
                "https://www.cycleworld.com/reviews/sport",
                "https://www.cycleworld.com/motorcycles/sport",
                "https://www.cycleworld.com/bikes/sport",
            ]
        );
        let listing = Document::parse(
            r#"<a href="/reviews/a">A</a><a href="/reviews/a">A again</a>
               <div class="bike-card"><a href="https://www.cycleworld.com/x">X</a></div>
               <a href="/about">About</a>"#,
        );
        assert_eq!(
            CycleWorld.detail_urls(&listing, "https://www.cycleworld.com/reviews"),
            vec![
                "https://www.cycleworld.com/reviews/a",
                "https://www.cycleworld.com/x",
            ]
        );
    }
}
