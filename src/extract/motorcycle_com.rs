//! Motorcycle.com profile: strict per-field patterns with units, a dedicated
//! category element, and a page-wide price fallback.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Selector;
use tracing::warn;

use super::document::{attr, compile, inline_text, node_text, Document};
use super::{
    collapse_whitespace, collect_images, collect_links, collect_texts, find_brand,
    infer_category, remove_word, usd_price, SiteProfile,
};
use crate::model::{
    RawDimensions, RawEngine, RawPerformance, RawPrice, RawRating, RawValue, RawVehicle,
};
use crate::patterns::{extract_number, NumberRule, TextRule};

pub const NAME: &str = "motorcycle-com";
const BASE_URL: &str = "https://www.motorcycle.com";

const MAX_IMAGES: usize = 15;
const MAX_FEATURES: usize = 15;
const MAX_COLORS: usize = 10;
const MAX_DESCRIPTION: usize = 2000;
const MIN_PRICE: f64 = 1000.0;

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
    "Benelli",
    "CFMoto",
    "Royal Enfield",
    "Husqvarna",
    "Beta",
    "Sherco",
    "GasGas",
    "TM Racing",
    "Zero",
    "Energica",
    "Lightning",
];

/// Substring → category, checked in order against the category element's text.
const CATEGORY_SYNONYMS: &[(&str, &str)] = &[
    ("sportbike", "sport"),
    ("supersport", "sport"),
    ("superbike", "sport"),
    ("sport bike", "sport"),
    ("street bike", "naked"),
    ("streetfighter", "naked"),
    ("standard", "naked"),
    ("touring bike", "touring"),
    ("tourer", "touring"),
    ("bagger", "cruiser"),
    ("chopper", "cruiser"),
    ("dual sport", "adventure"),
    ("dual-sport", "adventure"),
    ("adv", "adventure"),
    ("enduro", "adventure"),
    ("motocross", "dirt"),
    ("mx", "dirt"),
    ("cross", "dirt"),
    ("off-road", "dirt"),
    ("electric", "electric"),
    ("e-bike", "electric"),
];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("sport", &["supersport", "sportbike", "racing", "track", "racetrack", "circuit"]),
    ("cruiser", &["cruiser", "touring", "comfortable", "highway", "bagger", "chopper"]),
    ("naked", &["naked", "streetfighter", "standard", "upright", "street"]),
    ("adventure", &["adventure", "dual-sport", "off-road", "enduro", "adv", "travel"]),
    ("dirt", &["motocross", "mx", "dirt", "off-road", "enduro", "trail"]),
    ("scooter", &["scooter", "automatic", "cvt", "twist-and-go"]),
    ("electric", &["electric", "battery", "zero emissions", "e-bike"]),
];

const LISTING_PATHS: &[&str] = &[
    "/reviews",
    "/bikes",
    "/motorcycles",
    "/new-motorcycles",
    "/categories/sportbikes",
    "/categories/cruisers",
    "/categories/touring",
    "/categories/adventure",
];

const DETAIL_PATHS: &[&str] = &["/review/", "/motorcycle/", "/bike/", "/test/"];

const IMAGE_SKIP: &[&str] = &["icon", "logo", "placeholder", "thumbnail"];

/// Tried in order; the first match is the model year.
static YEAR_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"\b(20\d{2})\b", r"\b(19\d{2})\b", r"'(\d{2})\b"]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});
static EDGE_NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\w]+|[^\w]+$").unwrap());
static PAGE_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d{1,3}(?:,\d{3})*(?:\.\d{2})?)").unwrap());
/// Score patterns and the scale each one implies.
static RATING_RES: LazyLock<Vec<(Regex, u32)>> = LazyLock::new(|| {
    [
        (r"(\d+(?:\.\d+)?)/10", 10),
        (r"(\d+(?:\.\d+)?)/5", 5),
        (r"(\d+(?:\.\d+)?)\s*stars?", 5),
        (r"rating[:\s]*(\d+(?:\.\d+)?)", 10),
    ]
    .into_iter()
    .map(|(p, scale)| (Regex::new(p).unwrap(), scale))
    .collect()
});

struct Selectors {
    title: Vec<Selector>,
    specs: Vec<Selector>,
    /// Performance sections followed by spec sections.
    perf_sections: Vec<Selector>,
    price: Vec<Selector>,
    rating: Vec<Selector>,
    images: Vec<Selector>,
    description: Vec<Selector>,
    category: Vec<Selector>,
    features: Vec<Selector>,
    colors: Vec<Selector>,
    links: Vec<Selector>,
}

const SPEC_SELECTORS: &[&str] = &[".spec-table", ".specifications", ".tech-specs", ".bike-specs"];

static SELECTORS: LazyLock<Selectors> = LazyLock::new(|| Selectors {
    title: compile(&["h1.title", "h1", ".bike-title", ".motorcycle-name"]),
    specs: compile(SPEC_SELECTORS),
    perf_sections: compile(
        &[".performance-data", ".dyno-results", ".test-results"]
            .iter()
            .chain(SPEC_SELECTORS)
            .copied()
            .collect::<Vec<_>>(),
    ),
    price: compile(&[".price", ".msrp", ".starting-price"]),
    rating: compile(&[".rating-score", ".overall-rating", ".stars"]),
    images: compile(&[".hero-image img", ".gallery img", ".bike-photos img"]),
    description: compile(&[".bike-description", ".overview", ".intro-text"]),
    category: compile(&[".bike-category", ".type", ".segment"]),
    features: compile(&[
        ".features li",
        ".highlights li",
        ".key-features li",
        ".equipment li",
        "ul li",
    ]),
    colors: compile(&[
        ".colors li",
        ".available-colors li",
        ".color-options li",
        "[data-color]",
    ]),
    links: compile(&[
        r#"a[href*="/review/"]"#,
        r#"a[href*="/motorcycle/"]"#,
        r#"a[href*="/bike/"]"#,
        r#"a[href*="/test/"]"#,
        ".bike-card a",
        ".motorcycle-card a",
        ".review-card a",
    ]),
});

const NUM: &str = r"(\d+(?:\.\d+)?)";

fn number_rule(templates: &[&str]) -> NumberRule {
    let patterns: Vec<String> = templates.iter().map(|t| t.replace("{n}", NUM)).collect();
    let refs: Vec<&str> = patterns.iter().map(String::as_str).collect();
    NumberRule::patterns(&refs).unwrap()
}

struct Rules {
    displacement: NumberRule,
    engine_type: TextRule,
    bore: NumberRule,
    stroke: NumberRule,
    compression: TextRule,
    cooling: TextRule,
    fuel_system: TextRule,
    power_hp: NumberRule,
    power_kw: NumberRule,
    torque_nm: NumberRule,
    torque_lbft: NumberRule,
    top_speed_mph: NumberRule,
    top_speed_kmh: NumberRule,
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
    displacement: number_rule(&[r"displacement[:\s]*{n}\s*cc", r"engine[:\s]*{n}\s*cc", r"{n}\s*cc"]),
    engine_type: TextRule::patterns(&[
        r"engine type[:\s]*([^\n\r,]+)",
        r"configuration[:\s]*([^\n\r,]+)",
        r"(single|twin|inline-?\d+|v-?\d+|boxer)",
    ])
    .unwrap(),
    bore: number_rule(&[r"bore[:\s]*{n}\s*mm"]),
    stroke: number_rule(&[r"stroke[:\s]*{n}\s*mm"]),
    compression: TextRule::patterns(&[r"compression ratio[:\s]*(\d+(?:\.\d+)?:1)"]).unwrap(),
    cooling: TextRule::patterns(&[
        r"cooling[:\s]*([^\n\r,]+)",
        r"(liquid[- ]?cooled|air[- ]?cooled|oil[- ]?cooled)",
    ])
    .unwrap(),
    fuel_system: TextRule::patterns(&[
        r"fuel system[:\s]*([^\n\r,]+)",
        r"(fuel injection|carburetor|efi)",
    ])
    .unwrap(),
    power_hp: number_rule(&[r"power[:\s]*{n}\s*hp", r"{n}\s*hp", r"horsepower[:\s]*{n}"]),
    power_kw: number_rule(&[r"power[:\s]*{n}\s*kw", r"{n}\s*kw"]),
    torque_nm: number_rule(&[r"torque[:\s]*{n}\s*nm", r"{n}\s*nm"]),
    torque_lbft: number_rule(&[r"torque[:\s]*{n}\s*lb[- ]?ft", r"{n}\s*lb[- ]?ft"]),
    top_speed_mph: number_rule(&[
        r"top speed[:\s]*{n}\s*mph",
        r"max speed[:\s]*{n}\s*mph",
        r"{n}\s*mph",
    ]),
    top_speed_kmh: number_rule(&[r"top speed[:\s]*{n}\s*km/?h", r"max speed[:\s]*{n}\s*km/?h"]),
    acceleration: number_rule(&[r"0[- ]?60[:\s]*{n}\s*sec", r"0[- ]?to[- ]?60[:\s]*{n}\s*sec"]),
    quarter_mile: number_rule(&[r"quarter mile[:\s]*{n}\s*sec", r"1/4 mile[:\s]*{n}\s*sec"]),
    length: number_rule(&[r"length[:\s]*{n}\s*mm", r"length[:\s]*{n}\s*in"]),
    width: number_rule(&[r"width[:\s]*{n}\s*mm", r"width[:\s]*{n}\s*in"]),
    height: number_rule(&[r"height[:\s]*{n}\s*mm", r"height[:\s]*{n}\s*in"]),
    wheelbase: number_rule(&[r"wheelbase[:\s]*{n}\s*mm", r"wheelbase[:\s]*{n}\s*in"]),
    ground_clearance: number_rule(&[r"ground clearance[:\s]*{n}\s*mm"]),
    seat_height: number_rule(&[r"seat height[:\s]*{n}\s*mm", r"seat height[:\s]*{n}\s*in"]),
    dry_weight: number_rule(&[r"dry weight[:\s]*{n}\s*kg", r"dry weight[:\s]*{n}\s*lb"]),
    wet_weight: number_rule(&[r"wet weight[:\s]*{n}\s*kg", r"weight[:\s]*{n}\s*kg"]),
    fuel_capacity: number_rule(&[r"fuel capacity[:\s]*{n}\s*l", r"tank[:\s]*{n}\s*gal"]),
});

pub struct MotorcycleDotCom;

impl SiteProfile for MotorcycleDotCom {
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
        let perf_sections = doc.select_all(&sel.perf_sections);
        let perf = (!perf_sections.is_empty()).then(|| {
            perf_sections
                .iter()
                .map(|el| node_text(el).to_lowercase())
                .collect::<Vec<_>>()
                .join("\n")
        });

        Some(RawVehicle {
            brand: brand.map(str::to_string),
            model: Some(model),
            year: year.map(RawValue::from),
            category: category(doc),
            engine: specs.as_deref().and_then(engine),
            performance: perf.as_deref().and_then(performance),
            dimensions: specs.as_deref().and_then(dimensions),
            price: price(doc),
            rating: rating(doc),
            source_url: source_url.to_string(),
            images: collect_images(
                doc,
                &sel.images,
                MAX_IMAGES,
                &["src", "data-src", "data-original"],
                IMAGE_SKIP,
                source_url,
            ),
            description: description(doc),
            features: collect_texts(doc, &sel.features, MAX_FEATURES, |t| {
                (10..=150).contains(&t.chars().count())
            }),
            colors: colors(doc),
            ..Default::default()
        })
    }

    fn listing_urls(&self, category: Option<&str>) -> Vec<String> {
        match category {
            Some(c) => vec![format!("{}/categories/{}", BASE_URL, c)],
            None => LISTING_PATHS
                .iter()
                .map(|path| format!("{}{}", BASE_URL, path))
                .collect(),
        }
    }

    fn detail_urls(&self, doc: &Document, listing_url: &str) -> Vec<String> {
        collect_links(doc, &SELECTORS.links, listing_url, |url| {
            let lower = url.to_lowercase();
            DETAIL_PATHS.iter().any(|p| lower.contains(p))
        })
    }
}

fn parse_title(title: &str) -> (Option<&'static str>, String, Option<i32>) {
    let year = YEAR_RES.iter().find_map(|re| {
        let digits = re.captures(title)?.get(1)?.as_str();
        let n: i32 = digits.parse().ok()?;
        Some(match digits.len() {
            2 if n < 50 => 2000 + n,
            2 => 1900 + n,
            _ => n,
        })
    });
    let brand = find_brand(title, BRANDS);

    let mut model = title.to_string();
    if let Some(b) = brand {
        model = remove_word(&model, b);
    }
    for re in YEAR_RES.iter() {
        model = re.replace_all(&model, "").into_owned();
    }
    let model = collapse_whitespace(&model);
    let model = EDGE_NON_WORD_RE.replace_all(&model, "").into_owned();
    (brand, model, year)
}

fn category(doc: &Document) -> Option<String> {
    if let Some(el) = doc.select_one(&SELECTORS.category) {
        let text = inline_text(&el).to_lowercase();
        let mapped = CATEGORY_SYNONYMS
            .iter()
            .find(|(key, _)| text.contains(key))
            .map(|(_, category)| category.to_string());
        return Some(mapped.unwrap_or_else(|| text.trim().to_string()));
    }
    infer_category(&doc.page_text().to_lowercase(), CATEGORIES).map(str::to_string)
}

fn engine(text: &str) -> Option<RawEngine> {
    let r = &*RULES;
    let engine = RawEngine {
        kind: r.engine_type.find(text).map(|t| t.trim().to_string()),
        displacement: r.displacement.find(text).map(RawValue::from),
        bore: r.bore.find(text).map(RawValue::from),
        stroke: r.stroke.find(text).map(RawValue::from),
        compression_ratio: r.compression.find(text),
        cooling: r.cooling.find(text).map(|t| t.trim().to_string()),
        fuel_system: r.fuel_system.find(text).map(|t| t.trim().to_string()),
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
        top_speed_kmh: r.top_speed_kmh.find(text).map(RawValue::from),
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
    let value = match doc.select_one(&SELECTORS.price) {
        Some(el) => extract_number(&inline_text(&el)),
        None => PAGE_PRICE_RE
            .captures(&doc.page_text())
            .and_then(|c| c[1].replace(',', "").parse::<f64>().ok()),
    }?;
    (value > MIN_PRICE).then(|| usd_price(value))
}

fn rating(doc: &Document) -> Option<RawRating> {
    let el = doc.select_one(&SELECTORS.rating)?;
    let text = inline_text(&el).to_lowercase();
    RATING_RES.iter().find_map(|(re, scale)| {
        let score: f64 = re.captures(&text)?.get(1)?.as_str().parse().ok()?;
        Some(RawRating {
            overall: Some(score.into()),
            scale: Some((*scale).into()),
            ..Default::default()
        })
    })
}

fn description(doc: &Document) -> Option<String> {
    let el = doc.select_one(&SELECTORS.description)?;
    let text = inline_text(&el);
    if text.is_empty() {
        return None;
    }
    if text.chars().count() > MAX_DESCRIPTION {
        let mut cut: String = text.chars().take(MAX_DESCRIPTION).collect();
        cut.push_str("...");
        return Some(cut);
    }
    Some(text)
}

fn colors(doc: &Document) -> Vec<String> {
    doc.select_all(&SELECTORS.colors)
        .iter()
        .filter_map(|el| {
            let text = inline_text(el);
            if text.is_empty() {
                attr(el, "data-color").map(|c| c.trim().to_string())
            } else {
                Some(text)
            }
        })
        .filter(|c| !c.is_empty() && c.chars().count() < 50)
        .take(MAX_COLORS)
        .collect()
}
