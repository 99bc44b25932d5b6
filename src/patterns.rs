//! Labeled-field search over lower-cased page text.
//!
//! A rule is an ordered list of regexes; the first one that matches anywhere in the
//! text wins. Rules never look for the "best" match, so callers list patterns from
//! most to least specific.

use std::sync::LazyLock;

use regex::Regex;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)").unwrap());
static NUMBER_NOISE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[$,\s]").unwrap());

const NUMBER: &str = r"(\d+(?:\.\d+)?)";

/// Numeric field rule. Group 1 of each pattern is the value.
#[derive(Debug, Clone)]
pub struct NumberRule {
    patterns: Vec<Regex>,
}

impl NumberRule {
    /// Lenient form: `keyword [:\s]* number [unit]`, unit optional.
    pub fn keywords(keywords: &[&str], unit: &str) -> Result<Self, regex::Error> {
        let unit = if unit.is_empty() {
            String::new()
        } else {
            format!(r"(?:\s*{})?", regex::escape(unit))
        };
        let patterns = keywords
            .iter()
            .map(|kw| Regex::new(&format!(r"(?i){}[:\s]*{}{}", regex::escape(kw), NUMBER, unit)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NumberRule { patterns })
    }

    /// Strict form: full patterns, each carrying its own unit.
    pub fn patterns(patterns: &[&str]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NumberRule { patterns })
    }

    pub fn find(&self, text: &str) -> Option<f64> {
        self.patterns.iter().find_map(|re| {
            re.captures(text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
        })
    }
}

/// Free-text field rule. Group 1 of each pattern is the value.
#[derive(Debug, Clone)]
pub struct TextRule {
    patterns: Vec<Regex>,
}

impl TextRule {
    /// Lenient form: `keyword [:\s]* rest-of-line`.
    pub fn keywords(keywords: &[&str]) -> Result<Self, regex::Error> {
        let patterns = keywords
            .iter()
            .map(|kw| Regex::new(&format!(r"(?i){}[:\s]*([^\n\r]+)", regex::escape(kw))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TextRule { patterns })
    }

    pub fn patterns(patterns: &[&str]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TextRule { patterns })
    }

    pub fn find(&self, text: &str) -> Option<String> {
        self.patterns.iter().find_map(|re| {
            let caps = re.captures(text)?;
            let value = caps.get(1)?.as_str().trim_end();
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        })
    }
}

/// First number embedded in `text`, ignoring currency signs, thousands separators
/// and whitespace.
pub fn extract_number(text: &str) -> Option<f64> {
    let compact = NUMBER_NOISE_RE.replace_all(text, "");
    NUMBER_RE
        .captures(&compact)
        .and_then(|caps| caps[1].parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_keyword_in_order_wins() {
        let text = "bore: 76 mm\nengine: 999cc inline-4\ndisplacement: 998 cc";
        let rule = NumberRule::keywords(&["engine", "displacement"], "cc").unwrap();
        assert_eq!(rule.find(text), Some(999.0));
        let rule = NumberRule::keywords(&["displacement", "engine"], "cc").unwrap();
        assert_eq!(rule.find(text), Some(998.0));
    }

    #[test]
    fn lenient_unit_is_optional() {
        let rule = NumberRule::keywords(&["seat height"], "mm").unwrap();
        assert_eq!(rule.find("seat height: 832"), Some(832.0));
        assert_eq!(rule.find("seat height 832 mm"), Some(832.0));
    }

    #[test]
    fn matching_ignores_case() {
        let rule = NumberRule::keywords(&["power"], "hp").unwrap();
        assert_eq!(rule.find("Power: 217 HP"), Some(217.0));
    }

    #[test]
    fn strict_unit_is_required() {
        let rule = NumberRule::patterns(&[r"bore[:\s]*(\d+(?:\.\d+)?)\s*mm"]).unwrap();
        assert_eq!(rule.find("bore: 81"), None);
        assert_eq!(rule.find("bore: 81 mm"), Some(81.0));
    }

    #[test]
    fn strict_falls_through_to_later_patterns() {
        let rule = NumberRule::patterns(&[
            r"power[:\s]*(\d+(?:\.\d+)?)\s*hp",
            r"(\d+(?:\.\d+)?)\s*hp",
        ])
        .unwrap();
        assert_eq!(rule.find("claimed 214.5 hp at the crank"), Some(214.5));
    }

    #[test]
    fn no_match_is_none() {
        let rule = NumberRule::keywords(&["torque"], "nm").unwrap();
        assert_eq!(rule.find("nothing to see"), None);
    }

    #[test]
    fn text_rule_takes_rest_of_line() {
        let rule = TextRule::keywords(&["cooling"]).unwrap();
        assert_eq!(
            rule.find("cooling: liquid-cooled   \nfuel system: efi").as_deref(),
            Some("liquid-cooled")
        );
    }

    #[test]
    fn text_rule_skips_blank_capture() {
        let rule = TextRule::keywords(&["cooling", "fuel system"]).unwrap();
        assert_eq!(rule.find("fuel system: efi\ncooling:   ").as_deref(), Some("efi"));
    }

    #[test]
    fn number_extraction() {
        assert_eq!(extract_number("123 hp"), Some(123.0));
        assert_eq!(extract_number("$12,345"), Some(12345.0));
        assert_eq!(extract_number("45.6 mph"), Some(45.6));
        assert_eq!(extract_number("no numbers"), None);
    }
}
