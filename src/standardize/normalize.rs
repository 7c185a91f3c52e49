// Shared normalization rules applied after per-source extraction, so a
// Google-flavored "St." and a Yelp-flavored "Street" both collapse to the
// same canonical form before matching ever sees them.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d+]").unwrap());

static BUSINESS_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+(LLC|Inc|Corp|Ltd|Co|Restaurant|Bar|Pub|Grill|Lounge|Tavern|Cafe|Bistro)\.?$")
        .unwrap()
});
static NON_NAME_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s\-']").unwrap());

static UNIT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(apt|suite|ste|unit)\.?\s*\S+|#\s*\S+").unwrap());

// Abbreviation -> long form, the direction the matching library's fuzzy
// comparison expects a canonical form to converge on.
static STREET_SUFFIXES: &[(&str, &str)] = &[
    (r"\bst\.?\b", "street"),
    (r"\bave\.?\b", "avenue"),
    (r"\bblvd\.?\b", "boulevard"),
    (r"\brd\.?\b", "road"),
    (r"\bdr\.?\b", "drive"),
    (r"\bln\.?\b", "lane"),
    (r"\bct\.?\b", "court"),
    (r"\bpkwy\.?\b", "parkway"),
    (r"\bpl\.?\b", "place"),
    (r"\bcir\.?\b", "circle"),
];

pub fn normalize_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let stripped = BUSINESS_SUFFIX.replace(&lowered, "").to_string();
    let cleaned = NON_NAME_CHAR.replace_all(&stripped, "");
    WHITESPACE.replace_all(cleaned.trim(), " ").to_string()
}

pub fn normalize_address_line(line: &str) -> String {
    let lowered = line.to_lowercase();
    let without_unit = UNIT_MARKER.replace_all(&lowered, "").to_string();
    let mut normalized = without_unit;
    for (pattern, replacement) in STREET_SUFFIXES {
        let re = Regex::new(pattern).expect("static pattern is valid");
        normalized = re.replace_all(&normalized, *replacement).to_string();
    }
    WHITESPACE.replace_all(normalized.trim(), " ").to_string()
}

const BAR_KEYWORDS: &[&str] = &["bar", "pub", "tavern", "lounge", "wine_bar", "brewery", "cocktail"];
const RESTAURANT_KEYWORDS: &[&str] =
    &["restaurant", "food", "dining", "eatery", "cafe", "bistro"];

/// Derives the `isBar`/`isRestaurant` flags from a category set: true if any
/// category contains one of the relevant keywords, case-insensitively.
pub fn classify_categories(categories: &[String]) -> (bool, bool) {
    let lowered: Vec<String> = categories.iter().map(|c| c.to_lowercase()).collect();
    let is_bar = lowered
        .iter()
        .any(|c| BAR_KEYWORDS.iter().any(|kw| c.contains(kw)));
    let is_restaurant = lowered
        .iter()
        .any(|c| RESTAURANT_KEYWORDS.iter().any(|kw| c.contains(kw)));
    (is_bar, is_restaurant)
}

/// Strips everything but digits and a leading `+`, so "(555) 123-4567" and
/// "555.123.4567" normalize identically.
pub fn normalize_phone(phone: &str) -> String {
    NON_DIGIT.replace_all(phone, "").to_string()
}

pub fn normalize_website(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Some(trimmed.to_string())
    } else {
        Some(format!("https://{trimmed}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_extra_whitespace_and_lowercases() {
        assert_eq!(normalize_name("  Joe's   Pizza "), "joe's pizza");
    }

    #[test]
    fn strips_trailing_business_suffix() {
        assert_eq!(normalize_name("The Tipsy Armadillo Bar"), "the tipsy armadillo");
        assert_eq!(normalize_name("Marco's LLC"), "marco's");
    }

    #[test]
    fn expands_street_suffix_abbreviations() {
        assert_eq!(normalize_address_line("123 Main St."), "123 main street");
    }

    #[test]
    fn strips_unit_markers() {
        assert_eq!(normalize_address_line("123 Main St, Apt 4B"), "123 main street,");
        assert_eq!(normalize_address_line("123 Main St #200"), "123 main street");
    }

    #[test]
    fn phone_keeps_only_digits_and_plus() {
        assert_eq!(normalize_phone("+1 (555) 123-4567"), "+15551234567");
    }

    #[test]
    fn classifies_bars_and_restaurants_by_category_keyword() {
        let categories = vec!["cocktail_bar".to_string(), "live_music".to_string()];
        assert_eq!(classify_categories(&categories), (true, false));

        let categories = vec!["fine_dining_restaurant".to_string()];
        assert_eq!(classify_categories(&categories), (false, true));

        let categories = vec!["gift_shop".to_string()];
        assert_eq!(classify_categories(&categories), (false, false));
    }

    #[test]
    fn website_gets_a_scheme() {
        assert_eq!(normalize_website("example.com"), Some("https://example.com".to_string()));
        assert_eq!(
            normalize_website("http://example.com"),
            Some("http://example.com".to_string())
        );
        assert_eq!(normalize_website(""), None);
    }
}
