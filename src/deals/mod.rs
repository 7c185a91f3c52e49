//! Regex-based deal extraction. Disabled by default (spec's Non-goals
//! explicitly exclude ML-based extraction; this is the regex-only opt-in
//! noted as a supplemental feature). Compiled whenever the crate is, but
//! only ever invoked behind the `deals` feature flag from the composition
//! root.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::domain::deal::Deal;

const EXTRACTOR_NAME: &str = "regex:happy_hour";

static DAY_NAMES: &[(&str, u8)] = &[
    ("sunday", 0),
    ("monday", 1),
    ("tuesday", 2),
    ("wednesday", 3),
    ("thursday", 4),
    ("friday", 5),
    ("saturday", 6),
];

static TIME_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)\s*[-–to]+\s*(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)").unwrap()
});
static PRICE_CUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\$\d+(?:\.\d{2})?\s*(?:off)?|half[\s-]?price|\d{1,2}%\s*off)").unwrap());
static HAPPY_HOUR_CUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)happy\s*hour").unwrap());

fn parse_24h(raw: &str) -> Option<String> {
    let raw = raw.trim().to_lowercase();
    let is_pm = raw.ends_with("pm");
    let is_am = raw.ends_with("am");
    let digits = raw.trim_end_matches("am").trim_end_matches("pm").trim();

    let (hour, minute) = if let Some((h, m)) = digits.split_once(':') {
        (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?)
    } else {
        (digits.parse::<u32>().ok()?, 0)
    };

    let hour24 = if is_pm && hour != 12 {
        hour + 12
    } else if is_am && hour == 12 {
        0
    } else {
        hour
    };

    if hour24 > 23 || minute > 59 {
        return None;
    }
    Some(format!("{hour24:02}:{minute:02}"))
}

/// Scans free text (an operating-hours note or a review snippet) for a
/// recurring-discount pattern. Returns at most one `Deal` per call; callers
/// scan each candidate text independently.
pub fn extract_deal(business_id: Uuid, text: &str) -> Option<Deal> {
    if !HAPPY_HOUR_CUE.is_match(text) && !PRICE_CUE.is_match(text) {
        return None;
    }

    let time_caps = TIME_RANGE.captures(text)?;
    let start_time = parse_24h(&time_caps[1])?;
    let end_time = parse_24h(&time_caps[2])?;

    let lower = text.to_lowercase();
    let day_of_week = DAY_NAMES.iter().find(|(name, _)| lower.contains(name)).map(|(_, idx)| *idx);

    let confidence = if HAPPY_HOUR_CUE.is_match(text) && PRICE_CUE.is_match(text) {
        0.9
    } else if HAPPY_HOUR_CUE.is_match(text) {
        0.7
    } else {
        0.6
    };

    let title = if HAPPY_HOUR_CUE.is_match(text) { "Happy Hour" } else { "Special Offer" };

    Some(Deal {
        id: Uuid::new_v4(),
        business_id,
        day_of_week,
        start_time,
        end_time,
        title: title.to_string(),
        description: Some(text.trim().to_string()),
        extracted_by: EXTRACTOR_NAME.to_string(),
        confidence,
        source_text: text.to_string(),
        is_active: true,
        created_at: chrono::Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_a_happy_hour_deal_with_day_and_time_range() {
        let business_id = Uuid::new_v4();
        let deal = extract_deal(business_id, "Join us for Happy Hour every Friday 4pm-6pm, $5 off drafts").unwrap();

        assert_eq!(deal.day_of_week, Some(5));
        assert_eq!(deal.start_time, "16:00");
        assert_eq!(deal.end_time, "18:00");
        assert_eq!(deal.title, "Happy Hour");
        assert!(deal.confidence > 0.8);
    }

    #[test]
    fn text_without_a_deal_cue_extracts_nothing() {
        assert!(extract_deal(Uuid::new_v4(), "Open 9am-5pm Monday through Saturday").is_none());
    }

    #[test]
    fn text_with_a_cue_but_no_time_range_extracts_nothing() {
        assert!(extract_deal(Uuid::new_v4(), "Ask about our happy hour specials").is_none());
    }
}
