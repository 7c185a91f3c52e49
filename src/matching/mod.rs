//! Pure scoring functions used to decide whether two standardized business
//! records refer to the same real-world place. Nothing here touches storage
//! or I/O, which keeps it property-testable in isolation, the same way the
//! teacher keeps its cost-calculation engine a pure function of its inputs.

use std::collections::HashSet;

use crate::domain::standardized::GeoPoint;

pub const HIGH_CONFIDENCE: f32 = 0.90;
pub const LOW_CONFIDENCE: f32 = 0.70;

/// Outcome of the matching library's own decision procedure, distinct from
/// the Deduplicator's HIGH_CONFIDENCE/LOW_CONFIDENCE bands applied on top of
/// `confidence` (a candidate can be `is_match: true` here with a confidence
/// that still falls in the Deduplicator's uncertain band).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchDecision {
    pub is_match: bool,
    pub confidence: f32,
}

impl MatchDecision {
    /// Multi-branch decision procedure: name+location both near-exact short
    /// circuits to a fixed high confidence; an exact phone or domain match
    /// backed by a decent name/location lowers the bar further; otherwise
    /// the blended `overall` score carries the decision, gated by minimum
    /// name/location scores so an overall score propped up by phone/domain
    /// alone never counts as a match.
    pub fn decide(scores: SimilarityScores) -> Self {
        if scores.name > 0.9 && scores.location.unwrap_or(0.0) > 0.9 {
            return MatchDecision { is_match: true, confidence: 0.95 };
        }

        let exact_identifier = scores.phone == Some(1.0) || scores.domain == Some(1.0);
        if exact_identifier && scores.name > 0.7 && scores.location.unwrap_or(0.0) > 0.8 {
            return MatchDecision { is_match: true, confidence: 0.90 };
        }

        if scores.overall > 0.8 {
            return MatchDecision { is_match: true, confidence: scores.overall };
        }

        if scores.overall > 0.7 && scores.name > 0.8 && scores.location.unwrap_or(0.0) > 0.7 {
            return MatchDecision { is_match: true, confidence: scores.overall };
        }

        MatchDecision { is_match: false, confidence: scores.overall }
    }
}

/// Weights applied to each component score when combining them into an
/// overall match score. Sums to 1.0.
#[derive(Debug, Clone, Copy)]
pub struct MatchWeights {
    pub name: f32,
    pub location: f32,
    pub phone: f32,
    pub domain: f32,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            name: 0.35,
            location: 0.35,
            phone: 0.20,
            domain: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchInput<'a> {
    pub name_a: &'a str,
    pub name_b: &'a str,
    pub location_a: Option<GeoPoint>,
    pub location_b: Option<GeoPoint>,
    pub phone_a: Option<&'a str>,
    pub phone_b: Option<&'a str>,
    pub domain_a: Option<&'a str>,
    pub domain_b: Option<&'a str>,
}

/// Normalized Levenshtein similarity in `[0, 1]`, 1.0 for identical strings.
pub fn name_levenshtein_score(a: &str, b: &str) -> f32 {
    let a = normalize_for_match(a);
    let b = normalize_for_match(b);
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let distance = strsim::levenshtein(&a, &b);
    let max_len = a.chars().count().max(b.chars().count()).max(1);
    1.0 - (distance as f32 / max_len as f32)
}

/// Jaccard similarity over whitespace-separated tokens, robust to word
/// reordering ("Joe's Pizza Downtown" vs "Downtown Joe's Pizza").
pub fn name_jaccard_score(a: &str, b: &str) -> f32 {
    let a = normalize_for_match(a);
    let b = normalize_for_match(b);
    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count().max(1);
    intersection as f32 / union as f32
}

/// Weighted combination of Levenshtein and Jaccard (0.6/0.4), catching both
/// typos and word-reordering without either dominating the other. An exact
/// match (after normalization) short-circuits to 1.0.
pub fn name_score(a: &str, b: &str) -> f32 {
    if normalize_for_match(a) == normalize_for_match(b) {
        return 1.0;
    }
    let lev = name_levenshtein_score(a, b);
    let jac = name_jaccard_score(a, b);
    0.6 * lev + 0.4 * jac
}

fn normalize_for_match(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two points, in meters.
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Converts distance into a `[0, 1]` score: 1.0 at 0m, decaying to 0.0 at
/// `max_meters` and beyond.
pub fn location_score(a: GeoPoint, b: GeoPoint, max_meters: f64) -> f32 {
    let distance = haversine_meters(a, b);
    if distance >= max_meters {
        0.0
    } else {
        (1.0 - distance / max_meters) as f32
    }
}

fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// 1.0 if normalized digit sequences match exactly, else 0.0. Phone numbers
/// don't degrade gracefully the way names do: a transposed digit is a
/// different business, not a near match.
pub fn phone_score(a: Option<&str>, b: Option<&str>) -> Option<f32> {
    match (a, b) {
        (Some(a), Some(b)) => {
            let a = normalize_phone(a);
            let b = normalize_phone(b);
            if a.is_empty() || b.is_empty() {
                None
            } else {
                Some(if a == b { 1.0 } else { 0.0 })
            }
        }
        _ => None,
    }
}

fn normalize_domain(url: &str) -> Option<String> {
    let without_scheme = url.split("://").last()?;
    let host = without_scheme.split('/').next()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

pub fn domain_score(a: Option<&str>, b: Option<&str>) -> Option<f32> {
    match (a.and_then(normalize_domain), b.and_then(normalize_domain)) {
        (Some(a), Some(b)) => Some(if a == b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Every component score plus the blended `overall`, bundled so
/// `MatchDecision::decide` can apply its multi-branch rules instead of
/// collapsing straight to a single threshold.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityScores {
    pub name: f32,
    pub location: Option<f32>,
    pub phone: Option<f32>,
    pub domain: Option<f32>,
    pub overall: f32,
}

/// Computes every component score for `input` and bundles them with the
/// weighted `overall`, the shape the Deduplicator needs to run
/// `MatchDecision::decide`.
pub fn compute_scores(input: MatchInput<'_>, weights: MatchWeights, max_location_meters: f64) -> SimilarityScores {
    let name = name_score(input.name_a, input.name_b);
    let location = match (input.location_a, input.location_b) {
        (Some(a), Some(b)) => Some(location_score(a, b, max_location_meters)),
        _ => None,
    };
    let phone = phone_score(input.phone_a, input.phone_b);
    let domain = domain_score(input.domain_a, input.domain_b);
    let overall = overall_score(input, weights, max_location_meters);
    SimilarityScores { name, location, phone, domain, overall }
}

/// Combines available component scores with the configured weights,
/// renormalizing over whichever components had data (missing phone/domain
/// shouldn't silently drag the score toward zero).
pub fn overall_score(input: MatchInput<'_>, weights: MatchWeights, max_location_meters: f64) -> f32 {
    let mut weighted_sum = 0.0f32;
    let mut weight_total = 0.0f32;

    let name = name_score(input.name_a, input.name_b);
    weighted_sum += name * weights.name;
    weight_total += weights.name;

    if let (Some(a), Some(b)) = (input.location_a, input.location_b) {
        let loc = location_score(a, b, max_location_meters);
        weighted_sum += loc * weights.location;
        weight_total += weights.location;
    }

    if let Some(phone) = phone_score(input.phone_a, input.phone_b) {
        weighted_sum += phone * weights.phone;
        weight_total += weights.phone;
    }

    if let Some(domain) = domain_score(input.domain_a, input.domain_b) {
        weighted_sum += domain * weights.domain;
        weight_total += weights.domain;
    }

    if weight_total == 0.0 {
        0.0
    } else {
        weighted_sum / weight_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_names_score_one() {
        assert_eq!(name_score("Joe's Pizza", "Joe's Pizza"), 1.0);
    }

    #[test]
    fn reordered_tokens_score_is_lifted_by_jaccard_but_stays_below_a_match() {
        let score = name_score("Downtown Joe's Pizza", "Joe's Pizza Downtown");
        let lev_only = name_levenshtein_score("Downtown Joe's Pizza", "Joe's Pizza Downtown");
        assert!(score > lev_only, "perfect token overlap should lift the blend above Levenshtein alone");
        assert!(score < 0.7, "word order alone, at the 0.6/0.4 blend, isn't enough to call these a match");
    }

    #[test]
    fn typo_degrades_levenshtein_but_not_to_zero() {
        let score = name_score("Joe's Pizza", "Joes Piza");
        assert!(score > 0.5 && score < 1.0);
    }

    #[test]
    fn haversine_zero_distance_is_zero() {
        let p = GeoPoint { lat: 40.0, lng: -73.0 };
        assert!(haversine_meters(p, p) < 1e-6);
    }

    #[test]
    fn location_score_decays_with_distance() {
        let a = GeoPoint { lat: 40.7128, lng: -74.0060 };
        let b = GeoPoint { lat: 40.7589, lng: -73.9851 };
        let score = location_score(a, b, 10_000.0);
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn phone_requires_exact_digit_match() {
        assert_eq!(phone_score(Some("(555) 123-4567"), Some("555-123-4567")), Some(1.0));
        assert_eq!(phone_score(Some("555-123-4567"), Some("555-123-4568")), Some(0.0));
        assert_eq!(phone_score(None, Some("555-123-4567")), None);
    }

    #[test]
    fn domain_ignores_scheme_and_www() {
        assert_eq!(
            domain_score(Some("https://www.example.com/menu"), Some("http://example.com")),
            Some(1.0)
        );
    }

    #[test]
    fn decision_name_and_location_both_near_exact_short_circuits_to_fixed_confidence() {
        let scores = SimilarityScores { name: 0.95, location: Some(0.95), phone: None, domain: None, overall: 0.95 };
        let decision = MatchDecision::decide(scores);
        assert!(decision.is_match);
        assert_eq!(decision.confidence, 0.95);
    }

    #[test]
    fn decision_exact_phone_backs_a_moderate_name_and_location_match() {
        let scores = SimilarityScores { name: 0.75, location: Some(0.85), phone: Some(1.0), domain: None, overall: 0.6 };
        let decision = MatchDecision::decide(scores);
        assert!(decision.is_match);
        assert_eq!(decision.confidence, 0.90);
    }

    #[test]
    fn decision_overall_alone_above_0_8_is_a_match_at_overall() {
        let scores = SimilarityScores { name: 0.5, location: Some(0.5), phone: None, domain: None, overall: 0.85 };
        let decision = MatchDecision::decide(scores);
        assert!(decision.is_match);
        assert_eq!(decision.confidence, 0.85);
    }

    #[test]
    fn decision_below_every_branch_is_not_a_match() {
        let scores = SimilarityScores { name: 0.3, location: Some(0.2), phone: None, domain: None, overall: 0.3 };
        let decision = MatchDecision::decide(scores);
        assert!(!decision.is_match);
        assert_eq!(decision.confidence, 0.3);
    }

    #[test]
    fn overall_score_ignores_missing_components_in_weighting() {
        let input = MatchInput {
            name_a: "Joe's Pizza",
            name_b: "Joe's Pizza",
            location_a: None,
            location_b: None,
            phone_a: None,
            phone_b: None,
            domain_a: None,
            domain_b: None,
        };
        let score = overall_score(input, MatchWeights::default(), 200.0);
        assert_eq!(score, 1.0);
    }
}
