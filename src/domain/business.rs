use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::standardized::{Address, GeoPoint, OpenHours};
use super::source::Source;

/// A deduplicated, merged listing. Provider-specific ids never live here;
/// see `SourceBinding` for provenance (Open Question 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    pub name: String,
    pub address: Address,
    pub location: GeoPoint,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub hours: Vec<OpenHours>,

    #[serde(default)]
    pub is_bar: bool,
    #[serde(default)]
    pub is_restaurant: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_level: Option<u8>,

    /// Arithmetic mean of whichever per-source ratings are present; kept in
    /// sync with `rating_google`/`rating_yelp` by `recompute_overall_rating`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_google: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_yelp: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u32>,

    /// Count of standardized records folded into this one so far.
    #[serde(default = "one")]
    pub merge_count: u32,

    /// Confidence of the most recent dedup decision that touched this
    /// business, not a cumulative product across merges.
    #[serde(default = "full_confidence")]
    pub confidence: f32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn one() -> u32 {
    1
}

fn full_confidence() -> f32 {
    1.0
}

impl Business {
    pub fn from_standardized(s: &super::standardized::StandardizedBusiness) -> Self {
        let now = Utc::now();
        let (rating_google, rating_yelp) = match s.source {
            Source::Google => (s.rating, None),
            Source::Yelp => (None, s.rating),
        };
        Self {
            id: Uuid::new_v4(),
            name: s.name.clone(),
            address: s.address.clone(),
            location: s.location,
            phone: s.phone.clone(),
            website: s.website.clone(),
            categories: s.categories.clone(),
            hours: s.hours.clone(),
            is_bar: s.is_bar,
            is_restaurant: s.is_restaurant,
            price_level: s.price_level,
            rating: s.rating,
            rating_google,
            rating_yelp,
            review_count: s.review_count,
            merge_count: 1,
            confidence: 1.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Folds `incoming`'s rating into this business's per-source slots by
    /// the incoming record's source, then recomputes the overall rating as
    /// the arithmetic mean of whichever per-source ratings are now present.
    pub fn apply_rating(&mut self, source: Source, rating: Option<f32>) {
        if let Some(rating) = rating {
            match source {
                Source::Google => self.rating_google = Some(rating),
                Source::Yelp => self.rating_yelp = Some(rating),
            }
        }
        let present: Vec<f32> = [self.rating_google, self.rating_yelp].into_iter().flatten().collect();
        self.rating = if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f32>() / present.len() as f32)
        };
    }
}

/// Links a deduplicated `Business` back to the provider record(s) it was
/// merged from. The sole carrier of external provider ids (Open Question 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBinding {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub business_id: Uuid,
    pub source: Source,
    pub external_id: String,
    /// The matching-library score that justified binding this record to
    /// `business_id`, or 1.0 for the record that created the business.
    pub match_confidence: f32,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl SourceBinding {
    pub fn originating(business_id: Uuid, source: Source, external_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            business_id,
            source,
            external_id,
            match_confidence: 1.0,
            first_seen_at: now,
            last_seen_at: now,
        }
    }
}
