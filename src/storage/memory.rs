// In-memory repository implementations used as the test double for every
// repository trait, mirroring what an `InMemoryRepository` would look like
// in the teacher's test helpers but covering this crate's full entity set.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::business::{Business, SourceBinding};
use crate::domain::budget::Budget;
use crate::domain::error::Result;
use crate::domain::operation::Operation;
use crate::domain::photo::Photo;
use crate::domain::raw::RawBusiness;
use crate::domain::source::Source;
use crate::domain::standardized::{GeoPoint, StandardizedBusiness};
use crate::matching::haversine_meters;

use super::repository::{
    BudgetRepository, BusinessRepository, OperationRepository, PhotoRepository,
    RawBusinessRepository, StandardizedRepository,
};

#[derive(Default)]
pub struct InMemoryRepository {
    raw: Mutex<HashMap<(Source, String), RawBusiness>>,
    standardized: Mutex<HashMap<Uuid, StandardizedBusiness>>,
    businesses: Mutex<HashMap<Uuid, Business>>,
    bindings: Mutex<HashMap<(Source, String), SourceBinding>>,
    photos: Mutex<HashMap<Uuid, Photo>>,
    operations: Mutex<Vec<Operation>>,
    budgets: Mutex<HashMap<String, Budget>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RawBusinessRepository for InMemoryRepository {
    async fn insert(&self, record: &RawBusiness) -> Result<()> {
        let mut guard = self.raw.lock().unwrap();
        let key = (record.source, record.external_id.clone());
        match guard.get_mut(&key) {
            Some(existing) => {
                existing.raw_payload = record.raw_payload.clone();
                existing.fetch_count += 1;
                existing.fetched_at = record.fetched_at;
                // first_seen_at never moves forward on a refetch.
            }
            None => {
                guard.insert(key, record.clone());
            }
        }
        Ok(())
    }

    async fn get_by_source_external_id(
        &self,
        source: Source,
        external_id: &str,
    ) -> Result<Option<RawBusiness>> {
        Ok(self
            .raw
            .lock()
            .unwrap()
            .get(&(source, external_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl StandardizedRepository for InMemoryRepository {
    async fn insert(&self, record: &StandardizedBusiness) -> Result<()> {
        self.standardized
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StandardizedBusiness>> {
        Ok(self.standardized.lock().unwrap().get(&id).cloned())
    }
}

#[async_trait]
impl BusinessRepository for InMemoryRepository {
    async fn insert(&self, business: &Business) -> Result<()> {
        self.businesses
            .lock()
            .unwrap()
            .insert(business.id, business.clone());
        Ok(())
    }

    async fn update(&self, business: &Business) -> Result<()> {
        self.businesses
            .lock()
            .unwrap()
            .insert(business.id, business.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Business>> {
        Ok(self.businesses.lock().unwrap().get(&id).cloned())
    }

    async fn find_near(&self, center: GeoPoint, radius_meters: f64) -> Result<Vec<Business>> {
        Ok(self
            .businesses
            .lock()
            .unwrap()
            .values()
            .filter(|b| haversine_meters(center, b.location) <= radius_meters)
            .cloned()
            .collect())
    }

    async fn add_source_binding(&self, binding: &SourceBinding) -> Result<()> {
        self.bindings.lock().unwrap().insert(
            (binding.source, binding.external_id.clone()),
            binding.clone(),
        );
        Ok(())
    }

    async fn find_binding(
        &self,
        source: Source,
        external_id: &str,
    ) -> Result<Option<SourceBinding>> {
        Ok(self
            .bindings
            .lock()
            .unwrap()
            .get(&(source, external_id.to_string()))
            .cloned())
    }

    async fn list_bindings_for_business(&self, business_id: Uuid) -> Result<Vec<SourceBinding>> {
        Ok(self
            .bindings
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.business_id == business_id)
            .cloned()
            .collect())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<Business>, i64)> {
        let guard = self.businesses.lock().unwrap();
        let mut all: Vec<Business> = guard.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn list_by_category(
        &self,
        category: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Business>, i64)> {
        let guard = self.businesses.lock().unwrap();
        let mut matching: Vec<Business> = guard
            .values()
            .filter(|b| b.categories.iter().any(|c| c == category))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }
}

#[async_trait]
impl PhotoRepository for InMemoryRepository {
    async fn insert(&self, photo: &Photo) -> Result<()> {
        self.photos.lock().unwrap().insert(photo.id, photo.clone());
        Ok(())
    }

    async fn update(&self, photo: &Photo) -> Result<()> {
        self.photos.lock().unwrap().insert(photo.id, photo.clone());
        Ok(())
    }

    async fn list_for_business(&self, business_id: Uuid) -> Result<Vec<Photo>> {
        Ok(self
            .photos
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.business_id == business_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OperationRepository for InMemoryRepository {
    async fn record(&self, operation: &Operation) -> Result<()> {
        self.operations.lock().unwrap().push(operation.clone());
        Ok(())
    }
}

#[async_trait]
impl BudgetRepository for InMemoryRepository {
    async fn get(&self, period: &str) -> Result<Option<Budget>> {
        Ok(self.budgets.lock().unwrap().get(period).cloned())
    }

    async fn upsert(&self, budget: &Budget) -> Result<()> {
        self.budgets
            .lock()
            .unwrap()
            .insert(budget.period.clone(), budget.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::standardized::Address;
    use chrono::Utc;

    fn sample_business(lat: f64, lng: f64) -> Business {
        let now = Utc::now();
        Business {
            id: Uuid::new_v4(),
            name: "Test Cafe".to_string(),
            address: Address::default(),
            location: GeoPoint { lat, lng },
            phone: None,
            website: None,
            categories: vec![],
            hours: vec![],
            is_bar: false,
            is_restaurant: false,
            price_level: None,
            rating: None,
            rating_google: None,
            rating_yelp: None,
            review_count: None,
            merge_count: 1,
            confidence: 1.0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn find_near_filters_by_distance() {
        let repo = InMemoryRepository::new();
        let close = sample_business(40.7128, -74.0060);
        let far = sample_business(34.0522, -118.2437);
        repo.insert(&close).await.unwrap();
        repo.insert(&far).await.unwrap();

        let found = repo
            .find_near(GeoPoint { lat: 40.7128, lng: -74.0060 }, 5_000.0)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, close.id);
    }

    #[tokio::test]
    async fn raw_business_insert_increments_fetch_count_on_conflict() {
        let repo = InMemoryRepository::new();
        let job_id = Uuid::new_v4();
        let first = RawBusiness::new(Source::Google, "abc".into(), job_id, serde_json::json!({}));
        repo.insert(&first).await.unwrap();
        let second = RawBusiness::new(Source::Google, "abc".into(), job_id, serde_json::json!({}));
        repo.insert(&second).await.unwrap();

        let stored = repo
            .get_by_source_external_id(Source::Google, "abc")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.fetch_count, 2);
    }
}
