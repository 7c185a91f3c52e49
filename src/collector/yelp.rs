// Yelp Fusion API client: `/businesses/search` (radius + lat/lng, no
// continuation token so pagination exhausts after the first page) and
// `/businesses/{id}` for details.

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::error::{IngestError, Result};
use crate::domain::source::Source;

use super::{CollectorClient, SearchPage, SEARCH_TIMEOUT};

const BASE_URL: &str = "https://api.yelp.com/v3";

pub struct YelpClient {
    http: reqwest::Client,
    api_key: String,
}

impl YelpClient {
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self { http, api_key }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    businesses: Vec<serde_json::Value>,
}

#[async_trait]
impl CollectorClient for YelpClient {
    fn source(&self) -> Source {
        Source::Yelp
    }

    /// Yelp Fusion's search endpoint is offset-paginated rather than
    /// token-paginated; `page_token` carries the offset as a decimal string
    /// so `RawCollector`'s generic pagination loop still applies.
    async fn search_nearby_page(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: u32,
        page_token: Option<&str>,
    ) -> Result<SearchPage> {
        const PAGE_SIZE: u32 = 50;
        let offset: u32 = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);

        let response = self
            .http
            .get(format!("{BASE_URL}/businesses/search"))
            .bearer_auth(&self.api_key)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lng.to_string()),
                ("radius", radius_meters.min(40_000).to_string()),
                ("limit", PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
            ])
            .send()
            .await
            .map_err(|e| IngestError::Upstream { provider: "yelp".into(), message: e.to_string() })?;

        if !response.status().is_success() {
            return Err(IngestError::Upstream {
                provider: "yelp".into(),
                message: format!("search returned {}", response.status()),
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| IngestError::Upstream { provider: "yelp".into(), message: e.to_string() })?;

        let returned = parsed.businesses.len() as u32;
        let results = parsed
            .businesses
            .into_iter()
            .filter_map(|business| {
                business
                    .get("id")
                    .and_then(|id| id.as_str())
                    .map(|id| (id.to_string(), business.clone()))
            })
            .collect();

        let next_page_token = if returned == PAGE_SIZE { Some((offset + PAGE_SIZE).to_string()) } else { None };
        Ok(SearchPage { results, next_page_token })
    }

    async fn place_details(&self, external_id: &str) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(format!("{BASE_URL}/businesses/{external_id}"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| IngestError::Upstream { provider: "yelp".into(), message: e.to_string() })?;

        if !response.status().is_success() {
            return Err(IngestError::Upstream {
                provider: "yelp".into(),
                message: format!("business details returned {}", response.status()),
            });
        }

        response
            .json()
            .await
            .map_err(|e| IngestError::Upstream { provider: "yelp".into(), message: e.to_string() })
    }
}
