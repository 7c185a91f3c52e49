// Google Places API v1 client: `places:searchNearby` for the paginated
// search job, `places/{id}` for place details.

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::error::{IngestError, Result};
use crate::domain::source::Source;

use super::{CollectorClient, SearchPage, SEARCH_TIMEOUT};

const SEARCH_URL: &str = "https://places.googleapis.com/v1/places:searchNearby";
const DETAILS_URL: &str = "https://places.googleapis.com/v1";

const FIELD_MASK: &str = "places.id,places.displayName,places.formattedAddress,\
places.addressComponents,places.location,places.nationalPhoneNumber,places.websiteUri,\
places.types,places.priceLevel,places.rating,places.userRatingCount,places.regularOpeningHours,\
places.photos,nextPageToken";

pub struct GooglePlacesClient {
    http: reqwest::Client,
    api_key: String,
}

impl GooglePlacesClient {
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self { http, api_key }
    }
}

#[derive(Debug, Deserialize)]
struct SearchNearbyResponse {
    #[serde(default)]
    places: Vec<serde_json::Value>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[async_trait]
impl CollectorClient for GooglePlacesClient {
    fn source(&self) -> Source {
        Source::Google
    }

    async fn search_nearby_page(
        &self,
        lat: f64,
        lng: f64,
        radius_meters: u32,
        page_token: Option<&str>,
    ) -> Result<SearchPage> {
        let mut body = serde_json::json!({
            "locationRestriction": {
                "circle": {
                    "center": { "latitude": lat, "longitude": lng },
                    "radius": radius_meters,
                }
            }
        });
        if let Some(token) = page_token {
            body["pageToken"] = serde_json::Value::String(token.to_string());
        }

        let response = self
            .http
            .post(SEARCH_URL)
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&body)
            .send()
            .await
            .map_err(|e| IngestError::Upstream { provider: "google".into(), message: e.to_string() })?;

        if !response.status().is_success() {
            return Err(IngestError::Upstream {
                provider: "google".into(),
                message: format!("search_nearby returned {}", response.status()),
            });
        }

        let parsed: SearchNearbyResponse = response
            .json()
            .await
            .map_err(|e| IngestError::Upstream { provider: "google".into(), message: e.to_string() })?;

        let results = parsed
            .places
            .into_iter()
            .filter_map(|place| {
                place
                    .get("id")
                    .and_then(|id| id.as_str())
                    .map(|id| (id.to_string(), place.clone()))
            })
            .collect();

        Ok(SearchPage { results, next_page_token: parsed.next_page_token })
    }

    async fn place_details(&self, external_id: &str) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(format!("{DETAILS_URL}/places/{external_id}"))
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK.replace("places.", ""))
            .send()
            .await
            .map_err(|e| IngestError::Upstream { provider: "google".into(), message: e.to_string() })?;

        if !response.status().is_success() {
            return Err(IngestError::Upstream {
                provider: "google".into(),
                message: format!("place_details returned {}", response.status()),
            });
        }

        response
            .json()
            .await
            .map_err(|e| IngestError::Upstream { provider: "google".into(), message: e.to_string() })
    }
}
