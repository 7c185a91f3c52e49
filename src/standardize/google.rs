// Extractor for Google Places-shaped payloads (the Places API v1 "Place"
// resource: displayName, formattedAddress, location.{latitude,longitude}).

use chrono::Utc;
use serde::Deserialize;

use crate::domain::error::{IngestError, Result};
use crate::domain::raw::RawBusiness;
use crate::domain::standardized::{Address, GeoPoint, OpenHours, StandardizedBusiness};

use super::normalize::{
    classify_categories, normalize_address_line, normalize_name, normalize_phone,
    normalize_website,
};

#[derive(Debug, Deserialize)]
struct GooglePlace {
    #[serde(rename = "displayName")]
    display_name: GoogleLocalizedText,
    #[serde(rename = "formattedAddress")]
    formatted_address: Option<String>,
    #[serde(rename = "addressComponents", default)]
    address_components: Vec<GoogleAddressComponent>,
    location: GoogleLatLng,
    #[serde(rename = "nationalPhoneNumber")]
    national_phone_number: Option<String>,
    #[serde(rename = "websiteUri")]
    website_uri: Option<String>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(rename = "priceLevel")]
    price_level: Option<String>,
    rating: Option<f32>,
    #[serde(rename = "userRatingCount")]
    user_rating_count: Option<u32>,
    #[serde(rename = "regularOpeningHours")]
    regular_opening_hours: Option<GoogleOpeningHours>,
    #[serde(default)]
    photos: Vec<GooglePhoto>,
}

#[derive(Debug, Deserialize)]
struct GoogleLocalizedText {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GoogleAddressComponent {
    #[serde(rename = "longText")]
    long_text: String,
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleLatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct GoogleOpeningHours {
    #[serde(default)]
    periods: Vec<GoogleOpeningPeriod>,
}

#[derive(Debug, Deserialize)]
struct GoogleOpeningPeriod {
    open: GoogleOpeningPoint,
    close: Option<GoogleOpeningPoint>,
}

#[derive(Debug, Deserialize)]
struct GoogleOpeningPoint {
    day: u8,
    hour: u8,
    minute: u8,
}

#[derive(Debug, Deserialize)]
struct GooglePhoto {
    name: String,
}

fn component(components: &[GoogleAddressComponent], kind: &str) -> Option<String> {
    components
        .iter()
        .find(|c| c.types.iter().any(|t| t == kind))
        .map(|c| c.long_text.clone())
}

fn price_level_to_u8(level: &str) -> Option<u8> {
    match level {
        "PRICE_LEVEL_FREE" => Some(0),
        "PRICE_LEVEL_INEXPENSIVE" => Some(1),
        "PRICE_LEVEL_MODERATE" => Some(2),
        "PRICE_LEVEL_EXPENSIVE" => Some(3),
        "PRICE_LEVEL_VERY_EXPENSIVE" => Some(4),
        _ => None,
    }
}

pub fn extract(raw: &RawBusiness) -> Result<StandardizedBusiness> {
    let place: GooglePlace = serde_json::from_value(raw.raw_payload.clone())
        .map_err(|e| IngestError::validation(format!("malformed google place payload: {e}")))?;

    let address = Address {
        street: component(&place.address_components, "route")
            .map(|s| normalize_address_line(&s)),
        city: component(&place.address_components, "locality"),
        region: component(&place.address_components, "administrative_area_level_1"),
        postal_code: component(&place.address_components, "postal_code"),
        country: component(&place.address_components, "country").unwrap_or_else(|| "US".into()),
    };

    let hours = place
        .regular_opening_hours
        .map(|h| {
            h.periods
                .into_iter()
                .map(|p| OpenHours {
                    day_of_week: p.open.day,
                    open_time: format!("{:02}:{:02}", p.open.hour, p.open.minute),
                    close_time: p
                        .close
                        .map(|c| format!("{:02}:{:02}", c.hour, c.minute))
                        .unwrap_or_else(|| "23:59".to_string()),
                })
                .collect()
        })
        .unwrap_or_default();

    let (is_bar, is_restaurant) = classify_categories(&place.types);

    Ok(StandardizedBusiness {
        id: uuid::Uuid::new_v4(),
        source: raw.source,
        external_id: raw.external_id.clone(),
        raw_business_id: raw.id,
        name: normalize_name(&place.display_name.text),
        address,
        location: GeoPoint { lat: place.location.latitude, lng: place.location.longitude },
        phone: place.national_phone_number.as_deref().map(normalize_phone),
        website: place.website_uri.as_deref().and_then(normalize_website),
        is_bar,
        is_restaurant,
        categories: place.types,
        hours,
        price_level: place.price_level.as_deref().and_then(price_level_to_u8),
        rating: place.rating,
        review_count: place.user_rating_count,
        photo_refs: place.photos.into_iter().map(|p| p.name).collect(),
        standardized_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::source::Source;

    fn sample_payload() -> serde_json::Value {
        serde_json::json!({
            "displayName": { "text": "  Joe's   Pizza " },
            "formattedAddress": "123 Main Street, Springfield, IL 62701, US",
            "addressComponents": [
                { "longText": "Main Street", "types": ["route"] },
                { "longText": "Springfield", "types": ["locality"] },
                { "longText": "IL", "types": ["administrative_area_level_1"] },
                { "longText": "62701", "types": ["postal_code"] },
                { "longText": "United States", "types": ["country"] }
            ],
            "location": { "latitude": 39.78, "longitude": -89.65 },
            "nationalPhoneNumber": "(217) 555-0100",
            "websiteUri": "https://joespizza.example.com",
            "types": ["restaurant", "food"],
            "priceLevel": "PRICE_LEVEL_MODERATE",
            "rating": 4.5,
            "userRatingCount": 120,
            "photos": [{ "name": "places/abc/photos/xyz" }]
        })
    }

    #[test]
    fn extracts_and_normalizes_a_google_place() {
        let raw = RawBusiness::new(Source::Google, "abc".into(), uuid::Uuid::new_v4(), sample_payload());
        let standardized = extract(&raw).unwrap();

        assert_eq!(standardized.name, "joe's pizza");
        assert_eq!(standardized.address.city.as_deref(), Some("Springfield"));
        assert_eq!(standardized.phone.as_deref(), Some("+12175550100"));
        assert_eq!(standardized.price_level, Some(2));
        assert_eq!(standardized.photo_refs, vec!["places/abc/photos/xyz"]);
        assert!(standardized.is_restaurant);
        assert!(!standardized.is_bar);
    }

    #[test]
    fn rejects_malformed_payloads() {
        let raw = RawBusiness::new(Source::Google, "abc".into(), uuid::Uuid::new_v4(), serde_json::json!({}));
        assert!(extract(&raw).is_err());
    }
}
