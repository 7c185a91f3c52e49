// Extractor for Yelp Fusion Business-shaped payloads (location.address1,
// coordinates.{latitude,longitude}, display_phone, categories[].title).

use chrono::Utc;
use serde::Deserialize;

use crate::domain::error::{IngestError, Result};
use crate::domain::raw::RawBusiness;
use crate::domain::standardized::{Address, GeoPoint, StandardizedBusiness};

use super::normalize::{
    classify_categories, normalize_address_line, normalize_name, normalize_phone,
    normalize_website,
};

#[derive(Debug, Deserialize)]
struct YelpBusiness {
    name: String,
    location: YelpLocation,
    coordinates: YelpCoordinates,
    phone: Option<String>,
    url: Option<String>,
    #[serde(default)]
    categories: Vec<YelpCategory>,
    price: Option<String>,
    rating: Option<f32>,
    review_count: Option<u32>,
    #[serde(default)]
    photos: Vec<String>,
    #[serde(default)]
    hours: Vec<YelpHours>,
}

#[derive(Debug, Deserialize)]
struct YelpLocation {
    address1: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YelpCoordinates {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct YelpCategory {
    title: String,
}

#[derive(Debug, Deserialize)]
struct YelpHours {
    #[serde(default)]
    open: Vec<YelpOpenInterval>,
}

#[derive(Debug, Deserialize)]
struct YelpOpenInterval {
    day: u8,
    start: String,
    end: String,
}

fn price_to_u8(price: &str) -> Option<u8> {
    let level = price.matches('$').count();
    if level == 0 {
        None
    } else {
        Some((level - 1).min(4) as u8)
    }
}

fn split_hhmm(raw: &str) -> String {
    if raw.len() == 4 {
        format!("{}:{}", &raw[0..2], &raw[2..4])
    } else {
        raw.to_string()
    }
}

pub fn extract(raw: &RawBusiness) -> Result<StandardizedBusiness> {
    let business: YelpBusiness = serde_json::from_value(raw.raw_payload.clone())
        .map_err(|e| IngestError::validation(format!("malformed yelp business payload: {e}")))?;

    let address = Address {
        street: business.location.address1.as_deref().map(normalize_address_line),
        city: business.location.city,
        region: business.location.state,
        postal_code: business.location.zip_code,
        country: business.location.country.unwrap_or_else(|| "US".into()),
    };

    let hours = business
        .hours
        .into_iter()
        .flat_map(|h| h.open)
        .map(|interval| crate::domain::standardized::OpenHours {
            day_of_week: interval.day,
            open_time: split_hhmm(&interval.start),
            close_time: split_hhmm(&interval.end),
        })
        .collect();

    let categories: Vec<String> = business.categories.into_iter().map(|c| c.title).collect();
    let (is_bar, is_restaurant) = classify_categories(&categories);

    Ok(StandardizedBusiness {
        id: uuid::Uuid::new_v4(),
        source: raw.source,
        external_id: raw.external_id.clone(),
        raw_business_id: raw.id,
        name: normalize_name(&business.name),
        address,
        location: GeoPoint { lat: business.coordinates.latitude, lng: business.coordinates.longitude },
        phone: business.phone.as_deref().map(normalize_phone),
        website: business.url.as_deref().and_then(normalize_website),
        is_bar,
        is_restaurant,
        categories,
        hours,
        price_level: business.price.as_deref().and_then(price_to_u8),
        rating: business.rating,
        review_count: business.review_count,
        photo_refs: business.photos,
        standardized_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::source::Source;

    fn sample_payload() -> serde_json::Value {
        serde_json::json!({
            "name": "  Joe's   Pizza ",
            "location": {
                "address1": "123 Main Street",
                "city": "Springfield",
                "state": "IL",
                "zip_code": "62701",
                "country": "US"
            },
            "coordinates": { "latitude": 39.78, "longitude": -89.65 },
            "phone": "+12175550100",
            "url": "https://www.yelp.com/biz/joes-pizza",
            "categories": [{ "alias": "pizza", "title": "Pizza" }],
            "price": "$$",
            "rating": 4.5,
            "review_count": 310,
            "photos": ["https://s3-media.fl.yelpcdn.com/bphoto/abc/o.jpg"],
            "hours": [{ "open": [{ "day": 0, "start": "1100", "end": "2200" }] }]
        })
    }

    #[test]
    fn extracts_and_normalizes_a_yelp_business() {
        let raw = RawBusiness::new(Source::Yelp, "joes-pizza".into(), uuid::Uuid::new_v4(), sample_payload());
        let standardized = extract(&raw).unwrap();

        assert_eq!(standardized.name, "joe's pizza");
        assert_eq!(standardized.address.city.as_deref(), Some("Springfield"));
        assert_eq!(standardized.price_level, Some(1));
        assert_eq!(standardized.categories, vec!["Pizza"]);
        assert_eq!(standardized.hours[0].open_time, "11:00");
        assert_eq!(standardized.hours[0].close_time, "22:00");
        assert!(!standardized.is_bar);
        assert!(!standardized.is_restaurant);
    }

    #[test]
    fn rejects_malformed_payloads() {
        let raw = RawBusiness::new(Source::Yelp, "x".into(), uuid::Uuid::new_v4(), serde_json::json!({}));
        assert!(extract(&raw).is_err());
    }
}
