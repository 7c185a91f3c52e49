// End-to-end seed scenarios exercising Raw Collection through Photo
// Materialization against the in-memory repository, the way a single
// upstream refetch or cross-source merge would actually flow through the
// pipeline. Field values are adapted to this crate's own domain model
// (`Business`/`StandardizedBusiness` have no `normalizedName` or per-source
// rating fields; `price_level` is a plain `u8`) rather than copied verbatim
// from any external scenario catalogue.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use venue_ingest::{
    Budget, CostController, Deduplicator, EventBus, EventTag, InMemoryRepository,
    LocalObjectStore, MergeOutcome, Photo, PhotoProcessor, PhotoRepository, RawBusiness, Source,
    Standardizer,
};

fn google_payload(
    name: &str,
    street: &str,
    city: &str,
    region: &str,
    lat: f64,
    lng: f64,
    types: &[&str],
    rating: f32,
    price_level: &str,
) -> serde_json::Value {
    serde_json::json!({
        "displayName": { "text": name },
        "formattedAddress": format!("{street}, {city}, {region}"),
        "addressComponents": [
            { "longText": street, "types": ["route"] },
            { "longText": city, "types": ["locality"] },
            { "longText": region, "types": ["administrative_area_level_1"] },
        ],
        "location": { "latitude": lat, "longitude": lng },
        "types": types,
        "rating": rating,
        "priceLevel": price_level,
    })
}

fn yelp_payload(
    name: &str,
    street: &str,
    city: &str,
    region: &str,
    lat: f64,
    lng: f64,
    rating: f32,
) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "location": { "address1": street, "city": city, "state": region, "zip_code": null, "country": "US" },
        "coordinates": { "latitude": lat, "longitude": lng },
        "rating": rating,
        "review_count": 12,
    })
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// S1: a single Google record creates one Business and one SourceBinding,
/// and publishes `deduplicated` with `outcome: "Created"`.
#[tokio::test]
async fn s1_new_business_from_a_single_source() {
    let repo = Arc::new(InMemoryRepository::new());
    let bus = EventBus::new();

    let events = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let sink = events.clone();
    bus.subscribe(EventTag::Deduplicated, move |event| {
        let sink = sink.clone();
        async move {
            sink.lock().await.push(event.payload);
            Ok(())
        }
    })
    .await;

    let standardizer = Standardizer::new(repo.clone(), bus.clone());
    let dedup = Deduplicator::new(repo.clone(), bus.clone());

    let job_id = Uuid::new_v4();
    let raw = RawBusiness::new(
        Source::Google,
        "X1".into(),
        job_id,
        google_payload(
            "The Tipsy Armadillo",
            "123 E 6th St",
            "Austin",
            "TX",
            30.2672,
            -97.7431,
            &["bar", "restaurant"],
            4.2,
            "PRICE_LEVEL_MODERATE",
        ),
    );

    let standardized = standardizer.standardize(&raw).await.unwrap();
    assert!(standardized.is_bar);
    assert!(standardized.is_restaurant);
    assert_eq!(standardized.price_level, Some(2));

    let (business_id, outcome) = dedup.deduplicate(&standardized).await.unwrap();
    assert_eq!(outcome, MergeOutcome::Created);

    let bindings = repo.list_bindings_for_business(business_id).await.unwrap();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].source, Source::Google);
    assert_eq!(bindings[0].external_id, "X1");
    assert_eq!(bindings[0].match_confidence, 1.0);

    settle().await;
    let captured = events.lock().await;
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0]["outcome"], "Created");
    assert_eq!(captured[0]["businessId"], business_id.to_string());
}

/// S2: re-fetching the same `(source, externalId)` refreshes the existing
/// business in place instead of creating a duplicate binding.
#[tokio::test]
async fn s2_exact_source_refetch_updates_in_place() {
    let repo = Arc::new(InMemoryRepository::new());
    let bus = EventBus::new();
    let standardizer = Standardizer::new(repo.clone(), bus.clone());
    let dedup = Deduplicator::new(repo.clone(), bus.clone());

    let job_id = Uuid::new_v4();
    let payload = google_payload(
        "The Tipsy Armadillo",
        "123 E 6th St",
        "Austin",
        "TX",
        30.2672,
        -97.7431,
        &["bar", "restaurant"],
        4.2,
        "PRICE_LEVEL_MODERATE",
    );

    let first_raw = RawBusiness::new(Source::Google, "X1".into(), job_id, payload.clone());
    let first = standardizer.standardize(&first_raw).await.unwrap();
    let (first_business_id, first_outcome) = dedup.deduplicate(&first).await.unwrap();
    assert_eq!(first_outcome, MergeOutcome::Created);

    // Same upstream record re-collected: the raw-layer fetch count bumps,
    // and the same payload runs back through standardize + dedup.
    let refetch_raw = RawBusiness::new(Source::Google, "X1".into(), job_id, payload);
    repo.insert(&refetch_raw).await.unwrap();
    let stored_raw = repo
        .get_by_source_external_id(Source::Google, "X1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored_raw.fetch_count, 2);

    let second = standardizer.standardize(&refetch_raw).await.unwrap();
    let (second_business_id, second_outcome) = dedup.deduplicate(&second).await.unwrap();

    assert_eq!(second_outcome, MergeOutcome::Updated);
    assert_eq!(first_business_id, second_business_id);

    let bindings = repo.list_bindings_for_business(first_business_id).await.unwrap();
    assert_eq!(bindings.len(), 1, "refetch must not create a second binding");
}

/// S3: a closely matching Yelp record for the same place merges into the
/// existing business rather than creating a second one.
#[tokio::test]
async fn s3_high_confidence_merge_across_sources() {
    let repo = Arc::new(InMemoryRepository::new());
    let bus = EventBus::new();
    let standardizer = Standardizer::new(repo.clone(), bus.clone());
    let dedup = Deduplicator::new(repo.clone(), bus.clone());

    let google_raw = RawBusiness::new(
        Source::Google,
        "X1".into(),
        Uuid::new_v4(),
        google_payload(
            "The Tipsy Armadillo",
            "123 E 6th St",
            "Austin",
            "TX",
            30.2672,
            -97.7431,
            &["bar", "restaurant"],
            4.2,
            "PRICE_LEVEL_MODERATE",
        ),
    );
    let google_standardized = standardizer.standardize(&google_raw).await.unwrap();
    let (business_id, _) = dedup.deduplicate(&google_standardized).await.unwrap();

    let yelp_raw = RawBusiness::new(
        Source::Yelp,
        "y-1".into(),
        Uuid::new_v4(),
        yelp_payload(
            "The Tipsy Armadillo",
            "123 East 6th Street",
            "Austin",
            "TX",
            30.26721,
            -97.74310,
            4.4,
        ),
    );
    let yelp_standardized = standardizer.standardize(&yelp_raw).await.unwrap();
    let (merged_id, outcome) = dedup.deduplicate(&yelp_standardized).await.unwrap();

    assert_eq!(outcome, MergeOutcome::Merged);
    assert_eq!(merged_id, business_id);

    let business = repo.get(business_id).await.unwrap().unwrap();
    assert_eq!(business.merge_count, 2);
    assert_eq!(business.rating_google, Some(4.2));
    assert_eq!(business.rating_yelp, Some(4.4));
    assert!((business.rating.unwrap() - 4.3).abs() < 1e-4);

    let bindings = repo.list_bindings_for_business(business_id).await.unwrap();
    assert_eq!(bindings.len(), 2);
    let yelp_binding = bindings.iter().find(|b| b.source == Source::Yelp).unwrap();
    assert!(yelp_binding.match_confidence >= 0.90);
}

/// S4: a dissimilar, distant record never merges into the existing business.
#[tokio::test]
async fn s4_distant_dissimilar_record_creates_a_new_business() {
    let repo = Arc::new(InMemoryRepository::new());
    let bus = EventBus::new();
    let standardizer = Standardizer::new(repo.clone(), bus.clone());
    let dedup = Deduplicator::new(repo.clone(), bus.clone());

    let first_raw = RawBusiness::new(
        Source::Google,
        "X1".into(),
        Uuid::new_v4(),
        google_payload(
            "The Tipsy Armadillo",
            "123 E 6th St",
            "Austin",
            "TX",
            30.2672,
            -97.7431,
            &["bar", "restaurant"],
            4.2,
            "PRICE_LEVEL_MODERATE",
        ),
    );
    let first = standardizer.standardize(&first_raw).await.unwrap();
    let (first_id, _) = dedup.deduplicate(&first).await.unwrap();

    let second_raw = RawBusiness::new(
        Source::Google,
        "X2".into(),
        Uuid::new_v4(),
        google_payload(
            "The Dive Bar",
            "900 Red River St",
            "Austin",
            "TX",
            30.269895,
            -97.7431,
            &["bar"],
            3.8,
            "PRICE_LEVEL_INEXPENSIVE",
        ),
    );
    let second = standardizer.standardize(&second_raw).await.unwrap();
    let (second_id, outcome) = dedup.deduplicate(&second).await.unwrap();

    assert_eq!(outcome, MergeOutcome::Created);
    assert_ne!(first_id, second_id);
}

fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    use image::codecs::jpeg::JpegEncoder;
    use image::{DynamicImage, ImageBuffer, Rgb};

    let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, 90);
    encoder.encode_image(&DynamicImage::ImageRgb8(img)).unwrap();
    bytes
}

/// S5: a budget that's already over its emergency threshold when photo
/// processing starts denies every variant upload, but the photo still
/// gets a terminal record — marked as the business's main photo with
/// nothing but its external URL, not left stuck `Pending` forever.
#[tokio::test]
async fn s5_budget_exhaustion_stops_processing_partway() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photo.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(sample_jpeg(300, 200)))
        .mount(&mock_server)
        .await;

    let repo = Arc::new(InMemoryRepository::new());
    let bus = EventBus::new();
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalObjectStore::new(dir.path()));

    // Already at 98% utilization before this business's photos are even
    // looked at, so the very first variant upload attempt is denied.
    let mut budget = Budget::new("2026-07", Decimal::new(1, 5));
    budget.record_spend(Decimal::new(98, 7));
    let cost = CostController::new(budget, 1000.0, 600.0);

    let business_id = Uuid::new_v4();
    let photo = Photo::pending(business_id, format!("{}/photo.jpg", mock_server.uri()));
    let photo_id = photo.id;
    repo.insert(&photo).await.unwrap();

    let processor = PhotoProcessor::new(repo.clone(), store, cost, bus.clone());
    let processed = processor.process_business(business_id).await.unwrap();

    assert_eq!(processed, 1);
    let stored = repo.list_for_business(business_id).await.unwrap();
    let stored = stored.iter().find(|p| p.id == photo_id).unwrap();
    assert_eq!(stored.status, venue_ingest::PhotoStatus::Ready);
    assert!(stored.storage_keys.is_empty());
    assert!(stored.main_photo);
    assert_eq!(stored.source_ref, format!("{}/photo.jpg", mock_server.uri()));
}

/// S6: a budget already in emergency mode skips object-store materialization
/// entirely, but the photo is still marked `Ready` as the business's main
/// photo and `photos.processed` still fires, so a caller always gets a
/// terminal event for the business rather than a photo stuck `Pending`.
#[tokio::test]
async fn s6_emergency_mode_skips_materialization() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photo.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(sample_jpeg(300, 200)))
        .mount(&mock_server)
        .await;

    let repo = Arc::new(InMemoryRepository::new());
    let bus = EventBus::new();

    let events = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let sink = events.clone();
    bus.subscribe(EventTag::PhotosProcessed, move |event| {
        let sink = sink.clone();
        async move {
            sink.lock().await.push(event.payload);
            Ok(())
        }
    })
    .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalObjectStore::new(dir.path()));

    let mut budget = Budget::new("2026-07", Decimal::new(20, 0));
    budget.emergency_mode = true;
    let cost = CostController::new(budget, 1000.0, 600.0);

    let business_id = Uuid::new_v4();
    let photo = Photo::pending(business_id, format!("{}/photo.jpg", mock_server.uri()));
    let photo_id = photo.id;
    repo.insert(&photo).await.unwrap();

    let processor = PhotoProcessor::new(repo.clone(), store, cost, bus.clone());
    let processed = processor.process_business(business_id).await.unwrap();

    assert_eq!(processed, 1);
    let stored = repo.list_for_business(business_id).await.unwrap();
    let stored = stored.iter().find(|p| p.id == photo_id).unwrap();
    assert_eq!(stored.status, venue_ingest::PhotoStatus::Ready);
    assert!(stored.storage_keys.is_empty());
    assert!(stored.main_photo);

    settle().await;
    let captured = events.lock().await;
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0]["photosProcessed"], 1);
}

/// Boundary behavior: zero upstream results for a job is a clean no-op, not
/// an error, and touches neither storage nor the event bus.
#[tokio::test]
async fn zero_upstream_records_completes_cleanly_with_no_events() {
    use venue_ingest::{CollectionJobKind, CollectorClient, Job, RawCollector};

    struct EmptyClient;

    #[async_trait::async_trait]
    impl CollectorClient for EmptyClient {
        fn source(&self) -> Source {
            Source::Google
        }

        async fn search_nearby_page(
            &self,
            _lat: f64,
            _lng: f64,
            _radius_meters: u32,
            _page_token: Option<&str>,
        ) -> venue_ingest::Result<venue_ingest::collector::SearchPage> {
            Ok(venue_ingest::collector::SearchPage { results: vec![], next_page_token: None })
        }

        async fn place_details(&self, external_id: &str) -> venue_ingest::Result<serde_json::Value> {
            Ok(serde_json::json!({ "id": external_id }))
        }
    }

    let repo = Arc::new(InMemoryRepository::new());
    let bus = EventBus::new();

    let events = Arc::new(tokio::sync::Mutex::new(0usize));
    let sink = events.clone();
    bus.subscribe(EventTag::RawCollected, move |_| {
        let sink = sink.clone();
        async move {
            *sink.lock().await += 1;
            Ok(())
        }
    })
    .await;

    let client: Arc<dyn CollectorClient> = Arc::new(EmptyClient);
    let collector = RawCollector::new(vec![client], repo.clone(), bus.clone());
    let job = Job::new(
        CollectionJobKind::SearchNearby { source: Source::Google, lat: 0.0, lng: 0.0, radius_meters: 500 },
        3,
    );

    let total = collector.run_job(&job).await.unwrap();
    assert_eq!(total, 0);

    settle().await;
    assert_eq!(*events.lock().await, 0);
}

/// Idempotence: normalizing an already-normalized name or address line is a
/// no-op, so re-running standardization on stable input never drifts.
#[test]
fn normalization_is_idempotent() {
    use venue_ingest::standardize::normalize::{normalize_address_line, normalize_name};

    let name = "  Joe's   Pizza ";
    let once = normalize_name(name);
    let twice = normalize_name(&once);
    assert_eq!(once, twice);

    let address = "123 Main Street";
    let once = normalize_address_line(address);
    let twice = normalize_address_line(&once);
    assert_eq!(once, twice);
}
