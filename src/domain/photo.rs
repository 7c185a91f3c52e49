use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A generated size variant of a source photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoVariant {
    Thumbnail,
    Small,
    Medium,
    Large,
    Original,
}

impl PhotoVariant {
    pub const ALL: [PhotoVariant; 5] = [
        PhotoVariant::Thumbnail,
        PhotoVariant::Small,
        PhotoVariant::Medium,
        PhotoVariant::Large,
        PhotoVariant::Original,
    ];

    /// `(max_width, max_height, jpeg_quality)`. `Original` carries no resize
    /// bound and re-encodes only to normalize orientation/format.
    pub fn bounds(&self) -> (u32, u32, u8) {
        match self {
            PhotoVariant::Thumbnail => (150, 150, 70),
            PhotoVariant::Small => (320, 240, 75),
            PhotoVariant::Medium => (640, 480, 80),
            PhotoVariant::Large => (1024, 768, 85),
            PhotoVariant::Original => (u32::MAX, u32::MAX, 90),
        }
    }

    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            PhotoVariant::Thumbnail => Some("thumbnail"),
            PhotoVariant::Small => Some("small"),
            PhotoVariant::Medium => Some("medium"),
            PhotoVariant::Large => Some("large"),
            PhotoVariant::Original => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub business_id: Uuid,

    /// Provider photo reference (Google photo reference / Yelp photo URL).
    pub source_ref: String,

    pub status: PhotoStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_sha256: Option<String>,

    /// Deterministic storage keys already materialized, keyed by variant.
    #[serde(default)]
    pub storage_keys: std::collections::HashMap<PhotoVariant, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// True for exactly one `Ready`/partially-materialized photo per
    /// business: the first one this processor successfully touches.
    #[serde(default)]
    pub main_photo: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Photo {
    pub fn pending(business_id: Uuid, source_ref: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            business_id,
            source_ref,
            status: PhotoStatus::Pending,
            width: None,
            height: None,
            checksum_sha256: None,
            storage_keys: std::collections::HashMap::new(),
            failure_reason: None,
            main_photo: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// `businesses/<businessId>/photos/<photoId>[-variant].jpg`
    pub fn storage_key(business_id: Uuid, photo_id: Uuid, variant: PhotoVariant) -> String {
        match variant.suffix() {
            Some(suffix) => format!("businesses/{business_id}/photos/{photo_id}-{suffix}.jpg"),
            None => format!("businesses/{business_id}/photos/{photo_id}.jpg"),
        }
    }
}
