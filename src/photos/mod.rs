//! Photo Processor: downloads a business's source photos (streamed,
//! size-capped), materializes the configured variants, uploads each one
//! through the cost controller, and publishes `photos.processed` exactly
//! once per run, even when nothing was uploaded (Open Question 2).

pub mod resize;

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cost::{CostController, ObjectStoreOp};
use crate::domain::error::{IngestError, Result};
use crate::domain::photo::{Photo, PhotoStatus, PhotoVariant};
use crate::events::{Event, EventBus, EventTag};
use crate::objectstore::ObjectStore;
use crate::storage::PhotoRepository;

const MAX_PHOTO_BYTES: u64 = 10 * 1024 * 1024;

pub struct PhotoProcessor<R, S> {
    photos: Arc<R>,
    store: Arc<S>,
    cost: CostController,
    bus: EventBus,
    http: reqwest::Client,
}

impl<R, S> PhotoProcessor<R, S>
where
    R: PhotoRepository,
    S: ObjectStore,
{
    pub fn new(photos: Arc<R>, store: Arc<S>, cost: CostController, bus: EventBus) -> Self {
        Self {
            photos,
            store,
            cost,
            bus,
            http: reqwest::Client::new(),
        }
    }

    /// Runs the full materialization pipeline for every pending photo
    /// attached to `business_id`. Always publishes `photos.processed`,
    /// with `photos_processed: 0` only when there was nothing pending to
    /// begin with — a photo that's downloaded but denied storage by the
    /// cost controller still counts, with whatever variants it got and its
    /// remaining variants dropped (Open Question 2).
    pub async fn process_business(&self, business_id: Uuid) -> Result<usize> {
        let existing = self.photos.list_for_business(business_id).await?;
        let mut has_main_photo = existing.iter().any(|p| p.main_photo);
        let pending: Vec<Photo> = existing
            .into_iter()
            .filter(|p| p.status == PhotoStatus::Pending)
            .collect();

        let mut processed = 0usize;
        for mut photo in pending {
            match self.process_one(&mut photo).await {
                Ok(()) => {
                    photo.status = PhotoStatus::Ready;
                    if !has_main_photo {
                        photo.main_photo = true;
                        has_main_photo = true;
                    }
                    photo.updated_at = chrono::Utc::now();
                    self.photos.update(&photo).await?;
                    processed += 1;
                }
                Err(e) => {
                    photo.status = PhotoStatus::Failed;
                    photo.failure_reason = Some(e.to_string());
                    photo.updated_at = chrono::Utc::now();
                    self.photos.update(&photo).await?;
                    warn!(photo_id = %photo.id, error = %e, "photo processing failed");
                }
            }
        }

        self.bus
            .publish(Event::new(
                EventTag::PhotosProcessed,
                serde_json::json!({
                    "businessId": business_id,
                    "photosProcessed": processed,
                }),
            ))
            .await;

        info!(business_id = %business_id, processed, "photo processing complete");
        Ok(processed)
    }

    /// Downloads and resizes every variant, uploading each through the cost
    /// controller. A `BudgetExceeded` denial on any variant stops the loop
    /// for this photo only — already-uploaded variants and the computed
    /// checksum stay on `photo`; the caller still marks it `Ready`, not
    /// `Failed`, since it has a usable (if incomplete) record.
    async fn process_one(&self, photo: &mut Photo) -> Result<()> {
        let bytes = self.download_capped(&photo.source_ref).await?;
        let variants = resize::materialize_variants(&bytes, &PhotoVariant::ALL)?;

        photo.checksum_sha256 = Some(sha256_hex(&bytes));

        for encoded in &variants {
            if encoded.variant == PhotoVariant::Original {
                photo.width = Some(encoded.width);
                photo.height = Some(encoded.height);
            }

            let key = Photo::storage_key(photo.business_id, photo.id, encoded.variant);
            let body = encoded.bytes.clone();
            let body_len = body.len() as u64;
            let store = self.store.clone();
            let key_for_put = key.clone();

            match self
                .cost
                .check_and_execute(ObjectStoreOp::Put, body_len, move || async move {
                    store.put(&key_for_put, body, "image/jpeg").await
                })
                .await
            {
                Ok(()) => {
                    photo.storage_keys.insert(encoded.variant, key);
                }
                Err(IngestError::BudgetExceeded { .. }) => {
                    warn!(photo_id = %photo.id, variant = ?encoded.variant, "dropping remaining variants: budget exhausted");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    async fn download_capped(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| IngestError::Upstream { provider: "photo-source".into(), message: e.to_string() })?;

        if let Some(len) = response.content_length() {
            if len > MAX_PHOTO_BYTES {
                return Err(IngestError::PhotoTooLarge { limit_bytes: MAX_PHOTO_BYTES });
            }
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk: Bytes = chunk.map_err(|e| IngestError::Upstream {
                provider: "photo-source".into(),
                message: e.to_string(),
            })?;
            buffer.extend_from_slice(&chunk);
            if buffer.len() as u64 > MAX_PHOTO_BYTES {
                return Err(IngestError::PhotoTooLarge { limit_bytes: MAX_PHOTO_BYTES });
            }
        }

        Ok(buffer)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(bytes);
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_stable_for_same_input() {
        let a = sha256_hex(b"hello world");
        let b = sha256_hex(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn checksum_differs_for_different_input() {
        assert_ne!(sha256_hex(b"a"), sha256_hex(b"b"));
    }
}
