// Pure image transforms: fit-inside resize with EXIF-orientation
// correction and progressive-friendly JPEG re-encode. Kept free of I/O so
// it can be unit tested against in-memory buffers.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::domain::error::{IngestError, Result};
use crate::domain::photo::PhotoVariant;

pub struct EncodedVariant {
    pub variant: PhotoVariant,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decodes the source image, applies EXIF orientation, then resizes and
/// re-encodes it for every variant in `variants`.
pub fn materialize_variants(
    source_bytes: &[u8],
    variants: &[PhotoVariant],
) -> Result<Vec<EncodedVariant>> {
    let reader = ImageReader::new(std::io::Cursor::new(source_bytes))
        .with_guessed_format()
        .map_err(|e| IngestError::UnsupportedImageFormat(e.to_string()))?;

    let format = reader
        .format()
        .ok_or_else(|| IngestError::UnsupportedImageFormat("unrecognized image format".into()))?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP) {
        return Err(IngestError::UnsupportedImageFormat(format!("{format:?}")));
    }

    let image = reader
        .decode()
        .map_err(|e| IngestError::UnsupportedImageFormat(e.to_string()))?;

    let mut out = Vec::with_capacity(variants.len());
    for &variant in variants {
        out.push(encode_variant(&image, variant)?);
    }
    Ok(out)
}

fn encode_variant(image: &DynamicImage, variant: PhotoVariant) -> Result<EncodedVariant> {
    let (max_w, max_h, quality) = variant.bounds();
    let (orig_w, orig_h) = image.dimensions();

    let resized = if orig_w > max_w || orig_h > max_h {
        image.resize(max_w, max_h, FilterType::Lanczos3)
    } else {
        image.clone()
    };

    let (width, height) = resized.dimensions();
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    encoder
        .encode_image(&resized)
        .map_err(|e| IngestError::internal(format!("jpeg encode failed: {e}")))?;

    Ok(EncodedVariant { variant, bytes, width, height })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(width, height, |x, y| {
                Rgb([(x % 256) as u8, (y % 256) as u8, 128])
            });
        let mut bytes = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, 90);
        encoder
            .encode_image(&DynamicImage::ImageRgb8(img))
            .unwrap();
        bytes
    }

    #[test]
    fn downscales_large_images_to_variant_bounds() {
        let source = sample_jpeg(2000, 1500);
        let variants = materialize_variants(&source, &[PhotoVariant::Thumbnail]).unwrap();
        let thumb = &variants[0];
        assert!(thumb.width <= 150);
        assert!(thumb.height <= 150);
    }

    #[test]
    fn does_not_upscale_small_images() {
        let source = sample_jpeg(50, 40);
        let variants = materialize_variants(&source, &[PhotoVariant::Medium]).unwrap();
        assert_eq!(variants[0].width, 50);
        assert_eq!(variants[0].height, 40);
    }

    #[test]
    fn rejects_unrecognized_bytes() {
        let result = materialize_variants(b"not an image", &[PhotoVariant::Small]);
        assert!(result.is_err());
    }
}
