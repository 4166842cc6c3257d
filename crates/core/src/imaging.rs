//! Composite image assembly for single-message replies.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::error::CoreError;

/// Merge generated images into one picture.
///
/// - 1 image: returned unchanged.
/// - 4 images: tiled 2×2 on a `(2w, 2h)` canvas in row-major order
///   (top-left, top-right, bottom-left, bottom-right), where `(w, h)` is
///   the size of the first image.
/// - Any other count is unsupported: an error is logged and `None`
///   returned.
pub fn merge_images(images: &[DynamicImage]) -> Option<DynamicImage> {
    match images {
        [single] => Some(single.clone()),
        [first, ..] if images.len() == 4 => {
            let (w, h) = (first.width(), first.height());
            let mut canvas = DynamicImage::new_rgb8(w * 2, h * 2);
            let origins = [(0, 0), (w, 0), (0, h), (w, h)];
            for (tile, (x, y)) in images.iter().zip(origins) {
                image::imageops::overlay(&mut canvas, tile, i64::from(x), i64::from(y));
            }
            Some(canvas)
        }
        _ => {
            tracing::error!(
                error = %CoreError::UnsupportedImageCount(images.len()),
                "Cannot merge images",
            );
            None
        }
    }
}

/// Encode an image as PNG bytes for upload.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}
