#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unsupported image count: {0} (expected 1 or 4)")]
    UnsupportedImageCount(usize),

    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}
