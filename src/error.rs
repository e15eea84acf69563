//! Error types for the photo-watermark crate.

/// Errors that can occur while stamping a photo.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source image could not be read or decoded.
    #[error("failed to load source image: {0}")]
    ImageLoad(String),

    /// A drawing surface of the requested size could not be created.
    #[error("drawing surface unavailable ({width}x{height})")]
    SurfaceUnavailable {
        /// Requested backing-store width in pixels.
        width: u32,
        /// Requested backing-store height in pixels.
        height: u32,
    },

    /// Encoding the finished surface failed.
    #[error("failed to encode output image: {0}")]
    Encode(#[source] image::ImageError),

    /// A font file could not be parsed.
    #[error("invalid font data: {0}")]
    Font(String),

    /// A color string could not be parsed.
    #[error("invalid color: {0:?}")]
    InvalidColor(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The output path names a format other than JPEG.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The blocking render task did not complete.
    #[cfg(feature = "async")]
    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
