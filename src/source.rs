//! Image input and output boundaries.
//!
//! Sources arrive as whatever the caller has at hand: a `data:` URI or bare
//! base64 string from a browser, raw file bytes, a path, or an image that is
//! already decoded. Results leave as JPEG bytes that can be written to disk
//! or rendered back into a data URI.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use image::DynamicImage;

use crate::error::{Error, Result};

/// MIME type of every encoded result.
pub const JPEG_MIME: &str = "image/jpeg";

/// JPEG quality of encoded results (a canvas export quality of 0.9).
pub const JPEG_QUALITY: u8 = 90;

/// A source photo in any of the forms the compositor accepts.
#[derive(Clone)]
pub enum ImageSource {
    /// A `data:image/...;base64,...` URI.
    DataUri(String),
    /// Base64-encoded JPEG/PNG bytes without a `data:` prefix.
    Base64(String),
    /// Encoded file bytes.
    Bytes(Vec<u8>),
    /// A file on disk.
    Path(PathBuf),
    /// An image that is already decoded.
    Image(DynamicImage),
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataUri(uri) => f
                .debug_tuple("DataUri")
                .field(&uri.split(',').next().unwrap_or_default())
                .finish(),
            Self::Base64(data) => write!(f, "Base64({} chars)", data.len()),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Image(img) => write!(f, "Image({}x{})", img.width(), img.height()),
        }
    }
}

impl ImageSource {
    /// Interpret a string the way an `<img src>` would: `data:` URIs are
    /// decoded inline, anything else is a file path.
    #[must_use]
    pub fn from_src(src: &str) -> Self {
        if src.starts_with("data:") {
            Self::DataUri(src.to_string())
        } else {
            Self::Path(PathBuf::from(src))
        }
    }

    /// Decode the source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageLoad`] if the source cannot be read, is not valid
    /// base64, or is not a decodable image.
    pub fn decode(&self) -> Result<DynamicImage> {
        match self {
            Self::DataUri(uri) => decode_bytes(&data_uri_payload(uri)?),
            Self::Base64(data) => decode_bytes(&decode_base64(data)?),
            Self::Bytes(bytes) => decode_bytes(bytes),
            Self::Path(path) => {
                let bytes = std::fs::read(path)
                    .map_err(|e| Error::ImageLoad(format!("{}: {e}", path.display())))?;
                decode_bytes(&bytes)
            }
            Self::Image(img) => Ok(img.clone()),
        }
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(img: DynamicImage) -> Self {
        Self::Image(img)
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| Error::ImageLoad(e.to_string()))
}

fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| Error::ImageLoad(format!("invalid base64: {e}")))
}

/// Payload bytes of a base64 `data:` URI.
fn data_uri_payload(uri: &str) -> Result<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| Error::ImageLoad("not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::ImageLoad("data URI has no payload".to_string()))?;
    if !header.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        return Err(Error::ImageLoad(
            "only base64 data URIs are supported".to_string(),
        ));
    }
    decode_base64(payload)
}

/// A finished, encoded image.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Encoded bytes.
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`.
    pub mime: &'static str,
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl EncodedImage {
    /// Wrap JPEG bytes.
    #[must_use]
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime: JPEG_MIME,
        }
    }

    /// Render as a `data:` URI.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Write the encoded bytes to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}
