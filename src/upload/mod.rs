//! Upload module for image and document storage.
//!
//! Uploaded files pass through:
//! - Extension and content sniffing against a fixed allow-list
//! - A 10 MB size cap
//! - WebP re-encoding for raster images, with a fall-back to the original
//!   bytes when the image cannot be re-encoded
//! - A randomized 32-hex filename under the uploads directory

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageFormat, ImageReader};
use thiserror::Error;
use tracing::{info, warn};

/// Upload size cap in bytes
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Extensions accepted for upload
const ALLOWED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "pdf"];

/// Errors that can occur while storing an upload
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("File type not allowed: .{0}")]
    ExtensionNotAllowed(String),

    #[error("Invalid file content")]
    UnrecognizedContent,

    #[error("File content does not match its extension")]
    ContentMismatch,

    #[error("File too large (max {} MB)", .0 / (1024 * 1024))]
    TooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Sniffed content type of an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Jpeg,
    Png,
    Gif,
    WebP,
    Pdf,
}

impl FileKind {
    fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"%PDF-") {
            return Some(Self::Pdf);
        }
        match image::guess_format(data) {
            Ok(ImageFormat::Jpeg) => Some(Self::Jpeg),
            Ok(ImageFormat::Png) => Some(Self::Png),
            Ok(ImageFormat::Gif) => Some(Self::Gif),
            Ok(ImageFormat::WebP) => Some(Self::WebP),
            _ => None,
        }
    }

    fn matches_extension(self, ext: &str) -> bool {
        match self {
            Self::Jpeg => matches!(ext, "jpg" | "jpeg"),
            Self::Png => ext == "png",
            Self::Gif => ext == "gif",
            Self::WebP => ext == "webp",
            Self::Pdf => ext == "pdf",
        }
    }
}

/// Validates, converts and stores uploaded files
pub struct UploadService {
    upload_dir: PathBuf,
}

impl UploadService {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    /// Validate one uploaded file, write it into the uploads directory and
    /// return the stored file name.
    ///
    /// Raster images are re-encoded as WebP; WebP and PDF inputs are stored
    /// verbatim. The stored name is randomized, only the extension derives
    /// from the content.
    pub fn save(&self, original_name: &str, data: &[u8]) -> UploadResult<String> {
        let ext = extension_of(original_name);
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(UploadError::ExtensionNotAllowed(ext));
        }

        let kind = FileKind::from_bytes(data).ok_or(UploadError::UnrecognizedContent)?;
        if !kind.matches_extension(&ext) {
            return Err(UploadError::ContentMismatch);
        }

        if data.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge(MAX_UPLOAD_BYTES));
        }

        let base_name = uuid::Uuid::new_v4().simple().to_string();
        let (bytes, final_name) = match kind {
            FileKind::Jpeg | FileKind::Png | FileKind::Gif => match convert_to_webp(data) {
                Ok(webp) => (webp, format!("{}.webp", base_name)),
                Err(e) => {
                    warn!("WebP conversion failed, storing original bytes: {}", e);
                    (data.to_vec(), format!("{}.{}", base_name, ext))
                }
            },
            FileKind::WebP => (data.to_vec(), format!("{}.webp", base_name)),
            FileKind::Pdf => (data.to_vec(), format!("{}.pdf", base_name)),
        };

        fs::create_dir_all(&self.upload_dir)?;
        fs::write(self.upload_dir.join(&final_name), &bytes)?;

        info!("Stored upload {} ({} bytes)", final_name, bytes.len());
        Ok(final_name)
    }
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Re-encode raster bytes as lossless WebP
fn convert_to_webp(data: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()?;
    let rgba = img.to_rgba8();

    let mut webp = Vec::new();
    let encoder = WebPEncoder::new_lossless(&mut webp);
    encoder.encode(
        rgba.as_raw(),
        rgba.width(),
        rgba.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(webp)
}
