use std::path::{Path, PathBuf};

use super::error::{EmbedError, EmbedResult};
use super::packet::{build_packet, extract_text};
use super::{jpeg, png, webp};

/// Container format, chosen by file extension.
///
/// # Example
///
/// ```rust
/// use booru_xmp::xmp::ImageKind;
/// use std::path::Path;
///
/// assert_eq!(ImageKind::from_path(Path::new("123.JPEG")), Some(ImageKind::Jpeg));
/// assert_eq!(ImageKind::from_path(Path::new("123.gif")), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// JPEG — XMP in APP1
    Jpeg,
    /// PNG — XMP in iTXt
    Png,
    /// WebP — XMP in a RIFF chunk, sidecar fallback
    WebP,
}

impl ImageKind {
    /// Determine the kind from a file path extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::WebP => "WebP",
        }
    }
}

/// Where a packet ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedOutcome {
    /// Written into the image container itself.
    Embedded,
    /// The image wasn't a valid container; the packet went to this file.
    Sidecar(PathBuf),
}

/// Build a packet from `text` and embed it into the image at `path`.
///
/// Unsupported extensions fail with [`EmbedError::Unsupported`] before any
/// file is touched.
pub fn embed_path(path: &Path, text: &str) -> EmbedResult<EmbedOutcome> {
    let kind =
        ImageKind::from_path(path).ok_or_else(|| EmbedError::Unsupported(path.to_path_buf()))?;
    let packet = build_packet(text);

    match kind {
        ImageKind::Jpeg => jpeg::embed(path, &packet).map(|()| EmbedOutcome::Embedded),
        ImageKind::Png => png::embed(path, &packet).map(|()| EmbedOutcome::Embedded),
        ImageKind::WebP => webp::embed(path, &packet),
    }
}

/// Embed `text` into `path`, reporting only success or failure.
///
/// Errors are logged with the file name and never propagated, so one bad file
/// can't abort a batch.
pub fn embed_file(path: &Path, text: &str) -> bool {
    match embed_path(path, text) {
        Ok(EmbedOutcome::Embedded) => {
            log::debug!("Embedded XMP into {}", path.display());
            true
        }
        Ok(EmbedOutcome::Sidecar(sidecar)) => {
            log::debug!("Wrote XMP sidecar {} for {}", sidecar.display(), path.display());
            true
        }
        Err(e) => {
            log::error!("XMP embed failed for {}: {e}", path.display());
            false
        }
    }
}

/// Raw XMP packet stored in (or, for non-container WebP, beside) `path`.
pub fn read_packet(path: &Path) -> EmbedResult<Option<String>> {
    match ImageKind::from_path(path) {
        Some(ImageKind::Jpeg) => jpeg::read_packet(path),
        Some(ImageKind::Png) => png::read_packet(path),
        Some(ImageKind::WebP) => webp::read_packet(path),
        None => Err(EmbedError::Unsupported(path.to_path_buf())),
    }
}

/// Annotation text recovered from the packet at `path`, if any.
pub fn read_text(path: &Path) -> EmbedResult<Option<String>> {
    Ok(read_packet(path)?.as_deref().and_then(extract_text))
}
