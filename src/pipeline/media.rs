//! Media helpers: content sniffing, WebP transcoding and screenshot slicing.
//!
//! Decoding and encoding are CPU-bound, so both transformations run in
//! `spawn_blocking` to keep the runtime's worker threads free for I/O.

use crate::error::MediaError;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Detect the MIME type of a media file from its leading bytes.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return "video/mp4";
    }
    OCTET_STREAM
}

/// Prefix of every temp file this crate creates.
pub const TEMP_PREFIX: &str = "telegraph-";

/// A fresh temp file for derived media, removed when dropped.
///
/// Created in `dir` when given, else in the system temp directory.
pub fn temp_media_file(dir: Option<&Path>, suffix: &str) -> Result<NamedTempFile, MediaError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_PREFIX).suffix(suffix);
    Ok(match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    })
}

/// Re-encode a WebP image as PNG.
pub async fn transcode_webp_to_png(
    bytes: Vec<u8>,
    dir: Option<PathBuf>,
) -> Result<NamedTempFile, MediaError> {
    run_blocking(move || {
        let img = image::load_from_memory_with_format(&bytes, ImageFormat::WebP)?;
        let out = temp_media_file(dir.as_deref(), ".png")?;
        img.save_with_format(out.path(), ImageFormat::Png)?;
        debug!(
            "transcoded webp {}x{} to {}",
            img.width(),
            img.height(),
            out.path().display()
        );
        Ok(out)
    })
    .await
}

/// A screenshot ready for upload: the original file or its slices.
#[derive(Debug)]
pub enum ScreenshotSlices {
    Original(PathBuf),
    Split(Vec<NamedTempFile>),
}

impl ScreenshotSlices {
    /// Paths to upload, top to bottom.
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            ScreenshotSlices::Original(path) => vec![path.as_path()],
            ScreenshotSlices::Split(files) => files.iter().map(|f| f.path()).collect(),
        }
    }
}

/// Cut a tall screenshot into horizontal slices no taller than `max_height`.
///
/// Images that already fit are returned as [`ScreenshotSlices::Original`]
/// without being decoded twice.
pub async fn split_screenshot(
    path: &Path,
    max_height: u32,
    dir: Option<PathBuf>,
) -> Result<ScreenshotSlices, MediaError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MediaError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => MediaError::Io(e),
    })?;
    let original = path.to_path_buf();

    run_blocking(move || {
        let img = image::load_from_memory(&bytes)?;
        if max_height == 0 || img.height() <= max_height {
            return Ok(ScreenshotSlices::Original(original));
        }
        let slices = slice_image(&img, max_height, dir.as_deref())?;
        debug!(
            "split {} ({}px) into {} slices",
            original.display(),
            img.height(),
            slices.len()
        );
        Ok(ScreenshotSlices::Split(slices))
    })
    .await
}

fn slice_image(
    img: &DynamicImage,
    max_height: u32,
    dir: Option<&Path>,
) -> Result<Vec<NamedTempFile>, MediaError> {
    let (width, height) = (img.width(), img.height());
    let mut files = Vec::new();
    let mut top = 0;
    while top < height {
        let slice_height = max_height.min(height - top);
        let out = temp_media_file(dir, ".png")?;
        img.crop_imm(0, top, width, slice_height)
            .save_with_format(out.path(), ImageFormat::Png)?;
        files.push(out);
        top += slice_height;
    }
    Ok(files)
}

async fn run_blocking<T, F>(work: F) -> Result<T, MediaError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, MediaError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| MediaError::Io(std::io::Error::other(format!("image task panicked: {e}"))))?
}
