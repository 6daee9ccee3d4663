/// Upload ingestion: user-selected file -> `ImageAsset`
///
/// Reads the file asynchronously, checks that it really is an image, and
/// wraps the original bytes in a data URI with the sniffed MIME type.
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PanelError, Result};
use crate::state::data::{ImageAsset, ImageSource};

/// Extensions offered by the file picker (the `image/*` filter)
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "webp", "tif", "tiff", "ico",
];

/// Something that can read a file's bytes
#[async_trait]
pub trait FileReader: Send + Sync {
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Reads from the local filesystem with tokio
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFileReader;

#[async_trait]
impl FileReader for TokioFileReader {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|e| PanelError::FileRead {
            path: display_name(path),
            reason: e.to_string(),
        })
    }
}

/// Show the native picker, filtered to images. None when cancelled.
pub fn pick_image() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Select a Leaf Image")
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file()
}

/// Read and validate an uploaded file
pub async fn load_upload(reader: &dyn FileReader, path: &Path) -> Result<ImageAsset> {
    let bytes = reader.read(path).await?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    ingest_image(path, &bytes)
}

/// Turn file bytes into an `ImageAsset`, rejecting anything that isn't an image
pub fn ingest_image(path: &Path, bytes: &[u8]) -> Result<ImageAsset> {
    let name = display_name(path);

    let format = image::guess_format(bytes).map_err(|_| PanelError::NotAnImage(name.clone()))?;
    let mime = format.to_mime_type();

    info!("🖼️  Uploaded {} ({}, {} bytes)", name, mime, bytes.len());

    Ok(ImageAsset::from_bytes(
        mime,
        bytes,
        ImageSource::Upload { file_name: name },
    ))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn jpeg_bytes() -> Vec<u8> {
        let mut out = Vec::new();
        RgbImage::from_pixel(8, 8, image::Rgb([30, 160, 40]))
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
            .unwrap();
        out
    }

    #[test]
    fn test_jpeg_keeps_original_bytes() {
        let bytes = jpeg_bytes();
        let asset = ingest_image(Path::new("/photos/leaf.jpg"), &bytes).unwrap();

        assert!(asset.data_uri().starts_with("data:image/jpeg;base64,"));
        assert_eq!(asset.decode().unwrap(), bytes);
        assert_eq!(
            asset.source(),
            &ImageSource::Upload { file_name: "leaf.jpg".to_string() }
        );
    }

    #[test]
    fn test_text_file_is_rejected() {
        let result = ingest_image(Path::new("notes.txt"), b"just some notes");
        assert_eq!(result, Err(PanelError::NotAnImage("notes.txt".to_string())));
    }

    #[tokio::test]
    async fn test_missing_file_is_read_failure() {
        let result = load_upload(&TokioFileReader, Path::new("/nonexistent/leaf.png")).await;
        assert!(matches!(result, Err(PanelError::FileRead { .. })));
    }
}
