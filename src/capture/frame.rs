/// Frame capture: video frame -> raster surface -> PNG data URI
use image::{imageops::FilterType, ImageFormat, RgbaImage};
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

use crate::error::{PanelError, Result};
use crate::state::data::{ImageAsset, ImageSource};

/// A decoded RGBA video frame
#[derive(Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8, `width * height * 4` bytes
    pub rgba: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self { width, height, rgba }
    }

    /// Byte length a frame of this size must have
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    /// A frame with zero area or a short/long buffer cannot be drawn
    pub fn is_drawable(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.rgba.len() == Self::expected_len(self.width, self.height)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

/// Offscreen drawing target used to snapshot a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterSurface {
    pub width: u32,
    pub height: u32,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Draw the frame scaled to fill the surface
    pub fn draw(&self, frame: &Frame) -> Result<RgbaImage> {
        if !frame.is_drawable() {
            return Err(PanelError::SurfaceNotReady);
        }

        let image = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone())
            .ok_or(PanelError::SurfaceNotReady)?;

        if image.dimensions() == (self.width, self.height) {
            return Ok(image);
        }

        Ok(image::imageops::resize(
            &image,
            self.width,
            self.height,
            FilterType::Triangle,
        ))
    }
}

/// Turns a raster surface into a portable image
pub trait ImageEncoder: Send + Sync {
    fn encode(&self, surface: &RgbaImage) -> Result<ImageAsset>;
}

/// Encodes as `data:image/png;base64,...`
#[derive(Debug, Default, Clone, Copy)]
pub struct PngDataUriEncoder;

impl ImageEncoder for PngDataUriEncoder {
    fn encode(&self, surface: &RgbaImage) -> Result<ImageAsset> {
        let mut png = Vec::new();
        surface.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        debug!(
            "Encoded {}x{} surface to {} byte PNG",
            surface.width(),
            surface.height(),
            png.len()
        );

        Ok(ImageAsset::from_bytes("image/png", &png, ImageSource::Camera))
    }
}

/// Snapshots the current frame of a stream into an `ImageAsset`
#[derive(Clone)]
pub struct FrameCapture {
    surface: RasterSurface,
    encoder: Arc<dyn ImageEncoder>,
}

impl FrameCapture {
    pub fn new(surface: RasterSurface, encoder: Arc<dyn ImageEncoder>) -> Self {
        Self { surface, encoder }
    }

    /// Fails with `SurfaceNotReady` when there is no usable frame
    pub fn capture(&self, frame: Option<&Frame>) -> Result<ImageAsset> {
        let frame = frame.ok_or(PanelError::SurfaceNotReady)?;
        let raster = self.surface.draw(frame)?;
        self.encoder.encode(&raster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture() -> FrameCapture {
        FrameCapture::new(RasterSurface::new(320, 240), Arc::new(PngDataUriEncoder))
    }

    #[test]
    fn test_capture_scales_to_surface() {
        let frame = Frame::new(64, 48, vec![200; Frame::expected_len(64, 48)]);
        let asset = capture().capture(Some(&frame)).unwrap();

        assert!(asset.data_uri().starts_with("data:image/png;base64,"));
        assert_eq!(asset.source(), &ImageSource::Camera);

        let decoded = image::load_from_memory(&asset.decode().unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 240));
    }

    #[test]
    fn test_capture_without_frame_fails_fast() {
        assert_eq!(capture().capture(None), Err(PanelError::SurfaceNotReady));
    }

    #[test]
    fn test_empty_or_truncated_frame_is_not_ready() {
        let empty = Frame::new(0, 0, Vec::new());
        assert_eq!(capture().capture(Some(&empty)), Err(PanelError::SurfaceNotReady));

        let truncated = Frame::new(10, 10, vec![0; 12]);
        assert_eq!(capture().capture(Some(&truncated)), Err(PanelError::SurfaceNotReady));
    }
}
