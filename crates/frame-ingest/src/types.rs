use chrono::Utc;
use image::RgbaImage;
use thiserror::Error;

/// Still RGBA frame captured from a source.
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    Rgba8,
}

impl Frame {
    /// Wrap a decoded image, stamping it with the current time.
    pub fn from_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            timestamp_ms: Utc::now().timestamp_millis(),
            format: FrameFormat::Rgba8,
        }
    }

    /// Solid-color frame, mostly useful for tests and placeholders.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::from_image(RgbaImage::from_pixel(width, height, image::Rgba(rgba)))
    }

    /// Copy the pixels back into an image buffer.
    ///
    /// Returns `None` when the buffer length does not match the dimensions.
    pub fn to_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// A frame with a zero side cannot be mapped or encoded.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open frame source {uri:?}")]
    Open { uri: String },
    #[error("failed to decode frame from {uri:?}: {source}")]
    Decode {
        uri: String,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
