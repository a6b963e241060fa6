//! Image normalization
//!
//! Decodes caller-supplied image bytes (PNG, JPEG, BMP, TIFF, ...) into an
//! owned 8-bit grayscale raster. No resampling is done: images are assumed to
//! be captured at the sensor's native density, which is passed downstream as
//! a fixed parameter rather than detected.

use crate::error::PipelineError;
use image::{ImageError, ImageReader, Limits};
use std::io::Cursor;

/// Owned 8-bit grayscale raster, row-major, no padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayRaster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl GrayRaster {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw pixel bytes (`width * height` of them)
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Decodes and validates fingerprint images
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    max_dimension: u32,
}

impl ImageNormalizer {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    /// Decode `bytes` and convert to 8-bit grayscale
    ///
    /// Dimensions are read from the header and checked before any pixel data
    /// is decoded.
    pub fn normalize(&self, bytes: &[u8]) -> Result<GrayRaster, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::Decode("image data is empty".to_string()));
        }

        let (width, height) = self
            .reader(bytes)?
            .into_dimensions()
            .map_err(|e| PipelineError::Decode(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(PipelineError::Decode(format!(
                "image has no pixels ({}x{})",
                width, height
            )));
        }
        if width > self.max_dimension || height > self.max_dimension {
            return Err(self.oversized(width, height));
        }

        let mut reader = self.reader(bytes)?;
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        reader.limits(limits);

        let gray = reader
            .decode()
            .map_err(|e| match e {
                ImageError::Limits(_) => self.oversized(width, height),
                other => PipelineError::Decode(other.to_string()),
            })?
            .into_luma8();

        Ok(GrayRaster {
            width,
            height,
            data: gray.into_raw(),
        })
    }

    fn reader<'a>(&self, bytes: &'a [u8]) -> Result<ImageReader<Cursor<&'a [u8]>>, PipelineError> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode(format!("unrecognized image format: {}", e)))
    }

    fn oversized(&self, width: u32, height: u32) -> PipelineError {
        PipelineError::Decode(format!(
            "image {}x{} exceeds maximum dimension {}",
            width, height, self.max_dimension
        ))
    }
}
