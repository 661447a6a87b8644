use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};

use crate::assets::{JPEG_DATA_URI_PREFIX, JPEG_QUALITY};

/// Offscreen raster the frame source draws into every tick.
///
/// Both the pixel buffer and the JPEG scratch buffer are allocated once and
/// overwritten in place. Content from a previous tick is gone as soon as the
/// next one is rendered.
pub(crate) struct RasterSurface {
    raster: RgbImage,
    jpeg: Vec<u8>,
}

impl RasterSurface {
    pub fn new(w: u32, h: u32) -> Self {
        Self {
            raster: RgbImage::new(w, h),
            jpeg: Vec::new(),
        }
    }

    /// Writable pixels for the next render.
    pub fn raster_mut(&mut self) -> &mut RgbImage {
        &mut self.raster
    }

    /// Encode the current content as a JPEG data URI.
    pub fn to_data_uri(&mut self) -> Result<String> {
        self.jpeg.clear();
        let (w, h) = self.raster.dimensions();
        JpegEncoder::new_with_quality(&mut self.jpeg, JPEG_QUALITY)
            .encode(self.raster.as_raw(), w, h, ExtendedColorType::Rgb8)
            .context("JPEG encoding failed")?;

        let mut uri =
            String::with_capacity(JPEG_DATA_URI_PREFIX.len() + self.jpeg.len().div_ceil(3) * 4);
        uri.push_str(JPEG_DATA_URI_PREFIX);
        STANDARD.encode_string(&self.jpeg, &mut uri);
        Ok(uri)
    }
}
