//! Thumbnail downscaling.
//!
//! Pure and synchronous: decode, fit inside a bounding box keeping the
//! aspect ratio, re-encode in the source format.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use crate::error::Fault;

/// Blobs above this many bytes are downscaled before upload.
pub const MAX_IMAGE_SIZE: usize = 976_560;
pub const THUMBNAIL_BOX: (u32, u32) = (500, 500);

/// Image-transform collaborator used by the pipeline.
pub trait Thumbnailer {
    fn shrink(&self, bytes: &[u8], bounding_box: (u32, u32)) -> Result<Vec<u8>, Fault>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageThumbnailer;

impl Thumbnailer for ImageThumbnailer {
    fn shrink(&self, bytes: &[u8], (width, height): (u32, u32)) -> Result<Vec<u8>, Fault> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| Fault::Image(e.to_string()))?;
        let format = reader.format().unwrap_or(ImageFormat::Png);
        let image = reader.decode().map_err(|e| Fault::Image(e.to_string()))?;

        let thumb = if image.width() > width || image.height() > height {
            image.thumbnail(width, height)
        } else {
            image
        };

        let mut out = Cursor::new(Vec::new());
        thumb
            .write_to(&mut out, format)
            .or_else(|_| {
                // Formats we can decode but not encode.
                out.get_mut().clear();
                out.set_position(0);
                thumb.write_to(&mut out, ImageFormat::Png)
            })
            .map_err(|e| Fault::Image(e.to_string()))?;
        Ok(out.into_inner())
    }
}
