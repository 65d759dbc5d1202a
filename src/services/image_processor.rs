// src/services/image_processor.rs
use crate::errors::RestorationError;
use crate::services::llm_service::ImageData;
use image::{GenericImageView, ImageFormat as ImgFormat};
use log::{info, warn};
use std::io::Cursor;

pub struct ImageProcessor {
    max_dimension: u32,
}

impl ImageProcessor {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    /// Checks an upload and returns the bytes to hand to the model.
    ///
    /// The MIME type is taken from the content itself; `declared_mime` is only
    /// compared against it. Oversized images are downscaled to PNG.
    pub fn prepare(
        &self,
        data: &[u8],
        declared_mime: Option<&str>,
    ) -> Result<ImageData, RestorationError> {
        if data.is_empty() {
            return Err(RestorationError::InvalidInput("No image uploaded".to_string()));
        }

        let format = image::guess_format(data).map_err(|_| {
            RestorationError::InvalidInput("Only image files are allowed".to_string())
        })?;
        let mime_type = mime_for(format).ok_or_else(|| {
            RestorationError::InvalidInput("Only image files are allowed".to_string())
        })?;

        if let Some(declared) = declared_mime {
            if !declared.eq_ignore_ascii_case(mime_type) {
                warn!(
                    "Declared type {} does not match content ({}), using content type",
                    declared, mime_type
                );
            }
        }

        let (width, height) = image::io::Reader::with_format(Cursor::new(data), format)
            .into_dimensions()
            .map_err(|e| RestorationError::InvalidInput(format!("Invalid image format: {}", e)))?;

        if width <= self.max_dimension && height <= self.max_dimension {
            return Ok(ImageData::new(data.to_vec(), mime_type));
        }

        let resized = self.resize(data, width, height)?;
        Ok(ImageData::new(resized, "image/png"))
    }

    fn resize(&self, data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, RestorationError> {
        let img = image::load_from_memory(data)
            .map_err(|e| RestorationError::ImageProcessing(format!("Failed to load image: {}", e)))?;

        let ratio = (self.max_dimension as f32 / width.max(height) as f32).min(1.0);
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);

        let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);
        let (out_width, out_height) = resized.dimensions();
        info!(
            "Downscaled upload from {}x{} to {}x{}",
            width, height, out_width, out_height
        );

        let mut output = Vec::new();
        resized
            .write_to(&mut Cursor::new(&mut output), ImgFormat::Png)
            .map_err(|e| {
                RestorationError::ImageProcessing(format!("Failed to encode resized image: {}", e))
            })?;

        Ok(output)
    }
}

fn mime_for(format: ImgFormat) -> Option<&'static str> {
    match format {
        ImgFormat::Jpeg => Some("image/jpeg"),
        ImgFormat::Png => Some("image/png"),
        ImgFormat::WebP => Some("image/webp"),
        ImgFormat::Bmp => Some("image/bmp"),
        ImgFormat::Tiff => Some("image/tiff"),
        _ => None,
    }
}
