//! In-memory images shared by the dataset loader and the training visualizer.
//!
//! Pixels are stored as interleaved `f32` values in row-major order, so a
//! decoded 8-bit file keeps its raw 0–255 range and a model output can hold
//! values already in [0, 1]. [`Image::normalized`] brings either to [0, 1].

use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    /// 1 (grayscale), 3 (RGB) or 4 (RGBA).
    pub channels: u8,
    pub data: Vec<f32>,
}

impl Image {
    /// Builds an image after checking that `data` matches the shape.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<f32>) -> Result<Image> {
        let image = Image { width, height, channels, data };
        image.check_shape()?;
        Ok(image)
    }

    /// Fails with [`Error::Config`] unless `channels` is 1, 3 or 4 and
    /// `data` holds exactly `width * height * channels` values.
    pub fn check_shape(&self) -> Result<()> {
        if !matches!(self.channels, 1 | 3 | 4) {
            return Err(Error::Config(format!(
                "images need 1, 3 or 4 channels, got {}",
                self.channels
            )));
        }
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        if self.data.len() != expected {
            return Err(Error::Config(format!(
                "{}×{}×{} image needs {} values, got {}",
                self.width,
                self.height,
                self.channels,
                expected,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Single-channel image filled with `value`.
    pub fn filled(width: u32, height: u32, value: f32) -> Image {
        Image {
            width,
            height,
            channels: 1,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Converts a decoded image, keeping grayscale as one channel and
    /// colour as RGB or RGBA. Alpha on grayscale images is dropped.
    pub fn from_dynamic(img: DynamicImage) -> Image {
        let (width, height) = (img.width(), img.height());
        let color = img.color();
        let (channels, bytes) = if !color.has_color() {
            (1, img.into_luma8().into_raw())
        } else if color.has_alpha() {
            (4, img.into_rgba8().into_raw())
        } else {
            (3, img.into_rgb8().into_raw())
        };
        Image {
            width,
            height,
            channels,
            data: bytes.into_iter().map(f32::from).collect(),
        }
    }

    pub fn is_grayscale(&self) -> bool {
        self.channels == 1
    }

    /// Values of the pixel at column `x`, row `y`.
    ///
    /// Panics when the coordinates or the buffer do not fit the shape; see
    /// [`Image::check_shape`].
    pub fn pixel(&self, x: u32, y: u32) -> &[f32] {
        let c = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * c;
        &self.data[start..start + c]
    }

    /// Largest pixel value, or 0 for an empty image.
    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }

    /// Copy scaled to [0, 1]: divided by 255 when any value exceeds 1,
    /// returned unchanged otherwise.
    pub fn normalized(&self) -> Image {
        Image { data: normalize_pixels(&self.data), ..self.clone() }
    }
}

/// Divides every value by 255 when the maximum exceeds 1.
pub fn normalize_pixels(data: &[f32]) -> Vec<f32> {
    let max = data.iter().copied().fold(0.0, f32::max);
    if max > 1.0 {
        data.iter().map(|v| v / 255.0).collect()
    } else {
        data.to_vec()
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Opens an image file, optionally resizing to `(width, height)`.
pub fn load_image(path: &Path, resize: Option<(u32, u32)>) -> Result<Image> {
    let img = image::open(path).map_err(|e| Error::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(Image::from_dynamic(apply_resize(img, resize)))
}

fn apply_resize(img: DynamicImage, resize: Option<(u32, u32)>) -> DynamicImage {
    match resize {
        Some((w, h)) if (w, h) != (img.width(), img.height()) => {
            img.resize_exact(w, h, FilterType::Lanczos3)
        }
        _ => img,
    }
}
