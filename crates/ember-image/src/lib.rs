//! Image-backed pattern import and export for simulation grids.
//!
//! A grid cell maps to one RGBA pixel with float channels in [0, 1]. The
//! model crates define how a cell encodes to and decodes from such a pixel;
//! this crate handles the image side: decoding files, resizing to the grid
//! resolution, and the axis convention.
//!
//! # Axis convention
//!
//! Image row 0 is the **top** row; grid row 0 is the **bottom** row. Both
//! [`ChannelGrid::from_image`] and [`export_rgba`] flip vertically, so a
//! pattern exported and re-imported lands on the same cells.

use std::io::BufWriter;
use std::path::Path;

use ember_grid::GridError;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, Rgba, RgbaImage};
use thiserror::Error;

/// Errors from pattern import/export.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The underlying image could not be decoded or encoded.
    #[error("image error: {0}")]
    Image(#[from] ImageError),

    /// I/O failure reading or writing a pattern file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The pixel data does not match the requested dimensions.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Resampling filter used when a source image does not match the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFilter {
    /// Nearest pixel; keeps hard region boundaries intact.
    #[default]
    Nearest,
    /// Bilinear interpolation; smooth but blends class boundaries.
    Bilinear,
}

impl ResizeFilter {
    fn to_filter_type(self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
        }
    }
}

/// A rectangular field of per-cell RGBA float channels, grid-oriented
/// (row 0 at the bottom).
#[derive(Debug, Clone)]
pub struct ChannelGrid {
    width: usize,
    height: usize,
    data: Vec<[f32; 4]>,
}

impl ChannelGrid {
    /// Builds a channel grid from a decoded image, resizing to
    /// `width` x `height` when necessary and flipping to grid orientation.
    pub fn from_image(
        img: &DynamicImage,
        width: usize,
        height: usize,
        filter: ResizeFilter,
    ) -> Result<Self, CodecError> {
        if width < 2 || height < 2 {
            return Err(GridError::InvalidConfiguration(format!(
                "target dimensions must be at least 2x2, got {width}x{height}"
            ))
            .into());
        }
        let rgba = if img.width() as usize != width || img.height() as usize != height {
            img.resize_exact(width as u32, height as u32, filter.to_filter_type())
                .into_rgba8()
        } else {
            img.to_rgba8()
        };

        let mut data = vec![[0.0f32; 4]; width * height];
        for (x, y, px) in rgba.enumerate_pixels() {
            let gy = height - 1 - y as usize;
            data[gy * width + x as usize] = [
                px.0[0] as f32 / 255.0,
                px.0[1] as f32 / 255.0,
                px.0[2] as f32 / 255.0,
                px.0[3] as f32 / 255.0,
            ];
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Loads and converts an image file.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        width: usize,
        height: usize,
        filter: ResizeFilter,
    ) -> Result<Self, CodecError> {
        let img = image::open(path)?;
        Self::from_image(&img, width, height, filter)
    }

    /// Grid width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The channels of the cell at `(x, y)`, grid-oriented.
    pub fn get(&self, x: usize, y: usize) -> [f32; 4] {
        self.data[y * self.width + x]
    }

    /// Row-major channel data.
    pub fn channels(&self) -> &[[f32; 4]] {
        &self.data
    }

    /// Rec. 601 luma of every cell — the input to material classification.
    pub fn luminance(&self) -> Vec<f32> {
        self.data
            .iter()
            .map(|px| 0.299 * px[0] + 0.587 * px[1] + 0.114 * px[2])
            .collect()
    }

    /// Decodes every cell through a model-supplied conversion.
    pub fn to_cells<C>(&self, mut decode: impl FnMut([f32; 4]) -> C) -> Vec<C> {
        self.data.iter().map(|&px| decode(px)).collect()
    }
}

/// Converts per-cell channels (grid-oriented, row-major) into an 8-bit RGBA
/// image, scaling [0, 1] to [0, 255] and flipping back to image
/// orientation.
pub fn export_rgba(
    channels: &[[f32; 4]],
    width: usize,
    height: usize,
) -> Result<RgbaImage, CodecError> {
    if channels.len() != width * height {
        return Err(GridError::InvalidConfiguration(format!(
            "expected {} pixels for a {width}x{height} image, got {}",
            width * height,
            channels.len()
        ))
        .into());
    }
    let mut img = RgbaImage::new(width as u32, height as u32);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let gy = height - 1 - y as usize;
        let c = channels[gy * width + x as usize];
        *px = Rgba([
            (c[0].clamp(0.0, 1.0) * 255.0).round() as u8,
            (c[1].clamp(0.0, 1.0) * 255.0).round() as u8,
            (c[2].clamp(0.0, 1.0) * 255.0).round() as u8,
            (c[3].clamp(0.0, 1.0) * 255.0).round() as u8,
        ]);
    }
    Ok(img)
}

/// Encodes the current grid state through a model-supplied conversion and
/// writes it as a PNG.
pub fn save_pattern<P: AsRef<Path>>(
    path: P,
    channels: &[[f32; 4]],
    width: usize,
    height: usize,
) -> Result<(), CodecError> {
    let img = export_rgba(channels, width, height)?;
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    img.write_to(&mut writer, image::ImageFormat::Png)?;
    Ok(())
}
