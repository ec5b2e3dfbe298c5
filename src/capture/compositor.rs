//! Canvas buffer and tile compositing.
//!
//! Canvas offsets are measured from the bottom-left corner (world Y up),
//! while pixel buffers store the top row first. `Canvas::write` converts
//! between the two so the finished image shows the scene upright.

use image::{ImageBuffer, Rgba};

use crate::error::CaptureError;
use crate::grid::{GridPlan, TileSize};

/// RGBA pixel buffer, top row first.
pub type Pixels = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// The composite image assembled during one capture session.
#[derive(Clone, Debug)]
pub struct Canvas {
    image: Pixels,
}

impl Canvas {
    /// Allocates a transparent canvas sized for `plan`.
    pub fn new(plan: &GridPlan) -> Self {
        Self::with_size(plan.canvas_width, plan.canvas_height)
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            image: ImageBuffer::new(width, height),
        }
    }

    #[cfg(test)]
    pub fn image(&self) -> &Pixels {
        &self.image
    }

    /// Copies `tile_size` pixels from the top-left of `tile` into the canvas
    /// at `offset`, replacing whatever was there.
    pub fn write(
        &mut self,
        offset: (u32, u32),
        tile: &Pixels,
        tile_size: TileSize,
    ) -> Result<(), CaptureError> {
        let (canvas_width, canvas_height) = self.image.dimensions();
        let (x, y) = offset;
        let TileSize { width, height } = tile_size;

        let fits_x = x.checked_add(width).is_some_and(|right| right <= canvas_width);
        let fits_y = y.checked_add(height).is_some_and(|top| top <= canvas_height);
        if !fits_x || !fits_y {
            return Err(CaptureError::OutOfBounds {
                x,
                y,
                width,
                height,
                bounds_width: canvas_width,
                bounds_height: canvas_height,
            });
        }

        let (tile_width, tile_height) = tile.dimensions();
        if tile_width < width || tile_height < height {
            return Err(CaptureError::OutOfBounds {
                x: 0,
                y: 0,
                width,
                height,
                bounds_width: tile_width,
                bounds_height: tile_height,
            });
        }

        let row = canvas_height - y - height;
        let source = image::imageops::crop_imm(tile, 0, 0, width, height);
        image::imageops::replace(&mut self.image, &*source, x as i64, row as i64);
        Ok(())
    }

    /// Finishes the canvas and hands over its pixels.
    ///
    /// In-memory buffers need no upload step, so this only unwraps the image.
    pub fn finalize(self) -> Pixels {
        self.image
    }
}
