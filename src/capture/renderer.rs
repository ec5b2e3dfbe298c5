//! Rendering backends: move the capture device, render, read pixels back.

use anyhow::{Context, Result};
use image::{ImageBuffer, Rgba};
use std::path::Path;

use crate::capture::compositor::Pixels;
use crate::grid::{TileSize, WorldPoint};

/// A capture device plus its render target.
///
/// Calls are synchronous: pixels returned by `render_and_readback` reflect
/// the position most recently passed to `set_position`.
pub trait TileRenderer {
    /// Current device position in world units.
    fn position(&self) -> WorldPoint;

    /// Moves the device so its view starts at `position`.
    fn set_position(&mut self, position: WorldPoint) -> Result<()>;

    /// Renders the current view and returns a tile-size pixel buffer.
    fn render_and_readback(&mut self) -> Result<Pixels>;
}

/// Renders views of a large source image.
///
/// One world unit is one pixel. The world origin is the bottom-left corner of
/// the source image and Y grows upward; the device position is the
/// bottom-left corner of its view. Anything outside the image is transparent.
pub struct ImageScene {
    scene: Pixels,
    viewport: TileSize,
    position: WorldPoint,
}

impl ImageScene {
    pub fn new(scene: Pixels, viewport: TileSize, position: WorldPoint) -> Self {
        Self {
            scene,
            viewport,
            position,
        }
    }

    /// Loads the scene from an image file.
    pub fn open(path: &Path, viewport: TileSize, position: WorldPoint) -> Result<Self> {
        let position = position.validate("camera")?;
        let scene = image::open(path)
            .context(format!("Failed to open scene image: {}", path.display()))?
            .to_rgba8();
        crate::log(&format!(
            "Scene loaded: {} ({}x{})",
            path.display(),
            scene.width(),
            scene.height()
        ));
        Ok(Self::new(scene, viewport, position))
    }
}

impl TileRenderer for ImageScene {
    fn position(&self) -> WorldPoint {
        self.position
    }

    fn set_position(&mut self, position: WorldPoint) -> Result<()> {
        self.position = position.validate("device")?;
        Ok(())
    }

    fn render_and_readback(&mut self) -> Result<Pixels> {
        let (scene_width, scene_height) = self.scene.dimensions();
        let TileSize { width, height } = self.viewport;
        let view = self.position.round();

        // Image row of the view's top edge
        let left = view.x;
        let top = scene_height as i64 - view.y - height as i64;

        Ok(ImageBuffer::from_fn(width, height, |x, y| {
            let sx = left + x as i64;
            let sy = top + y as i64;
            if sx < 0 || sy < 0 || sx >= scene_width as i64 || sy >= scene_height as i64 {
                Rgba([0, 0, 0, 0])
            } else {
                *self.scene.get_pixel(sx as u32, sy as u32)
            }
        }))
    }
}
