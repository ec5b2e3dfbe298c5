//! Host display resolution handling.

use anyhow::Result;

use crate::grid::TileSize;

/// The host display the capture device renders into.
pub trait Screen {
    fn resolution(&self) -> (u32, u32);
    fn set_resolution(&mut self, width: u32, height: u32) -> Result<()>;
}

/// A display with no real output; remembers the last resolution set.
#[derive(Clone, Debug)]
pub struct HeadlessScreen {
    width: u32,
    height: u32,
}

impl HeadlessScreen {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Screen for HeadlessScreen {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        Ok(())
    }
}

/// Resizes the screen to the tile size if they differ.
///
/// Returns `true` when a resize happened. Call once at setup, not per tile.
pub fn match_tile_resolution(screen: &mut impl Screen, tile: TileSize) -> Result<bool> {
    let (width, height) = screen.resolution();
    if (width, height) == (tile.width, tile.height) {
        return Ok(false);
    }

    crate::log(&format!(
        "Display {}x{} does not match tile {}, resizing",
        width, height, tile
    ));
    screen.set_resolution(tile.width, tile.height)?;
    Ok(true)
}
