//! Tile-grid planning.
//!
//! This module provides:
//! - Grid plan computation (`plan`)
//! - Tile enumeration in capture order (`Tiles`)

pub mod planner;
pub mod tiles;

pub use planner::{plan, GridPlan, GridPoint, TileSize, WorldPoint};
pub use tiles::{Tile, Tiles};
