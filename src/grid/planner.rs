//! Grid planning: how many tiles a scan needs and how large the canvas is.
//!
//! Start points are rounded to the nearest integer (ties to even), end points
//! are rounded up. The distance between them is padded by half a tile and
//! then counted in whole tiles, so an end point at least half a tile past a
//! tile boundary gets one more tile.

use serde::{Deserialize, Serialize};

use crate::error::CaptureError;
use crate::grid::tiles::{Tile, Tiles};

/// Largest coordinate magnitude accepted for markers and device positions.
pub const MAX_COORDINATE: f64 = 1.0e9;

/// Largest canvas a plan may allocate, in bytes of RGBA pixels (2 GiB).
pub const MAX_CANVAS_BYTES: u64 = 1 << 31;

/// Size of one tile in pixels (the render viewport).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSize {
    pub width: u32,
    pub height: u32,
}

impl TileSize {
    /// Builds a tile size from signed configuration values.
    ///
    /// Non-positive dimensions are rejected with `InvalidConfiguration`.
    pub fn new(width: i64, height: i64) -> Result<Self, CaptureError> {
        let width = u32::try_from(width)
            .ok()
            .filter(|w| *w > 0)
            .ok_or_else(|| invalid_dimension("width", width))?;
        let height = u32::try_from(height)
            .ok()
            .filter(|h| *h > 0)
            .ok_or_else(|| invalid_dimension("height", height))?;
        Ok(Self { width, height })
    }

    fn validate(&self) -> Result<(), CaptureError> {
        if self.width == 0 {
            return Err(invalid_dimension("width", 0));
        }
        if self.height == 0 {
            return Err(invalid_dimension("height", 0));
        }
        Ok(())
    }
}

impl std::fmt::Display for TileSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn invalid_dimension(axis: &str, value: i64) -> CaptureError {
    CaptureError::InvalidConfiguration(format!("tile {} must be positive, got {}", axis, value))
}

/// A position in world units (one unit = one pixel, Y up).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl WorldPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Checks that both components are finite and within `MAX_COORDINATE`.
    pub fn validate(self, name: &str) -> Result<Self, CaptureError> {
        let in_range = |v: f64| v.is_finite() && v.abs() <= MAX_COORDINATE;
        if in_range(self.x) && in_range(self.y) {
            Ok(self)
        } else {
            Err(CaptureError::InvalidConfiguration(format!(
                "{} position ({}, {}) is outside +/-{}",
                name, self.x, self.y, MAX_COORDINATE
            )))
        }
    }

    /// Rounds both components to the nearest integer, ties to even.
    pub fn round(self) -> GridPoint {
        GridPoint {
            x: self.x.round_ties_even() as i64,
            y: self.y.round_ties_even() as i64,
        }
    }

    /// Rounds both components up.
    pub fn ceil(self) -> GridPoint {
        GridPoint {
            x: self.x.ceil() as i64,
            y: self.y.ceil() as i64,
        }
    }
}

/// An integral world position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i64,
    pub y: i64,
}

impl GridPoint {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl From<GridPoint> for WorldPoint {
    fn from(p: GridPoint) -> Self {
        WorldPoint::new(p.x as f64, p.y as f64)
    }
}

/// Tile counts and canvas dimensions for one capture session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPlan {
    pub tile: TileSize,
    pub steps_x: u32,
    pub steps_y: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl GridPlan {
    /// Bytes needed for the RGBA canvas, `None` on overflow.
    pub fn canvas_bytes(&self) -> Option<u64> {
        (self.canvas_width as u64)
            .checked_mul(self.canvas_height as u64)?
            .checked_mul(4)
    }

    /// Rejects plans with an empty tile or a canvas over `MAX_CANVAS_BYTES`.
    pub fn validate(&self) -> Result<(), CaptureError> {
        self.tile.validate()?;
        match self.canvas_bytes() {
            Some(bytes) if bytes <= MAX_CANVAS_BYTES => Ok(()),
            _ => Err(CaptureError::InvalidConfiguration(format!(
                "canvas {}x{} exceeds the {} byte limit",
                self.canvas_width, self.canvas_height, MAX_CANVAS_BYTES
            ))),
        }
    }

    /// Total number of tiles in the plan.
    pub fn tile_count(&self) -> u64 {
        self.steps_x as u64 * self.steps_y as u64
    }

    /// Tiles in capture order: row by row from the bottom, left to right.
    pub fn tiles(&self) -> Tiles {
        Tiles::new(self.steps_x, self.steps_y)
    }

    /// World position the device moves to for `tile`.
    pub fn world_position(&self, origin: GridPoint, tile: Tile) -> GridPoint {
        GridPoint {
            x: origin.x + tile.index_x as i64 * self.tile.width as i64,
            y: origin.y + tile.index_y as i64 * self.tile.height as i64,
        }
    }

    /// Offset of `tile` in the canvas, measured from the canvas's bottom-left corner.
    pub fn canvas_offset(&self, tile: Tile) -> (u32, u32) {
        (
            tile.index_x * self.tile.width,
            tile.index_y * self.tile.height,
        )
    }
}

/// Computes the grid plan for a scan from `start` towards `end`.
///
/// Without an end point the scan is a single tile.
pub fn plan(
    tile: TileSize,
    start: WorldPoint,
    end: Option<WorldPoint>,
) -> Result<GridPlan, CaptureError> {
    tile.validate()?;
    let start = start.validate("start")?.round();

    let (steps_x, steps_y) = match end {
        None => (1, 1),
        Some(end) => {
            let end = end.validate("end")?.ceil();
            (
                steps_for_span(end.x as i128 - start.x as i128, tile.width)?,
                steps_for_span(end.y as i128 - start.y as i128, tile.height)?,
            )
        }
    };

    let canvas_width = steps_x
        .checked_mul(tile.width)
        .ok_or_else(|| too_large("width", steps_x, tile.width))?;
    let canvas_height = steps_y
        .checked_mul(tile.height)
        .ok_or_else(|| too_large("height", steps_y, tile.height))?;

    let plan = GridPlan {
        tile,
        steps_x,
        steps_y,
        canvas_width,
        canvas_height,
    };
    plan.validate()?;
    Ok(plan)
}

/// Whole tiles in `distance + tile / 2`, at least one.
///
/// Evaluated as `floor((2 * distance + tile) / (2 * tile))` so half tiles of
/// odd sizes stay exact.
fn steps_for_span(distance: i128, tile: u32) -> Result<u32, CaptureError> {
    let tile = tile as i128;
    let steps = (2 * distance + tile).div_euclid(2 * tile).max(1);
    u32::try_from(steps).map_err(|_| {
        CaptureError::InvalidConfiguration(format!(
            "scan distance {} needs {} tiles, which is too many",
            distance, steps
        ))
    })
}

fn too_large(axis: &str, steps: u32, tile: u32) -> CaptureError {
    CaptureError::InvalidConfiguration(format!(
        "canvas {} of {} tiles x {} px does not fit in 32 bits",
        axis, steps, tile
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(w: u32, h: u32) -> TileSize {
        TileSize {
            width: w,
            height: h,
        }
    }

    #[test]
    fn test_no_end_marker_is_single_tile() {
        for (w, h) in [(1, 1), (640, 480), (800, 600), (1921, 7)] {
            let plan = plan(size(w, h), WorldPoint::new(12.4, -3.6), None).unwrap();
            assert_eq!((plan.steps_x, plan.steps_y), (1, 1));
            assert_eq!((plan.canvas_width, plan.canvas_height), (w, h));
        }
    }

    #[test]
    fn test_end_one_tile_past_start_fits_one_step() {
        let plan = plan(
            size(800, 600),
            WorldPoint::new(0.0, 0.0),
            Some(WorldPoint::new(800.0, 600.0)),
        )
        .unwrap();
        assert_eq!((plan.steps_x, plan.steps_y), (1, 1));
    }

    #[test]
    fn test_half_tile_boundary() {
        let tile = size(800, 600);
        let start = WorldPoint::new(0.0, 0.0);

        // Just under half a tile past the first boundary
        let under = plan(tile, start, Some(WorldPoint::new(1199.0, 899.0))).unwrap();
        assert_eq!((under.steps_x, under.steps_y), (1, 1));

        // Exactly half a tile past: prefer the extra tile
        let over = plan(tile, start, Some(WorldPoint::new(1200.0, 900.0))).unwrap();
        assert_eq!((over.steps_x, over.steps_y), (2, 2));
    }

    #[test]
    fn test_two_tiles_wide() {
        let plan = plan(
            size(800, 600),
            WorldPoint::new(0.0, 0.0),
            Some(WorldPoint::new(1600.0, 600.0)),
        )
        .unwrap();
        assert_eq!((plan.steps_x, plan.steps_y), (2, 1));
        assert_eq!((plan.canvas_width, plan.canvas_height), (1600, 600));
    }

    #[test]
    fn test_rounding_of_markers() {
        // Start 0.5 rounds to 0 (ties to even), end 1199.2 rounds up to 1200
        let plan = plan(
            size(800, 600),
            WorldPoint::new(0.5, 0.5),
            Some(WorldPoint::new(1199.2, 10.0)),
        )
        .unwrap();
        assert_eq!(plan.steps_x, 2);

        // Start 1.5 rounds to 2, pushing the span back under the half tile
        let plan2 = plan_at(WorldPoint::new(1.5, 0.0), WorldPoint::new(1201.0, 10.0));
        assert_eq!(plan2.steps_x, 1);
    }

    fn plan_at(start: WorldPoint, end: WorldPoint) -> GridPlan {
        plan(size(800, 600), start, Some(end)).unwrap()
    }

    #[test]
    fn test_end_behind_start_clamps_to_one() {
        let plan = plan_at(WorldPoint::new(5000.0, 5000.0), WorldPoint::new(0.0, 0.0));
        assert_eq!((plan.steps_x, plan.steps_y), (1, 1));
        assert_eq!((plan.canvas_width, plan.canvas_height), (800, 600));
    }

    #[test]
    fn test_odd_tile_half_is_exact() {
        // tile 3: half tile is 1.5, so distance 4 pads to 5.5 -> 1 tile, 5 pads to 6.5 -> 2
        let tile = size(3, 3);
        let start = WorldPoint::new(0.0, 0.0);
        assert_eq!(plan(tile, start, Some(WorldPoint::new(4.0, 0.0))).unwrap().steps_x, 1);
        assert_eq!(plan(tile, start, Some(WorldPoint::new(5.0, 0.0))).unwrap().steps_x, 2);
    }

    #[test]
    fn test_canvas_is_steps_times_tile() {
        let start = WorldPoint::new(-37.0, 12.0);
        for (w, h) in [(1, 1), (7, 13), (640, 480), (800, 600)] {
            for end in [(0.0, 0.0), (100.0, 250.0), (5000.3, 4000.7), (-900.0, 2.0)] {
                let plan = plan(size(w, h), start, Some(WorldPoint::new(end.0, end.1))).unwrap();
                assert_eq!(plan.canvas_width, plan.steps_x * w);
                assert_eq!(plan.canvas_height, plan.steps_y * h);
                assert!(plan.steps_x >= 1 && plan.steps_y >= 1);
            }
        }
    }

    #[test]
    fn test_zero_tile_is_invalid_configuration() {
        let err = plan(size(0, 600), WorldPoint::default(), None).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidConfiguration(_)));
        let err = plan(size(800, 0), WorldPoint::default(), None).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_tile_size_new_rejects_non_positive() {
        assert!(TileSize::new(800, 600).is_ok());
        assert!(matches!(
            TileSize::new(-1, 600),
            Err(CaptureError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            TileSize::new(800, 0),
            Err(CaptureError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_oversized_canvas_is_invalid_configuration() {
        // 100000 x 100000 one-pixel tiles need 40 GB of RGBA
        let err = plan(
            size(1, 1),
            WorldPoint::new(0.0, 0.0),
            Some(WorldPoint::new(100_000.0, 100_000.0)),
        )
        .unwrap_err();
        assert!(matches!(err, CaptureError::InvalidConfiguration(_)));

        // Just under the cap still plans
        let plan = plan(
            size(1, 1),
            WorldPoint::new(0.0, 0.0),
            Some(WorldPoint::new(16_384.0, 16_384.0)),
        )
        .unwrap();
        assert_eq!(plan.canvas_bytes(), Some(16_384 * 16_384 * 4));
    }

    #[test]
    fn test_far_markers_are_invalid_configuration() {
        let far = [
            (WorldPoint::new(-1e300, 0.0), WorldPoint::new(0.0, 0.0)),
            (WorldPoint::new(0.0, 0.0), WorldPoint::new(0.0, 4e9)),
            (WorldPoint::new(f64::NAN, 0.0), WorldPoint::new(0.0, 0.0)),
        ];
        for (start, end) in far {
            let err = plan(size(800, 600), start, Some(end)).unwrap_err();
            assert!(matches!(err, CaptureError::InvalidConfiguration(_)));
        }
        // A far start is rejected even without an end marker
        assert!(plan(size(800, 600), WorldPoint::new(0.0, -1e19), None).is_err());
    }

    #[test]
    fn test_plan_validate_rejects_hand_built_plans() {
        let mut plan = plan_at(WorldPoint::new(0.0, 0.0), WorldPoint::new(800.0, 600.0));
        assert!(plan.validate().is_ok());
        plan.canvas_width = u32::MAX;
        plan.canvas_height = u32::MAX;
        assert_eq!(plan.canvas_bytes(), None);
        assert!(matches!(
            plan.validate(),
            Err(CaptureError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let a = plan_at(WorldPoint::new(3.3, 4.4), WorldPoint::new(2000.0, 1500.0));
        let b = plan_at(WorldPoint::new(3.3, 4.4), WorldPoint::new(2000.0, 1500.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_world_position_and_offset() {
        let plan = plan_at(WorldPoint::new(10.0, 20.0), WorldPoint::new(1600.0, 600.0));
        let origin = GridPoint::new(10, 20);
        let tile = Tile {
            index_x: 1,
            index_y: 0,
        };
        assert_eq!(plan.world_position(origin, tile), GridPoint::new(810, 20));
        assert_eq!(plan.canvas_offset(tile), (800, 0));
    }
}
