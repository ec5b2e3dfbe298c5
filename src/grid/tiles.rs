//! Row-major tile enumeration.

use serde::{Deserialize, Serialize};

/// Grid index of one tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub index_x: u32,
    pub index_y: u32,
}

impl std::fmt::Display for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.index_x, self.index_y)
    }
}

/// Iterator over every tile of a plan: all of row 0, then row 1, and so on.
#[derive(Clone, Debug)]
pub struct Tiles {
    steps_x: u32,
    steps_y: u32,
    next_x: u32,
    next_y: u32,
}

impl Tiles {
    pub(crate) fn new(steps_x: u32, steps_y: u32) -> Self {
        Self {
            steps_x,
            steps_y,
            next_x: 0,
            next_y: 0,
        }
    }

    fn remaining(&self) -> u64 {
        if self.steps_x == 0 || self.next_y >= self.steps_y {
            return 0;
        }
        let full_rows = (self.steps_y - self.next_y - 1) as u64;
        full_rows * self.steps_x as u64 + (self.steps_x - self.next_x) as u64
    }
}

impl Iterator for Tiles {
    type Item = Tile;

    fn next(&mut self) -> Option<Tile> {
        if self.steps_x == 0 || self.next_y >= self.steps_y {
            return None;
        }

        let tile = Tile {
            index_x: self.next_x,
            index_y: self.next_y,
        };

        self.next_x += 1;
        if self.next_x == self.steps_x {
            self.next_x = 0;
            self.next_y += 1;
        }

        Some(tile)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining()) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(tiles: Tiles) -> Vec<(u32, u32)> {
        tiles.map(|t| (t.index_x, t.index_y)).collect()
    }

    #[test]
    fn test_row_major_order() {
        assert_eq!(
            indices(Tiles::new(3, 2)),
            vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]
        );
    }

    #[test]
    fn test_single_tile() {
        assert_eq!(indices(Tiles::new(1, 1)), vec![(0, 0)]);
    }

    #[test]
    fn test_empty_grid() {
        assert!(indices(Tiles::new(0, 4)).is_empty());
        assert!(indices(Tiles::new(4, 0)).is_empty());
    }

    #[test]
    fn test_size_hint_tracks_progress() {
        let mut tiles = Tiles::new(3, 2);
        assert_eq!(tiles.size_hint(), (6, Some(6)));
        tiles.next();
        tiles.next();
        tiles.next();
        assert_eq!(tiles.size_hint(), (3, Some(3)));
        tiles.by_ref().for_each(drop);
        assert_eq!(tiles.size_hint(), (0, Some(0)));
    }
}
