//! Board primitives: stone colors, cell occupancy and the flattened grid
//!
//! The board is stored row-major as `size * size` cells. Every rules
//! question the game asks (groups, liberties, territory) is answered by a
//! flood fill over this grid, so the traversal helpers live here and the
//! game-level rules in [`crate::game`] stay free of index arithmetic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Board sizes a game may be created with.
pub const BOARD_SIZES: [usize; 3] = [9, 13, 19];

/// The color of a stone or of a seated player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::Black => write!(f, "black"),
            Color::White => write!(f, "white"),
        }
    }
}

/// Occupancy of a single intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    #[default]
    Empty,
    Stone(Color),
}

impl Cell {
    pub fn is_empty(self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn color(self) -> Option<Color> {
        match self {
            Cell::Empty => None,
            Cell::Stone(color) => Some(color),
        }
    }
}

/// A connected set of same-colored stones and the empty points touching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub color: Color,
    pub stones: Vec<usize>,
    pub liberties: usize,
}

/// An empty region found by the territory flood fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Set only when every stone bordering the region has the same color.
    pub owner: Option<Color>,
    pub points: Vec<usize>,
}

/// Square Go board with row-major cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    size: usize,
    cells: Vec<Cell>,
}

impl Board {
    /// Creates an empty board. Callers validate `size` against [`BOARD_SIZES`].
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![Cell::Empty; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|cell| cell.is_empty())
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.cells.len()
    }

    pub fn get(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Converts column/row coordinates into a flat index.
    pub fn index_of(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.size && y < self.size).then(|| y * self.size + x)
    }

    pub fn set(&mut self, index: usize, cell: Cell) {
        if let Some(slot) = self.cells.get_mut(index) {
            *slot = cell;
        }
    }

    /// Orthogonal neighbors of `index`, never wrapping across row edges.
    pub fn neighbors(&self, index: usize) -> impl Iterator<Item = usize> {
        let size = self.size;
        let (x, y) = (index % size, index / size);
        let up = (y > 0).then(|| index - size);
        let down = (y + 1 < size).then(|| index + size);
        let left = (x > 0).then(|| index - 1);
        let right = (x + 1 < size).then(|| index + 1);
        [up, down, left, right].into_iter().flatten()
    }

    /// Flood fills the group containing `seed`.
    ///
    /// Returns `None` when `seed` is empty or out of bounds. Liberties are
    /// counted once per distinct empty point.
    pub fn group_at(&self, seed: usize) -> Option<Group> {
        let color = self.get(seed)?.color()?;
        let mut visited = vec![false; self.cells.len()];
        let mut liberties = BTreeSet::new();
        let mut stones = Vec::new();
        let mut stack = vec![seed];
        visited[seed] = true;

        while let Some(current) = stack.pop() {
            stones.push(current);
            for neighbor in self.neighbors(current) {
                match self.cells[neighbor] {
                    Cell::Empty => {
                        liberties.insert(neighbor);
                    }
                    Cell::Stone(c) if c == color && !visited[neighbor] => {
                        visited[neighbor] = true;
                        stack.push(neighbor);
                    }
                    Cell::Stone(_) => {}
                }
            }
        }

        Some(Group {
            color,
            stones,
            liberties: liberties.len(),
        })
    }

    /// Empties every point of `stones` and returns how many stones were removed.
    pub fn remove_stones(&mut self, stones: &[usize]) -> usize {
        let mut removed = 0;
        for &index in stones {
            if let Some(slot) = self.cells.get_mut(index) {
                if !slot.is_empty() {
                    *slot = Cell::Empty;
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Places `color` at `index` and removes every adjacent opposing group
    /// left without liberties. Returns the number of stones captured.
    ///
    /// Legality is the caller's concern; this only performs the mutation.
    pub fn place_and_capture(&mut self, index: usize, color: Color) -> usize {
        self.set(index, Cell::Stone(color));

        let opponent = color.opposite();
        let mut captured = 0;
        let neighbors: Vec<usize> = self.neighbors(index).collect();
        for neighbor in neighbors {
            if self.get(neighbor) != Some(Cell::Stone(opponent)) {
                continue;
            }
            if let Some(group) = self.group_at(neighbor) {
                if group.liberties == 0 {
                    captured += self.remove_stones(&group.stones);
                }
            }
        }
        captured
    }

    pub fn stone_count(&self, color: Color) -> usize {
        self.cells
            .iter()
            .filter(|cell| **cell == Cell::Stone(color))
            .count()
    }

    /// Partitions every empty point into connected regions and records which
    /// color, if only one, borders each of them.
    pub fn empty_regions(&self) -> Vec<Region> {
        let mut visited = vec![false; self.cells.len()];
        let mut regions = Vec::new();

        for start in 0..self.cells.len() {
            if visited[start] || !self.cells[start].is_empty() {
                continue;
            }

            let mut points = Vec::new();
            let mut borders = BTreeSet::new();
            let mut stack = vec![start];
            visited[start] = true;

            while let Some(current) = stack.pop() {
                points.push(current);
                for neighbor in self.neighbors(current) {
                    match self.cells[neighbor] {
                        Cell::Empty if !visited[neighbor] => {
                            visited[neighbor] = true;
                            stack.push(neighbor);
                        }
                        Cell::Empty => {}
                        Cell::Stone(color) => {
                            borders.insert(color);
                        }
                    }
                }
            }

            let owner = if borders.len() == 1 {
                borders.into_iter().next()
            } else {
                None
            };
            regions.push(Region { owner, points });
        }

        regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with(size: usize, stones: &[(usize, Color)]) -> Board {
        let mut board = Board::new(size);
        for &(index, color) in stones {
            board.set(index, Cell::Stone(color));
        }
        board
    }

    #[test]
    fn test_new_board_is_empty() {
        let board = Board::new(9);
        assert_eq!(board.len(), 81);
        assert_eq!(board.size(), 9);
        assert!(board.is_empty());
    }

    #[test]
    fn test_color_opposite() {
        assert_eq!(Color::Black.opposite(), Color::White);
        assert_eq!(Color::White.opposite(), Color::Black);
    }

    #[test]
    fn test_neighbors_do_not_wrap() {
        let board = Board::new(9);

        let corner: BTreeSet<usize> = board.neighbors(0).collect();
        assert_eq!(corner, BTreeSet::from([1, 9]));

        // Right edge of the first row must not reach the start of the second
        let edge: BTreeSet<usize> = board.neighbors(8).collect();
        assert_eq!(edge, BTreeSet::from([7, 17]));

        let center: BTreeSet<usize> = board.neighbors(40).collect();
        assert_eq!(center, BTreeSet::from([31, 39, 41, 49]));
    }

    #[test]
    fn test_group_liberties() {
        let board = board_with(9, &[(10, Color::Black), (11, Color::Black)]);
        let group = board.group_at(10).unwrap();

        assert_eq!(group.color, Color::Black);
        assert_eq!(group.stones.len(), 2);
        assert_eq!(group.liberties, 6);
        assert!(board.group_at(0).is_none());
    }

    #[test]
    fn test_shared_liberty_counted_once() {
        // Point 10 touches both 1 and 9 but is a single liberty
        let board = board_with(9, &[(0, Color::Black), (1, Color::Black), (9, Color::Black)]);
        let group = board.group_at(0).unwrap();
        assert_eq!(group.liberties, 3);
    }

    #[test]
    fn test_place_and_capture_removes_surrounded_group() {
        let mut board = board_with(
            9,
            &[
                (10, Color::Black),
                (1, Color::White),
                (9, Color::White),
                (11, Color::White),
            ],
        );

        let captured = board.place_and_capture(19, Color::White);
        assert_eq!(captured, 1);
        assert_eq!(board.get(10), Some(Cell::Empty));
        assert_eq!(board.stone_count(Color::White), 4);
    }

    #[test]
    fn test_empty_regions_owner() {
        // Black wall on column 2 splits the left edge off as black territory
        let stones: Vec<(usize, Color)> = (0..9).map(|y| (y * 9 + 2, Color::Black)).collect();
        let board = board_with(9, &stones);

        let regions = board.empty_regions();
        assert_eq!(regions.len(), 2);

        let left = regions.iter().find(|r| r.points.contains(&0)).unwrap();
        assert_eq!(left.owner, Some(Color::Black));
        assert_eq!(left.points.len(), 18);
    }

    #[test]
    fn test_contested_region_is_neutral() {
        let board = board_with(9, &[(0, Color::Black), (80, Color::White)]);
        let regions = board.empty_regions();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].owner, None);
    }

    #[test]
    fn test_index_of() {
        let board = Board::new(19);
        assert_eq!(board.index_of(3, 15), Some(15 * 19 + 3));
        assert_eq!(board.index_of(19, 0), None);
    }
}
