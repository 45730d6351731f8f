//! Fixed handicap stone placement

use crate::board::{Board, Cell, Color};

/// Star points as `(column, row)` in placement priority: the four corners
/// first, then the side points, then the center.
fn star_points(size: usize) -> Option<[(usize, usize); 9]> {
    match size {
        9 => Some([
            (2, 6),
            (6, 2),
            (2, 2),
            (6, 6),
            (2, 4),
            (6, 4),
            (4, 2),
            (4, 6),
            (4, 4),
        ]),
        13 => Some([
            (3, 9),
            (9, 3),
            (3, 3),
            (9, 9),
            (3, 6),
            (9, 6),
            (6, 3),
            (6, 9),
            (6, 6),
        ]),
        19 => Some([
            (3, 15),
            (15, 3),
            (3, 3),
            (15, 15),
            (3, 9),
            (15, 9),
            (9, 3),
            (9, 15),
            (9, 9),
        ]),
        _ => None,
    }
}

/// Which star points are used for 2 through 9 stones. Odd counts from five
/// upward include the center.
const SELECTION_ORDER: [&[usize]; 8] = [
    &[0, 1],
    &[0, 1, 2],
    &[0, 1, 2, 3],
    &[0, 1, 2, 3, 8],
    &[0, 1, 2, 3, 4, 5],
    &[0, 1, 2, 3, 4, 5, 8],
    &[0, 1, 2, 3, 4, 5, 6, 7],
    &[0, 1, 2, 3, 4, 5, 6, 7, 8],
];

/// Board indices for `stones` handicap stones on a board of `size`.
///
/// Fewer than two stones places nothing; counts above nine are clamped.
pub fn placements(size: usize, stones: u8) -> Vec<usize> {
    let stones = usize::from(stones.min(9));
    let Some(points) = star_points(size) else {
        return Vec::new();
    };
    if stones < 2 {
        return Vec::new();
    }

    SELECTION_ORDER[stones - 2]
        .iter()
        .map(|&slot| {
            let (x, y) = points[slot];
            y * size + x
        })
        .collect()
}

/// Puts black stones on every placement and returns the indices used.
pub fn place(board: &mut Board, stones: u8) -> Vec<usize> {
    let indices = placements(board.size(), stones);
    for &index in &indices {
        board.set(index, Cell::Stone(Color::Black));
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_stones_below_two() {
        assert!(placements(19, 0).is_empty());
        assert!(placements(19, 1).is_empty());
    }

    #[test]
    fn test_two_stones_on_19() {
        assert_eq!(placements(19, 2), vec![15 * 19 + 3, 3 * 19 + 15]);
    }

    #[test]
    fn test_five_stones_include_center() {
        let indices = placements(9, 5);
        assert_eq!(indices.len(), 5);
        assert_eq!(*indices.last().unwrap(), 4 * 9 + 4);
    }

    #[test]
    fn test_count_is_clamped() {
        assert_eq!(placements(13, 200).len(), 9);
    }

    #[test]
    fn test_placements_are_distinct_and_in_bounds() {
        for size in [9, 13, 19] {
            for stones in 2..=9 {
                let indices = placements(size, stones);
                assert_eq!(indices.len(), stones as usize);
                let mut unique = indices.clone();
                unique.sort_unstable();
                unique.dedup();
                assert_eq!(unique.len(), indices.len());
                assert!(indices.iter().all(|&i| i < size * size));
            }
        }
    }

    #[test]
    fn test_place_sets_black_stones() {
        let mut board = Board::new(9);
        let used = place(&mut board, 4);
        assert_eq!(used.len(), 4);
        assert_eq!(board.stone_count(Color::Black), 4);
        assert_eq!(board.stone_count(Color::White), 0);
    }
}
