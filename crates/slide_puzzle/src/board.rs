use std::fmt::{self, Display, Formatter};

use bevy::prelude::*;
use thiserror::Error;

/// Fatal configuration errors. Both abort setup before any tile exists.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    #[error("board must be at least 3x3, got {columns}x{rows}")]
    GridTooSmall { columns: usize, rows: usize },
    #[error("no board bounds configured")]
    MissingBounds,
}

/// Immutable slot geometry: one centered rectangle per grid slot,
/// tiling the configured area minus the spacing gaps.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct BoardLayout {
    columns: usize,
    rows: usize,
    cell: Vec2,
    centers: Vec<Vec2>,
}

impl BoardLayout {
    /// Slices `area` into `columns` x `rows` cells separated by `spacing`,
    /// left to right and top to bottom.
    pub fn build(
        area: Option<Rect>,
        columns: usize,
        rows: usize,
        spacing: f32,
    ) -> Result<Self, BoardError> {
        let area = area.ok_or(BoardError::MissingBounds)?;
        if columns < 3 || rows < 3 {
            return Err(BoardError::GridTooSmall { columns, rows });
        }

        let cell = Vec2::new(
            (area.width() - spacing * (columns - 1) as f32) / columns as f32,
            (area.height() - spacing * (rows - 1) as f32) / rows as f32,
        );
        // Top-left slot first, y flipped so row 0 sits at the top of the area.
        let first = Vec2::new(area.min.x + cell.x / 2.0, area.max.y - cell.y / 2.0);

        let mut centers = Vec::with_capacity(columns * rows);
        for row in 0..rows {
            for column in 0..columns {
                centers.push(Vec2::new(
                    (column as f32).mul_add(cell.x + spacing, first.x),
                    (-(row as f32)).mul_add(cell.y + spacing, first.y),
                ));
            }
        }

        Ok(Self {
            columns,
            rows,
            cell,
            centers,
        })
    }

    pub const fn columns(&self) -> usize {
        self.columns
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub fn slot_count(&self) -> usize {
        self.centers.len()
    }

    pub const fn cell(&self) -> Vec2 {
        self.cell
    }

    pub const fn slot_index(&self, row: usize, column: usize) -> usize {
        row * self.columns + column
    }

    pub fn slot_center(&self, slot: usize) -> Option<Vec2> {
        self.centers.get(slot).copied()
    }

    /// Source-image sub-rectangle for a slot, in pixels with a top-left
    /// origin, so that the full picture is split proportionally.
    pub fn image_rect(&self, slot: usize, image_size: Vec2) -> Option<Rect> {
        if slot >= self.centers.len() {
            return None;
        }
        let tile = Vec2::new(
            image_size.x / self.columns as f32,
            image_size.y / self.rows as f32,
        );
        let column = (slot % self.columns) as f32;
        let row = (slot / self.columns) as f32;
        Some(Rect::new(
            column * tile.x,
            row * tile.y,
            (column + 1.0) * tile.x,
            (row + 1.0) * tile.y,
        ))
    }
}

/// Mutable board state: which tile sits in which slot, and where each
/// tile currently is. Tile ids double as home slot indices, so the
/// slot -> tile table stays a checkable bijection over `0..slot_count`.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct PuzzleBoard {
    columns: usize,
    rows: usize,
    cell: Vec2,
    /// Slot index -> immutable initial center, fixed at layout time.
    initial: Vec<Vec2>,
    /// Slot index -> tile id.
    tiles: Vec<usize>,
    /// Tile id -> current position.
    positions: Vec<Vec2>,
}

impl PuzzleBoard {
    pub fn from_layout(layout: &BoardLayout) -> Self {
        Self {
            columns: layout.columns,
            rows: layout.rows,
            cell: layout.cell,
            initial: layout.centers.clone(),
            tiles: (0..layout.centers.len()).collect(),
            positions: layout.centers.clone(),
        }
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub const fn cell(&self) -> Vec2 {
        self.cell
    }

    pub fn tile_at(&self, slot: usize) -> Option<usize> {
        self.tiles.get(slot).copied()
    }

    pub fn slot_of_tile(&self, tile: usize) -> Option<usize> {
        self.tiles.iter().position(|&t| t == tile)
    }

    pub fn initial_position(&self, slot: usize) -> Option<Vec2> {
        self.initial.get(slot).copied()
    }

    /// Position of the tile currently occupying `slot`.
    pub fn current_position(&self, slot: usize) -> Option<Vec2> {
        self.tiles
            .get(slot)
            .and_then(|&tile| self.positions.get(tile))
            .copied()
    }

    pub fn tile_position(&self, tile: usize) -> Option<Vec2> {
        self.positions.get(tile).copied()
    }

    /// One-time randomization: assigns a uniformly random remaining tile
    /// to each slot in scan order (sampling without replacement), then
    /// parks every tile at its new slot's initial position. May leave
    /// the board solved; the identity permutation is not excluded.
    pub fn shuffle(&mut self, rng: &mut fastrand::Rng) {
        let mut pool: Vec<usize> = (0..self.tiles.len()).collect();
        for slot in 0..self.tiles.len() {
            let tile = pool.remove(rng.usize(..pool.len()));
            if let Some(entry) = self.tiles.get_mut(slot) {
                *entry = tile;
            }
            self.settle(slot);
        }
    }

    /// Exchanges the tiles of two slots and parks both at their new
    /// slots' positions. Swapping the same pair twice is a no-op overall.
    pub fn swap_slots(&mut self, a: usize, b: usize) {
        if a == b || a >= self.tiles.len() || b >= self.tiles.len() {
            return;
        }
        self.tiles.swap(a, b);
        self.settle(a);
        self.settle(b);
    }

    fn settle(&mut self, slot: usize) {
        let (Some(&tile), Some(&center)) = (self.tiles.get(slot), self.initial.get(slot)) else {
            return;
        };
        if let Some(position) = self.positions.get_mut(tile) {
            *position = center;
        }
    }

    /// First slot in row-major order, other than `dragged_slot`, whose
    /// occupant sits within half a cell width of `at`. At most one per
    /// call, so the caller gets at most one swap per frame.
    pub fn find_swap_target(&self, dragged_slot: usize, at: Vec2) -> Option<usize> {
        let threshold = self.cell.x / 2.0;
        (0..self.tiles.len()).find(|&slot| {
            slot != dragged_slot
                && self
                    .current_position(slot)
                    .is_some_and(|center| center.distance(at) < threshold)
        })
    }

    /// True iff every tile sits exactly at its home slot's initial
    /// position. Exact equality, no tolerance.
    pub fn is_solved(&self) -> bool {
        self.positions
            .iter()
            .zip(self.initial.iter())
            .all(|(position, home)| position == home)
    }
}

impl Display for PuzzleBoard {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            for column in 0..self.columns {
                match self.tiles.get(row * self.columns + column) {
                    Some(tile) => write!(f, "{tile:>02} ")?,
                    None => {}
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_area(side: f32) -> Option<Rect> {
        Some(Rect::new(0.0, 0.0, side, side))
    }

    fn layout_3x3() -> BoardLayout {
        BoardLayout::build(square_area(300.0), 3, 3, 0.0).expect("3x3 layout is valid")
    }

    #[test]
    fn three_by_three_layout_geometry() {
        let layout = layout_3x3();
        assert_eq!(layout.slot_count(), 9, "3x3 board has nine slots");
        assert_eq!(layout.cell(), Vec2::new(100.0, 100.0), "cells are 100x100");
        assert_eq!(
            layout.slot_center(0),
            Some(Vec2::new(50.0, 250.0)),
            "top-left slot center"
        );
        assert_eq!(
            layout.slot_center(layout.slot_index(2, 2)),
            Some(Vec2::new(250.0, 50.0)),
            "bottom-right slot center"
        );
    }

    #[test]
    fn layout_tiles_area_without_overlap() {
        let layout = BoardLayout::build(square_area(320.0), 3, 3, 10.0).expect("valid layout");
        assert_eq!(layout.cell(), Vec2::new(100.0, 100.0), "spacing shrinks cells");

        // Neighbouring cell edges are exactly one spacing gap apart, and
        // the outer edges line up with the configured area.
        for row in 0..3 {
            for column in 0..3 {
                let center = layout
                    .slot_center(layout.slot_index(row, column))
                    .expect("slot exists");
                let min = center - layout.cell() / 2.0;
                let max = center + layout.cell() / 2.0;
                assert!(
                    (min.x - column as f32 * 110.0).abs() < 1e-4,
                    "left edge of column {column}"
                );
                assert!(
                    (max.y - (320.0 - row as f32 * 110.0)).abs() < 1e-4,
                    "top edge of row {row}"
                );
            }
        }
        let last = layout
            .slot_center(layout.slot_index(2, 2))
            .expect("slot exists");
        assert!(
            (last + layout.cell() / 2.0 - Vec2::new(320.0, 100.0)).length() < 1e-4,
            "last cell touches the right edge of the area"
        );
    }

    #[test]
    fn image_rects_are_proportional() {
        let layout = layout_3x3();
        let image = Vec2::new(600.0, 450.0);
        assert_eq!(
            layout.image_rect(0, image),
            Some(Rect::new(0.0, 0.0, 200.0, 150.0)),
            "first slot shows the top-left slice"
        );
        assert_eq!(
            layout.image_rect(layout.slot_index(1, 2), image),
            Some(Rect::new(400.0, 150.0, 600.0, 300.0)),
            "middle-right slot shows its proportional slice"
        );
        assert_eq!(layout.image_rect(9, image), None, "out of range slot");
    }

    #[test]
    fn rejects_grids_below_three() {
        assert_eq!(
            BoardLayout::build(square_area(300.0), 2, 3, 0.0),
            Err(BoardError::GridTooSmall { columns: 2, rows: 3 }),
            "two columns are not enough"
        );
        assert_eq!(
            BoardLayout::build(square_area(300.0), 3, 2, 0.0),
            Err(BoardError::GridTooSmall { columns: 3, rows: 2 }),
            "two rows are not enough"
        );
    }

    #[test]
    fn rejects_missing_bounds() {
        assert_eq!(
            BoardLayout::build(None, 3, 3, 0.0),
            Err(BoardError::MissingBounds),
            "layout needs board bounds"
        );
    }

    #[test]
    fn solved_right_after_layout() {
        let board = PuzzleBoard::from_layout(&layout_3x3());
        assert!(board.is_solved(), "untouched board starts solved");
        assert_eq!(board.tile_at(4), Some(4), "tiles start in their home slots");
    }

    #[test]
    fn shuffle_keeps_the_bijection() {
        let layout = BoardLayout::build(square_area(400.0), 4, 3, 0.0).expect("valid layout");
        let mut board = PuzzleBoard::from_layout(&layout);
        let mut rng = fastrand::Rng::with_seed(17);
        board.shuffle(&mut rng);

        let mut seen: Vec<usize> = (0..board.tile_count())
            .filter_map(|slot| board.tile_at(slot))
            .collect();
        seen.sort_unstable();
        let expected: Vec<usize> = (0..board.tile_count()).collect();
        assert_eq!(seen, expected, "every tile occupies exactly one slot");

        for slot in 0..board.tile_count() {
            assert_eq!(
                board.current_position(slot),
                board.initial_position(slot),
                "slot {slot} occupant is parked at the slot center"
            );
        }
    }

    #[test]
    fn shuffle_is_reproducible_for_a_seed() {
        let layout = layout_3x3();
        let mut first = PuzzleBoard::from_layout(&layout);
        let mut second = PuzzleBoard::from_layout(&layout);
        first.shuffle(&mut fastrand::Rng::with_seed(99));
        second.shuffle(&mut fastrand::Rng::with_seed(99));
        assert_eq!(first, second, "same seed, same permutation");
    }

    #[test]
    fn swap_moves_both_tiles() {
        let mut board = PuzzleBoard::from_layout(&layout_3x3());
        board.swap_slots(0, 1);

        assert_eq!(board.tile_at(0), Some(1), "slots traded occupants");
        assert_eq!(board.tile_at(1), Some(0), "slots traded occupants");
        assert_eq!(
            board.tile_position(0),
            board.initial_position(1),
            "tile 0 sits at its new slot"
        );
        assert_eq!(
            board.tile_position(1),
            board.initial_position(0),
            "tile 1 sits at its new slot"
        );
        assert!(!board.is_solved(), "a single swap breaks the solved state");
    }

    #[test]
    fn swap_is_its_own_inverse() {
        let layout = layout_3x3();
        let mut board = PuzzleBoard::from_layout(&layout);
        board.shuffle(&mut fastrand::Rng::with_seed(5));
        let before = board.clone();

        board.swap_slots(2, 7);
        board.swap_slots(2, 7);
        assert_eq!(board, before, "double swap restores mapping and positions");
    }

    #[test]
    fn swap_ignores_degenerate_pairs() {
        let mut board = PuzzleBoard::from_layout(&layout_3x3());
        let before = board.clone();
        board.swap_slots(3, 3);
        board.swap_slots(0, 42);
        assert_eq!(board, before, "same-slot and out-of-range swaps change nothing");
    }

    #[test]
    fn swap_target_skips_the_dragged_slot() {
        let board = PuzzleBoard::from_layout(&layout_3x3());
        let own_center = board.initial_position(0).expect("slot exists");
        assert_eq!(
            board.find_swap_target(0, own_center),
            None,
            "hovering over the dragged tile's own slot never swaps"
        );
    }

    #[test]
    fn swap_target_uses_half_cell_proximity() {
        let board = PuzzleBoard::from_layout(&layout_3x3());
        // Slot 1 is centered at (150, 250); the threshold is 50.
        assert_eq!(
            board.find_swap_target(0, Vec2::new(120.0, 250.0)),
            Some(1),
            "inside the proximity zone"
        );
        assert_eq!(
            board.find_swap_target(0, Vec2::new(100.0, 250.0)),
            None,
            "exactly on the boundary does not count"
        );
        assert_eq!(
            board.find_swap_target(4, Vec2::new(-500.0, -500.0)),
            None,
            "far away from every slot"
        );
    }

    #[test]
    fn swap_target_takes_the_first_match_in_row_major_order() {
        // Non-square cells make neighbouring proximity zones overlap:
        // a 300x150 area cut 3x3 gives 100x50 cells, threshold 50.
        let layout = BoardLayout::build(Some(Rect::new(0.0, 0.0, 300.0, 150.0)), 3, 3, 0.0)
            .expect("valid layout");
        let board = PuzzleBoard::from_layout(&layout);

        // (50, 100) is 25 away from both slot 0 (50, 125) and slot 3 (50, 75).
        assert_eq!(
            board.find_swap_target(8, Vec2::new(50.0, 100.0)),
            Some(0),
            "the lower row-major index wins when two zones overlap"
        );
        assert_eq!(
            board.find_swap_target(0, Vec2::new(50.0, 100.0)),
            Some(3),
            "scan moves on to the next zone when the first is the dragged slot"
        );
    }

    #[test]
    fn drag_without_swap_changes_nothing() {
        let layout = layout_3x3();
        let mut board = PuzzleBoard::from_layout(&layout);
        board.shuffle(&mut fastrand::Rng::with_seed(11));
        let before = board.clone();

        // A drag that never crosses a proximity zone performs no swap,
        // so the authoritative state is untouched on release.
        let dragged = board.slot_of_tile(0).expect("tile 0 is somewhere");
        for step in 0..5 {
            let wander = Vec2::new(-400.0 - step as f32, 900.0);
            assert_eq!(board.find_swap_target(dragged, wander), None, "no zone hit");
        }
        assert_eq!(board, before, "board state unchanged by a swap-free drag");
    }
}
