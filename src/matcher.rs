use std::ops::AddAssign;

use aglet::{Coord, Grid};
use thiserror::Error;

use crate::{LevelDescriptor, ShapeId};

/// How much of a solution the player reproduced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score {
  /// Cells where the player put the same shape as the solution.
  pub matched: u32,
  /// Non-empty solution cells.
  pub possible: u32,
}

impl Score {
  pub fn new(matched: u32, possible: u32) -> Self {
    Self { matched, possible }
  }

  /// Whole-number percentage, 0 when nothing was possible.
  pub fn percent(self) -> u32 {
    if self.possible == 0 {
      return 0;
    }
    self.matched * 100 / self.possible
  }
}

impl AddAssign for Score {
  fn add_assign(&mut self, rhs: Self) {
    self.matched += rhs.matched;
    self.possible += rhs.possible;
  }
}

/// The player grid and the solution it is scored against have different
/// sizes. Only reachable by scoring without a [`GridMatcher::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
  "player grid is {player_width}x{player_height} but the solution is \
   {solution_width}x{solution_height}"
)]
pub struct InvariantViolation {
  pub player_width: u32,
  pub player_height: u32,
  pub solution_width: u32,
  pub solution_height: u32,
}

/// Holds the player's attempt next to the solution of the current level.
#[derive(Debug, Clone)]
pub struct GridMatcher {
  solution: Grid<ShapeId>,
  player: Grid<ShapeId>,
}

impl GridMatcher {
  /// An empty 0x0 matcher; call [`GridMatcher::reset`] before use.
  pub fn new() -> Self {
    Self {
      solution: Grid::new(0, 0),
      player: Grid::new(0, 0),
    }
  }

  /// Take the level's solution and start over with an empty player grid of
  /// the same size.
  pub fn reset(&mut self, level: &LevelDescriptor) {
    self.solution = level.solution().clone();
    self.player = Grid::new(level.width(), level.height());
  }

  pub fn width(&self) -> u32 {
    self.player.width()
  }

  pub fn height(&self) -> u32 {
    self.player.height()
  }

  fn in_bounds(&self, cell: Coord) -> bool {
    cell.x < self.width() && cell.y < self.height()
  }

  /// Put `shape` at `cell`, or empty it with `None`. Cells off the board are
  /// ignored.
  pub fn place(&mut self, cell: Coord, shape: Option<ShapeId>) {
    if !self.in_bounds(cell) {
      return;
    }
    self.player.insert_direct(cell, shape);
  }

  pub fn clear(&mut self, cell: Coord) {
    self.place(cell, None);
  }

  pub fn player_cell(&self, cell: Coord) -> Option<ShapeId> {
    if !self.in_bounds(cell) {
      return None;
    }
    self.player.get(cell).copied()
  }

  pub fn solution_cell(&self, cell: Coord) -> Option<ShapeId> {
    if cell.x >= self.solution.width() || cell.y >= self.solution.height() {
      return None;
    }
    self.solution.get(cell).copied()
  }

  /// Whether `cell` counts towards `matched`.
  pub fn cell_matches(&self, cell: Coord) -> bool {
    match self.solution_cell(cell) {
      Some(want) => self.player_cell(cell) == Some(want),
      None => false,
    }
  }

  /// Map a pointer position to the cell under it.
  ///
  /// `origin` is the top-left corner of the drawn grid and `cell_size` the
  /// size of one cell, both in the pointer's units.
  pub fn cell_at(
    &self,
    point: (i32, i32),
    origin: (i32, i32),
    cell_size: (u32, u32),
  ) -> Option<Coord> {
    let (cell_w, cell_h) = cell_size;
    if cell_w == 0 || cell_h == 0 {
      return None;
    }
    let dx = i64::from(point.0) - i64::from(origin.0);
    let dy = i64::from(point.1) - i64::from(origin.1);
    // must reject before dividing, division truncates towards zero
    if dx < 0 || dy < 0 {
      return None;
    }
    let x = dx / i64::from(cell_w);
    let y = dy / i64::from(cell_h);
    if x >= i64::from(self.width()) || y >= i64::from(self.height()) {
      return None;
    }
    Some(Coord::new(x as u32, y as u32))
  }

  pub fn score(&self) -> Result<Score, InvariantViolation> {
    if self.player.width() != self.solution.width()
      || self.player.height() != self.solution.height()
    {
      return Err(InvariantViolation {
        player_width: self.player.width(),
        player_height: self.player.height(),
        solution_width: self.solution.width(),
        solution_height: self.solution.height(),
      });
    }

    let mut score = Score::default();
    for y in 0..self.solution.height() {
      for x in 0..self.solution.width() {
        let coord = Coord::new(x, y);
        if let Some(want) = self.solution.get(coord).copied() {
          score.possible += 1;
          if self.player.get(coord).copied() == Some(want) {
            score.matched += 1;
          }
        }
      }
    }
    Ok(score)
  }
}

impl Default for GridMatcher {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const A: ShapeId = ShapeId(0);
  const B: ShapeId = ShapeId(1);

  fn level(width: u32, height: u32, cells: &[Option<ShapeId>]) -> LevelDescriptor {
    let mut grid = Grid::new(width, height);
    for (i, cell) in cells.iter().enumerate() {
      if let Some(id) = cell {
        let i = i as u32;
        grid.insert(Coord::new(i % width, i / width), *id);
      }
    }
    LevelDescriptor::new(1.0, vec![A, B], grid)
  }

  fn diagonal() -> LevelDescriptor {
    level(2, 2, &[Some(A), None, None, Some(B)])
  }

  #[test]
  fn exact_reproduction_scores_everything() {
    let mut m = GridMatcher::new();
    m.reset(&diagonal());
    m.place(Coord::new(0, 0), Some(A));
    m.place(Coord::new(1, 1), Some(B));
    assert_eq!(m.score(), Ok(Score::new(2, 2)));
  }

  #[test]
  fn empty_attempt_scores_nothing() {
    let mut m = GridMatcher::new();
    m.reset(&diagonal());
    assert_eq!(m.score(), Ok(Score::new(0, 2)));
  }

  #[test]
  fn wrong_shapes_and_extra_shapes_do_not_count() {
    let mut m = GridMatcher::new();
    m.reset(&diagonal());
    m.place(Coord::new(0, 0), Some(B));
    m.place(Coord::new(1, 0), Some(A));
    m.place(Coord::new(1, 1), Some(B));
    assert_eq!(m.score(), Ok(Score::new(1, 2)));
    assert!(!m.cell_matches(Coord::new(0, 0)));
    assert!(!m.cell_matches(Coord::new(1, 0)));
    assert!(m.cell_matches(Coord::new(1, 1)));
  }

  #[test]
  fn placing_none_clears() {
    let mut m = GridMatcher::new();
    m.reset(&diagonal());
    m.place(Coord::new(0, 0), Some(A));
    m.place(Coord::new(0, 0), None);
    assert_eq!(m.player_cell(Coord::new(0, 0)), None);
    m.place(Coord::new(1, 1), Some(B));
    m.clear(Coord::new(1, 1));
    assert_eq!(m.score(), Ok(Score::new(0, 2)));
  }

  #[test]
  fn placing_off_the_board_is_ignored() {
    let mut m = GridMatcher::new();
    m.reset(&diagonal());
    m.place(Coord::new(2, 0), Some(A));
    m.place(Coord::new(0, 2), Some(A));
    m.place(Coord::new(u32::MAX, u32::MAX), Some(B));
    for y in 0..2 {
      for x in 0..2 {
        assert_eq!(m.player_cell(Coord::new(x, y)), None);
      }
    }
  }

  #[test]
  fn reset_discards_the_previous_attempt() {
    let mut m = GridMatcher::new();
    m.reset(&diagonal());
    m.place(Coord::new(0, 0), Some(A));
    m.reset(&level(3, 1, &[None, Some(A), Some(A)]));
    assert_eq!((m.width(), m.height()), (3, 1));
    assert_eq!(m.player_cell(Coord::new(0, 0)), None);
    assert_eq!(m.score(), Ok(Score::new(0, 2)));
  }

  #[test]
  fn wide_grids_index_row_major() {
    let mut m = GridMatcher::new();
    m.reset(&level(3, 2, &[None, None, None, None, None, Some(B)]));
    m.place(Coord::new(2, 1), Some(B));
    assert_eq!(m.score(), Ok(Score::new(1, 1)));
  }

  #[test]
  fn cell_at_maps_pointer_to_cell() {
    let mut m = GridMatcher::new();
    m.reset(&level(3, 2, &[None; 6]));
    let origin = (10, 20);
    let size = (8, 4);

    assert_eq!(m.cell_at((10, 20), origin, size), Some(Coord::new(0, 0)));
    assert_eq!(m.cell_at((17, 23), origin, size), Some(Coord::new(0, 0)));
    assert_eq!(m.cell_at((18, 24), origin, size), Some(Coord::new(1, 1)));
    assert_eq!(m.cell_at((33, 27), origin, size), Some(Coord::new(2, 1)));

    assert_eq!(m.cell_at((34, 20), origin, size), None);
    assert_eq!(m.cell_at((10, 28), origin, size), None);
    assert_eq!(m.cell_at((9, 20), origin, size), None);
    assert_eq!(m.cell_at((5, 21), origin, size), None);
    assert_eq!(m.cell_at((12, 22), origin, (0, 4)), None);
  }

  #[test]
  fn score_refuses_mismatched_grids() {
    let m = GridMatcher {
      solution: Grid::new(2, 2),
      player: Grid::new(3, 2),
    };
    assert_eq!(
      m.score(),
      Err(InvariantViolation {
        player_width: 3,
        player_height: 2,
        solution_width: 2,
        solution_height: 2,
      })
    );
  }

  #[test]
  fn percent_handles_empty_levels() {
    assert_eq!(Score::new(0, 0).percent(), 0);
    assert_eq!(Score::new(1, 3).percent(), 33);
    let mut total = Score::new(1, 2);
    total += Score::new(2, 2);
    assert_eq!(total, Score::new(3, 4));
  }
}
