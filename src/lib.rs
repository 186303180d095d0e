pub mod catalog;
pub mod matcher;
mod parse;
pub mod session;

pub use catalog::{CatalogError, LevelCatalog, LevelSource};
pub use matcher::{GridMatcher, InvariantViolation, Score};
pub use parse::{parse_level, parse_level_str, Field, LevelFormatError};
pub use session::{Phase, Session, SessionError, SessionState};

use std::fmt;

use aglet::{Coord, Grid};

/// Index of a shape in the global shape set.
///
/// An empty cell is `None` wherever a cell is stored as `Option<ShapeId>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(u32);

impl ShapeId {
  pub fn new(index: u32) -> Self {
    Self(index)
  }

  pub fn index(self) -> usize {
    self.0 as usize
  }
}

impl fmt::Display for ShapeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// The global set of shapes a level may refer to.
///
/// The core only counts shapes and compares ids; whatever a `Drawable` is
/// belongs to the host.
pub trait ShapeSet {
  type Drawable;

  fn shape_count(&self) -> usize;

  fn drawable(&self, id: ShapeId) -> Option<&Self::Drawable>;

  fn contains(&self, id: ShapeId) -> bool {
    id.index() < self.shape_count()
  }
}

impl<T> ShapeSet for [T] {
  type Drawable = T;

  fn shape_count(&self) -> usize {
    self.len()
  }

  fn drawable(&self, id: ShapeId) -> Option<&T> {
    self.get(id.index())
  }
}

impl<T> ShapeSet for Vec<T> {
  type Drawable = T;

  fn shape_count(&self) -> usize {
    self.len()
  }

  fn drawable(&self, id: ShapeId) -> Option<&T> {
    self.get(id.index())
  }
}

impl<T, const N: usize> ShapeSet for [T; N] {
  type Drawable = T;

  fn shape_count(&self) -> usize {
    N
  }

  fn drawable(&self, id: ShapeId) -> Option<&T> {
    self.get(id.index())
  }
}

/// One parsed level: how long the solution is shown, which shapes the player
/// may place, and the solution itself.
#[derive(Debug, Clone)]
pub struct LevelDescriptor {
  reveal_seconds: f32,
  palette: Vec<ShapeId>,
  solution: Grid<ShapeId>,
}

impl LevelDescriptor {
  pub fn new(
    reveal_seconds: f32,
    palette: Vec<ShapeId>,
    solution: Grid<ShapeId>,
  ) -> Self {
    Self {
      reveal_seconds,
      palette,
      solution,
    }
  }

  pub fn reveal_seconds(&self) -> f32 {
    self.reveal_seconds
  }

  /// Selectable shapes in file order. May contain duplicates.
  pub fn palette(&self) -> &[ShapeId] {
    &self.palette
  }

  pub fn width(&self) -> u32 {
    self.solution.width()
  }

  pub fn height(&self) -> u32 {
    self.solution.height()
  }

  pub fn solution(&self) -> &Grid<ShapeId> {
    &self.solution
  }

  pub fn solution_cell(&self, coord: Coord) -> Option<ShapeId> {
    if coord.x >= self.width() || coord.y >= self.height() {
      return None;
    }
    self.solution.get(coord).copied()
  }

  /// Number of non-empty solution cells.
  pub fn occupied_cells(&self) -> u32 {
    let mut count = 0;
    for y in 0..self.height() {
      for x in 0..self.width() {
        if self.solution_cell(Coord::new(x, y)).is_some() {
          count += 1;
        }
      }
    }
    count
  }
}
