//! Session state machine.
//!
//! ```text
//! Intro -> Tutorial -> Loading -> AwaitReveal -> Revealing -> Guessing
//!                         ^                                       |
//!                         +------------- Scoring <----------------+
//!                                           |
//!                                           +-> Ended
//! ```
//!
//! Every arrow is taken on [`Session::confirm`] except `Loading ->
//! AwaitReveal`, which happens as soon as the level parses, and `Revealing ->
//! Guessing`, which happens on the [`Session::tick`] that uses up the reveal
//! time. Events that make no sense in the current phase are ignored.

use aglet::Coord;
use thiserror::Error;

use crate::{
  GridMatcher, InvariantViolation, LevelDescriptor, LevelFormatError,
  LevelSource, Score, ShapeId, ShapeSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
  Intro,
  Tutorial,
  /// Parsing the current level. Only lingers if the parse failed.
  Loading,
  /// Level loaded, waiting for the player to ask for the reveal.
  AwaitReveal,
  /// Solution on screen; counts down the level's reveal time.
  Revealing,
  /// Solution hidden; the player rebuilds it.
  Guessing,
  /// Showing the level result.
  Scoring,
  Ended,
}

/// Progress through the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
  pub current_level: usize,
  pub cumulative_score: u32,
  pub cumulative_possible: u32,
  pub phase: Phase,
}

impl SessionState {
  fn new() -> Self {
    Self {
      current_level: 0,
      cumulative_score: 0,
      cumulative_possible: 0,
      phase: Phase::Intro,
    }
  }

  pub fn total(&self) -> Score {
    Score::new(self.cumulative_score, self.cumulative_possible)
  }
}

#[derive(Debug, Error)]
pub enum SessionError {
  #[error("could not load level {index}")]
  Level {
    index: usize,
    #[source]
    source: LevelFormatError,
  },
  #[error(transparent)]
  Invariant(#[from] InvariantViolation),
}

#[derive(Debug, Clone, Copy, Default)]
struct RevealTimer {
  elapsed: f32,
  target: f32,
}

impl RevealTimer {
  fn new(target: f32) -> Self {
    Self {
      elapsed: 0.0,
      target,
    }
  }

  fn advance(&mut self, seconds: f32) {
    if seconds.is_finite() && seconds > 0.0 {
      self.elapsed += seconds;
    }
  }

  fn done(&self) -> bool {
    self.elapsed >= self.target
  }

  fn progress(&self) -> f32 {
    if self.target > 0.0 {
      (self.elapsed / self.target).min(1.0)
    } else {
      0.0
    }
  }
}

/// One play-through of every level in `L`, drawing shapes from `S`.
#[derive(Debug)]
pub struct Session<L, S> {
  levels: L,
  shapes: S,
  state: SessionState,
  level: Option<LevelDescriptor>,
  matcher: GridMatcher,
  reveal: RevealTimer,
  /// Index into the current level's palette.
  selected: usize,
}

impl<L: LevelSource, S: ShapeSet> Session<L, S> {
  pub fn new(levels: L, shapes: S) -> Self {
    Self {
      levels,
      shapes,
      state: SessionState::new(),
      level: None,
      matcher: GridMatcher::new(),
      reveal: RevealTimer::default(),
      selected: 0,
    }
  }

  pub fn phase(&self) -> Phase {
    self.state.phase
  }

  pub fn state(&self) -> &SessionState {
    &self.state
  }

  pub fn level_count(&self) -> usize {
    self.levels.level_count()
  }

  pub fn shapes(&self) -> &S {
    &self.shapes
  }

  /// The level being played, once it has loaded.
  pub fn level(&self) -> Option<&LevelDescriptor> {
    self.level.as_ref()
  }

  pub fn matcher(&self) -> &GridMatcher {
    &self.matcher
  }

  /// Score of the level in play as the grid stands right now.
  pub fn level_score(&self) -> Result<Score, InvariantViolation> {
    self.matcher.score()
  }

  /// Fraction of the reveal time used up, in `0.0..=1.0`.
  pub fn reveal_progress(&self) -> f32 {
    self.reveal.progress()
  }

  pub fn selected_index(&self) -> usize {
    self.selected
  }

  pub fn selected_shape(&self) -> Option<ShapeId> {
    self.level.as_ref()?.palette().get(self.selected).copied()
  }

  /// Advance to the next phase. Returns the phase the session ends up in.
  ///
  /// A level that fails to parse leaves the session in [`Phase::Loading`];
  /// confirming again retries it.
  pub fn confirm(&mut self) -> Result<Phase, SessionError> {
    match self.state.phase {
      Phase::Intro => self.enter(Phase::Tutorial),
      Phase::Tutorial | Phase::Loading => self.begin_level()?,
      Phase::AwaitReveal => {
        if let Some(level) = &self.level {
          self.matcher.reset(level);
          self.reveal = RevealTimer::new(level.reveal_seconds());
          self.selected = 0;
          self.enter(Phase::Revealing);
        }
      }
      Phase::Revealing => {}
      Phase::Guessing => self.enter(Phase::Scoring),
      Phase::Scoring => {
        let score = self.matcher.score()?;
        self.state.cumulative_score += score.matched;
        self.state.cumulative_possible += score.possible;
        self.state.current_level += 1;
        tracing::debug!(
          matched = score.matched,
          possible = score.possible,
          total = self.state.cumulative_score,
          "level scored"
        );
        self.begin_level()?;
      }
      Phase::Ended => {}
    }
    Ok(self.state.phase)
  }

  /// Feed elapsed seconds since the last tick. Returns whether the phase
  /// changed.
  pub fn tick(&mut self, elapsed: f32) -> bool {
    if self.state.phase != Phase::Revealing {
      return false;
    }
    self.reveal.advance(elapsed);
    if self.reveal.done() {
      self.enter(Phase::Guessing);
      return true;
    }
    false
  }

  /// Put `shape` (or nothing) at `cell`. Returns false when not guessing.
  pub fn place(&mut self, cell: Coord, shape: Option<ShapeId>) -> bool {
    if self.state.phase != Phase::Guessing {
      return false;
    }
    self.matcher.place(cell, shape);
    true
  }

  pub fn place_selected(&mut self, cell: Coord) -> bool {
    match self.selected_shape() {
      Some(shape) => self.place(cell, Some(shape)),
      None => false,
    }
  }

  pub fn clear(&mut self, cell: Coord) -> bool {
    self.place(cell, None)
  }

  /// Move the palette selection, wrapping at either end.
  pub fn cycle_selection(&mut self, forward: bool) -> bool {
    if self.state.phase != Phase::Guessing {
      return false;
    }
    let len = match &self.level {
      Some(level) if !level.palette().is_empty() => level.palette().len(),
      _ => return false,
    };
    self.selected = if forward {
      (self.selected + 1) % len
    } else {
      (self.selected + len - 1) % len
    };
    true
  }

  fn begin_level(&mut self) -> Result<(), SessionError> {
    let index = self.state.current_level;
    if index >= self.levels.level_count() {
      self.enter(Phase::Ended);
      return Ok(());
    }

    self.level = None;
    self.enter(Phase::Loading);
    let level = self
      .levels
      .load_level(index, &self.shapes)
      .map_err(|source| SessionError::Level { index, source })?;
    self.level = Some(level);
    self.enter(Phase::AwaitReveal);
    Ok(())
  }

  fn enter(&mut self, phase: Phase) {
    tracing::debug!(
      from = ?self.state.phase,
      to = ?phase,
      level = self.state.current_level,
      "phase change"
    );
    self.state.phase = phase;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parse_level_str;

  const SHAPES: [char; 3] = ['o', 'x', '^'];

  /// In-memory levels.
  struct Levels(Vec<&'static str>);

  impl LevelSource for Levels {
    fn level_count(&self) -> usize {
      self.0.len()
    }

    fn load_level<S: ShapeSet + ?Sized>(
      &self,
      index: usize,
      shapes: &S,
    ) -> Result<LevelDescriptor, LevelFormatError> {
      parse_level_str(self.0[index], shapes)
    }
  }

  const DIAGONAL: &str = "1\n0,1\n2,2\n0,-1\n-1,1\n";
  const SINGLE: &str = "0.5\n2\n1,1\n2\n";

  fn session(levels: Vec<&'static str>) -> Session<Levels, [char; 3]> {
    Session::new(Levels(levels), SHAPES)
  }

  fn to_guessing(s: &mut Session<Levels, [char; 3]>) {
    assert_eq!(s.confirm().unwrap(), Phase::Revealing);
    let secs = s.level().unwrap().reveal_seconds();
    assert!(s.tick(secs));
    assert_eq!(s.phase(), Phase::Guessing);
  }

  #[test]
  fn intro_and_tutorial_lead_to_the_first_level() {
    let mut s = session(vec![DIAGONAL]);
    assert_eq!(s.phase(), Phase::Intro);
    assert_eq!(s.confirm().unwrap(), Phase::Tutorial);
    assert_eq!(s.confirm().unwrap(), Phase::AwaitReveal);
    assert_eq!(s.level().unwrap().width(), 2);
  }

  #[test]
  fn no_levels_means_straight_to_the_end() {
    let mut s = session(vec![]);
    s.confirm().unwrap();
    assert_eq!(s.confirm().unwrap(), Phase::Ended);
    assert_eq!(s.confirm().unwrap(), Phase::Ended);
  }

  #[test]
  fn reveal_waits_for_the_full_duration() {
    let mut s = session(vec![DIAGONAL]);
    s.confirm().unwrap();
    s.confirm().unwrap();
    s.confirm().unwrap();
    assert_eq!(s.phase(), Phase::Revealing);

    assert!(!s.tick(0.4));
    assert!(!s.tick(0.4));
    assert_eq!(s.phase(), Phase::Revealing);
    assert!(s.tick(0.4));
    assert_eq!(s.phase(), Phase::Guessing);
    assert_eq!(s.reveal_progress(), 1.0);
  }

  #[test]
  fn bad_ticks_do_not_move_the_timer() {
    let mut s = session(vec![DIAGONAL]);
    s.confirm().unwrap();
    s.confirm().unwrap();
    s.confirm().unwrap();
    assert!(!s.tick(-5.0));
    assert!(!s.tick(f32::NAN));
    assert_eq!(s.reveal_progress(), 0.0);
    assert!(s.tick(f32::MAX));
  }

  #[test]
  fn confirm_does_not_skip_the_reveal() {
    let mut s = session(vec![DIAGONAL]);
    s.confirm().unwrap();
    s.confirm().unwrap();
    s.confirm().unwrap();
    assert_eq!(s.confirm().unwrap(), Phase::Revealing);
  }

  #[test]
  fn placement_only_counts_while_guessing() {
    let mut s = session(vec![DIAGONAL]);
    s.confirm().unwrap();
    s.confirm().unwrap();
    assert!(!s.place(Coord::new(0, 0), Some(ShapeId::new(0))));
    s.confirm().unwrap();
    assert!(!s.place(Coord::new(0, 0), Some(ShapeId::new(0))));
    assert!(!s.cycle_selection(true));

    s.tick(1.0);
    assert!(s.place_selected(Coord::new(0, 0)));
    s.confirm().unwrap();
    assert_eq!(s.phase(), Phase::Scoring);
    assert!(!s.clear(Coord::new(0, 0)));
    assert_eq!(s.level_score().unwrap(), Score::new(1, 2));
  }

  #[test]
  fn selection_wraps_around_the_palette() {
    let mut s = session(vec![DIAGONAL]);
    s.confirm().unwrap();
    s.confirm().unwrap();
    to_guessing(&mut s);

    assert_eq!(s.selected_shape(), Some(ShapeId::new(0)));
    s.cycle_selection(true);
    assert_eq!(s.selected_shape(), Some(ShapeId::new(1)));
    s.cycle_selection(true);
    assert_eq!(s.selected_shape(), Some(ShapeId::new(0)));
    s.cycle_selection(false);
    assert_eq!(s.selected_index(), 1);
  }

  #[test]
  fn two_levels_accumulate_and_end() {
    let mut s = session(vec![DIAGONAL, SINGLE]);
    s.confirm().unwrap();
    s.confirm().unwrap();
    to_guessing(&mut s);
    s.place(Coord::new(0, 0), Some(ShapeId::new(0)));
    s.place(Coord::new(1, 1), Some(ShapeId::new(2)));
    s.confirm().unwrap();
    assert_eq!(s.confirm().unwrap(), Phase::AwaitReveal);
    assert_eq!(s.state().current_level, 1);
    assert_eq!(s.state().total(), Score::new(1, 2));

    to_guessing(&mut s);
    assert_eq!(s.selected_shape(), Some(ShapeId::new(2)));
    s.place_selected(Coord::new(0, 0));
    s.confirm().unwrap();
    assert_eq!(s.confirm().unwrap(), Phase::Ended);

    let state = s.state();
    assert_eq!(state.cumulative_score, 2);
    assert_eq!(state.cumulative_possible, 3);
    assert_eq!(state.current_level, 2);
  }

  #[test]
  fn broken_level_stops_in_loading() {
    let mut s = session(vec!["1\n0\n3,2\n0,0,0\n"]);
    s.confirm().unwrap();
    let err = s.confirm().unwrap_err();
    assert!(matches!(
      err,
      SessionError::Level {
        index: 0,
        source: LevelFormatError::RowCount { .. },
      }
    ));
    assert_eq!(s.phase(), Phase::Loading);
    assert!(s.level().is_none());
    assert_eq!(s.state().current_level, 0);

    // retrying fails the same way and never reaches the reveal
    assert!(s.confirm().is_err());
    assert_eq!(s.phase(), Phase::Loading);
    assert!(!s.tick(10.0));
  }

  #[test]
  fn broken_second_level_keeps_the_first_score() {
    let mut s = session(vec![SINGLE, "1\n9\n1,1\n0\n"]);
    s.confirm().unwrap();
    s.confirm().unwrap();
    to_guessing(&mut s);
    s.place_selected(Coord::new(0, 0));
    s.confirm().unwrap();
    assert!(s.confirm().is_err());
    assert_eq!(s.phase(), Phase::Loading);
    assert_eq!(s.state().total(), Score::new(1, 1));
    assert_eq!(s.state().current_level, 1);

    // the board from the last good level is still there
    let m = s.matcher();
    assert_eq!((m.width(), m.height()), (1, 1));
    assert_eq!(m.player_cell(Coord::new(0, 0)), Some(ShapeId::new(2)));
    assert_eq!(m.score().unwrap(), Score::new(1, 1));
  }
}
