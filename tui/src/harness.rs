//! Play harness

use std::{
  io::{self, Stdout, Write},
  time::{Duration, Instant},
};

use aglet::{Coord, Direction4};
use crossterm::{
  cursor::{Hide, MoveTo, Show},
  event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode,
    KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
  },
  style::{
    Attribute, Attributes, Color, Colors, Print, ResetColor, SetAttributes,
    SetColors, SetForegroundColor,
  },
  terminal::{
    disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
  },
  QueueableCommand,
};
use terminal_memory::{
  InvariantViolation, LevelCatalog, Phase, Score, Session, SessionError,
  ShapeId, ShapeSet,
};

use crate::shapes::{Glyph, SHAPE_COUNT};

const START_X: u16 = 2;
const START_Y: u16 = 1;

const TILE_STRIDE_X: u16 = 2;
const TILE_STRIDE_Y: u16 = 1;

/// Top-left cell of the board.
const BOARD_X: u16 = 4;
const BOARD_Y: u16 = 5;

const PROGRESS_WIDTH: u16 = 24;

/// How long to wait for input before ticking again.
const FRAME: Duration = Duration::from_millis(33);

const TUTORIAL: &[&str] = &[
  "Each level shows you a grid of shapes for a few seconds.",
  "Once it disappears, rebuild it from memory.",
  "",
  "  arrows / hjkl      move the cursor",
  "  space / click      place the selected shape",
  "  x / right click    clear a cell",
  "  tab / [ ] / wheel  pick another shape",
  "  enter              submit your grid",
  "",
  "Every shape in the right place scores a point.",
];

type MemorySession = Session<LevelCatalog, [Glyph; SHAPE_COUNT]>;

/// How a play-through ended.
pub enum Outcome {
  Finished(Score),
  Quit,
  Failed(SessionError),
}

enum Flow {
  Continue,
  Stop(Outcome),
}

pub struct PlayHarness {
  session: MemorySession,
  cursor: Coord,

  /// Phase on screen at the last draw; a change wipes the screen.
  drawn_phase: Option<Phase>,
  must_redraw: bool,
}

impl PlayHarness {
  /// Transfer runtime to the harness.
  /// This will only return once the player is through.
  pub fn enter(session: MemorySession) -> io::Result<Outcome> {
    let mut harness = Self {
      session,
      cursor: Coord::new(0, 0),
      drawn_phase: None,
      must_redraw: false,
    };

    harness.spin()
  }

  fn spin(&mut self) -> io::Result<Outcome> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout
      .queue(EnterAlternateScreen)?
      .queue(EnableMouseCapture)?
      .flush()?;

    let outcome = self.run(&mut stdout);

    stdout
      .queue(Show)?
      .queue(DisableMouseCapture)?
      .queue(LeaveAlternateScreen)?
      .flush()?;
    disable_raw_mode()?;

    outcome
  }

  fn run(&mut self, stdout: &mut Stdout) -> io::Result<Outcome> {
    let mut last_tick = Instant::now();
    loop {
      self.draw(stdout)?;

      if event::poll(FRAME)? {
        let flow = match event::read()? {
          Event::Key(ev)
            if matches!(ev.kind, KeyEventKind::Press | KeyEventKind::Repeat) =>
          {
            self.update(ev.code, ev.modifiers)
          }
          Event::Mouse(ev) => {
            self.mouse(ev);
            Flow::Continue
          }
          Event::Resize(..) => {
            self.must_redraw = true;
            Flow::Continue
          }
          _ => Flow::Continue,
        };
        if let Flow::Stop(outcome) = flow {
          return Ok(outcome);
        }
      }

      let now = Instant::now();
      self.session.tick((now - last_tick).as_secs_f32());
      last_tick = now;
    }
  }

  fn update(&mut self, key: KeyCode, mods: KeyModifiers) -> Flow {
    if key == KeyCode::Char('c') && mods.contains(KeyModifiers::CONTROL) {
      return Flow::Stop(Outcome::Quit);
    }
    if key == KeyCode::Char('l') && mods.contains(KeyModifiers::CONTROL) {
      self.must_redraw = true;
      return Flow::Continue;
    }

    match key {
      KeyCode::Esc => return Flow::Stop(Outcome::Quit),
      KeyCode::Enter => {
        if self.session.phase() == Phase::Ended {
          return Flow::Stop(Outcome::Finished(self.session.state().total()));
        }
        match self.session.confirm() {
          Ok(Phase::Revealing) => self.cursor = Coord::new(0, 0),
          Ok(Phase::Scoring) => {
            if let Err(err) = self.session.level_score() {
              tracing::error!(error = %err, "board cannot be scored");
              return Flow::Stop(Outcome::Failed(err.into()));
            }
          }
          Ok(_) => {}
          Err(err) => return Flow::Stop(Outcome::Failed(err)),
        }
        return Flow::Continue;
      }
      KeyCode::Tab | KeyCode::Char(']') => {
        self.session.cycle_selection(true);
        return Flow::Continue;
      }
      KeyCode::BackTab | KeyCode::Char('[') => {
        self.session.cycle_selection(false);
        return Flow::Continue;
      }
      KeyCode::Char(' ') => {
        self.session.place_selected(self.cursor);
        return Flow::Continue;
      }
      KeyCode::Char('x') | KeyCode::Backspace | KeyCode::Delete => {
        self.session.clear(self.cursor);
        return Flow::Continue;
      }
      _ => {}
    }

    let width = self.session.matcher().width();
    let height = self.session.matcher().height();
    if self.session.phase() != Phase::Guessing || width == 0 || height == 0 {
      return Flow::Continue;
    }

    let cursor_delta = match key {
      KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('H') => {
        Some(Direction4::West)
      }
      KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('L') => {
        Some(Direction4::East)
      }
      KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') => {
        Some(Direction4::North)
      }
      KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') => {
        Some(Direction4::South)
      }
      _ => None,
    };
    if let Some(cursor_delta) = cursor_delta {
      let snap = mods.contains(KeyModifiers::SHIFT);
      let x2 = match (cursor_delta, snap) {
        (Direction4::North | Direction4::South, _) => self.cursor.x,
        (Direction4::West, false) => (self.cursor.x + width - 1) % width,
        (Direction4::West, true) => 0,
        (Direction4::East, false) => (self.cursor.x + 1) % width,
        (Direction4::East, true) => width - 1,
      };
      let y2 = match (cursor_delta, snap) {
        (Direction4::West | Direction4::East, _) => self.cursor.y,
        (Direction4::North, false) => (self.cursor.y + height - 1) % height,
        (Direction4::North, true) => 0,
        (Direction4::South, false) => (self.cursor.y + 1) % height,
        (Direction4::South, true) => height - 1,
      };
      self.cursor = Coord::new(x2, y2);
    }

    Flow::Continue
  }

  fn mouse(&mut self, ev: MouseEvent) {
    let cell = self.session.matcher().cell_at(
      (i32::from(ev.column), i32::from(ev.row)),
      (i32::from(BOARD_X), i32::from(BOARD_Y)),
      (u32::from(TILE_STRIDE_X), u32::from(TILE_STRIDE_Y)),
    );

    match (ev.kind, cell) {
      (MouseEventKind::Down(MouseButton::Left), Some(cell)) => {
        if self.session.place_selected(cell) {
          self.cursor = cell;
        }
      }
      (MouseEventKind::Down(MouseButton::Right), Some(cell)) => {
        if self.session.clear(cell) {
          self.cursor = cell;
        }
      }
      (MouseEventKind::ScrollUp, _) => {
        self.session.cycle_selection(false);
      }
      (MouseEventKind::ScrollDown, _) => {
        self.session.cycle_selection(true);
      }
      _ => {}
    }
  }

  fn draw(&mut self, stdout: &mut Stdout) -> io::Result<()> {
    let phase = self.session.phase();
    if self.must_redraw || self.drawn_phase != Some(phase) {
      stdout.queue(Clear(ClearType::All))?;
      self.must_redraw = false;
      self.drawn_phase = Some(phase);
    }
    stdout.queue(Hide)?;

    let state = *self.session.state();
    let level_no = state.current_level + 1;
    let level_count = self.session.level_count();

    match phase {
      Phase::Intro => {
        text(stdout, START_X, START_Y, Color::Yellow, "M E M O R Y")?;
        text(
          stdout,
          START_X,
          START_Y + 2,
          Color::White,
          &format!("{} levels. Press Enter to begin.", level_count),
        )?;
      }
      Phase::Tutorial => {
        text(stdout, START_X, START_Y, Color::Yellow, "How to play")?;
        for (i, line) in TUTORIAL.iter().enumerate() {
          text(stdout, START_X, START_Y + 2 + i as u16, Color::White, line)?;
        }
        let bottom = START_Y + 3 + TUTORIAL.len() as u16;
        text(stdout, START_X, bottom, Color::Grey, "Press Enter.")?;
      }
      Phase::Loading => {
        text(
          stdout,
          START_X,
          START_Y,
          Color::White,
          &format!("Loading level {}...", level_no),
        )?;
      }
      Phase::AwaitReveal => {
        self.header(stdout, level_no, level_count)?;
        let secs = self.session.level().map_or(0.0, |l| l.reveal_seconds());
        text(
          stdout,
          START_X,
          START_Y + 2,
          Color::White,
          &format!(
            "You will have {:.1}s to memorise it. Press Enter when ready.",
            secs
          ),
        )?;
      }
      Phase::Revealing => {
        self.header(stdout, level_no, level_count)?;
        self.progress_bar(stdout)?;
        self.draw_board(stdout, |h, coord| {
          let want = h.session.matcher().solution_cell(coord);
          h.shape_display(want, Attributes::default())
        })?;
      }
      Phase::Guessing => {
        self.header(stdout, level_no, level_count)?;
        text(stdout, START_X, START_Y + 2, Color::Grey, "Rebuild it!")?;
        self.draw_board(stdout, |h, coord| {
          let have = h.session.matcher().player_cell(coord);
          h.shape_display(have, Attributes::default())
        })?;
        self.palette_bar(stdout)?;
      }
      Phase::Scoring => {
        self.header(stdout, level_no, level_count)?;
        let (color, line) = score_line(self.session.level_score());
        text(stdout, START_X, START_Y + 2, color, &line)?;
        self.draw_board(stdout, |h, coord| h.scored_display(coord))?;
      }
      Phase::Ended => {
        let total = state.total();
        text(stdout, START_X, START_Y, Color::Yellow, "All done!")?;
        text(
          stdout,
          START_X,
          START_Y + 2,
          Color::White,
          &format!(
            "Final score: {}/{} ({}%). Press Enter to leave.",
            total.matched,
            total.possible,
            total.percent()
          ),
        )?;
      }
    }

    if phase == Phase::Guessing {
      let cursorpos = grid_to_screen(self.cursor);
      stdout.queue(MoveTo(cursorpos.0, cursorpos.1))?.queue(Show)?;
    }

    stdout.flush()?;
    Ok(())
  }

  fn header(
    &self,
    stdout: &mut Stdout,
    level_no: usize,
    level_count: usize,
  ) -> io::Result<()> {
    let state = self.session.state();
    text(
      stdout,
      START_X,
      START_Y,
      Color::Yellow,
      &format!(
        "Level {}/{}    score {}/{}",
        level_no, level_count, state.cumulative_score, state.cumulative_possible
      ),
    )
  }

  fn progress_bar(&self, stdout: &mut Stdout) -> io::Result<()> {
    let left = 1.0 - self.session.reveal_progress();
    let filled = (left * PROGRESS_WIDTH as f32).round() as u16;
    let bar: String = (0..PROGRESS_WIDTH)
      .map(|i| if i < filled { '█' } else { '░' })
      .collect();
    text(stdout, START_X, START_Y + 2, Color::Cyan, &bar)
  }

  fn palette_bar(&self, stdout: &mut Stdout) -> io::Result<()> {
    let palette = match self.session.level() {
      Some(level) => level.palette(),
      None => return Ok(()),
    };
    let y = BOARD_Y + self.session.matcher().height() as u16 * TILE_STRIDE_Y + 1;
    for (i, &id) in palette.iter().enumerate() {
      let selected = i == self.session.selected_index();
      let attrs = if selected {
        Attributes::default() | Attribute::Reverse | Attribute::Bold
      } else {
        Attributes::default()
      };
      let (ch, cols, fmt) = self.shape_display(Some(id), attrs);
      stdout
        .queue(MoveTo(BOARD_X + i as u16 * 3, y))?
        .queue(SetColors(cols))?
        .queue(SetAttributes(fmt))?
        .queue(Print(format!(" {} ", ch)))?
        .queue(SetAttributes(Attribute::Reset.into()))?;
    }
    Ok(())
  }

  fn draw_board(
    &self,
    stdout: &mut Stdout,
    display: impl Fn(&Self, Coord) -> (char, Colors, Attributes),
  ) -> io::Result<()> {
    let matcher = self.session.matcher();
    for y in 0..matcher.height() {
      for x in 0..matcher.width() {
        let coord = Coord::new(x, y);
        let (ch, cols, fmt) = display(self, coord);
        let screenpos = grid_to_screen(coord);
        stdout
          .queue(MoveTo(screenpos.0, screenpos.1))?
          .queue(SetColors(cols))?
          .queue(SetAttributes(fmt))?
          .queue(Print(ch))?
          .queue(SetAttributes(Attribute::Reset.into()))?;
      }
    }
    Ok(())
  }

  fn shape_display(
    &self,
    shape: Option<ShapeId>,
    attrs: Attributes,
  ) -> (char, Colors, Attributes) {
    match shape.and_then(|id| self.session.shapes().drawable(id)) {
      Some(glyph) => (glyph.ch, Colors::new(glyph.color, Color::Reset), attrs),
      None => bg_display(),
    }
  }

  /// Right shapes in green, wrong ones in red, missed ones greyed out.
  fn scored_display(&self, coord: Coord) -> (char, Colors, Attributes) {
    let matcher = self.session.matcher();
    let glyph_of = |id| self.session.shapes().drawable(id).map(|g| g.ch);
    let have = matcher.player_cell(coord);
    let want = matcher.solution_cell(coord);

    match (have.and_then(glyph_of), want.and_then(glyph_of)) {
      (Some(ch), _) if matcher.cell_matches(coord) => (
        ch,
        Colors::new(Color::Green, Color::Reset),
        Attribute::Bold.into(),
      ),
      (Some(ch), _) => (
        ch,
        Colors::new(Color::Red, Color::Reset),
        Attribute::CrossedOut.into(),
      ),
      (None, Some(ch)) => (
        ch,
        Colors::new(Color::DarkGrey, Color::Reset),
        Attribute::Dim.into(),
      ),
      (None, None) => bg_display(),
    }
  }
}

fn text(
  stdout: &mut Stdout,
  x: u16,
  y: u16,
  color: Color,
  s: &str,
) -> io::Result<()> {
  stdout
    .queue(MoveTo(x, y))?
    .queue(ResetColor)?
    .queue(SetForegroundColor(color))?
    .queue(Print(s))?;
  Ok(())
}

fn bg_display() -> (char, Colors, Attributes) {
  (
    '.',
    Colors::new(Color::DarkGrey, Color::Reset),
    Attribute::NormalIntensity.into(),
  )
}

fn grid_to_screen(coord: Coord) -> (u16, u16) {
  (
    coord.x as u16 * TILE_STRIDE_X + BOARD_X,
    coord.y as u16 * TILE_STRIDE_Y + BOARD_Y,
  )
}

fn score_line(score: Result<Score, InvariantViolation>) -> (Color, String) {
  match score {
    Ok(score) => (
      Color::Green,
      format!(
        "{}/{} in the right place. Press Enter to continue.",
        score.matched, score.possible
      ),
    ),
    Err(err) => (Color::Red, format!("Cannot score this board: {}", err)),
  }
}
