use std::{
  fmt, fs, io,
  ops::Range,
  path::{Path, PathBuf},
};

use aglet::{Coord, Grid};
use nom::{
  character::complete::{char, i64 as int, space0, u32 as uint},
  combinator::all_consuming,
  error::{context, VerboseError},
  multi::separated_list1,
  number::complete::float,
  sequence::separated_pair,
  Finish, IResult, Parser,
};
use thiserror::Error;

use crate::{LevelDescriptor, ShapeId, ShapeSet};

type PResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

/// Cell value marking an empty solution cell.
const EMPTY_CELL: i64 = -1;

/// Which part of a level file an error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
  RevealSeconds,
  Palette,
  Dimensions,
  Row(u32),
}

impl fmt::Display for Field {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Field::RevealSeconds => f.write_str("reveal duration"),
      Field::Palette => f.write_str("palette"),
      Field::Dimensions => f.write_str("grid dimensions"),
      Field::Row(row) => write!(f, "grid row {}", row),
    }
  }
}

/// A level file that cannot become a playable level.
///
/// Spans are byte ranges into the level source text.
#[derive(Debug, Error)]
pub enum LevelFormatError {
  #[error("could not read level file {}", .path.display())]
  Unreadable {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("missing {field} line")]
  MissingLine { field: Field, span: Range<usize> },
  #[error("malformed {field}")]
  Malformed { field: Field, span: Range<usize> },
  #[error("reveal duration must be a positive number of seconds, got {seconds}")]
  NonPositiveReveal { seconds: f32, span: Range<usize> },
  #[error("grid must be at least 1x1, got {width}x{height}")]
  EmptyGrid {
    width: u32,
    height: u32,
    span: Range<usize>,
  },
  #[error("shape index {index} is not one of the {known} known shapes")]
  UnknownShape {
    index: i64,
    known: usize,
    span: Range<usize>,
  },
  #[error("grid row {row} has {found} cells, expected {expected}")]
  RowWidth {
    row: u32,
    expected: u32,
    found: usize,
    span: Range<usize>,
  },
  #[error("expected {expected} grid rows, found {found}")]
  RowCount {
    expected: u32,
    found: usize,
    span: Range<usize>,
  },
}

impl LevelFormatError {
  /// Where in the source text the problem is, if it is about the text.
  pub fn span(&self) -> Option<Range<usize>> {
    match self {
      LevelFormatError::Unreadable { .. } => None,
      LevelFormatError::MissingLine { span, .. }
      | LevelFormatError::Malformed { span, .. }
      | LevelFormatError::NonPositiveReveal { span, .. }
      | LevelFormatError::EmptyGrid { span, .. }
      | LevelFormatError::UnknownShape { span, .. }
      | LevelFormatError::RowWidth { span, .. }
      | LevelFormatError::RowCount { span, .. } => Some(span.clone()),
    }
  }
}

/// Read and parse a level file.
pub fn parse_level<S: ShapeSet + ?Sized>(
  path: &Path,
  shapes: &S,
) -> Result<LevelDescriptor, LevelFormatError> {
  let src =
    fs::read_to_string(path).map_err(|source| LevelFormatError::Unreadable {
      path: path.to_owned(),
      source,
    })?;
  let level = parse_level_str(&src, shapes)?;
  tracing::debug!(
    path = %path.display(),
    width = level.width(),
    height = level.height(),
    "parsed level"
  );
  Ok(level)
}

/// Parse level source text.
///
/// Layout: reveal seconds, palette indices, `width,height`, then exactly
/// `height` rows of `width` cells where `-1` is empty.
pub fn parse_level_str<S: ShapeSet + ?Sized>(
  src: &str,
  shapes: &S,
) -> Result<LevelDescriptor, LevelFormatError> {
  let mut lines = split_lines(src);
  while lines.last().map_or(false, |l| l.text.trim().is_empty()) {
    lines.pop();
  }
  let eof = src.len()..src.len();
  let header = |idx: usize, field: Field| {
    lines.get(idx).ok_or_else(|| LevelFormatError::MissingLine {
      field,
      span: eof.clone(),
    })
  };

  let reveal_line = header(0, Field::RevealSeconds)?;
  let reveal = reveal_line.parse(Field::RevealSeconds, token(float))?;
  if !(reveal.value.is_finite() && reveal.value > 0.0) {
    return Err(LevelFormatError::NonPositiveReveal {
      seconds: reveal.value,
      span: reveal_line.span_of(&reveal),
    });
  }

  let palette_line = header(1, Field::Palette)?;
  let palette = palette_line
    .parse(Field::Palette, separated_list1(char(','), token(int)))?
    .into_iter()
    .map(|tok| shape_id(tok.value, palette_line.span_of(&tok), shapes))
    .collect::<Result<Vec<_>, _>>()?;

  let dims_line = header(2, Field::Dimensions)?;
  let (width, height) = dims_line.parse(
    Field::Dimensions,
    separated_pair(token(uint), char(','), token(uint)),
  )?;
  if width.value == 0 || height.value == 0 {
    return Err(LevelFormatError::EmptyGrid {
      width: width.value,
      height: height.value,
      span: dims_line.span(),
    });
  }
  let (width, height) = (width.value, height.value);

  let rows = &lines[3..];
  if rows.len() != height as usize {
    let span = match rows.get(height as usize) {
      Some(extra) => extra.span(),
      None => eof,
    };
    return Err(LevelFormatError::RowCount {
      expected: height,
      found: rows.len(),
      span,
    });
  }

  // Every row is checked against the declared width before the grid is
  // allocated, so the header alone can never size it.
  let mut placed = Vec::new();
  for (y, line) in (0..height).zip(rows) {
    let cells =
      line.parse(Field::Row(y), separated_list1(char(','), token(cell)))?;
    if cells.len() != width as usize {
      return Err(LevelFormatError::RowWidth {
        row: y,
        expected: width,
        found: cells.len(),
        span: line.span(),
      });
    }
    for (x, tok) in (0..width).zip(&cells) {
      if tok.value == EMPTY_CELL {
        continue;
      }
      let id = shape_id(tok.value, line.span_of(tok), shapes)?;
      placed.push((Coord::new(x, y), id));
    }
  }

  if width.checked_mul(height).is_none() {
    return Err(LevelFormatError::Malformed {
      field: Field::Dimensions,
      span: dims_line.span(),
    });
  }
  let mut solution = Grid::new(width, height);
  for (coord, id) in placed {
    solution.insert(coord, id);
  }

  Ok(LevelDescriptor::new(reveal.value, palette, solution))
}

fn shape_id<S: ShapeSet + ?Sized>(
  index: i64,
  span: Range<usize>,
  shapes: &S,
) -> Result<ShapeId, LevelFormatError> {
  u32::try_from(index)
    .ok()
    .map(ShapeId::new)
    .filter(|&id| shapes.contains(id))
    .ok_or(LevelFormatError::UnknownShape {
      index,
      known: shapes.shape_count(),
      span,
    })
}

/// One source line with its byte offset; `\r` already stripped.
struct Line<'a> {
  text: &'a str,
  offset: usize,
}

impl<'a> Line<'a> {
  fn span(&self) -> Range<usize> {
    self.offset..self.offset + self.text.len()
  }

  fn span_of<O>(&self, tok: &Spanned<O>) -> Range<usize> {
    let start = self.offset + self.text.len() - tok.tail;
    start..start + tok.len
  }

  /// Run `parser` over the whole line.
  fn parse<O, P>(&self, field: Field, parser: P) -> Result<O, LevelFormatError>
  where
    P: Parser<&'a str, O, VerboseError<&'a str>>,
  {
    match all_consuming(parser)(self.text).finish() {
      Ok((_, out)) => Ok(out),
      Err(e) => {
        let at = e
          .errors
          .first()
          .map_or(0, |(rest, _)| self.text.len() - rest.len());
        Err(LevelFormatError::Malformed {
          field,
          span: self.offset + at..self.offset + self.text.len(),
        })
      }
    }
  }
}

fn split_lines(src: &str) -> Vec<Line<'_>> {
  let mut offset = 0;
  src
    .split('\n')
    .map(|raw| {
      let line = Line {
        text: raw.strip_suffix('\r').unwrap_or(raw),
        offset,
      };
      offset += raw.len() + 1;
      line
    })
    .collect()
}

/// A parsed value plus where it sat in its line, measured from the line end
/// so it stays valid however the line was sliced.
struct Spanned<O> {
  tail: usize,
  len: usize,
  value: O,
}

// nice combinator
fn token<'a, O, F>(mut inner: F) -> impl FnMut(&'a str) -> PResult<'a, Spanned<O>>
where
  F: Parser<&'a str, O, VerboseError<&'a str>>,
{
  move |s: &'a str| {
    let (s, _) = space0(s)?;
    let start = s;
    let (s, value) = inner.parse(s)?;
    let len = start.len() - s.len();
    let (s, _) = space0(s)?;
    Ok((
      s,
      Spanned {
        tail: start.len(),
        len,
        value,
      },
    ))
  }
}

fn cell(s: &str) -> PResult<'_, i64> {
  context("cell", int)(s)
}
