//! Source diagnostics for broken level files.

use std::{fs, io, ops::Range, path::Path};

use ariadne::{Label, Report, ReportKind, Source};
use terminal_memory::LevelFormatError;

/// Print `err` to stderr, pointing into the level file when possible.
pub fn level_error(path: &Path, err: &LevelFormatError) -> io::Result<()> {
  let (span, src) = match (err.span(), fs::read_to_string(path)) {
    (Some(span), Ok(src)) => (span, src),
    _ => {
      eprintln!("{}: {}", path.display(), err);
      return Ok(());
    }
  };

  // empty spans (end of file) get the preceding character
  let span = match span {
    Range { start, end } if start == end && start > 0 => start - 1..end,
    span => span,
  };

  Report::<Range<usize>>::build(ReportKind::Error, (), span.start)
    .with_message(format!("{} is not a valid level", path.display()))
    .with_label(Label::new(span).with_message(err.to_string()))
    .finish()
    .eprint(Source::from(src))
}
