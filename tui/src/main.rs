mod harness;
mod report;
mod shapes;

use std::{fs::File, path::Path, sync::Mutex};

use argh::FromArgs;
use eyre::eyre;
use harness::{Outcome, PlayHarness};
use shapes::SHAPES;
use terminal_memory::{
  parse_level, LevelCatalog, LevelSource, Session, SessionError, ShapeSet,
};

fn main() -> eyre::Result<()> {
  let args: ArgsEntrypoint = argh::from_env();

  match args.sub {
    Subcommands::Play(play) => play.run()?,
    Subcommands::Check(check) => check.run()?,
  }

  Ok(())
}

#[derive(FromArgs, Debug)]
/// A terminal memory puzzle: study the grid, then rebuild it from memory.
struct ArgsEntrypoint {
  #[argh(subcommand)]
  sub: Subcommands,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Subcommands {
  Play(CmdPlay),
  Check(CmdCheck),
}

/// Play every level listed in a manifest.
///
/// Controls:
/// - Enter to move on (start, show the solution, submit, next level).
/// - Arrow keys or HJKL to move the cursor. Press shift to snap to the edge of
///   the grid.
/// - Space or left click to place the selected shape.
/// - X, Backspace or right click to clear a cell.
/// - Tab / Shift+Tab, [ and ], or the scroll wheel to pick a shape.
/// - Esc or Ctrl+C to quit.
/// - Ctrl+L to redraw the screen.
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "play")]
struct CmdPlay {
  /// path to the level manifest.
  #[argh(positional)]
  manifest: String,

  /// write debug logs to this file.
  #[argh(option)]
  log: Option<String>,
}

impl CmdPlay {
  fn run(&self) -> eyre::Result<()> {
    if let Some(log) = &self.log {
      init_logging(log)?;
    }

    let catalog = LevelCatalog::load_or_empty(Path::new(&self.manifest));
    let paths = catalog.paths().to_vec();
    let session = Session::new(catalog, SHAPES);

    match PlayHarness::enter(session)? {
      Outcome::Finished(total) => {
        println!(
          "Final score: {}/{} ({}%)",
          total.matched,
          total.possible,
          total.percent()
        );
      }
      Outcome::Quit => {}
      Outcome::Failed(SessionError::Level { index, source }) => {
        report::level_error(&paths[index], &source)?;
        return Err(eyre!("level {} could not be loaded", index + 1));
      }
      Outcome::Failed(err) => return Err(err.into()),
    }
    Ok(())
  }
}

/// Parse every level in a manifest and report the broken ones.
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "check")]
struct CmdCheck {
  /// path to the level manifest.
  #[argh(positional)]
  manifest: String,
}

impl CmdCheck {
  fn run(&self) -> eyre::Result<()> {
    let catalog = LevelCatalog::load(Path::new(&self.manifest))?;

    let mut failed = 0;
    for path in catalog.paths() {
      match parse_level(path, &SHAPES) {
        Ok(level) => println!(
          "ok    {} ({}x{}, {} to find, {} shapes on offer)",
          path.display(),
          level.width(),
          level.height(),
          level.occupied_cells(),
          level.palette().len(),
        ),
        Err(err) => {
          failed += 1;
          report::level_error(path, &err)?;
        }
      }
    }

    if failed > 0 {
      return Err(eyre!(
        "{} of {} levels failed (shape set has {} shapes)",
        failed,
        catalog.level_count(),
        SHAPES.shape_count()
      ));
    }
    Ok(())
  }
}

/// The harness owns the terminal, so logs only ever go to a file.
fn init_logging(path: &str) -> eyre::Result<()> {
  let file = File::create(path)?;
  tracing_subscriber::fmt()
    .with_writer(Mutex::new(file))
    .with_ansi(false)
    .with_max_level(tracing::Level::DEBUG)
    .init();
  Ok(())
}
