//! Level manifests.
//!
//! A manifest is a text file listing one level file per line. Relative
//! entries are resolved against the manifest's own directory.

use std::{
  fs, io,
  path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{parse_level, LevelDescriptor, LevelFormatError, ShapeSet};

#[derive(Debug, Error)]
#[error("could not read level manifest {}", .path.display())]
pub struct CatalogError {
  pub path: PathBuf,
  #[source]
  pub source: io::Error,
}

/// Anything that can hand out levels by index.
pub trait LevelSource {
  fn level_count(&self) -> usize;

  /// Parse level `index`. Out-of-range indices are the caller's bug and may
  /// panic.
  fn load_level<S: ShapeSet + ?Sized>(
    &self,
    index: usize,
    shapes: &S,
  ) -> Result<LevelDescriptor, LevelFormatError>;
}

/// Ordered list of level files.
#[derive(Debug, Clone, Default)]
pub struct LevelCatalog {
  levels: Vec<PathBuf>,
}

impl LevelCatalog {
  pub fn load(manifest: &Path) -> Result<Self, CatalogError> {
    let text = fs::read_to_string(manifest).map_err(|source| CatalogError {
      path: manifest.to_owned(),
      source,
    })?;
    let base = manifest.parent().unwrap_or_else(|| Path::new(""));
    let catalog = Self::from_manifest_str(&text, base);
    tracing::debug!(
      manifest = %manifest.display(),
      levels = catalog.level_count(),
      "loaded level manifest"
    );
    Ok(catalog)
  }

  /// Like [`LevelCatalog::load`], but an unreadable manifest just means there
  /// are no levels.
  pub fn load_or_empty(manifest: &Path) -> Self {
    match Self::load(manifest) {
      Ok(catalog) => catalog,
      Err(err) => {
        tracing::warn!(error = %err, "treating manifest as empty");
        Self::default()
      }
    }
  }

  pub fn from_manifest_str(text: &str, base: &Path) -> Self {
    let levels = text
      .lines()
      .map(|line| line.trim_end_matches('\r'))
      .filter(|line| !line.trim().is_empty())
      .map(|line| base.join(line))
      .collect();
    Self { levels }
  }

  pub fn paths(&self) -> &[PathBuf] {
    &self.levels
  }

}

impl LevelSource for LevelCatalog {
  fn level_count(&self) -> usize {
    self.levels.len()
  }

  fn load_level<S: ShapeSet + ?Sized>(
    &self,
    index: usize,
    shapes: &S,
  ) -> Result<LevelDescriptor, LevelFormatError> {
    parse_level(&self.levels[index], shapes)
  }
}
