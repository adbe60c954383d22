//! Typed failures shared across the sprite and asset-group pipelines.

use std::path::PathBuf;

/// Reason a block could not be placed on the atlas canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitErrorKind {
  /// No free node large enough remained on the canvas.
  CanvasExhausted,
  /// The block set asked for both `repeat-x` and `repeat-y` strips.
  MixedRepeatModes,
}

/// Packing failure, always naming the block that could not be placed.
///
/// Raised by [`crate::packer::Packer::fit`]; there are no partial layouts, so a
/// fit error aborts the whole sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitError {
  /// Name of the block that triggered the failure.
  pub block: String,
  /// What went wrong.
  pub kind: FitErrorKind,
}

impl FitError {
  pub(crate) fn exhausted(block: &str) -> Self {
    Self {
      block: block.to_string(),
      kind: FitErrorKind::CanvasExhausted,
    }
  }

  pub(crate) fn mixed_repeat(block: &str) -> Self {
    Self {
      block: block.to_string(),
      kind: FitErrorKind::MixedRepeatModes,
    }
  }
}

impl std::fmt::Display for FitError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self.kind {
      FitErrorKind::CanvasExhausted => {
        write!(f, "no space left on canvas for block {}", self.block)
      }
      FitErrorKind::MixedRepeatModes => {
        write!(f, "cannot mix repeat-x and repeat-y for {}", self.block)
      }
    }
  }
}

impl std::error::Error for FitError {}

/// A configured source image does not exist on the filesystem.
///
/// A missing *input* is a configuration defect and fatal, unlike a missing
/// generated *output* which merely marks the atlas as not yet built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetNotFoundError {
  /// Resolved local path that could not be read.
  pub path: PathBuf,
}

impl AssetNotFoundError {
  pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

impl std::fmt::Display for AssetNotFoundError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "source asset not found: {}", self.path.display())
  }
}

impl std::error::Error for AssetNotFoundError {}

/// Failure while expanding asset-group names into artifact references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
  /// A name used in `depends` or requested directly is not configured.
  UnknownAsset(String),
  /// The `depends` graph loops back on a group still being resolved.
  CyclicDependency(String),
}

impl std::fmt::Display for ResolveError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::UnknownAsset(name) => write!(f, "asset {name} not registered"),
      Self::CyclicDependency(name) => {
        write!(f, "cyclic dependency while resolving asset {name}")
      }
    }
  }
}

impl std::error::Error for ResolveError {}
