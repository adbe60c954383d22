//! Atlas rasterization and SCSS metadata rendering for packed layouts.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::{RgbaImage, imageops};

use crate::config::{PipelineConfig, SpriteSheet};
use crate::error::AssetNotFoundError;
use crate::packer::PlacementMode;

/// One image with its assigned atlas position, in base-density units.
///
/// `src` is already density-suffixed; the offsets and dimensions stay in base
/// units and are scaled by the multiplier during rasterization.
#[derive(Debug, Clone)]
pub struct PlacedImage {
  /// Logical image name used as the SCSS map key.
  pub name: String,
  /// Density-suffixed source path under the static root.
  pub src: String,
  /// Image width in base-density units.
  pub width: u32,
  /// Image height in base-density units.
  pub height: u32,
  /// Placement mode the image was packed with.
  pub mode: PlacementMode,
  /// Assigned left edge in base-density units.
  pub x: u32,
  /// Assigned top edge in base-density units.
  pub y: u32,
}

/// One generated density variant referenced from the shared metadata file.
#[derive(Debug, Clone)]
pub struct DensityRef {
  /// Scale factor of this variant.
  pub multiplier: u32,
  /// Public URL of the variant's atlas image.
  pub url: String,
}

/// Rasterize one density variant of a packed layout onto a fresh RGBA canvas.
///
/// Source files are expected to exist at the variant's resolution already
/// (for example `icon@2x.png` at twice the base size); they are pasted, never
/// resampled. Tiled modes cover the full canvas extent, clipping the final
/// repetition at the edge.
pub fn rasterize(
  config: &PipelineConfig,
  images: &[PlacedImage],
  canvas_size: (u32, u32),
  multiplier: u32,
) -> Result<RgbaImage> {
  let (canvas_width, canvas_height) = canvas_size;
  let mut canvas = RgbaImage::new(canvas_width * multiplier, canvas_height * multiplier);

  for image in images {
    let path = config.local_path(&image.src);
    if !path.exists() {
      return Err(AssetNotFoundError::new(path).into());
    }
    let tile = image::open(&path)
      .with_context(|| format!("failed to decode source image {}", path.display()))?
      .to_rgba8();

    let scale = i64::from(multiplier);
    match image.mode {
      PlacementMode::NoRepeat => {
        imageops::overlay(
          &mut canvas,
          &tile,
          i64::from(image.x) * scale,
          i64::from(image.y) * scale,
        );
      }
      PlacementMode::RepeatX => {
        for repeat in 0..canvas_width.div_ceil(image.width) {
          imageops::overlay(
            &mut canvas,
            &tile,
            i64::from(repeat * image.width) * scale,
            i64::from(image.y) * scale,
          );
        }
      }
      PlacementMode::RepeatY => {
        for repeat in 0..canvas_height.div_ceil(image.height) {
          imageops::overlay(
            &mut canvas,
            &tile,
            i64::from(image.x) * scale,
            i64::from(repeat * image.height) * scale,
          );
        }
      }
    }
  }

  Ok(canvas)
}

/// Render the shared SCSS metadata document for a sheet.
///
/// All offsets and sizes are in base-density units; `_ratio` and `_url` are
/// positionally aligned lists, one entry per generated density, so the
/// consuming stylesheet can pick a density-appropriate background image while
/// sharing one offset table. Offsets are negated for direct use as
/// `background-position` values.
pub fn render_metadata(
  sheet: &SpriteSheet,
  images: &[PlacedImage],
  densities: &[DensityRef],
) -> String {
  let mut document = String::new();
  let _ = writeln!(document, "${}: (", sheet.name);
  let _ = writeln!(document, "  _w: {}px,", sheet.width);
  let _ = writeln!(document, "  _h: {}px,", sheet.height);
  let _ = writeln!(document, "  _size: {}px {}px,", sheet.width, sheet.height);
  let _ = writeln!(
    document,
    "  _ratio: {},",
    scss_list(densities.iter().map(|density| density.multiplier.to_string()))
  );
  let _ = writeln!(
    document,
    "  _url: {},",
    scss_list(densities.iter().map(|density| format!("url({})", density.url)))
  );

  let entries: Vec<String> = images.iter().map(image_entry).collect();
  document.push_str(&entries.join(",\n"));
  document.push_str("\n);\n");
  document
}

fn image_entry(image: &PlacedImage) -> String {
  format!(
    "  {name}: (w: {w}px, h: {h}px, x: {x}px, y: {y}px, size: {w}px {h}px, offset: -{x}px -{y}px)",
    name = image.name,
    w = image.width,
    h = image.height,
    x = image.x,
    y = image.y,
  )
}

/// Format values as an SCSS list; single values keep a trailing comma so the
/// result still reads as a list.
fn scss_list(values: impl Iterator<Item = String>) -> String {
  let values: Vec<String> = values.collect();
  if values.len() == 1 {
    format!("({},)", values[0])
  } else {
    format!("({})", values.join(", "))
  }
}

/// Write a rasterized atlas, creating parent directories as needed. Existing
/// files are overwritten.
pub fn write_atlas(path: &Path, atlas: &RgbaImage) -> Result<()> {
  ensure_parent(path)?;
  atlas
    .save(path)
    .with_context(|| format!("failed to write atlas image {}", path.display()))?;
  Ok(())
}

/// Write the shared SCSS metadata file, creating parent directories as needed.
pub fn write_metadata(path: &Path, document: &str) -> Result<()> {
  ensure_parent(path)?;
  fs::write(path, document)
    .with_context(|| format!("failed to write sprite metadata {}", path.display()))?;
  Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    fs::create_dir_all(parent)
      .with_context(|| format!("failed to create output directory {}", parent.display()))?;
  }
  Ok(())
}
