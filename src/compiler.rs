//! Sprite compile orchestration and the staleness decision.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::atlas::{self, DensityRef, PlacedImage};
use crate::config::{PipelineConfig, ScaleVariant, SpriteSheet, insert_suffix};
use crate::error::AssetNotFoundError;
use crate::packer::{Block, Packer, PlacementMode};

/// Offline build step that packs, rasterizes and writes every configured
/// sprite sheet.
///
/// Intended as a one-shot invocation; concurrent runs against the same output
/// paths are unsupported. A failure aborts the whole run, leaving artifacts
/// from earlier sheets in place.
pub struct SpriteCompiler<'a> {
  config: &'a PipelineConfig,
}

/// Source image with its dimensions settled, either from configuration or by
/// probing the base-density file.
#[derive(Debug, Clone)]
struct ResolvedImage {
  name: String,
  src: String,
  width: u32,
  height: u32,
  mode: PlacementMode,
}

impl<'a> SpriteCompiler<'a> {
  /// Create a compiler over the given configuration.
  pub fn new(config: &'a PipelineConfig) -> Self {
    Self { config }
  }

  /// Compile every configured sprite sheet.
  pub fn compile(&self) -> Result<()> {
    for sheet in &self.config.sprites {
      self.compile_sheet(sheet)?;
    }
    Ok(())
  }

  /// Decide, from modification timestamps alone, whether any configured atlas
  /// must be rebuilt.
  ///
  /// A missing generated output is the expected pre-build state and
  /// short-circuits to `true`; a missing *source* image is a configuration
  /// defect and fails with [`AssetNotFoundError`]. The check has no side
  /// effects and is cheap enough to run on every process start.
  pub fn recompilation_needed(&self) -> Result<bool> {
    for sheet in &self.config.sprites {
      for variant in sheet_densities(sheet) {
        let output = insert_suffix(&sheet.output, &variant.suffix);
        let Some(output_mtime) = mtime(&self.config.local_path(&output))? else {
          return Ok(true);
        };

        for image in &sheet.images {
          let src = insert_suffix(&image.src, &variant.suffix);
          let path = self.config.local_path(&src);
          let source_mtime = mtime(&path)?.ok_or(AssetNotFoundError::new(path))?;
          if source_mtime > output_mtime {
            return Ok(true);
          }
        }
      }
    }
    Ok(false)
  }

  fn compile_sheet(&self, sheet: &SpriteSheet) -> Result<()> {
    info!("compiling sprite sheet {}", sheet.name);
    let images = self.resolve_images(sheet)?;

    let variants = sheet_densities(sheet);
    let mut density_refs = Vec::with_capacity(variants.len());
    let mut base_layout = Vec::new();

    for variant in &variants {
      debug!(
        "rasterizing {} at {}x density",
        sheet.name, variant.multiplier
      );
      let placed = pack_variant(sheet, &images, variant)?;
      let canvas = atlas::rasterize(
        self.config,
        &placed,
        (sheet.width, sheet.height),
        variant.multiplier,
      )?;

      let output = insert_suffix(&sheet.output, &variant.suffix);
      atlas::write_atlas(&self.config.local_path(&output), &canvas)?;
      density_refs.push(DensityRef {
        multiplier: variant.multiplier,
        url: format!("{}{output}", self.config.static_url),
      });

      if variant.suffix.is_empty() {
        base_layout = placed;
      }
    }

    let document = atlas::render_metadata(sheet, &base_layout, &density_refs);
    atlas::write_metadata(&self.config.local_path(&sheet.scss_output), &document)
  }

  /// Fill in dimensions missing from the configuration by probing the
  /// base-density source file headers.
  fn resolve_images(&self, sheet: &SpriteSheet) -> Result<Vec<ResolvedImage>> {
    sheet
      .images
      .iter()
      .map(|spec| {
        let (width, height) = match (spec.width, spec.height) {
          (Some(width), Some(height)) => (width, height),
          _ => {
            let path = self.config.local_path(&spec.src);
            if !path.exists() {
              return Err(AssetNotFoundError::new(path).into());
            }
            let (probed_width, probed_height) = image::image_dimensions(&path)
              .with_context(|| format!("failed to probe image size of {}", path.display()))?;
            (
              spec.width.unwrap_or(probed_width),
              spec.height.unwrap_or(probed_height),
            )
          }
        };

        Ok(ResolvedImage {
          name: spec.name.clone(),
          src: spec.src.clone(),
          width,
          height,
          mode: spec.mode,
        })
      })
      .collect()
  }
}

/// Densities to generate for a sheet: the implicit base `(1, "")` followed by
/// the configured extra sizes, in configuration order.
fn sheet_densities(sheet: &SpriteSheet) -> Vec<ScaleVariant> {
  let mut variants = vec![ScaleVariant {
    multiplier: 1,
    suffix: String::new(),
  }];
  variants.extend(sheet.extra_sizes.iter().cloned());
  variants
}

/// Derive the density-suffixed block set for one variant, pack it and return
/// the placed layout. Widths and heights stay in base units; only names and
/// source paths gain the suffix.
fn pack_variant(
  sheet: &SpriteSheet,
  images: &[ResolvedImage],
  variant: &ScaleVariant,
) -> Result<Vec<PlacedImage>> {
  let mut blocks: Vec<Block> = images
    .iter()
    .map(|image| {
      Block::new(
        format!("{}{}", image.name, variant.suffix),
        image.width,
        image.height,
        image.mode,
      )
    })
    .collect();

  Packer::new(sheet.width, sheet.height)
    .fit(&mut blocks)
    .with_context(|| format!("failed to pack sprite sheet {}", sheet.name))?;

  blocks
    .into_iter()
    .zip(images)
    .map(|(block, image)| {
      let placement = block
        .placement
        .with_context(|| format!("block {} left unplaced after packing", block.name))?;
      Ok(PlacedImage {
        name: image.name.clone(),
        src: insert_suffix(&image.src, &variant.suffix),
        width: image.width,
        height: image.height,
        mode: image.mode,
        x: placement.x,
        y: placement.y,
      })
    })
    .collect()
}

fn mtime(path: &Path) -> Result<Option<SystemTime>> {
  match fs::metadata(path) {
    Ok(metadata) => {
      let modified = metadata
        .modified()
        .with_context(|| format!("failed to read mtime of {}", path.display()))?;
      Ok(Some(modified))
    }
    Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
    Err(err) => {
      Err(err).with_context(|| format!("failed to stat {}", path.display()))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::{FitError, FitErrorKind};
  use image::{Rgba, RgbaImage};
  use std::time::Duration;
  use tempfile::tempdir;

  fn config_with(static_root: &Path, sprites: serde_json::Value) -> PipelineConfig {
    serde_json::from_value(serde_json::json!({
      "static_root": static_root,
      "sprites": sprites,
    }))
    .unwrap()
  }

  fn write_solid_png(root: &Path, relative: &str, width: u32, height: u32, color: [u8; 4]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbaImage::from_pixel(width, height, Rgba(color))
      .save(path)
      .unwrap();
  }

  fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::options()
      .write(true)
      .open(path)
      .unwrap()
      .set_modified(time)
      .unwrap();
  }

  fn icon_sheet() -> serde_json::Value {
    serde_json::json!([{
      "name": "icons",
      "output": "img/icons.png",
      "scss_output": "scss/_icons.scss",
      "width": 8,
      "height": 8,
      "extra_sizes": [[2, "@2x"]],
      "images": [
        {"name": "red", "src": "img/red.png"},
        {"name": "blue", "src": "img/blue.png"}
      ]
    }])
  }

  fn write_icon_sources(root: &Path) {
    write_solid_png(root, "img/red.png", 2, 2, [255, 0, 0, 255]);
    write_solid_png(root, "img/red@2x.png", 4, 4, [255, 0, 0, 255]);
    write_solid_png(root, "img/blue.png", 2, 2, [0, 0, 255, 255]);
    write_solid_png(root, "img/blue@2x.png", 4, 4, [0, 0, 255, 255]);
  }

  #[test]
  fn compiles_atlases_and_shared_metadata() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_icon_sources(root);
    let config = config_with(root, icon_sheet());

    SpriteCompiler::new(&config).compile().unwrap();

    let base = image::open(root.join("img/icons.png")).unwrap().to_rgba8();
    assert_eq!(base.dimensions(), (8, 8));
    assert_eq!(*base.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    assert_eq!(*base.get_pixel(3, 0), Rgba([0, 0, 255, 255]));

    let retina = image::open(root.join("img/icons@2x.png")).unwrap().to_rgba8();
    assert_eq!(retina.dimensions(), (16, 16));
    assert_eq!(*retina.get_pixel(6, 0), Rgba([0, 0, 255, 255]));

    let metadata = fs::read_to_string(root.join("scss/_icons.scss")).unwrap();
    assert!(metadata.starts_with("$icons: (\n"));
    assert!(metadata.contains("_ratio: (1, 2),"));
    assert!(metadata.contains("url(/static/img/icons@2x.png)"));
    assert!(metadata.contains("red: (w: 2px, h: 2px, x: 0px, y: 0px"));
    assert!(metadata.contains("blue: (w: 2px, h: 2px, x: 3px, y: 0px"));
  }

  #[test]
  fn probes_dimensions_only_when_unspecified() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_solid_png(root, "img/tall.png", 2, 6, [9, 9, 9, 255]);
    let config = config_with(
      root,
      serde_json::json!([{
        "name": "one",
        "output": "img/one.png",
        "scss_output": "scss/_one.scss",
        "width": 10,
        "height": 10,
        "images": [{"name": "tall", "src": "img/tall.png"}]
      }]),
    );

    SpriteCompiler::new(&config).compile().unwrap();

    let metadata = fs::read_to_string(root.join("scss/_one.scss")).unwrap();
    assert!(metadata.contains("tall: (w: 2px, h: 6px"));
  }

  #[test]
  fn repeat_strip_and_fixed_block_share_a_tiny_canvas() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_solid_png(root, "img/normal.png", 1, 1, [1, 1, 1, 255]);
    write_solid_png(root, "img/repeat.png", 1, 1, [2, 2, 2, 255]);
    let config = config_with(
      root,
      serde_json::json!([{
        "name": "tiny",
        "output": "img/tiny.png",
        "scss_output": "scss/_tiny.scss",
        "width": 3,
        "height": 3,
        "images": [
          {"name": "normal", "src": "img/normal.png", "width": 1, "height": 1},
          {"name": "repeat", "src": "img/repeat.png", "width": 1, "height": 1, "mode": "repeat-x"}
        ]
      }]),
    );

    SpriteCompiler::new(&config).compile().unwrap();

    let atlas = image::open(root.join("img/tiny.png")).unwrap().to_rgba8();
    // The strip fills the bottom row, the fixed block packs above it.
    for x in 0..3 {
      assert_eq!(*atlas.get_pixel(x, 2), Rgba([2, 2, 2, 255]));
    }
    assert_eq!(*atlas.get_pixel(0, 0), Rgba([1, 1, 1, 255]));
  }

  #[test]
  fn missing_source_aborts_the_compile_run() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let config = config_with(
      root,
      serde_json::json!([{
        "name": "broken",
        "output": "img/broken.png",
        "scss_output": "scss/_broken.scss",
        "width": 8,
        "height": 8,
        "images": [{"name": "ghost", "src": "img/ghost.png"}]
      }]),
    );

    let err = SpriteCompiler::new(&config).compile().unwrap_err();
    assert!(err.downcast_ref::<AssetNotFoundError>().is_some());
    assert!(!root.join("img/broken.png").exists());
  }

  #[test]
  fn overflowing_sheet_fails_with_a_fit_error() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_solid_png(root, "img/big.png", 12, 12, [7, 7, 7, 255]);
    let config = config_with(
      root,
      serde_json::json!([{
        "name": "small",
        "output": "img/small.png",
        "scss_output": "scss/_small.scss",
        "width": 4,
        "height": 4,
        "images": [{"name": "big", "src": "img/big.png"}]
      }]),
    );

    let err = SpriteCompiler::new(&config).compile().unwrap_err();
    let fit = err.downcast_ref::<FitError>().unwrap();
    assert_eq!(fit.kind, FitErrorKind::CanvasExhausted);
    assert_eq!(fit.block, "big");
  }

  #[test]
  fn missing_output_means_recompilation_needed() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_icon_sources(root);
    let config = config_with(root, icon_sheet());

    let compiler = SpriteCompiler::new(&config);
    assert!(compiler.recompilation_needed().unwrap());
  }

  #[test]
  fn fresh_outputs_do_not_need_recompilation() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_icon_sources(root);
    let config = config_with(root, icon_sheet());

    let compiler = SpriteCompiler::new(&config);
    compiler.compile().unwrap();

    let past = SystemTime::now() - Duration::from_secs(600);
    for source in ["img/red.png", "img/red@2x.png", "img/blue.png", "img/blue@2x.png"] {
      set_mtime(&root.join(source), past);
    }

    assert!(!compiler.recompilation_needed().unwrap());
  }

  #[test]
  fn newer_source_marks_the_atlas_stale() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_icon_sources(root);
    let config = config_with(root, icon_sheet());

    let compiler = SpriteCompiler::new(&config);
    compiler.compile().unwrap();

    let future = SystemTime::now() + Duration::from_secs(600);
    set_mtime(&root.join("img/blue@2x.png"), future);

    assert!(compiler.recompilation_needed().unwrap());
  }

  #[test]
  fn missing_source_fails_the_staleness_check() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_icon_sources(root);
    let config = config_with(root, icon_sheet());

    let compiler = SpriteCompiler::new(&config);
    compiler.compile().unwrap();
    fs::remove_file(root.join("img/red@2x.png")).unwrap();

    let err = compiler.recompilation_needed().unwrap_err();
    let not_found = err.downcast_ref::<AssetNotFoundError>().unwrap();
    assert!(not_found.path.ends_with("img/red@2x.png"));
  }
}
