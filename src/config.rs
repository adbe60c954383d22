//! Pipeline configuration loader describing sprite sheets and asset groups.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

use crate::packer::PlacementMode;

/// Top-level configuration consumed by both halves of the pipeline.
///
/// Loadable from JSON or YAML; the file extension picks the format.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
  /// URL prefix substituted for the `static://` scheme in asset references.
  #[serde(default = "default_static_url")]
  pub static_url: String,
  /// Local directory that slash-separated asset paths resolve under.
  pub static_root: PathBuf,
  /// Sprite sheets compiled by the offline build step.
  #[serde(default)]
  pub sprites: Vec<SpriteSheet>,
  /// Named asset groups resolved at render time.
  #[serde(default)]
  pub assets: BTreeMap<String, AssetGroupConfig>,
}

fn default_static_url() -> String {
  "/static/".to_string()
}

impl PipelineConfig {
  /// Load configuration from a JSON (`.json`) or YAML (`.yml`/`.yaml`) file.
  pub fn from_path(path: &Path) -> Result<Self> {
    let contents = fs::read_to_string(path)
      .with_context(|| format!("failed to read configuration at {}", path.display()))?;

    let extension = path.extension().and_then(|ext| ext.to_str());
    let config = match extension {
      Some("yml" | "yaml") => serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse YAML configuration at {}", path.display()))?,
      _ => serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse JSON configuration at {}", path.display()))?,
    };
    Ok(config)
  }

  /// Resolve a slash-separated asset path to a file under `static_root`.
  pub fn local_path(&self, asset_path: &str) -> PathBuf {
    let mut path = self.static_root.clone();
    for segment in asset_path.split('/').filter(|segment| !segment.is_empty()) {
      path.push(segment);
    }
    path
  }

  /// Rewrite a `static://` reference against `static_url`; other references
  /// pass through untouched.
  pub fn rewrite_static(&self, reference: &str) -> String {
    match reference.strip_prefix("static://") {
      Some(rest) => format!("{}{rest}", self.static_url),
      None => reference.to_string(),
    }
  }
}

/// One sprite atlas: a canvas, the images packed onto it and the artifacts to
/// write.
#[derive(Debug, Clone, Deserialize)]
pub struct SpriteSheet {
  /// Sheet name; becomes the SCSS variable name.
  pub name: String,
  /// Slash-separated output path of the base-density atlas image.
  pub output: String,
  /// Slash-separated output path of the shared SCSS metadata file.
  pub scss_output: String,
  /// Canvas width in base-density units.
  pub width: u32,
  /// Canvas height in base-density units.
  pub height: u32,
  /// Additional pixel-density variants beyond the implicit `(1, "")`.
  #[serde(default)]
  pub extra_sizes: Vec<ScaleVariant>,
  /// Images packed onto the sheet, in packing order.
  pub images: Vec<ImageSpec>,
}

/// A pixel-density variant: the scale multiplier and the filename suffix
/// inserted before the extension (for example `(2, "@2x")`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "(u32, String)")]
pub struct ScaleVariant {
  /// Scale factor relative to the base density.
  pub multiplier: u32,
  /// Suffix inserted into source and output filenames.
  pub suffix: String,
}

impl From<(u32, String)> for ScaleVariant {
  fn from((multiplier, suffix): (u32, String)) -> Self {
    Self { multiplier, suffix }
  }
}

/// A single source image within a sprite sheet.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSpec {
  /// Logical name used as the SCSS map key.
  pub name: String,
  /// Slash-separated source path under `static_root`.
  pub src: String,
  /// Width in base-density units; probed from the file when absent.
  #[serde(default)]
  pub width: Option<u32>,
  /// Height in base-density units; probed from the file when absent.
  #[serde(default)]
  pub height: Option<u32>,
  /// Placement mode, `no-repeat` by default.
  #[serde(default)]
  pub mode: PlacementMode,
}

/// Raw asset-group record as authored in the configuration file.
///
/// `css`/`js` accept a single string or a list; `attributes` accepts a single
/// map or a list of maps zipped positionally against the references.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetGroupConfig {
  /// Stylesheet references.
  #[serde(default, deserialize_with = "one_or_many")]
  pub css: Vec<String>,
  /// Script references.
  #[serde(default, deserialize_with = "one_or_many")]
  pub js: Vec<String>,
  /// Asset groups emitted before this one.
  #[serde(default)]
  pub depends: Vec<String>,
  /// Extra tag attributes, paired positionally with `css`/`js` entries.
  #[serde(default, deserialize_with = "one_or_many")]
  pub attributes: Vec<BTreeMap<String, String>>,
  /// Whether the external CDN layer may cache this group locally.
  #[serde(default = "default_cache")]
  pub cache: bool,
}

fn default_cache() -> bool {
  true
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
  }

  Ok(match OneOrMany::deserialize(deserializer)? {
    OneOrMany::One(value) => vec![value],
    OneOrMany::Many(values) => values,
  })
}

/// Insert a density suffix before the file extension of a slash-separated
/// path: `img/sprites.png` + `@2x` becomes `img/sprites@2x.png`. Paths
/// without an extension get the suffix appended.
pub fn insert_suffix(path: &str, suffix: &str) -> String {
  if suffix.is_empty() {
    return path.to_string();
  }

  let basename_start = path.rfind('/').map_or(0, |index| index + 1);
  match path[basename_start..].rfind('.') {
    Some(dot) => {
      let split = basename_start + dot;
      format!("{}{suffix}{}", &path[..split], &path[split..])
    }
    None => format!("{path}{suffix}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn inserts_suffix_before_extension() {
    assert_eq!(insert_suffix("img/sprites.png", "@2x"), "img/sprites@2x.png");
    assert_eq!(insert_suffix("sprites.png", "@2x"), "sprites@2x.png");
    assert_eq!(insert_suffix("img/sprites", "@2x"), "img/sprites@2x");
    assert_eq!(insert_suffix("v1.2/sprites", "@2x"), "v1.2/sprites@2x");
    assert_eq!(insert_suffix("img/sprites.png", ""), "img/sprites.png");
  }

  #[test]
  fn rewrites_static_scheme_references() {
    let config: PipelineConfig =
      serde_json::from_str(r#"{"static_root": "/srv/static"}"#).unwrap();

    assert_eq!(config.rewrite_static("static://js/app.js"), "/static/js/app.js");
    assert_eq!(
      config.rewrite_static("http://example.tld/app.js"),
      "http://example.tld/app.js"
    );
  }

  #[test]
  fn resolves_local_paths_by_segment() {
    let config: PipelineConfig =
      serde_json::from_str(r#"{"static_root": "/srv/static"}"#).unwrap();

    assert_eq!(
      config.local_path("img/icons/home.png"),
      PathBuf::from("/srv/static/img/icons/home.png")
    );
  }

  #[test]
  fn parses_sprite_sheets_with_extra_sizes() {
    let config: PipelineConfig = serde_json::from_str(
      r#"{
        "static_root": "static",
        "sprites": [{
          "name": "icons",
          "output": "img/icons.png",
          "scss_output": "scss/_icons.scss",
          "width": 64,
          "height": 64,
          "extra_sizes": [[2, "@2x"]],
          "images": [
            {"name": "home", "src": "img/home.png"},
            {"name": "edge", "src": "img/edge.png", "width": 4, "height": 4, "mode": "repeat-x"}
          ]
        }]
      }"#,
    )
    .unwrap();

    let sheet = &config.sprites[0];
    assert_eq!(sheet.extra_sizes, vec![ScaleVariant {
      multiplier: 2,
      suffix: "@2x".to_string()
    }]);
    assert_eq!(sheet.images[0].mode, PlacementMode::NoRepeat);
    assert_eq!(sheet.images[1].mode, PlacementMode::RepeatX);
    assert_eq!(sheet.images[1].width, Some(4));
  }

  #[test]
  fn accepts_scalar_and_list_asset_shapes() {
    let config: PipelineConfig = serde_json::from_str(
      r#"{
        "static_root": "static",
        "assets": {
          "app": {
            "css": "static://css/app.css",
            "js": ["static://js/a.js", "static://js/b.js"],
            "attributes": {"defer": ""}
          }
        }
      }"#,
    )
    .unwrap();

    let group = &config.assets["app"];
    assert_eq!(group.css, vec!["static://css/app.css"]);
    assert_eq!(group.js.len(), 2);
    assert_eq!(group.attributes.len(), 1);
    assert!(group.cache);
    assert!(group.depends.is_empty());
  }

  #[test]
  fn loads_yaml_configuration_by_extension() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("assets.yaml");
    fs::write(
      &path,
      "static_root: static\nassets:\n  app:\n    js: static://js/app.js\n",
    )
    .unwrap();

    let config = PipelineConfig::from_path(&path).unwrap();
    assert_eq!(config.assets["app"].js, vec!["static://js/app.js"]);
  }

  #[test]
  fn missing_configuration_file_reports_its_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing.json");

    let err = PipelineConfig::from_path(&path).unwrap_err();
    assert!(err.to_string().contains("missing.json"));
  }
}
