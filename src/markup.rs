//! HTML fragment rendering for resolved asset blocks.

use std::fmt::Write as _;

use crate::error::ResolveError;
use crate::resolver::{ArtifactKind, AssetRegistry, RenderPass, RenderedBlock, resolve};

/// Render one resolved block to its tag fragments.
///
/// Stylesheet references become `<link rel="stylesheet" href=... />`, script
/// references become `<script src=...></script>`; extra attributes follow the
/// reference attribute in key order, values HTML-escaped.
pub fn render_block(block: &RenderedBlock) -> String {
  let mut markup = String::new();
  for reference in &block.refs {
    let mut attributes = String::new();
    for (key, value) in &reference.attributes {
      let _ = write!(attributes, " {key}=\"{}\"", escape(value));
    }

    match block.kind {
      ArtifactKind::Css => {
        let _ = write!(
          markup,
          "<link rel=\"stylesheet\" href=\"{}\"{attributes} />",
          escape(&reference.href)
        );
      }
      ArtifactKind::Js => {
        let _ = write!(
          markup,
          "<script src=\"{}\"{attributes}></script>",
          escape(&reference.href)
        );
      }
    }
  }
  markup
}

/// Resolve and render stylesheet fragments for the requested groups.
pub fn assets_css(
  registry: &AssetRegistry,
  pass: &mut RenderPass,
  names: &[&str],
) -> Result<String, ResolveError> {
  render_kind(registry, pass, names, ArtifactKind::Css)
}

/// Resolve and render script fragments for the requested groups.
pub fn assets_js(
  registry: &AssetRegistry,
  pass: &mut RenderPass,
  names: &[&str],
) -> Result<String, ResolveError> {
  render_kind(registry, pass, names, ArtifactKind::Js)
}

/// Resolve and render both kinds: all stylesheet fragments followed by all
/// script fragments.
pub fn assets(
  registry: &AssetRegistry,
  pass: &mut RenderPass,
  names: &[&str],
) -> Result<String, ResolveError> {
  let mut markup = assets_css(registry, pass, names)?;
  markup.push_str(&assets_js(registry, pass, names)?);
  Ok(markup)
}

fn render_kind(
  registry: &AssetRegistry,
  pass: &mut RenderPass,
  names: &[&str],
  kind: ArtifactKind,
) -> Result<String, ResolveError> {
  let blocks = resolve(registry, names, kind, pass)?;
  Ok(blocks.iter().map(render_block).collect())
}

fn escape(value: &str) -> String {
  let mut escaped = String::with_capacity(value.len());
  for character in value.chars() {
    match character {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#x27;"),
      other => escaped.push(other),
    }
  }
  escaped
}
