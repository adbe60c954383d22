//! Asset-group dependency resolution scoped to one rendering pass.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{AssetGroupConfig, PipelineConfig};
use crate::error::ResolveError;

/// Kind of artifact reference an asset group can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
  /// Stylesheet references rendered as `<link>` tags.
  Css,
  /// Script references rendered as `<script>` tags.
  Js,
}

/// One artifact reference with its extra tag attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
  /// Resolved URL, with any `static://` prefix already rewritten.
  pub href: String,
  /// Extra tag attributes, rendered in key order.
  pub attributes: BTreeMap<String, String>,
}

/// Normalized runtime form of one configured asset group.
#[derive(Debug, Clone)]
pub struct AssetBundle {
  /// Stylesheet references with paired attributes.
  pub css: Vec<AssetRef>,
  /// Script references with paired attributes.
  pub js: Vec<AssetRef>,
  /// Groups emitted before this one.
  pub depends: Vec<String>,
  /// Pass-through flag for the external CDN caching layer.
  pub cache: bool,
}

impl AssetBundle {
  /// References of one artifact kind.
  pub fn refs(&self, kind: ArtifactKind) -> &[AssetRef] {
    match kind {
      ArtifactKind::Css => &self.css,
      ArtifactKind::Js => &self.js,
    }
  }
}

/// All configured asset groups in their normalized runtime form.
///
/// Built once from configuration and shared read-only between renders.
#[derive(Debug, Clone)]
pub struct AssetRegistry {
  groups: BTreeMap<String, AssetBundle>,
}

impl AssetRegistry {
  /// Normalize the raw asset-group configuration: rewrite `static://`
  /// references and pair each reference with its positional attribute map.
  pub fn from_config(config: &PipelineConfig) -> Self {
    let groups = config
      .assets
      .iter()
      .map(|(name, raw)| (name.clone(), normalize_group(config, raw)))
      .collect();
    Self { groups }
  }

  /// Whether a group of this name is configured.
  pub fn contains(&self, name: &str) -> bool {
    self.groups.contains_key(name)
  }

  /// Look up a group by name.
  pub fn get(&self, name: &str) -> Option<&AssetBundle> {
    self.groups.get(name)
  }

  /// Names of all configured groups.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.groups.keys().map(String::as_str)
  }
}

fn normalize_group(config: &PipelineConfig, raw: &AssetGroupConfig) -> AssetBundle {
  AssetBundle {
    css: pair_refs(config, &raw.css, &raw.attributes),
    js: pair_refs(config, &raw.js, &raw.attributes),
    depends: raw.depends.clone(),
    cache: raw.cache,
  }
}

fn pair_refs(
  config: &PipelineConfig,
  refs: &[String],
  attributes: &[BTreeMap<String, String>],
) -> Vec<AssetRef> {
  refs
    .iter()
    .enumerate()
    .map(|(index, reference)| AssetRef {
      href: config.rewrite_static(reference),
      attributes: attributes.get(index).cloned().unwrap_or_default(),
    })
    .collect()
}

/// Per-render de-duplication state: the groups not yet emitted, tracked
/// separately per artifact kind so one group can contribute its stylesheets
/// and its scripts exactly once each.
///
/// Create one per rendering context and never share it across concurrent
/// renders; every [`resolve`] call within the context mutates it.
#[derive(Debug, Clone)]
pub struct RenderPass {
  pending_css: BTreeSet<String>,
  pending_js: BTreeSet<String>,
}

impl RenderPass {
  /// Start a pass with every registered group pending.
  pub fn new(registry: &AssetRegistry) -> Self {
    let pending: BTreeSet<String> = registry.names().map(str::to_string).collect();
    Self {
      pending_css: pending.clone(),
      pending_js: pending,
    }
  }

  fn pending(&self, kind: ArtifactKind) -> &BTreeSet<String> {
    match kind {
      ArtifactKind::Css => &self.pending_css,
      ArtifactKind::Js => &self.pending_js,
    }
  }

  fn pending_mut(&mut self, kind: ArtifactKind) -> &mut BTreeSet<String> {
    match kind {
      ArtifactKind::Css => &mut self.pending_css,
      ArtifactKind::Js => &mut self.pending_js,
    }
  }
}

/// Ordered artifact block contributed by one asset group.
#[derive(Debug, Clone)]
pub struct RenderedBlock {
  /// Group that contributed the block.
  pub group: String,
  /// Artifact kind the block was resolved for.
  pub kind: ArtifactKind,
  /// References in configuration order.
  pub refs: Vec<AssetRef>,
}

/// Expand asset-group names into ordered artifact blocks.
///
/// Dependencies are emitted before their dependents, each group at most once
/// per pass. Requesting an already-emitted known group contributes nothing;
/// requesting an unregistered name always fails, as does a `depends` cycle.
pub fn resolve(
  registry: &AssetRegistry,
  names: &[&str],
  kind: ArtifactKind,
  pass: &mut RenderPass,
) -> Result<Vec<RenderedBlock>, ResolveError> {
  let mut blocks = Vec::new();
  let mut resolving = BTreeSet::new();
  for name in names {
    walk(registry, name, kind, pass, &mut resolving, &mut blocks)?;
  }
  Ok(blocks)
}

fn walk(
  registry: &AssetRegistry,
  name: &str,
  kind: ArtifactKind,
  pass: &mut RenderPass,
  resolving: &mut BTreeSet<String>,
  blocks: &mut Vec<RenderedBlock>,
) -> Result<(), ResolveError> {
  if !pass.pending(kind).contains(name) {
    // Unknown names error even when named repeatedly; known groups that were
    // already emitted this pass are silently skipped.
    if !registry.contains(name) {
      return Err(ResolveError::UnknownAsset(name.to_string()));
    }
    return Ok(());
  }

  let Some(bundle) = registry.get(name) else {
    return Err(ResolveError::UnknownAsset(name.to_string()));
  };

  if !resolving.insert(name.to_string()) {
    return Err(ResolveError::CyclicDependency(name.to_string()));
  }

  for dependency in &bundle.depends {
    walk(registry, dependency, kind, pass, resolving, blocks)?;
  }

  resolving.remove(name);
  pass.pending_mut(kind).remove(name);

  let refs = bundle.refs(kind);
  if !refs.is_empty() {
    blocks.push(RenderedBlock {
      group: name.to_string(),
      kind,
      refs: refs.to_vec(),
    });
  }
  Ok(())
}
