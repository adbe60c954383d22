//! Guillotine rectangle packer used to lay out sprite atlases.
//!
//! The packer owns a binary space-partition tree over the canvas. Every
//! placement carries one unit of padding on its right and bottom edge so that
//! adjacent sprites never touch, which avoids edge bleed when the atlas is
//! sampled with background positioning.

use serde::Deserialize;

use crate::error::FitError;

/// How a block occupies the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementMode {
  /// Placed once into the first free node that fits.
  #[default]
  NoRepeat,
  /// Tiled along the full canvas width; reserves a horizontal strip.
  RepeatX,
  /// Tiled along the full canvas height; reserves a vertical strip.
  RepeatY,
}

/// Region assigned to a block by the packer, in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
  /// Left edge of the block.
  pub x: u32,
  /// Top edge of the block.
  pub y: u32,
  /// Occupied width; the full canvas width for `repeat-x` strips.
  pub width: u32,
  /// Occupied height; the full canvas height for `repeat-y` strips.
  pub height: u32,
}

/// One rectangle to place, plus its assigned position once packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
  /// Name reported in fit errors and carried into atlas metadata.
  pub name: String,
  /// Block width in canvas units.
  pub width: u32,
  /// Block height in canvas units.
  pub height: u32,
  /// Placement strategy for this block.
  pub mode: PlacementMode,
  /// Filled in by [`Packer::fit`]; `None` until packing succeeds.
  pub placement: Option<Placement>,
}

impl Block {
  /// Create an unplaced block.
  pub fn new(name: impl Into<String>, width: u32, height: u32, mode: PlacementMode) -> Self {
    Self {
      name: name.into(),
      width,
      height,
      mode,
      placement: None,
    }
  }
}

/// Free or occupied region of the canvas. A node is either a leaf or fully
/// split into a `down` and a `right` child; occupied leaves are never re-split.
#[derive(Debug)]
struct Node {
  x: i32,
  y: i32,
  width: i32,
  height: i32,
  used: bool,
  down: Option<Box<Node>>,
  right: Option<Box<Node>>,
}

impl Node {
  fn leaf(x: i32, y: i32, width: i32, height: i32) -> Self {
    Self {
      x,
      y,
      width,
      height,
      used: false,
      down: None,
      right: None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepeatAxis {
  X,
  Y,
}

/// Single-use packer over one canvas. Build one per sheet and density, call
/// [`Packer::fit`] once, then drop it; the tree is not reusable.
#[derive(Debug)]
pub struct Packer {
  root: Node,
}

impl Packer {
  /// Create a packer for an empty canvas of the given size.
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      root: Node::leaf(0, 0, width as i32, height as i32),
    }
  }

  /// Assign a placement to every block, or fail naming the first block that
  /// cannot be placed.
  ///
  /// Repeat strips are reserved first, in input order; fixed blocks are then
  /// placed first-fit in input order. No sorting happens internally, so
  /// placement is a deterministic function of the input ordering and callers
  /// control packing density by pre-ordering blocks (typically largest-first).
  pub fn fit(&mut self, blocks: &mut [Block]) -> Result<(), FitError> {
    let mut repeat_axis = None;

    for block in blocks.iter_mut() {
      match block.mode {
        PlacementMode::RepeatX => {
          self.reserve_row(block)?;
          repeat_axis = claim_axis(repeat_axis, RepeatAxis::X, &block.name)?;
        }
        PlacementMode::RepeatY => {
          self.reserve_column(block)?;
          repeat_axis = claim_axis(repeat_axis, RepeatAxis::Y, &block.name)?;
        }
        PlacementMode::NoRepeat => {}
      }
    }

    for block in blocks.iter_mut() {
      if block.mode == PlacementMode::NoRepeat {
        self.place_block(block)?;
      }
    }

    Ok(())
  }

  /// Shrink the usable canvas from the bottom and hand the freed strip to a
  /// `repeat-x` block.
  fn reserve_row(&mut self, block: &mut Block) -> Result<(), FitError> {
    self.root.height -= block.height as i32 + 1;
    // -1 is still legal: the final strip needs no trailing padding.
    if self.root.height < -1 {
      return Err(FitError::exhausted(&block.name));
    }

    block.placement = Some(Placement {
      x: 0,
      y: (self.root.height + 1) as u32,
      width: self.root.width as u32,
      height: block.height,
    });
    Ok(())
  }

  /// Shrink the usable canvas from the right and hand the freed strip to a
  /// `repeat-y` block.
  fn reserve_column(&mut self, block: &mut Block) -> Result<(), FitError> {
    self.root.width -= block.width as i32 + 1;
    if self.root.width < -1 {
      return Err(FitError::exhausted(&block.name));
    }

    block.placement = Some(Placement {
      x: (self.root.width + 1) as u32,
      y: 0,
      width: block.width,
      height: self.root.height as u32,
    });
    Ok(())
  }

  fn place_block(&mut self, block: &mut Block) -> Result<(), FitError> {
    let (width, height) = (block.width as i32, block.height as i32);
    let Some(node) = find_node(&mut self.root, width, height) else {
      return Err(FitError::exhausted(&block.name));
    };

    // Split off the padded footprint; the padding unit may hang over the
    // node's edge, only the block itself has to fit.
    split_node(node, width + 1, height + 1);
    node.used = true;
    block.placement = Some(Placement {
      x: node.x as u32,
      y: node.y as u32,
      width: block.width,
      height: block.height,
    });
    Ok(())
  }
}

fn claim_axis(
  current: Option<RepeatAxis>,
  requested: RepeatAxis,
  block: &str,
) -> Result<Option<RepeatAxis>, FitError> {
  match current {
    None => Ok(Some(requested)),
    Some(axis) if axis == requested => Ok(Some(axis)),
    Some(_) => Err(FitError::mixed_repeat(block)),
  }
}

/// Depth-first first-fit search, right branch before down branch.
fn find_node(node: &mut Node, width: i32, height: i32) -> Option<&mut Node> {
  if node.used {
    if let Some(found) = node
      .right
      .as_deref_mut()
      .and_then(|child| find_node(child, width, height))
    {
      return Some(found);
    }
    return node
      .down
      .as_deref_mut()
      .and_then(|child| find_node(child, width, height));
  }

  if width <= node.width && height <= node.height {
    Some(node)
  } else {
    None
  }
}

/// Split a free leaf around a padded footprint: `down` keeps the full node
/// width below it, `right` keeps the full node height beside it.
fn split_node(node: &mut Node, padded_width: i32, padded_height: i32) {
  node.down = Some(Box::new(Node::leaf(
    node.x,
    node.y + padded_height,
    node.width,
    node.height - padded_height,
  )));
  node.right = Some(Box::new(Node::leaf(
    node.x + padded_width,
    node.y,
    node.width - padded_width,
    node.height,
  )));
}
