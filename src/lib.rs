#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod atlas;
pub mod checks;
pub mod compiler;
pub mod config;
pub mod error;
pub mod markup;
pub mod packer;
pub mod resolver;

pub use compiler::SpriteCompiler;
pub use config::PipelineConfig;
pub use error::{AssetNotFoundError, FitError, FitErrorKind, ResolveError};
pub use packer::{Block, Packer, Placement, PlacementMode};
pub use resolver::{ArtifactKind, AssetRegistry, RenderPass, RenderedBlock};
