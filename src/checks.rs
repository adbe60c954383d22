//! Configuration health checks for the serving path.
//!
//! Stale atlases are surfaced as warnings with a remediation hint rather than
//! failing the serving process; a missing source image is a configuration
//! defect and propagates as a hard error.

use anyhow::Result;

use crate::compiler::SpriteCompiler;
use crate::config::PipelineConfig;

/// Non-fatal finding raised by a configuration check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
  /// Stable identifier for the finding.
  pub id: &'static str,
  /// Human-readable description.
  pub message: String,
  /// Suggested remediation.
  pub hint: String,
}

impl std::fmt::Display for ConfigWarning {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {} (hint: {})", self.id, self.message, self.hint)
  }
}

/// Check that every configured sprite atlas has been generated and is newer
/// than its sources.
pub fn check_sprites(config: &PipelineConfig) -> Result<Vec<ConfigWarning>> {
  let mut warnings = Vec::new();
  if SpriteCompiler::new(config).recompilation_needed()? {
    warnings.push(ConfigWarning {
      id: "asset_pipeline.W001",
      message: "sprites not generated".to_string(),
      hint: "run the sprite compile step".to_string(),
    });
  }
  Ok(warnings)
}
