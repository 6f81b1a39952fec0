//! Session configuration.
//!
//! Every field has a default, so hosts only pass what they change:
//!
//! ```json
//! { "historyCapacity": 100, "toolbar": { "margin": 16 } }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid session config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("historyCapacity must be at least 1")]
    ZeroCapacity,
    #[error("{field} must be a finite, non-negative number (got {value})")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Floating toolbar dimensions and spacing, in viewport pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolbarConfig {
    /// Gap between the selection box and the toolbar.
    pub margin: f64,
    pub width: f64,
    pub height: f64,
    /// Minimum distance kept from the viewport edges.
    pub edge_padding: f64,
}

impl Default for ToolbarConfig {
    fn default() -> Self {
        Self {
            margin: 12.0,
            width: 220.0,
            height: 44.0,
            edge_padding: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Maximum number of snapshots kept in the history log.
    pub history_capacity: usize,
    /// How long after pointer release a transform gesture still counts.
    pub transform_settle_ms: f64,
    pub nudge_step: f64,
    /// Arrow-key step with Shift held.
    pub nudge_step_large: f64,
    /// Offset applied to duplicated elements.
    pub duplicate_offset: f64,
    pub toolbar: ToolbarConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            transform_settle_ms: 150.0,
            nudge_step: 1.0,
            nudge_step_large: 10.0,
            duplicate_offset: 20.0,
            toolbar: ToolbarConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON config object.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        let checks = [
            ("transformSettleMs", self.transform_settle_ms),
            ("nudgeStep", self.nudge_step),
            ("nudgeStepLarge", self.nudge_step_large),
            ("duplicateOffset", self.duplicate_offset),
            ("toolbar.margin", self.toolbar.margin),
            ("toolbar.width", self.toolbar.width),
            ("toolbar.height", self.toolbar.height),
            ("toolbar.edgePadding", self.toolbar.edge_padding),
        ];
        for (field, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        Ok(())
    }
}
