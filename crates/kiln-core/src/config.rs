use serde::{Deserialize, Serialize};

/// Environment variable holding a JSON [`AnalysisConfig`].
pub const CONFIG_ENV_VAR: &str = "KILN_ANALYSIS_CONFIG";

/// Thresholds deciding whether a transpose is worth a tiled emitter.
///
/// The swapped pair is the operand's minor-most dimension and the output's
/// minor-most dimension, after merging dimensions that stay adjacent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransposeTilingConfig {
    /// Both swapped extents at least this large always tile.
    pub min_dimension: usize,
    /// Lower per-extent bound that applies together with `min_total_elements`.
    pub min_dimension_relaxed: usize,
    pub min_total_elements: usize,
    /// Byte budget of a minor-most dimension the transpose leaves in place.
    pub max_bytes_in_minor_dimension: usize,
}

impl Default for TransposeTilingConfig {
    fn default() -> Self {
        Self {
            min_dimension: 16,
            min_dimension_relaxed: 8,
            min_total_elements: 64 * 128,
            max_bytes_in_minor_dimension: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub transpose_tiling: TransposeTilingConfig,
}

impl AnalysisConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Defaults, overridden by the JSON in [`CONFIG_ENV_VAR`] when it is set.
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(json) => {
                let config = Self::from_json(&json)?;
                log::debug!("Analysis config from {CONFIG_ENV_VAR}: {config:?}");
                Ok(config)
            }
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(e) => anyhow::bail!("{CONFIG_ENV_VAR} is not valid unicode: {e}"),
        }
    }
}
