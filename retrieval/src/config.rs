use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

/// Strategy for fusing multiple channel rankings into one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionStrategy {
    /// Reciprocal Rank Fusion: robust to differing score scales
    Rrf,
    /// Weighted sum of raw channel scores
    Weighted,
    /// Mean of raw channel scores; also the fallback for unrecognized
    /// strategy names
    Average,
}

impl FusionStrategy {
    /// Resolve a strategy name. Unrecognized names fall back to
    /// [`FusionStrategy::Average`] with a warning.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "rrf" => FusionStrategy::Rrf,
            "weighted" => FusionStrategy::Weighted,
            "average" => FusionStrategy::Average,
            other => {
                warn!("unrecognized fusion strategy '{other}', falling back to average scoring");
                FusionStrategy::Average
            }
        }
    }
}

fn strategy_from_name<'de, D>(deserializer: D) -> Result<FusionStrategy, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    Ok(FusionStrategy::from_name(&name))
}

/// Numeric knobs for the fusion strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionParams {
    /// RRF constant; higher flattens the contribution of top ranks
    #[serde(default = "default_rrf_k")]
    pub k: f32,

    /// Per-channel weights for the weighted strategy, in channel query
    /// order. Missing entries fall back to uniform `1 / n_channels`.
    #[serde(default)]
    pub weights: Option<Vec<f32>>,
}

fn default_rrf_k() -> f32 {
    60.0
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            k: default_rrf_k(),
            weights: None,
        }
    }
}

/// Fusion configuration. Serialized under the `rerank` key of the retrieval
/// config, matching the established configuration surface
/// (`rerank.strategy`, `rerank.params.k`, `rerank.params.weights`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionSettings {
    #[serde(
        default = "default_strategy",
        deserialize_with = "strategy_from_name"
    )]
    pub strategy: FusionStrategy,

    #[serde(default)]
    pub params: FusionParams,
}

fn default_strategy() -> FusionStrategy {
    FusionStrategy::Rrf
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            params: FusionParams::default(),
        }
    }
}

/// Configuration for the hybrid dispatcher
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default, rename = "rerank")]
    pub fusion: FusionSettings,
}

impl RetrievalConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.fusion.params.k > 0.0) {
            return Err(format!("rrf k must be > 0, got {}", self.fusion.params.k));
        }
        if let Some(weights) = &self.fusion.params.weights {
            for (index, weight) in weights.iter().enumerate() {
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(format!(
                        "fusion weight {index} must be a non-negative number, got {weight}"
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_valid() {
        let config = RetrievalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fusion.strategy, FusionStrategy::Rrf);
        assert_eq!(config.fusion.params.k, 60.0);
    }

    #[test]
    fn test_strategy_name_resolution() {
        assert_eq!(FusionStrategy::from_name("rrf"), FusionStrategy::Rrf);
        assert_eq!(FusionStrategy::from_name("RRF"), FusionStrategy::Rrf);
        assert_eq!(
            FusionStrategy::from_name("weighted"),
            FusionStrategy::Weighted
        );
        assert_eq!(
            FusionStrategy::from_name("anything else"),
            FusionStrategy::Average
        );
    }

    #[test]
    fn test_config_surface_keys() {
        let config: RetrievalConfig = serde_json::from_str(
            r#"{ "rerank": { "strategy": "weighted", "params": { "k": 10, "weights": [0.7, 0.3] } } }"#,
        )
        .unwrap();
        assert_eq!(config.fusion.strategy, FusionStrategy::Weighted);
        assert_eq!(config.fusion.params.k, 10.0);
        assert_eq!(config.fusion.params.weights, Some(vec![0.7, 0.3]));
    }

    #[test]
    fn test_unrecognized_strategy_falls_back() {
        let config: RetrievalConfig =
            serde_json::from_str(r#"{ "rerank": { "strategy": "borda" } }"#).unwrap();
        assert_eq!(config.fusion.strategy, FusionStrategy::Average);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = RetrievalConfig::default();
        config.fusion.params.k = 0.0;
        assert!(config.validate().is_err());

        let mut config = RetrievalConfig::default();
        config.fusion.params.weights = Some(vec![0.5, -1.0]);
        assert!(config.validate().is_err());
    }
}
