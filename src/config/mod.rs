use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use crate::types::TARGET_SAMPLE_RATE;

/// Which template the trainer keeps once the round log-likelihood stops improving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConvergencePolicy {
    /// Keep the template that produced the best round total.
    #[default]
    KeepBest,
    /// Keep the template rebuilt on the terminating round, even if it regressed.
    KeepLast,
}

/// Knobs for the iterative template trainer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    pub max_rounds: usize,
    pub convergence: ConvergencePolicy,
    /// Align utterances of a round on the rayon pool.
    pub parallel: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_rounds: 50,
            convergence: ConvergencePolicy::KeepBest,
            parallel: true,
        }
    }
}

impl TrainingConfig {
    /// Loads a JSON config file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read training config {:?}", path))?;
                Self::from_json(&raw)
                    .with_context(|| format!("invalid training config {:?}", path))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).context("failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_rounds >= 1, "max_rounds must be at least 1");
        Ok(())
    }
}

/// Input stream settings for the front end.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrontEndConfig {
    pub input_sample_rate: u32,
    /// Samples dropped between consecutive 400-sample frames.
    pub frame_shift: usize,
}

impl Default for FrontEndConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: TARGET_SAMPLE_RATE,
            frame_shift: 160,
        }
    }
}
