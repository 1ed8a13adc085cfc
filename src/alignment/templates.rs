use crate::types::{Cepstrum, Utterance};
use crate::{RecognizerError, Result};

use super::gaussian::GaussianState;

/// Ordered Gaussian states describing the time evolution of one word.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    states: Vec<GaussianState>,
}

impl Template {
    pub fn new(states: Vec<GaussianState>) -> Self {
        Self { states }
    }

    /// One identity-covariance state per frame of `utterance`.
    pub fn seed(utterance: &Utterance) -> Result<Self> {
        if utterance.is_empty() {
            return Err(RecognizerError::new(
                "cannot seed a template from an empty utterance",
            ));
        }
        Ok(Self {
            states: utterance.cepstra().map(GaussianState::from_frame).collect(),
        })
    }

    /// Re-estimates every state from its cluster. The result has one state per
    /// cluster and replaces the previous template wholesale.
    pub fn from_clusters(clusters: &[Vec<Cepstrum>]) -> Result<Self> {
        let states = clusters
            .iter()
            .enumerate()
            .map(|(index, cluster)| {
                GaussianState::from_cluster(cluster).map_err(|err| {
                    RecognizerError::new(format!("state {index}: {err}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { states })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[GaussianState] {
        &self.states
    }
}
