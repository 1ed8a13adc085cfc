use crate::alignment::align;
use crate::types::Utterance;
use crate::{RecognizerError, Result};

use super::WordModel;

/// Calibrated score of one word against an utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct WordScore {
    pub word: String,
    pub log_likelihood: f64,
    pub score: f64,
}

/// Scores utterances against a fixed vocabulary of word models.
#[derive(Debug, Clone)]
pub struct Recognizer {
    models: Vec<WordModel>,
}

impl Recognizer {
    pub fn new(models: Vec<WordModel>) -> Result<Self> {
        if models.is_empty() {
            return Err(RecognizerError::new(
                "recognizer needs at least one word model",
            ));
        }
        Ok(Self { models })
    }

    pub fn models(&self) -> &[WordModel] {
        &self.models
    }

    /// Every word's calibrated score, best first.
    pub fn score(&self, utterance: &Utterance) -> Result<Vec<WordScore>> {
        let mut scores = self
            .models
            .iter()
            .map(|model| {
                let alignment = align(utterance, &model.template)?;
                Ok(WordScore {
                    word: model.name.clone(),
                    log_likelihood: alignment.log_likelihood,
                    score: model.calibration.apply(alignment.log_likelihood),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(scores)
    }

    pub fn best(&self, utterance: &Utterance) -> Result<WordScore> {
        self.score(utterance)?
            .into_iter()
            .next()
            .ok_or_else(|| RecognizerError::new("no word scores produced"))
    }
}
