//! Cross-model score calibration.
//!
//! Each model's in-class mean log-likelihood maps to 0 and the mean over every
//! other word's utterances maps to -100.

use tracing::{info, warn};

use crate::model::{Calibration, WordModel};
use crate::types::{TrainingCorpus, Utterance};
use crate::{RecognizerError, Result};

use super::align_all;

const REJECT_SCORE: f64 = -100.0;

/// Solves `offset + slope·ll` so that `match_ll → 0` and `reject_ll → -100`.
pub fn calibration_from_scores(match_ll: f64, reject_ll: f64) -> Result<Calibration> {
    let gap = reject_ll - match_ll;
    if gap == 0.0 || !gap.is_finite() {
        return Err(RecognizerError::new(format!(
            "cannot calibrate: match log-likelihood {match_ll} and rejection \
             log-likelihood {reject_ll} do not separate"
        )));
    }
    let slope = REJECT_SCORE / gap;
    Ok(Calibration {
        offset: -match_ll * slope,
        slope,
    })
}

/// Sets the calibration of every model from the corpus it was trained on.
pub fn calibrate(models: &mut [WordModel], corpus: &TrainingCorpus, parallel: bool) -> Result<()> {
    for model in models.iter_mut() {
        let own = corpus.get(&model.name).ok_or_else(|| {
            RecognizerError::new(format!("no corpus entry for word '{}'", model.name))
        })?;
        let own_utterances: Vec<&Utterance> = own.utterances.iter().collect();
        let rejected: Vec<&Utterance> = corpus
            .words()
            .iter()
            .filter(|word| word.name != model.name)
            .flat_map(|word| word.utterances.iter())
            .collect();

        let match_ll = mean_log_likelihood(model, &own_utterances, parallel)?;
        if rejected.is_empty() {
            warn!(
                word = %model.name,
                "no other words to calibrate against; using unit slope"
            );
            model.calibration = Calibration {
                offset: -match_ll,
                slope: 1.0,
            };
            continue;
        }
        let reject_ll = mean_log_likelihood(model, &rejected, parallel)?;
        if reject_ll > match_ll {
            warn!(
                word = %model.name,
                match_ll,
                reject_ll,
                "other words score higher than the word's own utterances"
            );
        }
        model.calibration = calibration_from_scores(match_ll, reject_ll)
            .map_err(|err| RecognizerError::new(format!("word '{}': {err}", model.name)))?;
        info!(
            word = %model.name,
            match_ll,
            reject_ll,
            offset = model.calibration.offset,
            slope = model.calibration.slope,
            "calibrated model"
        );
    }
    Ok(())
}

fn mean_log_likelihood(model: &WordModel, utterances: &[&Utterance], parallel: bool) -> Result<f64> {
    if utterances.is_empty() {
        return Err(RecognizerError::new(format!(
            "word '{}' has no utterances to score",
            model.name
        )));
    }
    let alignments = align_all(&model.template, utterances, parallel)?;
    let total: f64 = alignments.iter().map(|a| a.log_likelihood).sum();
    Ok(total / utterances.len() as f64)
}
