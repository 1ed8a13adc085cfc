//! Iterative hard-assignment template training.
//!
//! A template is seeded from the median-length utterance, then each round
//! realigns the whole corpus against the current template, rebuilds every
//! state from the frames aligned to it and repeats while the corpus
//! log-likelihood strictly improves.

pub mod calibration;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::alignment::{align, DtwAlignment, Template};
use crate::config::{ConvergencePolicy, TrainingConfig};
use crate::model::WordModel;
use crate::types::{Cepstrum, TrainingCorpus, Utterance};
use crate::{RecognizerError, Result};

/// Per-word training history.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Corpus log-likelihood of the template in use at each round, in order.
    pub round_log_likelihoods: Vec<f64>,
    /// 1-based round whose template was retained, or `None` when the retained
    /// template was rebuilt after the last scored round.
    pub retained_round: Option<usize>,
    /// Index into the corpus of the utterance used as seed.
    pub seed_index: usize,
    /// `false` when training stopped at `max_rounds` while still improving.
    pub converged: bool,
}

#[derive(Debug, Clone)]
pub struct TrainedTemplate {
    pub template: Template,
    pub report: TrainingReport,
}

struct RoundOutcome {
    total: f64,
    clusters: Vec<Vec<Cepstrum>>,
}

/// Trains one template per word with the configured convergence policy.
#[derive(Debug, Clone, Default)]
pub struct TemplateTrainer {
    config: TrainingConfig,
}

impl TemplateTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn train(&self, word: &str, corpus: &[Utterance]) -> Result<TrainedTemplate> {
        let seed_index = median_utterance_index(corpus).ok_or_else(|| {
            RecognizerError::new(format!("word '{word}' has no training utterances"))
        })?;
        let seed = Template::seed(&corpus[seed_index])?;
        info!(
            word,
            utterances = corpus.len(),
            states = seed.len(),
            seed_index,
            "seeded template"
        );
        self.refine(word, seed, seed_index, |template| {
            self.run_round(template, corpus)
        })
    }

    /// Runs `round_fn` from `seed` while the round total strictly improves,
    /// then picks the template named by the convergence policy.
    fn refine<F>(
        &self,
        word: &str,
        seed: Template,
        seed_index: usize,
        mut round_fn: F,
    ) -> Result<TrainedTemplate>
    where
        F: FnMut(&Template) -> Result<RoundOutcome>,
    {
        let mut current = seed;
        let mut history = Vec::new();
        let mut best: Option<(Template, f64, usize)> = None;
        let mut converged = false;

        for round in 1..=self.config.max_rounds {
            let outcome = round_fn(&current)?;
            if outcome.total.is_nan() {
                return Err(RecognizerError::new(format!(
                    "word '{word}': round {round} produced a NaN log-likelihood"
                )));
            }
            history.push(outcome.total);
            let rebuilt = Template::from_clusters(&outcome.clusters)?;
            debug!(word, round, log_likelihood = outcome.total, "training round");

            let improved = best
                .as_ref()
                .map_or(true, |(_, best_total, _)| outcome.total > *best_total);
            if !improved {
                converged = true;
                current = rebuilt;
                break;
            }
            best = Some((current, outcome.total, round));
            current = rebuilt;
        }

        let (template, retained_round) = match (self.config.convergence, best) {
            (ConvergencePolicy::KeepBest, Some((template, _, round))) => (template, Some(round)),
            _ => (current, None),
        };
        info!(
            word,
            rounds = history.len(),
            converged,
            retained_round = ?retained_round,
            "finished training"
        );
        Ok(TrainedTemplate {
            template,
            report: TrainingReport {
                round_log_likelihoods: history,
                retained_round,
                seed_index,
                converged,
            },
        })
    }

    /// Aligns every utterance against a read-only template, then groups frames
    /// by the state they aligned to. Clusters are filled in corpus order.
    fn run_round(&self, template: &Template, corpus: &[Utterance]) -> Result<RoundOutcome> {
        let utterances: Vec<&Utterance> = corpus.iter().collect();
        let alignments = align_all(template, &utterances, self.config.parallel)?;
        let mut clusters = vec![Vec::new(); template.len()];
        let mut total = 0.0;
        for (utterance, alignment) in corpus.iter().zip(alignments.iter()) {
            total += alignment.log_likelihood;
            for &(x, y) in &alignment.path {
                clusters[y].push(*utterance.cepstrum(x));
            }
        }
        Ok(RoundOutcome { total, clusters })
    }
}

/// Index of the median-length utterance (lower median, ties kept in corpus order).
pub fn median_utterance_index(corpus: &[Utterance]) -> Option<usize> {
    if corpus.is_empty() {
        return None;
    }
    let mut order: Vec<usize> = (0..corpus.len()).collect();
    order.sort_by_key(|&index| corpus[index].len());
    Some(order[(order.len() - 1) / 2])
}

/// Aligns each utterance against `template`, optionally on the rayon pool.
/// Results come back in input order either way.
pub(crate) fn align_all(
    template: &Template,
    utterances: &[&Utterance],
    parallel: bool,
) -> Result<Vec<DtwAlignment>> {
    if parallel {
        utterances
            .par_iter()
            .map(|utterance| align(utterance, template))
            .collect()
    } else {
        utterances
            .iter()
            .map(|utterance| align(utterance, template))
            .collect()
    }
}

/// Trains every word in `corpus`, then calibrates the resulting models against
/// each other.
pub fn train_vocabulary(corpus: &TrainingCorpus, config: &TrainingConfig) -> Result<Vec<WordModel>> {
    if corpus.is_empty() {
        return Err(RecognizerError::new("training corpus contains no words"));
    }
    let trainer = TemplateTrainer::new(config.clone());
    let mut models = corpus
        .words()
        .iter()
        .map(|word| {
            let trained = trainer.train(&word.name, &word.utterances)?;
            Ok(WordModel::new(word.name.clone(), trained.template))
        })
        .collect::<Result<Vec<_>>>()?;
    calibration::calibrate(&mut models, corpus, config.parallel)?;
    Ok(models)
}
