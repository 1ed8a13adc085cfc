//! Core types shared across the feature, alignment and training pipeline

use crate::{RecognizerError, Result};

/// Sample rate every frame handed to the extractor is expected to use.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;
/// Samples per analysis frame (25 ms at 16 kHz).
pub const FRAME_LENGTH: usize = 400;
/// Transform length frames are zero-padded to.
pub const FFT_LENGTH: usize = 512;
/// Number of cepstral coefficients per feature vector.
pub const FEATURE_DIM: usize = 13;

/// Fixed-size cepstral coefficient vector.
pub type Cepstrum = [f32; FEATURE_DIM];

/// One analysed frame. Produced once by the extractor and never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub log_energy: f32,
    pub cepstrum: Cepstrum,
    pub noise_floor_estimate: f32,
    /// 1-based position of the frame in the stream that produced it.
    pub sequence_number: u64,
}

/// Time-ordered run of feature vectors for one spoken word.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Utterance {
    frames: Vec<FeatureVector>,
}

impl Utterance {
    pub fn new(frames: Vec<FeatureVector>) -> Self {
        Self { frames }
    }

    /// Builds an utterance from bare coefficient rows, numbering frames from 1.
    pub fn from_cepstra(rows: impl IntoIterator<Item = Cepstrum>) -> Self {
        let frames = rows
            .into_iter()
            .enumerate()
            .map(|(index, cepstrum)| FeatureVector {
                log_energy: 0.0,
                cepstrum,
                noise_floor_estimate: 0.0,
                sequence_number: index as u64 + 1,
            })
            .collect();
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[FeatureVector] {
        &self.frames
    }

    pub fn cepstrum(&self, index: usize) -> &Cepstrum {
        &self.frames[index].cepstrum
    }

    pub fn cepstra(&self) -> impl Iterator<Item = &Cepstrum> + '_ {
        self.frames.iter().map(|frame| &frame.cepstrum)
    }
}

/// Example utterances for one word.
#[derive(Debug, Clone, Default)]
pub struct WordCorpus {
    pub name: String,
    pub utterances: Vec<Utterance>,
}

/// Word name to example utterances, in the order words were added.
#[derive(Debug, Clone, Default)]
pub struct TrainingCorpus {
    words: Vec<WordCorpus>,
}

impl TrainingCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a word, rejecting duplicates, empty word lists and empty utterances.
    pub fn insert(&mut self, word: WordCorpus) -> Result<()> {
        if self.get(&word.name).is_some() {
            return Err(RecognizerError::new(format!(
                "word '{}' appears more than once in the corpus",
                word.name
            )));
        }
        if word.utterances.is_empty() {
            return Err(RecognizerError::new(format!(
                "word '{}' has no utterances",
                word.name
            )));
        }
        if let Some(index) = word.utterances.iter().position(Utterance::is_empty) {
            return Err(RecognizerError::new(format!(
                "utterance {index} of word '{}' has no frames",
                word.name
            )));
        }
        self.words.push(word);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&WordCorpus> {
        self.words.iter().find(|word| word.name == name)
    }

    pub fn words(&self) -> &[WordCorpus] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Converts a coefficient slice into a fixed-size cepstrum, rejecting any other width.
pub fn cepstrum_from_slice(values: &[f32]) -> Result<Cepstrum> {
    values.try_into().map_err(|_| {
        RecognizerError::new(format!(
            "feature vector has {} coefficients, expected {FEATURE_DIM}",
            values.len()
        ))
    })
}
