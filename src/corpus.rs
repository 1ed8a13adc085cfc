//! Utterance CSV files and word directories.
//!
//! Each row is `log_energy,c0,...,c12`. The log energy column is kept on the
//! loaded feature vectors but never reaches the trainer, which only reads cepstra.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use tracing::{debug, info};

use crate::types::{
    cepstrum_from_slice, FeatureVector, TrainingCorpus, Utterance, WordCorpus, FEATURE_DIM,
};

const COLUMNS: usize = FEATURE_DIM + 1;

/// Reads one utterance CSV.
pub fn load_utterance(path: &Path) -> Result<Utterance> {
    let file = File::open(path).with_context(|| format!("failed to open utterance {:?}", path))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut frames = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read {:?}", path))?;
        let line = record.position().map_or(index as u64 + 1, |pos| pos.line());
        if record.iter().all(str::is_empty) {
            continue;
        }
        ensure!(
            record.len() == COLUMNS,
            "{:?} line {}: expected {} columns (log energy + {} cepstra), found {}",
            path,
            line,
            COLUMNS,
            FEATURE_DIM,
            record.len()
        );
        let values = record
            .iter()
            .map(|field| field.parse::<f32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("{:?} line {}: invalid number", path, line))?;
        let cepstrum = cepstrum_from_slice(&values[1..])?;
        frames.push(FeatureVector {
            log_energy: values[0],
            cepstrum,
            noise_floor_estimate: 0.0,
            sequence_number: frames.len() as u64 + 1,
        });
    }
    ensure!(!frames.is_empty(), "utterance {:?} contains no frames", path);
    Ok(Utterance::new(frames))
}

/// Writes an utterance in the CSV layout [`load_utterance`] reads.
pub fn write_utterance(path: &Path, utterance: &Utterance) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to create utterance file {:?}", path))?;
    for frame in utterance.frames() {
        let mut row = Vec::with_capacity(COLUMNS);
        row.push(format!("{:.6}", frame.log_energy));
        row.extend(frame.cepstrum.iter().map(|c| format!("{:.6}", c)));
        writer
            .write_record(&row)
            .with_context(|| format!("failed to write {:?}", path))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {:?}", path))?;
    Ok(())
}

/// First `utter_<n>.csv` in `dir` that does not exist yet.
pub fn next_free_utterance_path(dir: &Path) -> PathBuf {
    (0_u64..)
        .map(|n| dir.join(format!("utter_{n}.csv")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| dir.join("utter.csv"))
}

/// Loads every file in a word directory, in file-name order. The word is named
/// after the directory.
pub fn load_word_dir(dir: &Path) -> Result<WordCorpus> {
    let name = dir
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .with_context(|| format!("cannot derive a word name from {:?}", dir))?
        .to_string();
    let mut paths = fs::read_dir(dir)
        .with_context(|| format!("failed to list word directory {:?}", dir))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("failed to list word directory {:?}", dir))?;
    paths.retain(|path| path.is_file());
    paths.sort();
    if paths.is_empty() {
        bail!("word directory {:?} contains no utterance files", dir);
    }

    let utterances = paths
        .iter()
        .map(|path| {
            let utterance = load_utterance(path)?;
            debug!(path = %path.display(), frames = utterance.len(), "loaded utterance");
            Ok(utterance)
        })
        .collect::<Result<Vec<_>>>()?;
    info!(word = %name, utterances = utterances.len(), "loaded word directory");
    Ok(WordCorpus { name, utterances })
}

/// Loads one word per directory into a training corpus.
pub fn load_corpus(dirs: &[PathBuf]) -> Result<TrainingCorpus> {
    ensure!(!dirs.is_empty(), "no word directories given");
    let mut corpus = TrainingCorpus::new();
    for dir in dirs {
        let word = load_word_dir(dir)?;
        corpus
            .insert(word)
            .with_context(|| format!("cannot add {:?} to the corpus", dir))?;
    }
    Ok(corpus)
}
