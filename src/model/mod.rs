//! Calibrated word models and their binary record format.
//!
//! Each record is little-endian and records concatenate:
//! `u32 name_len | name | f32 offset | f32 slope | u32 states |
//! { f32 log_normalizer | 13×f32 mean | 13×13 f32 inverse covariance } × states`.

pub mod recognizer;

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result as AnyResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ndarray::{Array1, Array2};
use tracing::info;

use crate::alignment::{GaussianState, Template};
use crate::types::FEATURE_DIM;
use crate::{RecognizerError, Result};

/// Upper bound on a stored word name, guarding against corrupt length prefixes.
const MAX_NAME_BYTES: u32 = 4096;

/// Linear map from raw DTW log-likelihood to a calibrated score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub offset: f64,
    pub slope: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            offset: 0.0,
            slope: 1.0,
        }
    }
}

impl Calibration {
    pub fn apply(&self, log_likelihood: f64) -> f64 {
        self.offset + self.slope * log_likelihood
    }
}

/// A trained, calibrated word template.
#[derive(Debug, Clone, PartialEq)]
pub struct WordModel {
    pub name: String,
    pub calibration: Calibration,
    pub template: Template,
}

impl WordModel {
    pub fn new(name: impl Into<String>, template: Template) -> Self {
        Self {
            name: name.into(),
            calibration: Calibration::default(),
            template,
        }
    }

    /// Appends this model's record to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let name = self.name.as_bytes();
        let name_len = u32::try_from(name.len())
            .ok()
            .filter(|&len| len <= MAX_NAME_BYTES)
            .ok_or_else(|| {
                RecognizerError::new(format!("word name is too long ({} bytes)", name.len()))
            })?;
        let states = u32::try_from(self.template.len())
            .map_err(|_| RecognizerError::new("template has too many states"))?;

        writer.write_u32::<LittleEndian>(name_len)?;
        writer.write_all(name)?;
        writer.write_f32::<LittleEndian>(self.calibration.offset as f32)?;
        writer.write_f32::<LittleEndian>(self.calibration.slope as f32)?;
        writer.write_u32::<LittleEndian>(states)?;
        for state in self.template.states() {
            writer.write_f32::<LittleEndian>(state.log_normalizer() as f32)?;
            for &value in state.mean() {
                writer.write_f32::<LittleEndian>(value as f32)?;
            }
            for &value in state.inverse_covariance() {
                writer.write_f32::<LittleEndian>(value as f32)?;
            }
        }
        Ok(())
    }

    /// Reads the next record, or `None` when the reader is already at end of input.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>> {
        let name_len = match reader.read_u32::<LittleEndian>() {
            Ok(len) => len,
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if name_len > MAX_NAME_BYTES {
            return Err(RecognizerError::new(format!(
                "word name length {name_len} exceeds {MAX_NAME_BYTES} bytes"
            )));
        }
        let mut name = vec![0_u8; name_len as usize];
        reader.read_exact(&mut name).map_err(truncated)?;
        let name = String::from_utf8(name)
            .map_err(|err| RecognizerError::new(format!("word name is not UTF-8: {err}")))?;
        let offset = reader.read_f32::<LittleEndian>().map_err(truncated)? as f64;
        let slope = reader.read_f32::<LittleEndian>().map_err(truncated)? as f64;
        let state_count = reader.read_u32::<LittleEndian>().map_err(truncated)?;

        let mut states = Vec::new();
        for _ in 0..state_count {
            states.push(read_state(reader)?);
        }
        Ok(Some(Self {
            name,
            calibration: Calibration { offset, slope },
            template: Template::new(states),
        }))
    }
}

fn read_state<R: Read>(reader: &mut R) -> Result<GaussianState> {
    let log_normalizer = reader.read_f32::<LittleEndian>().map_err(truncated)? as f64;
    let mut mean = [0.0_f32; FEATURE_DIM];
    reader
        .read_f32_into::<LittleEndian>(&mut mean)
        .map_err(truncated)?;
    let mut inverse = vec![0.0_f32; FEATURE_DIM * FEATURE_DIM];
    reader
        .read_f32_into::<LittleEndian>(&mut inverse)
        .map_err(truncated)?;
    let inverse = Array2::from_shape_vec(
        (FEATURE_DIM, FEATURE_DIM),
        inverse.into_iter().map(f64::from).collect(),
    )
    .map_err(|err| RecognizerError::new(err.to_string()))?;
    GaussianState::from_parts(
        mean.iter().map(|&v| v as f64).collect::<Array1<f64>>(),
        inverse,
        log_normalizer,
    )
}

fn truncated(err: io::Error) -> RecognizerError {
    if err.kind() == ErrorKind::UnexpectedEof {
        RecognizerError::new("model record is truncated")
    } else {
        err.into()
    }
}

/// Serialises models into one buffer.
pub fn encode_models(models: &[WordModel]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    for model in models {
        model.write_to(&mut buffer)?;
    }
    Ok(buffer)
}

/// Parses every record in `bytes`.
pub fn decode_models(mut bytes: &[u8]) -> Result<Vec<WordModel>> {
    let mut models = Vec::new();
    while let Some(model) = WordModel::read_from(&mut bytes)? {
        models.push(model);
    }
    Ok(models)
}

/// Writes all models to `path` through a sibling temporary file that is
/// renamed into place only after a complete, flushed write.
pub fn save_models(path: &Path, models: &[WordModel]) -> AnyResult<()> {
    let tmp = temporary_path(path);
    let result = write_records(&tmp, models).and_then(|()| {
        fs::rename(&tmp, path)
            .with_context(|| format!("failed to move {:?} into place at {:?}", tmp, path))
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result?;
    info!(path = %path.display(), words = models.len(), "wrote model file");
    Ok(())
}

fn write_records(tmp: &Path, models: &[WordModel]) -> AnyResult<()> {
    let file = File::create(tmp)
        .with_context(|| format!("failed to create temporary model file {:?}", tmp))?;
    let mut writer = BufWriter::new(file);
    for model in models {
        model
            .write_to(&mut writer)
            .with_context(|| format!("failed to write model '{}' to {:?}", model.name, tmp))?;
    }
    let file = writer
        .into_inner()
        .map_err(|err| err.into_error())
        .with_context(|| format!("failed to flush {:?}", tmp))?;
    file.sync_all()
        .with_context(|| format!("failed to sync {:?}", tmp))?;
    Ok(())
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "model".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Loads every model record from `path`.
pub fn load_models(path: &Path) -> AnyResult<Vec<WordModel>> {
    let file =
        File::open(path).with_context(|| format!("failed to open model file {:?}", path))?;
    let mut reader = BufReader::new(file);
    let mut models = Vec::new();
    while let Some(model) = WordModel::read_from(&mut reader)
        .with_context(|| format!("failed to read model file {:?}", path))?
    {
        models.push(model);
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_mean_model() -> WordModel {
        let state = GaussianState::identity(Array1::zeros(FEATURE_DIM));
        WordModel {
            name: "yes".to_string(),
            calibration: Calibration {
                offset: 50.0,
                slope: 10.0,
            },
            template: Template::new(vec![state]),
        }
    }

    #[test]
    fn record_layout_matches_format() {
        let bytes = encode_models(&[zero_mean_model()]).unwrap();
        let expected_len = 4 + 3 + 4 + 4 + 4 + 4 * (1 + FEATURE_DIM + FEATURE_DIM * FEATURE_DIM);
        assert_eq!(bytes.len(), expected_len);
        assert_eq!(&bytes[0..4], &3_u32.to_le_bytes());
        assert_eq!(&bytes[4..7], b"yes");
        assert_eq!(&bytes[7..11], &50.0_f32.to_le_bytes());
        assert_eq!(&bytes[11..15], &10.0_f32.to_le_bytes());
        assert_eq!(&bytes[15..19], &1_u32.to_le_bytes());
        // Diagonal of the inverse covariance, first entry.
        let inverse_start = 19 + 4 + 4 * FEATURE_DIM;
        assert_eq!(&bytes[inverse_start..inverse_start + 4], &1.0_f32.to_le_bytes());
    }

    #[test]
    fn round_trip_preserves_identity_state() {
        let model = zero_mean_model();
        let decoded = decode_models(&encode_models(&[model.clone()]).unwrap()).unwrap();
        assert_eq!(decoded, vec![model]);
    }

    #[test]
    fn records_concatenate() {
        let mut second = zero_mean_model();
        second.name = "no".to_string();
        let decoded = decode_models(&encode_models(&[zero_mean_model(), second]).unwrap()).unwrap();
        let names: Vec<&str> = decoded.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["yes", "no"]);
    }

    #[test]
    fn truncated_record_is_an_error() {
        let bytes = encode_models(&[zero_mean_model()]).unwrap();
        let err = decode_models(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn save_replaces_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.model");
        fs::write(&path, b"stale").unwrap();
        save_models(&path, &[zero_mean_model()]).unwrap();
        assert!(!dir.path().join("words.model.tmp").exists());
        assert_eq!(load_models(&path).unwrap(), vec![zero_mean_model()]);
    }

    #[test]
    fn save_to_missing_directory_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("words.model");
        let err = save_models(&path, &[zero_mean_model()]).unwrap_err();
        assert!(format!("{err:#}").contains("words.model.tmp"));
    }
}
