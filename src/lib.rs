//! Isolated-word speech recognizer: cepstral feature extraction, DTW template
//! training and calibrated binary word models.

pub mod alignment;
pub mod audio;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod features;
pub mod model;
pub mod training;
pub mod types;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Convenient alias for results returned by the recognizer core.
pub type Result<T> = std::result::Result<T, RecognizerError>;

/// Lightweight error type shared by the feature, alignment and training modules.
#[derive(Debug, Clone)]
pub struct RecognizerError {
    message: Arc<str>,
}

impl RecognizerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Arc::from(message.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for RecognizerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for RecognizerError {}

impl From<std::io::Error> for RecognizerError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}
