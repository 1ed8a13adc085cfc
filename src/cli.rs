use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::config::{ConvergencePolicy, TrainingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "isoword",
    version,
    about = "Isolated-word recognizer: feature extraction, template training and scoring"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train one template per word directory and write a calibrated model file.
    Train(TrainArgs),
    /// Extract feature vectors from a WAV file into utterance CSVs.
    Features(FeaturesArgs),
    /// Score utterance CSVs or recorded audio against a model file.
    Recognize(RecognizeArgs),
    /// Print the words stored in a model file.
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// One directory of utterance CSVs per word; the directory name is the word.
    #[arg(value_name = "WORD_DIR", required = true)]
    pub word_dirs: Vec<PathBuf>,
    /// Model file to write.
    #[arg(long, short)]
    pub output: PathBuf,
    /// Optional JSON training config.
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,
    /// Override the maximum number of training rounds.
    #[arg(long = "max-rounds")]
    pub max_rounds: Option<usize>,
    /// Keep the template from the final round instead of the best one.
    #[arg(long = "keep-last")]
    pub keep_last: bool,
    /// Align utterances on the calling thread only.
    #[arg(long)]
    pub sequential: bool,
}

impl TrainArgs {
    /// Applies command-line overrides on top of a loaded config.
    pub fn apply_overrides(&self, mut config: TrainingConfig) -> Result<TrainingConfig> {
        if let Some(rounds) = self.max_rounds {
            ensure!(rounds >= 1, "--max-rounds must be at least 1");
            config.max_rounds = rounds;
        }
        if self.keep_last {
            config.convergence = ConvergencePolicy::KeepLast;
        }
        if self.sequential {
            config.parallel = false;
        }
        Ok(config)
    }
}

#[derive(Args, Debug, Clone)]
pub struct FeaturesArgs {
    /// 16-bit PCM WAV input, mono or stereo.
    #[arg(value_name = "WAV")]
    pub wav: PathBuf,
    /// Directory receiving `utter_<n>.csv` files.
    #[arg(long = "output-dir")]
    pub output_dir: PathBuf,
    /// Treat the whole file as a single utterance instead of endpointing it.
    #[arg(long = "one-shot")]
    pub one_shot: bool,
}

#[derive(Args, Debug, Clone)]
#[command(group(
    ArgGroup::new("input")
        .required(true)
        .multiple(true)
        .args(["utterances", "wav", "raw"])
))]
pub struct RecognizeArgs {
    #[arg(value_name = "MODEL")]
    pub model: PathBuf,
    /// Precomputed utterance CSVs.
    #[arg(value_name = "CSV")]
    pub utterances: Vec<PathBuf>,
    /// 16-bit PCM WAV recording to endpoint and score.
    #[arg(long, value_name = "FILE")]
    pub wav: Option<PathBuf>,
    /// Headerless signed 16-bit little-endian mono audio; `-` reads stdin.
    #[arg(long, value_name = "FILE")]
    pub raw: Option<PathBuf>,
    /// Sample rate of the `--raw` stream.
    #[arg(long = "sample-rate", default_value_t = 16_000)]
    pub sample_rate: u32,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[arg(value_name = "MODEL")]
    pub model: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use crate::config::{ConvergencePolicy, TrainingConfig};
    use clap::Parser;

    #[test]
    fn parses_train_overrides() {
        let cli = Cli::try_parse_from([
            "isoword",
            "train",
            "yes",
            "no",
            "--output",
            "words.model",
            "--max-rounds",
            "5",
            "--keep-last",
            "--sequential",
        ])
        .unwrap();
        let Command::Train(args) = cli.command else {
            panic!("expected train command");
        };
        assert_eq!(args.word_dirs.len(), 2);
        let config = args.apply_overrides(TrainingConfig::default()).unwrap();
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.convergence, ConvergencePolicy::KeepLast);
        assert!(!config.parallel);
    }

    #[test]
    fn train_without_overrides_keeps_config() {
        let cli = Cli::try_parse_from(["isoword", "train", "yes", "-o", "w.model"]).unwrap();
        let Command::Train(args) = cli.command else {
            panic!("expected train command");
        };
        let config = args.apply_overrides(TrainingConfig::default()).unwrap();
        assert_eq!(config.max_rounds, 50);
        assert_eq!(config.convergence, ConvergencePolicy::KeepBest);
        assert!(config.parallel);
    }

    #[test]
    fn rejects_zero_round_override() {
        let cli = Cli::try_parse_from([
            "isoword",
            "train",
            "yes",
            "-o",
            "w.model",
            "--max-rounds",
            "0",
        ])
        .unwrap();
        let Command::Train(args) = cli.command else {
            panic!("expected train command");
        };
        assert!(args.apply_overrides(TrainingConfig::default()).is_err());
    }

    #[test]
    fn train_requires_a_word_directory() {
        assert!(Cli::try_parse_from(["isoword", "train", "-o", "w.model"]).is_err());
    }

    #[test]
    fn parses_features_and_recognize() {
        let cli = Cli::try_parse_from([
            "isoword",
            "features",
            "in.wav",
            "--output-dir",
            "out",
            "--one-shot",
        ])
        .unwrap();
        let Command::Features(args) = cli.command else {
            panic!("expected features command");
        };
        assert!(args.one_shot);

        let cli = Cli::try_parse_from(["isoword", "recognize", "w.model", "a.csv", "b.csv"]).unwrap();
        let Command::Recognize(args) = cli.command else {
            panic!("expected recognize command");
        };
        assert_eq!(args.utterances.len(), 2);
    }

    #[test]
    fn recognize_accepts_audio_inputs() {
        let cli = Cli::try_parse_from([
            "isoword",
            "recognize",
            "w.model",
            "--raw",
            "-",
            "--sample-rate",
            "8000",
        ])
        .unwrap();
        let Command::Recognize(args) = cli.command else {
            panic!("expected recognize command");
        };
        assert!(args.utterances.is_empty());
        assert_eq!(args.raw.as_deref(), Some(std::path::Path::new("-")));
        assert_eq!(args.sample_rate, 8000);

        let cli = Cli::try_parse_from(["isoword", "recognize", "w.model", "--wav", "a.wav"]).unwrap();
        let Command::Recognize(args) = cli.command else {
            panic!("expected recognize command");
        };
        assert_eq!(args.sample_rate, 16_000);
    }

    #[test]
    fn recognize_requires_some_input() {
        assert!(Cli::try_parse_from(["isoword", "recognize", "w.model"]).is_err());
    }
}
