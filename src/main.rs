use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use isoword::audio::decoder::decode_wav;
use isoword::cli::{Cli, Command, FeaturesArgs, InspectArgs, RecognizeArgs, TrainArgs};
use isoword::config::{FrontEndConfig, TrainingConfig};
use isoword::corpus::{load_corpus, load_utterance, next_free_utterance_path, write_utterance};
use isoword::features::endpoint::{DetectionMode, UtteranceDetector};
use isoword::features::frontend::{decode_pcm16_le, FrontEnd};
use isoword::features::{utterances_from_samples, FeatureExtractor};
use isoword::model::recognizer::{Recognizer, WordScore};
use isoword::model::{load_models, save_models};
use isoword::training::train_vocabulary;
use isoword::types::Utterance;

/// Samples handed to the front end per call when streaming a recording.
const STREAM_CHUNK_SAMPLES: usize = 4096;

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Train(args) => handle_train(&args),
        Command::Features(args) => handle_features(&args),
        Command::Recognize(args) => handle_recognize(&args),
        Command::Inspect(args) => handle_inspect(&args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_train(args: &TrainArgs) -> Result<()> {
    let config = args.apply_overrides(TrainingConfig::load(args.config.as_deref())?)?;
    let corpus = load_corpus(&args.word_dirs).context("Failed to load training corpus")?;
    info!(
        words = corpus.len(),
        max_rounds = config.max_rounds,
        convergence = ?config.convergence,
        parallel = config.parallel,
        "training vocabulary"
    );
    let models = train_vocabulary(&corpus, &config).context("Training failed")?;
    save_models(&args.output, &models)?;
    println!("Wrote {} word models to {:?}", models.len(), args.output);
    Ok(())
}

fn handle_features(args: &FeaturesArgs) -> Result<()> {
    let audio = decode_wav(&args.wav)?;
    let config = FrontEndConfig {
        input_sample_rate: audio.sample_rate,
        ..FrontEndConfig::default()
    };
    let mode = if args.one_shot {
        DetectionMode::OneShot
    } else {
        DetectionMode::FreeRunning
    };
    let utterances = utterances_from_samples(&audio.samples, &config, mode)
        .with_context(|| format!("Failed to extract features from {:?}", args.wav))?;

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", args.output_dir))?;
    for utterance in &utterances {
        let path = next_free_utterance_path(&args.output_dir);
        write_utterance(&path, utterance)?;
        println!("Wrote {} frames to {:?}", utterance.len(), path);
    }
    if utterances.is_empty() {
        eprintln!("No utterances detected in {:?}", args.wav);
    }
    Ok(())
}

fn handle_recognize(args: &RecognizeArgs) -> Result<()> {
    let models = load_models(&args.model)?;
    let recognizer = Recognizer::new(models)
        .with_context(|| format!("Model file {:?} holds no words", args.model))?;
    info!(words = recognizer.models().len(), "loaded recognizer");

    for path in &args.utterances {
        let utterance = load_utterance(path)?;
        let scores = recognizer
            .score(&utterance)
            .with_context(|| format!("Failed to score {:?}", path))?;
        println!("{}:", path.display());
        print_scores(&scores);
    }
    if let Some(path) = &args.wav {
        let audio = decode_wav(path)?;
        let label = path.display().to_string();
        recognize_audio(&recognizer, &audio.samples, audio.sample_rate, &label)?;
    }
    if let Some(path) = &args.raw {
        let bytes = read_raw_input(path)?;
        let samples = decode_pcm16_le(&bytes)
            .with_context(|| format!("Failed to decode raw PCM from {:?}", path))?;
        let label = path.display().to_string();
        recognize_audio(&recognizer, &samples, args.sample_rate, &label)?;
    }
    Ok(())
}

fn read_raw_input(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    if path == Path::new("-") {
        io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Failed to read raw PCM from stdin")?;
    } else {
        bytes = fs::read(path).with_context(|| format!("Failed to read raw PCM {:?}", path))?;
    }
    Ok(bytes)
}

/// Streams samples through the front end and endpointer, scoring each word
/// as soon as it closes.
fn recognize_audio(
    recognizer: &Recognizer,
    samples: &[f32],
    sample_rate: u32,
    label: &str,
) -> Result<()> {
    let config = FrontEndConfig {
        input_sample_rate: sample_rate,
        ..FrontEndConfig::default()
    };
    let mut front_end = FrontEnd::new(&config)?;
    let mut extractor = FeatureExtractor::new();
    let mut detector = UtteranceDetector::new(DetectionMode::FreeRunning);
    let mut detected = 0usize;

    for chunk in samples.chunks(STREAM_CHUNK_SAMPLES) {
        for frame in front_end.feed(chunk, &mut extractor)? {
            let was_active = detector.in_utterance();
            let closed = detector.push(frame);
            if !was_active && detector.in_utterance() {
                info!(frame = frame.sequence_number, "utterance detected");
            }
            if let Some(utterance) = closed {
                info!(frame = frame.sequence_number, "utterance over");
                detected += 1;
                report_utterance(recognizer, &utterance, detected, label)?;
            }
        }
    }
    if let Some(utterance) = detector.flush() {
        detected += 1;
        report_utterance(recognizer, &utterance, detected, label)?;
    }
    if detected == 0 {
        eprintln!("No utterances detected in {}", label);
    }
    Ok(())
}

fn report_utterance(
    recognizer: &Recognizer,
    utterance: &Utterance,
    index: usize,
    label: &str,
) -> Result<()> {
    let scores = recognizer
        .score(utterance)
        .with_context(|| format!("Failed to score utterance {} of {}", index, label))?;
    println!("{} utterance {}:", label, index);
    print_scores(&scores);
    Ok(())
}

fn print_scores(scores: &[WordScore]) {
    for score in scores {
        println!(
            "  {:<20} score {:>10.3}  log-likelihood {:>12.3}",
            score.word, score.score, score.log_likelihood
        );
    }
}

fn handle_inspect(args: &InspectArgs) -> Result<()> {
    let models = load_models(&args.model)?;
    println!("{} word models in {:?}", models.len(), args.model);
    for model in &models {
        println!(
            "  {:<20} states {:>4}  offset {:>10.4}  slope {:>10.4}",
            model.name,
            model.template.len(),
            model.calibration.offset,
            model.calibration.slope
        );
    }
    Ok(())
}
