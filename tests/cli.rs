use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const FEATURE_DIM: usize = 13;

fn write_word(root: &Path, word: &str, base: f32) {
    let dir = root.join(word);
    fs::create_dir_all(&dir).unwrap();
    let shapes: [&[f32]; 3] = [&[0.0, 1.0, 2.0], &[0.0, 1.0, 1.0, 2.0], &[0.0, 2.0]];
    for (index, shape) in shapes.iter().enumerate() {
        let rows: Vec<String> = shape
            .iter()
            .map(|offset| {
                let mut fields = vec!["10.0".to_string()];
                fields.extend((0..FEATURE_DIM).map(|i| format!("{}", base + offset + i as f32 * 0.1)));
                fields.join(",")
            })
            .collect();
        fs::write(dir.join(format!("utter_{index}.csv")), rows.join("\n")).unwrap();
    }
}

/// Half a second of noise, a tone buried in noise, then half a second of noise.
fn tone_word(frequency: f32, seconds: f32, seed: u32) -> Vec<i16> {
    let mut state = seed;
    let mut noise = move || {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (state >> 8) as f32 / (1u32 << 24) as f32 * 100.0 - 50.0
    };
    let lead = 8_000;
    let body = (seconds * 16_000.0) as usize;
    (0..lead + body + lead)
        .map(|i| {
            let mut sample = noise();
            if (lead..lead + body).contains(&i) {
                let t = (i - lead) as f32 / 16_000.0;
                sample += 4000.0 * (2.0 * std::f32::consts::PI * frequency * t).sin();
            }
            sample as i16
        })
        .collect()
}

fn write_wav(path: &Path, samples: &[i16]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

/// First word listed under the first scored utterance.
fn best_word(stdout: &[u8]) -> String {
    let stdout = String::from_utf8(stdout.to_vec()).unwrap();
    stdout
        .lines()
        .find(|line| line.starts_with("  "))
        .and_then(|line| line.split_whitespace().next())
        .unwrap_or_else(|| panic!("no scores in {stdout:?}"))
        .to_string()
}

fn isoword() -> Command {
    Command::cargo_bin("isoword").unwrap()
}

#[test]
fn train_inspect_and_recognize() {
    let root = tempfile::tempdir().unwrap();
    write_word(root.path(), "left", 0.0);
    write_word(root.path(), "right", 15.0);
    let model = root.path().join("words.model");

    isoword()
        .arg("train")
        .arg(root.path().join("left"))
        .arg(root.path().join("right"))
        .arg("--output")
        .arg(&model)
        .arg("--sequential")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 word models"));
    assert!(model.exists());
    assert!(!root.path().join("words.model.tmp").exists());

    isoword()
        .arg("inspect")
        .arg(&model)
        .assert()
        .success()
        .stdout(predicate::str::contains("left").and(predicate::str::contains("right")));

    let output = isoword()
        .arg("recognize")
        .arg(&model)
        .arg(root.path().join("right").join("utter_0.csv"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let first_word = stdout
        .lines()
        .nth(1)
        .and_then(|line| line.split_whitespace().next())
        .unwrap();
    assert_eq!(first_word, "right");
}

#[test]
fn empty_word_directory_fails() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir(root.path().join("silent")).unwrap();
    isoword()
        .arg("train")
        .arg(root.path().join("silent"))
        .arg("--output")
        .arg(root.path().join("out.model"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("contains no utterance files"));
    assert!(!root.path().join("out.model").exists());
}

#[test]
fn malformed_config_is_reported() {
    let root = tempfile::tempdir().unwrap();
    write_word(root.path(), "only", 0.0);
    let config = root.path().join("train.json");
    fs::write(&config, r#"{"rounds": 3}"#).unwrap();
    isoword()
        .arg("train")
        .arg(root.path().join("only"))
        .arg("--output")
        .arg(root.path().join("out.model"))
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("train.json"));
}

#[test]
fn features_writes_one_shot_utterance() {
    let root = tempfile::tempdir().unwrap();
    let wav = root.path().join("word.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&wav, spec).unwrap();
    for i in 0..8_000 {
        let sample = (3000.0 * (i as f32 * 0.17).sin()) as i16;
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();

    let out = root.path().join("csv");
    isoword()
        .arg("features")
        .arg(&wav)
        .arg("--output-dir")
        .arg(&out)
        .arg("--one-shot")
        .assert()
        .success();

    let written = fs::read_to_string(out.join("utter_0.csv")).unwrap();
    // (8000 - 400) / 160 + 1 frames.
    assert_eq!(written.lines().count(), 48);
    assert!(written
        .lines()
        .all(|line| line.split(',').count() == FEATURE_DIM + 1));
}

#[test]
fn recognizes_words_from_recorded_audio() {
    let root = tempfile::tempdir().unwrap();
    let words = [("low", 300.0_f32), ("high", 2500.0_f32)];
    for (word, frequency) in words {
        let dir = root.path().join(word);
        for (take, seconds) in [0.4_f32, 0.5, 0.6].into_iter().enumerate() {
            let wav = root.path().join(format!("{word}_{take}.wav"));
            write_wav(&wav, &tone_word(frequency, seconds, 7 + take as u32));
            isoword()
                .arg("features")
                .arg(&wav)
                .arg("--output-dir")
                .arg(&dir)
                .assert()
                .success();
        }
        assert!(dir.join("utter_0.csv").exists());
    }

    let model = root.path().join("tones.model");
    isoword()
        .arg("train")
        .arg(root.path().join("low"))
        .arg(root.path().join("high"))
        .arg("--output")
        .arg(&model)
        .assert()
        .success();

    let fresh = root.path().join("fresh.wav");
    write_wav(&fresh, &tone_word(300.0, 0.45, 99));
    let output = isoword()
        .arg("recognize")
        .arg(&model)
        .arg("--wav")
        .arg(&fresh)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("utterance 1:"));
    assert_eq!(best_word(&output.stdout), "low");

    let raw: Vec<u8> = tone_word(2500.0, 0.45, 123)
        .iter()
        .flat_map(|sample| sample.to_le_bytes())
        .collect();
    let output = isoword()
        .arg("recognize")
        .arg(&model)
        .arg("--raw")
        .arg("-")
        .arg("--sample-rate")
        .arg("16000")
        .write_stdin(raw)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(best_word(&output.stdout), "high");
}

#[test]
fn recording_without_speech_reports_nothing() {
    let root = tempfile::tempdir().unwrap();
    write_word(root.path(), "left", 0.0);
    let model = root.path().join("words.model");
    isoword()
        .arg("train")
        .arg(root.path().join("left"))
        .arg("--output")
        .arg(&model)
        .assert()
        .success();

    let quiet = root.path().join("quiet.raw");
    fs::write(&quiet, vec![0u8; 32_000]).unwrap();
    isoword()
        .arg("recognize")
        .arg(&model)
        .arg("--raw")
        .arg(&quiet)
        .assert()
        .success()
        .stderr(predicate::str::contains("No utterances detected"));
}
