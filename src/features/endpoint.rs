//! Energy-based utterance endpointing over a feature vector stream.

use std::collections::VecDeque;

use crate::types::{FeatureVector, Utterance};

const START_THRESHOLD: f32 = 5.0;
const STOP_THRESHOLD: f32 = 2.5;
const START_LENGTH: usize = 4;
const STOP_LENGTH: usize = 10;
const FRAMES_BACKED_UP: usize = 8;
const FRAMES_DROPPED_FROM_END: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMode {
    /// Every frame seen becomes part of a single utterance, emitted on flush.
    OneShot,
    /// Utterances are cut from the stream by comparing energy against the noise floor.
    FreeRunning,
}

/// Groups feature vectors into utterances.
#[derive(Debug, Clone)]
pub struct UtteranceDetector {
    mode: DetectionMode,
    backlog: VecDeque<FeatureVector>,
    current: Vec<FeatureVector>,
    active: bool,
    loud_run: usize,
    quiet_run: usize,
}

impl UtteranceDetector {
    pub fn new(mode: DetectionMode) -> Self {
        Self {
            mode,
            backlog: VecDeque::with_capacity(FRAMES_BACKED_UP),
            current: Vec::new(),
            active: false,
            loud_run: 0,
            quiet_run: 0,
        }
    }

    /// Whether an utterance is currently being accumulated.
    pub fn in_utterance(&self) -> bool {
        self.active
    }

    /// Consumes one frame, returning an utterance if this frame closed one.
    pub fn push(&mut self, frame: FeatureVector) -> Option<Utterance> {
        match self.mode {
            DetectionMode::OneShot => {
                self.current.push(frame);
                self.active = true;
                None
            }
            DetectionMode::FreeRunning => self.push_free_running(frame),
        }
    }

    /// Ends the stream. In one-shot mode everything accumulated is returned;
    /// in free-running mode an utterance still in progress is closed.
    pub fn flush(&mut self) -> Option<Utterance> {
        self.backlog.clear();
        self.loud_run = 0;
        self.quiet_run = 0;
        if !self.active {
            return None;
        }
        self.active = false;
        let frames = std::mem::take(&mut self.current);
        (!frames.is_empty()).then(|| Utterance::new(frames))
    }

    fn push_free_running(&mut self, frame: FeatureVector) -> Option<Utterance> {
        let excess = frame.log_energy - frame.noise_floor_estimate;
        if self.active {
            self.current.push(frame);
            if excess < STOP_THRESHOLD {
                self.quiet_run += 1;
            } else {
                self.quiet_run = 0;
            }
            if self.quiet_run >= STOP_LENGTH {
                return self.finish();
            }
            return None;
        }

        if self.backlog.len() == FRAMES_BACKED_UP {
            self.backlog.pop_front();
        }
        self.backlog.push_back(frame);
        if excess > START_THRESHOLD {
            self.loud_run += 1;
        } else {
            self.loud_run = 0;
        }
        if self.loud_run >= START_LENGTH {
            self.active = true;
            self.loud_run = 0;
            self.quiet_run = 0;
            self.current = self.backlog.drain(..).collect();
        }
        None
    }

    fn finish(&mut self) -> Option<Utterance> {
        self.active = false;
        self.quiet_run = 0;
        let mut frames = std::mem::take(&mut self.current);
        let keep = frames.len().saturating_sub(FRAMES_DROPPED_FROM_END);
        frames.truncate(keep);
        (!frames.is_empty()).then(|| Utterance::new(frames))
    }
}
