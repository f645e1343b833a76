//! Pitch pipeline: gates raw detector output and writes the audio field group.

use super::Pipeline;
use crate::config::AudioConfig;
use crate::state::SharedState;
use crate::theory::{is_guitar_range, NoteInfo};

/// External pitch detector. Returns `(frequency_hz, clarity)` with clarity in [0, 1].
pub trait PitchDetector {
    fn find_pitch(&mut self, samples: &[f32], sample_rate: u32) -> (f64, f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioMode {
    /// Live input; only pitches a guitar can produce are accepted.
    #[default]
    Steady,
    /// Diagnostic oscillator; any clear pitch is accepted.
    TestTone,
}

/// Display level for an RMS value: `min(rms * 5, 1)`.
pub fn input_level(rms: f64) -> f64 {
    (rms * 5.0).min(1.0)
}

pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt()
}

/// Acceptance rules shared by live capture and recorded measurements.
pub struct PitchGate {
    config: AudioConfig,
    mode: AudioMode,
    state: SharedState,
}

impl PitchGate {
    pub fn new(config: AudioConfig, state: SharedState) -> Self {
        Self {
            config,
            mode: AudioMode::Steady,
            state,
        }
    }

    pub fn mode(&self) -> AudioMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: AudioMode) {
        self.mode = mode;
    }

    /// Whether a buffer at this RMS is loud enough to run the detector on.
    pub fn is_audible(&self, rms: f64) -> bool {
        rms > self.config.min_volume
    }

    pub fn start(&self) {
        self.state.update_audio(|a| a.is_listening = true);
        log::info!("Audio pipeline started ({:?})", self.mode);
    }

    /// Publish one measurement. `pitch` is the detector's `(frequency, clarity)`,
    /// absent when the buffer was too quiet to analyze.
    ///
    /// A quiet buffer clears the note in steady mode. In test-tone mode it is
    /// ignored and the last reading stays on display.
    pub fn publish(&self, rms: f64, pitch: Option<(f64, f64)>) -> Option<NoteInfo> {
        let level = input_level(rms);
        let Some((frequency, clarity)) = pitch.filter(|_| self.is_audible(rms)) else {
            if self.mode == AudioMode::Steady {
                self.state.update_audio(|a| a.set_note(None, level, 0.0));
            }
            return None;
        };

        if self.mode == AudioMode::TestTone {
            log::debug!("Test tone: detected {:.2} Hz, clarity {:.3}", frequency, clarity);
        }

        let in_range = self.mode == AudioMode::TestTone || is_guitar_range(frequency);
        let note = (clarity >= self.config.clarity_threshold && frequency > 0.0 && in_range)
            .then(|| NoteInfo::from_frequency(frequency));

        self.state.update_audio(|a| a.set_note(note, level, clarity));
        note
    }

    /// Back to idle: nothing listening, no note, zero level.
    pub fn stop(&self) {
        self.state.update_audio(|a| a.stop());
        log::info!("Audio pipeline stopped");
    }
}

pub struct AudioPipeline<P: PitchDetector> {
    detector: P,
    gate: PitchGate,
}

impl<P: PitchDetector> AudioPipeline<P> {
    pub fn new(detector: P, config: AudioConfig, state: SharedState) -> Self {
        Self {
            detector,
            gate: PitchGate::new(config, state),
        }
    }

    pub fn with_mode(mut self, mode: AudioMode) -> Self {
        self.gate.set_mode(mode);
        self
    }

    pub fn mode(&self) -> AudioMode {
        self.gate.mode()
    }

    pub fn start(&self) {
        self.gate.start();
    }

    /// Analyze one buffer and publish the result. Returns the accepted note, if any.
    pub fn process_buffer(&mut self, samples: &[f32], sample_rate: u32) -> Option<NoteInfo> {
        let rms = rms(samples);
        let pitch = self
            .gate
            .is_audible(rms)
            .then(|| self.detector.find_pitch(samples, sample_rate));
        self.gate.publish(rms, pitch)
    }

    pub fn stop(&self) {
        self.gate.stop();
    }
}

impl<P: PitchDetector> Pipeline for AudioPipeline<P> {
    fn start(&mut self) {
        AudioPipeline::start(self);
    }

    fn stop(&mut self) {
        AudioPipeline::stop(self);
    }
}
