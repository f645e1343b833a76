//! Application state shared by the audio pipeline, the vision pipeline and
//! whatever displays the result.
//!
//! Each field group has one writer: the audio pipeline owns `AudioState`, the
//! vision pipeline owns `VisionState`, and the user (CLI or UI) owns
//! calibration and settings. Derived values (resolved position, hand region,
//! scale positions) are computed on demand and never stored.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::calibration::{Calibration, CalibrationError, CalibrationStep, CalibrationWizard};
use crate::config::SettingsConfig;
use crate::db::{Database, DbError};
use crate::fretboard::{positions_for_note, FretPosition};
use crate::hand_region::{fret_range, FretRange};
use crate::landmarks::Landmark;
use crate::resolver::{resolve_position, AudioData, ResolvedPosition, VisionData};
use crate::scales::{scale_positions, ScalePosition, ScaleType};
use crate::theory::{NoteInfo, NoteName};

#[derive(Error, Debug)]
pub enum StateError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error("Failed to persist state: {0}")]
    Db(#[from] DbError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub is_left_handed: bool,
    pub fret_tolerance: u8,
    pub show_all_positions: bool,
    pub show_hand_region: bool,
    pub practice_enabled: bool,
    pub practice_root: NoteName,
    pub practice_scale: ScaleType,
    pub display_frets: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&SettingsConfig::default())
    }
}

impl From<&SettingsConfig> for Settings {
    fn from(c: &SettingsConfig) -> Self {
        Self {
            is_left_handed: c.left_handed,
            fret_tolerance: c.fret_tolerance,
            show_all_positions: c.show_all_positions,
            show_hand_region: c.show_hand_region,
            practice_enabled: false,
            practice_root: c.practice_root,
            practice_scale: c.practice_scale,
            display_frets: c.display_frets,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioState {
    pub is_listening: bool,
    pub device_id: Option<String>,
    pub current_note: Option<NoteInfo>,
    /// Always `find_positions` of `current_note`; kept in step by `set_note`.
    pub possible_positions: Vec<FretPosition>,
    /// Display level 0-1.
    pub input_level: f64,
    pub clarity: f64,
}

impl AudioState {
    pub fn set_note(&mut self, note: Option<NoteInfo>, input_level: f64, clarity: f64) {
        if self.current_note.map(|n| n.midi_note) != note.map(|n| n.midi_note) {
            self.possible_positions = positions_for_note(note.map(|n| n.midi_note));
        }
        self.current_note = note;
        self.input_level = input_level;
        self.clarity = clarity;
    }

    /// Idle state after the pipeline stops.
    pub fn stop(&mut self) {
        self.is_listening = false;
        self.set_note(None, 0.0, 0.0);
    }

    pub fn audio_data(&self) -> AudioData {
        AudioData {
            midi_note: self.current_note.map(|n| n.midi_note),
            possible_positions: self.possible_positions.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisionState {
    pub is_tracking: bool,
    pub device_id: Option<String>,
    pub hand_detected: bool,
    pub landmarks: Option<Vec<Landmark>>,
    pub estimated_fret: u8,
    pub smoothed_x: Option<f64>,
    /// True until the landmark model is ready.
    pub is_loading: bool,
}

impl Default for VisionState {
    fn default() -> Self {
        Self {
            is_tracking: false,
            device_id: None,
            hand_detected: false,
            landmarks: None,
            estimated_fret: 0,
            smoothed_x: None,
            is_loading: true,
        }
    }
}

impl VisionState {
    pub fn hand_found(&mut self, landmarks: Vec<Landmark>, smoothed_x: f64, estimated_fret: u8) {
        self.is_tracking = true;
        self.hand_detected = true;
        self.landmarks = Some(landmarks);
        self.smoothed_x = Some(smoothed_x);
        self.estimated_fret = estimated_fret;
    }

    /// No usable hand this frame. The last smoothed x and fret estimate are
    /// kept so a brief dropout doesn't make the display jump.
    pub fn hand_lost(&mut self) {
        self.hand_detected = false;
        self.landmarks = None;
    }

    pub fn stop(&mut self) {
        self.is_tracking = false;
        self.hand_lost();
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    audio: AudioState,
    vision: VisionState,
    calibration: Option<Calibration>,
    wizard: CalibrationWizard,
    settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Restore persisted calibration and device selection. Anything missing
    /// or unreadable just stays unset.
    pub fn load(db: &Database, settings: Settings) -> crate::db::Result<Self> {
        let mut state = Self::new(settings);
        state.calibration = db.load_calibration()?;
        if let Some(c) = &state.calibration {
            state.settings.is_left_handed = c.is_left_handed;
        }
        state.audio.device_id = db.audio_device()?;
        state.vision.device_id = db.camera_device()?;
        log::debug!(
            "State loaded: calibrated={} audio_device={:?} camera_device={:?}",
            state.calibration.is_some(),
            state.audio.device_id,
            state.vision.device_id
        );
        Ok(state)
    }

    pub fn audio(&self) -> &AudioState {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioState {
        &mut self.audio
    }

    pub fn vision(&self) -> &VisionState {
        &self.vision
    }

    pub fn vision_mut(&mut self) -> &mut VisionState {
        &mut self.vision
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn wizard(&self) -> &CalibrationWizard {
        &self.wizard
    }

    pub fn calibration_step(&self) -> CalibrationStep {
        self.wizard.step()
    }

    pub fn set_audio_device(
        &mut self,
        db: &Database,
        device_id: Option<String>,
    ) -> crate::db::Result<()> {
        db.set_audio_device(device_id.as_deref())?;
        self.audio.device_id = device_id;
        Ok(())
    }

    pub fn set_camera_device(
        &mut self,
        db: &Database,
        device_id: Option<String>,
    ) -> crate::db::Result<()> {
        db.set_camera_device(device_id.as_deref())?;
        self.vision.device_id = device_id;
        Ok(())
    }

    /// Replace the calibration, persisting it when present.
    pub fn set_calibration(
        &mut self,
        db: &Database,
        calibration: Option<Calibration>,
    ) -> crate::db::Result<()> {
        if let Some(c) = &calibration {
            db.save_calibration(c)?;
        }
        self.calibration = calibration;
        Ok(())
    }

    pub fn start_calibration(&mut self) {
        self.wizard.start();
    }

    pub fn capture_picking_zone(&mut self, x: f64) -> Result<(), CalibrationError> {
        self.wizard.capture_picking_zone(x)
    }

    pub fn capture_fret1(&mut self, x: f64) -> Result<(), CalibrationError> {
        self.wizard.capture_fret1(x)
    }

    /// Final capture. Only an accepted calibration is persisted; a rejected
    /// one leaves the stored calibration untouched.
    pub fn capture_fret12(&mut self, db: &Database, x: f64) -> Result<Calibration, StateError> {
        let calibration = self.wizard.capture_fret12(x, self.settings.is_left_handed)?;
        db.save_calibration(&calibration)?;
        self.calibration = Some(calibration.clone());
        Ok(calibration)
    }

    pub fn finish_calibration(&mut self) {
        self.wizard.finish();
    }

    /// Forget the calibration entirely, including the stored copy.
    pub fn reset_calibration(&mut self, db: &Database) -> crate::db::Result<()> {
        db.clear_calibration()?;
        self.calibration = None;
        self.wizard.reset();
        Ok(())
    }

    /// Flip handedness; an existing calibration follows and is re-persisted.
    pub fn toggle_left_handed(&mut self, db: &Database) -> crate::db::Result<()> {
        let left = !self.settings.is_left_handed;
        self.settings.is_left_handed = left;
        if let Some(c) = self.calibration.as_mut() {
            c.is_left_handed = left;
            db.save_calibration(c)?;
        }
        Ok(())
    }

    pub fn vision_data(&self) -> VisionData {
        VisionData {
            hand_detected: self.vision.hand_detected,
            estimated_fret: self.vision.estimated_fret,
            tolerance: self.settings.fret_tolerance,
        }
    }

    pub fn resolved_position(&self) -> ResolvedPosition {
        resolve_position(&self.audio.audio_data(), &self.vision_data())
    }

    /// Hand-region window for display (see `hand_region`).
    pub fn fret_range(&self) -> FretRange {
        fret_range(
            self.vision.estimated_fret,
            self.settings.fret_tolerance,
            self.settings.is_left_handed,
        )
    }

    pub fn scale_positions(&self) -> Vec<ScalePosition> {
        scale_positions(
            self.settings.practice_root,
            self.settings.practice_scale,
            self.settings.display_frets,
        )
    }
}

/// `AppState` behind a lock, cloned into each pipeline.
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<RwLock<AppState>>);

impl SharedState {
    pub fn new(state: AppState) -> Self {
        Self(Arc::new(RwLock::new(state)))
    }

    /// A panicked writer leaves plain data behind, so a poisoned lock is still usable.
    pub fn read(&self) -> RwLockReadGuard<'_, AppState> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, AppState> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn update_audio<R>(&self, f: impl FnOnce(&mut AudioState) -> R) -> R {
        f(self.write().audio_mut())
    }

    pub fn update_vision<R>(&self, f: impl FnOnce(&mut VisionState) -> R) -> R {
        f(self.write().vision_mut())
    }

    pub fn resolved_position(&self) -> ResolvedPosition {
        self.read().resolved_position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Confidence;

    fn calibrated_state(db: &Database) -> AppState {
        let mut state = AppState::default();
        state.start_calibration();
        state.capture_picking_zone(0.9).unwrap();
        state.capture_fret1(0.2).unwrap();
        state.capture_fret12(db, 0.75).unwrap();
        state.finish_calibration();
        state
    }

    #[test]
    fn test_set_note_tracks_positions() {
        let mut audio = AudioState::default();
        audio.set_note(Some(NoteInfo::from_frequency(110.0)), 0.5, 0.95);
        assert_eq!(audio.possible_positions.len(), 2);
        audio.set_note(None, 0.1, 0.2);
        assert!(audio.possible_positions.is_empty());
        assert_eq!(audio.clarity, 0.2);
    }

    #[test]
    fn test_hand_lost_keeps_last_estimate() {
        let mut vision = VisionState::default();
        vision.hand_found(vec![Landmark::new(0.4, 0.5, 0.0)], 0.4, 7);
        vision.hand_lost();
        assert!(!vision.hand_detected);
        assert!(vision.landmarks.is_none());
        assert_eq!(vision.smoothed_x, Some(0.4));
        assert_eq!(vision.estimated_fret, 7);
    }

    #[test]
    fn test_capture_persists_valid_calibration() {
        let db = Database::open_in_memory().unwrap();
        let state = calibrated_state(&db);
        assert!(state.is_calibrated());
        assert_eq!(state.calibration_step(), CalibrationStep::Idle);
        assert_eq!(db.load_calibration().unwrap().as_ref(), state.calibration());
    }

    #[test]
    fn test_rejected_capture_keeps_stored_calibration() {
        let db = Database::open_in_memory().unwrap();
        let mut state = calibrated_state(&db);
        let before = db.load_calibration().unwrap();

        state.start_calibration();
        state.capture_picking_zone(0.9).unwrap();
        state.capture_fret1(0.5).unwrap();
        assert!(state.capture_fret12(&db, 0.55).is_err());
        assert_eq!(state.calibration_step(), CalibrationStep::Fret1);
        assert_eq!(db.load_calibration().unwrap(), before);
        assert_eq!(state.calibration().cloned(), before);
    }

    #[test]
    fn test_rejected_first_capture_stores_nothing() {
        let db = Database::open_in_memory().unwrap();
        let mut state = AppState::default();
        state.start_calibration();
        state.capture_picking_zone(0.9).unwrap();
        state.capture_fret1(0.3).unwrap();
        assert!(state.capture_fret12(&db, 0.35).is_err());
        assert!(!state.is_calibrated());
        assert!(db.load_calibration().unwrap().is_none());
    }

    #[test]
    fn test_toggle_left_handed_updates_stored_calibration() {
        let db = Database::open_in_memory().unwrap();
        let mut state = calibrated_state(&db);
        state.toggle_left_handed(&db).unwrap();
        assert!(state.settings().is_left_handed);
        assert!(db.load_calibration().unwrap().unwrap().is_left_handed);

        let reloaded = AppState::load(&db, Settings::default()).unwrap();
        assert!(reloaded.settings().is_left_handed);
    }

    #[test]
    fn test_reset_calibration() {
        let db = Database::open_in_memory().unwrap();
        let mut state = calibrated_state(&db);
        state.reset_calibration(&db).unwrap();
        assert!(!state.is_calibrated());
        assert!(db.load_calibration().unwrap().is_none());
    }

    #[test]
    fn test_resolved_position_from_state() {
        let mut state = AppState::default();
        // G2 only fits on the low E string
        state.audio_mut().set_note(Some(NoteInfo::from_frequency(98.0)), 0.4, 0.95);
        assert_eq!(state.resolved_position().confidence, Confidence::Low);

        state.vision_mut().hand_found(Vec::new(), 0.3, 3);
        let r = state.resolved_position();
        assert_eq!(r.confidence, Confidence::High);
        assert_eq!(r.position, Some(FretPosition::new(6, 3)));
    }

    #[test]
    fn test_fret_range_uses_settings() {
        let mut state = AppState::default();
        state.vision_mut().estimated_fret = 7;
        assert_eq!(state.fret_range(), FretRange { min: 6, max: 10 });
        state.settings_mut().is_left_handed = true;
        assert_eq!(state.fret_range(), FretRange { min: 4, max: 8 });
    }

    #[test]
    fn test_device_selection_persists() {
        let db = Database::open_in_memory().unwrap();
        let mut state = AppState::default();
        state.set_audio_device(&db, Some("mic-2".into())).unwrap();
        state.set_camera_device(&db, Some("cam-1".into())).unwrap();
        let reloaded = AppState::load(&db, Settings::default()).unwrap();
        assert_eq!(reloaded.audio().device_id.as_deref(), Some("mic-2"));
        assert_eq!(reloaded.vision().device_id.as_deref(), Some("cam-1"));
    }

    #[test]
    fn test_shared_state_updates() {
        let shared = SharedState::default();
        shared.update_audio(|a| a.is_listening = true);
        shared.update_vision(|v| v.is_tracking = true);
        let s = shared.read();
        assert!(s.audio().is_listening);
        assert!(s.vision().is_tracking);
    }

    #[test]
    fn test_scale_positions_follow_settings() {
        let mut state = AppState::default();
        state.settings_mut().display_frets = 5;
        let positions = state.scale_positions();
        assert!(positions.iter().all(|p| p.position.fret <= 5));
        assert!(positions.iter().any(|p| p.is_root));
    }
}
