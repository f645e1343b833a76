pub mod calibration;
pub mod config;
pub mod db;
pub mod fretboard;
pub mod hand_region;
pub mod landmarks;
pub mod pipeline;
pub mod replay;
pub mod resolver;
pub mod scales;
pub mod smoothing;
pub mod state;
pub mod theory;
pub mod tuner;

/// Application name for XDG paths
pub const APP_NAME: &str = "fretsight";
