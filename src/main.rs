use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fretsight::calibration::{estimate_fret, is_in_detection_zone, Calibration};
use fretsight::config::AppConfig;
use fretsight::db::Database;
use fretsight::fretboard::{
    find_positions, fret_marker, string_name, FretMarker, FRET_COUNT, GUITAR_STRINGS,
};
use fretsight::pipeline::scheduler::ScheduledTask;
use fretsight::resolver::ResolvedPosition;
use fretsight::scales::{ScalePosition, ScaleType};
use fretsight::state::{AppState, Settings, SharedState, StateError};
use fretsight::theory::{
    format_note, midi_to_frequency, midi_to_note_name, midi_to_octave, parse_note_or_midi,
    NoteInfo, NoteName,
};
use fretsight::tuner::{format_cents, TunerReading};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "fretsight", version, about = "Guitar fret-position tracker")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every place a note can be played
    Positions {
        /// Note name with octave (E2, C#4, Bb3) or MIDI number
        note: String,

        /// Highest fret to search
        #[arg(long, default_value_t = FRET_COUNT)]
        max_fret: u8,
    },

    /// Resolve a detected note against a hand position
    Resolve {
        /// Note name with octave or MIDI number
        #[arg(long, conflicts_with = "freq", required_unless_present = "freq")]
        note: Option<String>,

        /// Detected frequency in Hz
        #[arg(long)]
        freq: Option<f64>,

        /// Hand x-coordinate (0-1); needs a stored calibration
        #[arg(long, conflicts_with = "fret")]
        hand_x: Option<f64>,

        /// Estimated fret of the hand, bypassing calibration
        #[arg(long)]
        fret: Option<u8>,

        /// Window half-width in frets (defaults to config)
        #[arg(short, long)]
        tolerance: Option<u8>,
    },

    /// Show the nearest open string and how far off a frequency is
    Tune {
        /// Frequency in Hz
        freq: f64,
    },

    /// Print a scale over the fingerboard
    Scale {
        /// Root note (A, C#, Bb)
        root: Option<NoteName>,

        /// Scale type
        #[arg(value_enum)]
        scale: Option<ScaleType>,

        /// Number of frets to draw (defaults to config)
        #[arg(long)]
        frets: Option<u8>,
    },

    /// Calibrate from three captured hand positions
    Calibrate {
        /// Picking-hand boundary x
        #[arg(long)]
        picking: f64,

        /// Hand x at fret 1
        #[arg(long)]
        fret1: f64,

        /// Hand x at fret 12
        #[arg(long)]
        fret12: f64,

        /// Left-handed player
        #[arg(long)]
        left_handed: bool,
    },

    /// Inspect or change the stored calibration
    Calibration {
        #[command(subcommand)]
        action: CalibrationAction,
    },

    /// Show or set the remembered capture device
    Device {
        #[arg(value_enum)]
        kind: DeviceKind,

        /// Device id to remember
        id: Option<String>,
    },

    /// Replay a recorded session (JSON lines) through both pipelines
    Replay {
        /// Recording file
        file: PathBuf,

        /// Time between replayed ticks in milliseconds
        #[arg(long, default_value = "1")]
        interval_ms: u64,

        /// Print every tick, not only changes
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum CalibrationAction {
    /// Print the stored calibration
    Show,
    /// Delete the stored calibration
    Reset,
    /// Switch between left- and right-handed
    ToggleHand,
}

#[derive(Clone, Copy, ValueEnum)]
enum DeviceKind {
    Audio,
    Camera,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli.db_path
        .or(config.db_path.clone())
        .unwrap_or_else(fretsight::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = Database::open(&db_path)
        .context("Failed to open database")?;

    let mut state = AppState::load(&db, Settings::from(&config.settings))
        .context("Failed to load stored state")?;

    match cli.command {
        Commands::Positions { note, max_fret } => {
            let midi = parse_note(&note)?;
            let label = format_note(midi_to_note_name(midi), midi_to_octave(midi));
            let positions = find_positions(midi, max_fret);

            if positions.is_empty() {
                println!("{} (MIDI {}) is not playable up to fret {}.", label, midi, max_fret);
                return Ok(());
            }

            println!("{} (MIDI {}):", label, midi);
            for p in &positions {
                println!(
                    "  string {} ({:<2})  fret {:>2}",
                    p.string,
                    string_name(p.string),
                    p.fret
                );
            }
        }

        Commands::Resolve { note, freq, hand_x, fret, tolerance } => {
            let note_info = match (note, freq) {
                (Some(n), _) => {
                    let midi = parse_note(&n)?;
                    note_from_frequency(midi_to_frequency(midi))?
                }
                (None, Some(f)) => note_from_frequency(f)?,
                (None, None) => anyhow::bail!("Pass --note or --freq"),
            };

            if let Some(t) = tolerance {
                state.settings_mut().fret_tolerance = t;
            }
            state.audio_mut().set_note(Some(note_info), 0.0, 1.0);

            match (hand_x, fret) {
                (Some(x), _) => {
                    let calibration = state
                        .calibration()
                        .cloned()
                        .context("No calibration stored. Run `fretsight calibrate` first.")?;
                    if !is_in_detection_zone(x, &calibration) {
                        println!(
                            "Hand at x={:.3} is in the picking zone; treating as not detected.",
                            x
                        );
                    } else {
                        let estimated = estimate_fret(x, &calibration);
                        state.vision_mut().hand_found(Vec::new(), x, estimated);
                    }
                }
                (None, Some(f)) => {
                    state.vision_mut().hand_found(Vec::new(), 0.0, f.min(FRET_COUNT))
                }
                (None, None) => {}
            }

            println!("Note: {} ({:.2} Hz)", note_info.label(), note_info.frequency);
            if state.vision().hand_detected {
                let range = state.fret_range();
                println!(
                    "Hand: fret {} (hand region {}-{})",
                    state.vision().estimated_fret, range.min, range.max
                );
            } else {
                println!("Hand: not detected");
            }
            println!();
            print_resolution(&state.resolved_position());
        }

        Commands::Tune { freq } => match TunerReading::from_frequency(freq) {
            Some(r) => {
                println!(
                    "{:.2} Hz -> string {} ({}, {:.2} Hz)",
                    r.frequency, r.target.string, r.target.label, r.target.frequency
                );
                println!("{} cents  {}", format_cents(r.cents), r.status);
            }
            None => println!("{:.2} Hz is not within a semitone of any open string.", freq),
        },

        Commands::Scale { root, scale, frets } => {
            if let Some(root) = root {
                state.settings_mut().practice_root = root;
            }
            if let Some(scale) = scale {
                state.settings_mut().practice_scale = scale;
            }
            if let Some(frets) = frets {
                state.settings_mut().display_frets = frets.min(FRET_COUNT);
            }
            let settings = state.settings().clone();
            println!("{} {}", settings.practice_root, settings.practice_scale.display_name());
            println!();
            print_scale_grid(&state.scale_positions(), settings.display_frets);
        }

        Commands::Calibrate { picking, fret1, fret12, left_handed } => {
            if left_handed {
                state.settings_mut().is_left_handed = true;
            }
            for x in [picking, fret1, fret12] {
                if !(0.0..=1.0).contains(&x) {
                    anyhow::bail!("Hand positions are normalized: {} is outside 0-1", x);
                }
            }

            state.start_calibration();
            state.capture_picking_zone(picking).context("Picking zone capture failed")?;
            state.capture_fret1(fret1).context("Fret 1 capture failed")?;
            match state.capture_fret12(&db, fret12) {
                Ok(c) => {
                    state.finish_calibration();
                    println!("Calibration saved.");
                    print_calibration(&c);
                }
                Err(StateError::Calibration(e)) => {
                    println!("Calibration rejected: {}", e);
                    println!("Next step: {}", state.calibration_step().instruction());
                }
                Err(e) => return Err(e).context("Failed to save calibration"),
            }
        }

        Commands::Calibration { action } => match action {
            CalibrationAction::Show => match state.calibration() {
                Some(c) => print_calibration(c),
                None => println!("Not calibrated."),
            },
            CalibrationAction::Reset => {
                state.reset_calibration(&db).context("Failed to reset calibration")?;
                println!("Calibration cleared.");
            }
            CalibrationAction::ToggleHand => {
                state.toggle_left_handed(&db).context("Failed to update calibration")?;
                let hand = if state.settings().is_left_handed { "left" } else { "right" };
                println!("Now {}-handed.", hand);
                if state.calibration().is_none() {
                    println!("(no stored calibration; the setting applies to the next one)");
                }
            }
        },

        Commands::Device { kind, id } => {
            let label = match kind {
                DeviceKind::Audio => "Audio",
                DeviceKind::Camera => "Camera",
            };
            if id.is_some() {
                let stored = match kind {
                    DeviceKind::Audio => state.set_audio_device(&db, id),
                    DeviceKind::Camera => state.set_camera_device(&db, id),
                };
                stored.context("Failed to store device")?;
            }
            let current = match kind {
                DeviceKind::Audio => state.audio().device_id.clone(),
                DeviceKind::Camera => state.vision().device_id.clone(),
            };
            println!("{} device: {}", label, current.as_deref().unwrap_or("(none)"));
        }

        Commands::Replay { file, interval_ms, all } => {
            let reader = std::io::BufReader::new(
                std::fs::File::open(&file)
                    .with_context(|| format!("Failed to open {}", file.display()))?,
            );
            if !state.is_calibrated() {
                log::warn!("No calibration stored; hand positions will all read as fret 0");
            }
            let shared = SharedState::new(state);
            let mut replayer = Some(fretsight::replay::Replayer::new(reader, &config, shared));

            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .context("Failed to start runtime")?;

            let period = Duration::from_millis(interval_ms.max(1));
            rt.block_on(async move {
                let task = ScheduledTask::spawn(
                    "replay",
                    period,
                    CancellationToken::new(),
                    move || {
                        let Some(r) = replayer.as_mut() else {
                            return false;
                        };
                        let more = match r.next_tick() {
                            Ok(Some(t)) => {
                                if all || t.changed {
                                    let note = t.note.as_deref().unwrap_or("-");
                                    print!("{:>8} ms  {:<4} ", t.t_ms, note);
                                    print_resolution_line(&t.resolved);
                                }
                                true
                            }
                            Ok(None) => false,
                            Err(e) => {
                                log::error!("Replay stopped: {}", e);
                                false
                            }
                        };
                        if !more {
                            if let Some(r) = replayer.take() {
                                r.finish();
                            }
                        }
                        more
                    },
                );
                task.join().await;
            });
        }
    }

    Ok(())
}

fn parse_note(s: &str) -> Result<i32> {
    parse_note_or_midi(s).with_context(|| format!("Not a note or MIDI number: {}", s))
}

fn note_from_frequency(freq: f64) -> Result<NoteInfo> {
    NoteInfo::try_from_frequency(freq)
        .with_context(|| format!("Frequency must be a positive number of Hz, got {}", freq))
}

fn print_resolution(r: &ResolvedPosition) {
    match r.position {
        Some(p) => println!("Position:   string {} fret {}", p.string, p.fret),
        None => println!("Position:   unresolved"),
    }
    println!("Confidence: {}", r.confidence);
    if !r.all_matches.is_empty() {
        let matches: Vec<String> = r
            .all_matches
            .iter()
            .map(|p| format!("{}/{}", p.string, p.fret))
            .collect();
        println!("Matches:    {}", matches.join(", "));
    }
    println!("Reasoning:  {}", r.reasoning);
}

fn print_resolution_line(r: &ResolvedPosition) {
    let position = match r.position {
        Some(p) => format!("{}/{}", p.string, p.fret),
        None => "-".to_string(),
    };
    println!("{:<6} {:<6} {}", position, r.confidence, r.reasoning);
}

fn print_calibration(c: &Calibration) {
    let zone = c.detection_zone();
    println!("Fret 1:           x={:.3}", c.fret1_x);
    println!("Fret 12:          x={:.3}", c.fret12_x);
    println!("Picking boundary: x={:.3}", c.picking_boundary_x);
    println!("Direction:        {}", c.direction());
    println!("Detection zone:   {:.3}-{:.3}", zone.min_x, zone.max_x);
    println!("Captured:         {}", c.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
}

/// Strings high E on top, as on tab. `R` marks roots.
fn print_scale_grid(positions: &[ScalePosition], frets: u8) {
    print!("    ");
    for fret in 0..=frets {
        let marker = match fret_marker(fret) {
            Some(FretMarker::Double) => ':',
            Some(FretMarker::Single) => '.',
            None => ' ',
        };
        print!("{:>3}{}", fret, marker);
    }
    println!();

    for gs in GUITAR_STRINGS.iter().rev() {
        print!("{:<3} ", gs.name);
        for fret in 0..=frets {
            let cell = positions
                .iter()
                .find(|p| p.position.string == gs.string && p.position.fret == fret)
                .map(|p| if p.is_root { "R".to_string() } else { p.note_name.to_string() })
                .unwrap_or_else(|| "-".to_string());
            print!("{:>3} ", cell);
        }
        println!();
    }
}
