//! Tiled scene capture.
//!
//! This module provides:
//! - Capture configuration (`CaptureConfig`)
//! - Rendering backends (`TileRenderer`, `ImageScene`)
//! - Canvas compositing (`Canvas`)
//! - The session state machine (`CaptureSequencer`)
//! - PNG export (`PngExporter`)
//! - Trigger handling and the interactive host loop (`watch`)

pub mod compositor;
pub mod config;
pub mod export;
pub mod renderer;
pub mod runner;
pub mod screen;
pub mod sequencer;
pub mod trigger;

pub use config::{load_config, CaptureConfig};
pub use export::PngExporter;
pub use renderer::ImageScene;
pub use runner::watch;
pub use screen::{match_tile_resolution, HeadlessScreen};
pub use sequencer::CaptureSequencer;
pub use trigger::{create_trigger_queue, spawn_stdin_triggers, TriggerEvent};
