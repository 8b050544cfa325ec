#![doc = include_str!("../README.md")]

// Core pipeline modules, leaves first.
pub mod types;

pub mod gradient;
pub mod plateau;
pub mod roadmap;
pub mod scanner;
pub mod seeds;
pub mod segments;
pub mod terrain;
pub mod tileset;
pub mod track;

pub mod pipeline;

// --- High-level re-exports -------------------------------------------------

// Main entry points: the pipeline and the per-seed detector.
pub use crate::pipeline::{Pipeline, RunConfig, Step};
pub use crate::track::{CarriageTrack, DetectionStatus, TrackDetector};

// Frequently used domain types.
pub use crate::plateau::{Plateau, PlateauModel, PlateauStatus};
pub use crate::scanner::{DirectionalScanner, ScannerProvider};
pub use crate::tileset::PtTileSet;
