//! Carriage-track tracking.
//!
//! From one seed stroke, [`TrackDetector`] detects the central
//! cross-section plateau and grows the track on both sides, one scan
//! at a time, re-centering the directional scanners on the moving
//! reference pattern and chaining plateau detections with retries,
//! trend prediction and consistency pruning. The outcome is a
//! [`CarriageTrack`] or a failure status.

mod carriage;
mod detector;

pub use carriage::CarriageTrack;
pub use detector::TrackDetector;

use serde::Serialize;

/// Global outcome of one seed detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DetectionStatus {
    /// No detection attempted yet.
    None,
    Ok,
    /// Seed stroke shorter than the maximal track width.
    TooNarrowInput,
    /// The scanner produced no central scan.
    NoAvailableScan,
    /// No plateau on the seed scan.
    NoCentralPlateau,
    /// Tail pruning left no consistent sequence.
    NoConsistentSequence,
    /// No bounded plateau within the tolerated scan count.
    NoBounds,
    /// Relative shift length above the tolerance.
    TooHecticPlateaux,
    /// Too many holes for the accepted spread.
    TooSparsePlateaux,
    /// An accepted plateau lost adjacency with its predecessor.
    Disconnect,
}
