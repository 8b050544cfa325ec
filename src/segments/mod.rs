//! Blurred segment detection on a gradient vector map.
//!
//! The detector seeds candidate pixels on local gradient maxima and
//! grows each seed along the local edge tangent into a *blurred
//! segment*: a pixel set whose enclosing straight strip stays under an
//! assigned thickness. Grown segments are summarised as digital
//! straight segments with integer line parameters and exact rational
//! naive-line endpoints.
//!
//! Growth is orientation-gated (the gradient of an absorbed pixel must
//! stay close to the seed's) and tolerates short interruptions of the
//! ridge, which makes the detection robust to raster noise while
//! keeping integer outputs for the directional scanners downstream.

mod blurred;
mod detector;
mod dss;

pub use blurred::BlurredSegment;
pub use detector::{BsDetector, BsDetectorOptions};
pub use dss::DigitalStraightSegment;
