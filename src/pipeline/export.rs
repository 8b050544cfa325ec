//! Vector and text exports of the detection results.

use crate::seeds::SeedMap;
use crate::track::{CarriageTrack, TrackDetector};
use crate::types::Pt2i;
use log::info;
use shapefile::{Point, Polyline, ShapeWriter};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Projected coordinate (metres) of a tile-grid pixel centre.
fn world(ref_mm: i64, px: i32, cell_mm: f64) -> f64 {
    (ref_mm as f64 + px as f64 * cell_mm + cell_mm / 2.0) / 1000.0
}

fn ensure_parent(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
    }
    Ok(())
}

/// Exports the road bounds as one closed polyline per track.
pub fn export_roads(
    path: &Path,
    sections: &[CarriageTrack],
    xref: i64,
    yref: i64,
    cell_mm: f64,
) -> Result<(), String> {
    if sections.is_empty() {
        return Ok(());
    }
    info!("Exporting road bounds in {}", path.display());
    ensure_parent(path)?;
    let mut shapes = Vec::with_capacity(sections.len());
    for ct in sections {
        let mut firsts: Vec<Pt2i> = Vec::new();
        let mut seconds: Vec<Pt2i> = Vec::new();
        ct.position(false, &mut firsts, &mut seconds);
        if firsts.is_empty() {
            continue;
        }
        let mut part: Vec<Point> = firsts
            .iter()
            .map(|p| Point::new(world(xref, p.x, cell_mm), world(yref, p.y, cell_mm)))
            .collect();
        for p in seconds.iter().rev() {
            part.push(Point::new(
                world(xref, p.x, cell_mm),
                world(yref, p.y, cell_mm),
            ));
        }
        // Close the loop on the first bound point.
        if let Some(first) = part.first().copied() {
            part.push(first);
        }
        shapes.push(Polyline::new(part));
    }
    let writer = ShapeWriter::from_path(path)
        .map_err(|e| format!("Failed to create {}: {e}", path.display()))?;
    writer
        .write_shapes(&shapes)
        .map_err(|e| format!("Failed to write {}: {e}", path.display()))
}

/// Exports the road centerlines, one polyline per track.
pub fn export_road_centers(
    path: &Path,
    sections: &[CarriageTrack],
    xref: i64,
    yref: i64,
    cell_mm: f64,
) -> Result<(), String> {
    if sections.is_empty() {
        return Ok(());
    }
    info!("Exporting road centers in {}", path.display());
    ensure_parent(path)?;
    let mut shapes = Vec::with_capacity(sections.len());
    for ct in sections {
        let mut centers: Vec<Pt2i> = Vec::new();
        let mut unused: Vec<Pt2i> = Vec::new();
        ct.position(true, &mut centers, &mut unused);
        if centers.is_empty() {
            continue;
        }
        let part: Vec<Point> = centers
            .iter()
            .map(|p| Point::new(world(xref, p.x, cell_mm), world(yref, p.y, cell_mm)))
            .collect();
        shapes.push(Polyline::new(part));
    }
    let writer = ShapeWriter::from_path(path)
        .map_err(|e| format!("Failed to create {}: {e}", path.display()))?;
    writer
        .write_shapes(&shapes)
        .map_err(|e| format!("Failed to write {}: {e}", path.display()))
}

/// Writes the successful seeds, one `x1 y1 x2 y2` millimetre line per
/// stroke, in boustrophedon tile order.
pub fn save_successful_seeds(
    path: &Path,
    seeds: &SeedMap,
    xref: i64,
    yref: i64,
    cell_mm: f64,
) -> Result<(), String> {
    ensure_parent(path)?;
    let file = File::create(path)
        .map_err(|e| format!("Failed to create {}: {e}", path.display()))?;
    let mut out = BufWriter::new(file);
    let coord = |r: i64, px: i32| (world(r, px, cell_mm) * 1000.0) as i64;
    for k in seeds.boustrophedon() {
        for (p1, p2) in seeds.bucket(k) {
            writeln!(
                out,
                "{} {} {} {}",
                coord(xref, p1.x),
                coord(yref, p1.y),
                coord(xref, p2.x),
                coord(yref, p2.y)
            )
            .map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
        }
    }
    out.flush()
        .map_err(|e| format!("Failed to write {}: {e}", path.display()))
}

/// Dumps the effective detector tuning next to the results.
pub fn save_detector_status(path: &Path, det: &TrackDetector) -> Result<(), String> {
    ensure_parent(path)?;
    let file = File::create(path)
        .map_err(|e| format!("Failed to create {}: {e}", path.display()))?;
    let mut out = BufWriter::new(file);
    let model = det.model();
    let res: Result<(), std::io::Error> = (|| {
        writeln!(out, "PLATEAU_LACK_TOLERANCE {}", det.plateau_lack_tolerance())?;
        writeln!(out, "MAX_SHIFT_LENGTH {}", det.max_shift_length())?;
        writeln!(out, "MIN_DENSITY {}", det.min_density())?;
        writeln!(out, "PLATEAU_MIN_LENGTH {}", model.min_length)?;
        writeln!(out, "PLATEAU_MAX_LENGTH {}", model.max_length)?;
        writeln!(out, "THICKNESS_TOLERANCE {}", model.thickness_tolerance)?;
        writeln!(out, "SLOPE_TOLERANCE {}", model.slope_tolerance)?;
        writeln!(out, "SIDE_SHIFT_TOLERANCE {}", model.side_shift_tolerance)?;
        writeln!(out, "BS_MAX_TILT {}", model.bs_max_tilt)?;
        writeln!(out, "TAIL_MIN_SIZE {}", model.tail_min_size)?;
        out.flush()
    })();
    res.map_err(|e| format!("Failed to write {}: {e}", path.display()))
}
