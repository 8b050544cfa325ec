//! Synthetic mountain terrains with carved roads, written as real
//! point tiles so the tests exercise the on-disk path.

use std::path::PathBuf;
use trackway::tileset::{PtTile, PtTileSet, GRID_SUBDIVISION};
use trackway::track::TrackDetector;
use trackway::types::Pt3i;

/// DTM cell size (m).
pub const CSIZE: f32 = 0.5;
/// DTM cells per tile side.
pub const TILE_CELLS: i32 = 128;

/// World side of one tile (m).
pub fn tile_metres() -> f32 {
    TILE_CELLS as f32 * CSIZE
}

/// Builds a tile set sampling `height_at(x, y)` (metres, y up) on a
/// regular grid of step `sample_step`, one tile per grid position.
pub fn build_tileset<F>(
    name: &str,
    tiles: (usize, usize),
    sample_step: f32,
    height_at: F,
) -> (PtTileSet, PathBuf)
where
    F: Fn(f32, f32) -> f32,
{
    let dir = std::env::temp_dir().join(format!("trackway_{name}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let fine = TILE_CELLS * GRID_SUBDIVISION;
    let cell_mm = CSIZE * 1000.0 / GRID_SUBDIVISION as f32;
    let tile_m = tile_metres();
    let mut ts = PtTileSet::new(0);
    for tj in 0..tiles.1 {
        for ti in 0..tiles.0 {
            let xref = (ti as f64 * tile_m as f64 * 1000.0).round() as i64;
            let yref = (tj as f64 * tile_m as f64 * 1000.0).round() as i64;
            let mut cells = vec![Vec::new(); (fine * fine) as usize];
            let n = (tile_m / sample_step) as i32;
            for iy in 0..n {
                for ix in 0..n {
                    let lx = (ix as f32 + 0.5) * sample_step;
                    let ly = (iy as f32 + 0.5) * sample_step;
                    let z = height_at(ti as f32 * tile_m + lx, tj as f32 * tile_m + ly);
                    let cx = ((lx * 1000.0 / cell_mm) as i32).clamp(0, fine - 1);
                    let cy = ((ly * 1000.0 / cell_mm) as i32).clamp(0, fine - 1);
                    cells[(cy * fine + cx) as usize].push(Pt3i::new(
                        (lx * 1000.0) as i32,
                        (ly * 1000.0) as i32,
                        (z * 1000.0) as i32,
                    ));
                }
            }
            let tile = PtTile::from_cells(fine, fine, xref, yref, cell_mm, &cells);
            let path = dir.join(format!("t{ti}_{tj}.til"));
            tile.save(&path).unwrap();
            ts.add_tile(&path, true).unwrap();
        }
    }
    ts.create().unwrap();
    (ts, dir)
}

/// A track detector tuned like the automatic pipeline, over a map of
/// `tiles` tile sides.
pub fn auto_detector(tiles: (usize, usize)) -> TrackDetector {
    let mut det = TrackDetector::new();
    det.set_plateau_lack_tolerance(5);
    det.set_max_shift_length(0.5);
    if det.is_initialization_on() {
        det.switch_initialization();
    }
    det.set_automatic(true);
    det.model_mut().set_min_length(2.0);
    det.model_mut().set_thickness_tolerance(0.25);
    det.model_mut().set_slope_tolerance(0.10);
    det.model_mut().set_side_shift_tolerance(0.5);
    det.model_mut().set_bs_max_tilt(10);
    det.set_points_grid(
        TILE_CELLS * tiles.0 as i32,
        TILE_CELLS * tiles.1 as i32,
        GRID_SUBDIVISION,
        CSIZE,
    );
    det
}

/// Flat ground with a straight east-west road sunk into it.
pub fn straight_road(road_y: f32, half_width: f32, depth: f32) -> impl Fn(f32, f32) -> f32 {
    move |_x, y| {
        if (y - road_y).abs() <= half_width {
            10.0
        } else {
            10.0 + depth
        }
    }
}
