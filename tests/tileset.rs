mod common;

use trackway::tileset::{PtTile, PtTileSet};
use trackway::types::Pt3i;

/// Nine tiny tiles on a 3x3 grid, each with one point per cell.
fn nine_tile_set(buffer: usize) -> (PtTileSet, usize) {
    let dir = std::env::temp_dir().join(format!("trackway_lru_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let cells = 10i32;
    let cell_mm = 100.0f32;
    let tile_mm = (cells as f32 * cell_mm) as i64;
    let mut tile_bytes = 0usize;
    let mut ts = PtTileSet::new(buffer);
    for tj in 0..3i64 {
        for ti in 0..3i64 {
            let mut content = Vec::new();
            for cy in 0..cells {
                for cx in 0..cells {
                    content.push(vec![Pt3i::new(
                        cx * 100 + 50,
                        cy * 100 + 50,
                        ((ti + tj) * 1000) as i32,
                    )]);
                }
            }
            let tile = PtTile::from_cells(
                cells,
                cells,
                ti * tile_mm,
                tj * tile_mm,
                cell_mm,
                &content,
            );
            tile_bytes = tile.point_bytes();
            let path = dir.join(format!("lru{ti}_{tj}.til"));
            tile.save(&path).unwrap();
            // Header-only: residency is driven by the buffer.
            ts.add_tile(&path, false).unwrap();
        }
    }
    ts.create().unwrap();
    (ts, tile_bytes)
}

#[test]
fn lru_pressure_keeps_answers_correct() {
    let (mut ts, tile_bytes) = nine_tile_set(0);
    // First establish the budgeted variant.
    let budget = 3 * tile_bytes;
    let (mut ts_b, _) = nine_tile_set(budget);
    ts_b.create_buffers();
    let mut visited = 0;
    let mut peak = 0usize;
    while let Some(k) = ts_b.next_tile() {
        visited += 1;
        peak = peak.max(ts_b.resident_bytes());
        // The visited tile answers its own cells.
        let (ti, tj) = ((k % 3) as i32, (k / 3) as i32);
        let mut pts = Vec::new();
        assert!(
            ts_b.collect_points(&mut pts, ti * 10 + 4, tj * 10 + 4),
            "tile {k} not resident on its own visit"
        );
        assert_eq!(pts.len(), 1);
        let expected_z = (ti + tj) as f32;
        assert!((pts[0].z - expected_z).abs() < 1e-6);
    }
    assert_eq!(visited, 9);
    assert!(
        peak <= budget,
        "resident bytes {peak} exceeded the {budget} budget"
    );

    // The unbounded set gives the same answers.
    ts.load_points().unwrap();
    let mut pts = Vec::new();
    assert!(ts.collect_points(&mut pts, 14, 4));
    assert_eq!(pts.len(), 1);
    assert!((pts[0].x - 1.45).abs() < 1e-3);
}

#[test]
fn cells_outside_the_grid_read_as_missing() {
    let (mut ts, _) = nine_tile_set(0);
    ts.load_points().unwrap();
    let mut pts = Vec::new();
    assert!(!ts.collect_points(&mut pts, -1, 5));
    assert!(!ts.collect_points(&mut pts, 5, 400));
    assert!(pts.is_empty());
}
