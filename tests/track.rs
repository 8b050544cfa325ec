mod common;

use common::synthetic_terrain::{
    auto_detector, build_tileset, straight_road, tile_metres, CSIZE, TILE_CELLS,
};
use trackway::roadmap::RoadMap;
use trackway::track::{CarriageTrack, DetectionStatus};
use trackway::types::Pt2i;

/// Accepted plateau count over the whole track.
fn accepted_count(ct: &CarriageTrack) -> i32 {
    let mut n = 0;
    for num in -ct.right_scan_count()..=ct.left_scan_count() {
        if ct.plateau(num).map(|p| p.is_accepted()).unwrap_or(false) {
            n += 1;
        }
    }
    n
}

/// Seed stroke crossing a horizontal road at `(x, y)` (DTM pixels),
/// 18 m long.
fn cross_stroke(x: i32, y: i32) -> (Pt2i, Pt2i) {
    let half = (9.0 / CSIZE) as i32;
    (Pt2i::new(x, y - half), Pt2i::new(x, y + half))
}

#[test]
fn straight_road_is_tracked_end_to_end() {
    let road_y = tile_metres() / 2.0;
    let (mut ts, _dir) = build_tileset("straight", (1, 1), 0.25, straight_road(road_y, 1.5, 0.5));
    let mut det = auto_detector((1, 1));
    let (p1, p2) = cross_stroke(TILE_CELLS / 2, TILE_CELLS / 2);
    let ct = det
        .detect(&mut ts, p1, p2)
        .expect("straight road should be detected");
    assert_eq!(det.status(), DetectionStatus::Ok);
    let accepted = accepted_count(&ct);
    assert!(accepted >= 70, "only {accepted} accepted plateaux");
    assert!(
        ct.relative_shift_length() <= 0.2,
        "hecticness {}",
        ct.relative_shift_length()
    );
    // The central plateau is bounded by the road edges on both sides.
    let central = ct.plateau(0).unwrap();
    assert!(central.bounded());
    assert!((central.estimated_width() - 3.0).abs() < 0.8);
}

#[test]
fn curved_road_is_followed() {
    // Circular arc of radius 50 m, 3.5 m wide, tangent to the seed.
    let tm = tile_metres();
    let (cx, cy, r) = (tm / 2.0, tm / 2.0 + 50.0, 50.0f32);
    let (mut ts, _dir) = build_tileset("curved", (1, 1), 0.25, move |x, y| {
        let d = ((x - cx) * (x - cx) + (y - cy) * (y - cy)).sqrt();
        if (d - r).abs() <= 1.75 {
            10.0
        } else {
            10.5
        }
    });
    let mut det = auto_detector((1, 1));
    let (p1, p2) = cross_stroke(TILE_CELLS / 2, TILE_CELLS / 2);
    let ct = det
        .detect(&mut ts, p1, p2)
        .expect("curved road should be detected");
    assert!(ct.nb_holes() <= 3, "{} holes", ct.nb_holes());

    // Successive accepted centers drift smoothly, and the deviation
    // register picks up a nonzero trend along the bend.
    let mut prev: Option<f32> = None;
    let mut max_step = 0.0f32;
    let mut some_deviation = 0.0f32;
    for num in -ct.right_scan_count()..=ct.left_scan_count() {
        if let Some(pl) = ct.plateau(num) {
            if pl.is_accepted() {
                let c = pl.estimated_center();
                if let Some(p) = prev {
                    max_step = max_step.max((c - p).abs());
                }
                prev = Some(c);
                if pl.estimated_deviation().abs() > some_deviation {
                    some_deviation = pl.estimated_deviation().abs();
                }
            }
        }
    }
    assert!(max_step <= 0.6, "center jump of {max_step} m");
    assert!(some_deviation > 0.0, "deviation trend stayed null");
}

#[test]
fn obstructed_road_stops_at_the_ridge() {
    // A 4 m ridge crosses the road 20 m east of the seed.
    let road_y = tile_metres() / 2.0;
    let base = straight_road(road_y, 1.5, 0.5);
    let ridge_x0 = tile_metres() / 2.0 + 20.0;
    let (mut ts, _dir) = build_tileset("obstructed", (1, 1), 0.25, move |x, y| {
        if x >= ridge_x0 && x <= ridge_x0 + 4.0 {
            14.0
        } else {
            base(x, y)
        }
    });
    let mut det = auto_detector((1, 1));
    let (p1, p2) = cross_stroke(TILE_CELLS / 2, TILE_CELLS / 2);
    let ct = det
        .detect(&mut ts, p1, p2)
        .expect("partial track before the ridge");
    let (short, long) = {
        let l = ct.left_scan_count();
        let r = ct.right_scan_count();
        (l.min(r), l.max(r))
    };
    // The obstructed side gives up after the failure tolerance; the
    // free side runs to the raster border.
    assert!(short <= 48, "obstructed side ran {short} scans");
    assert!(long >= 55, "free side stopped after {long} scans");
}

#[test]
fn too_short_stroke_fails_cleanly() {
    let road_y = tile_metres() / 2.0;
    let (mut ts, _dir) = build_tileset("narrow", (1, 1), 0.5, straight_road(road_y, 1.5, 0.5));
    let mut det = auto_detector((1, 1));
    // 5.9 m long stroke: just under the minimal track width.
    let half = (2.95 / CSIZE) as i32;
    let x = TILE_CELLS / 2;
    let y = TILE_CELLS / 2;
    let ct = det.detect(&mut ts, Pt2i::new(x, y - half), Pt2i::new(x, y + half));
    assert!(ct.is_none());
    assert_eq!(det.status(), DetectionStatus::TooNarrowInput);
}

#[test]
fn second_seed_on_the_same_road_is_vetoed() {
    let road_y = tile_metres() / 2.0;
    let (mut ts, _dir) = build_tileset("overlap", (1, 1), 0.25, straight_road(road_y, 1.5, 0.5));
    let mut det = auto_detector((1, 1));
    let vm = TILE_CELLS;
    let iratio = vm as f32 / tile_metres();
    let mut map = RoadMap::new(vm as usize, vm as usize);

    let (p1, p2) = cross_stroke(vm / 2, vm / 2);
    let ct = det.detect(&mut ts, p1, p2).expect("first detection");
    assert!(map.add(&ct.points(vm, vm, iratio)));

    // A second seed two pixels away lands on the rasterised road.
    let (q1, q2) = cross_stroke(vm / 2 + 2, vm / 2);
    let center = Pt2i::new((q1.x + q2.x) / 2, (q1.y + q2.y) / 2);
    let mcenter = Pt2i::new(center.x, vm - 1 - center.y);
    assert!(map.occupied(mcenter), "road pixels should veto the seed");
}
