//! Seed generation from detected straight segments.
//!
//! Every long-enough digital straight segment is sampled into short
//! cross-strokes perpendicular to the segment, each a candidate input
//! for the carriage-track detector. Strokes are bucketed per point
//! tile (the tile containing the stroke midpoint) so the detection
//! stage can walk tiles in cache-friendly order.

use crate::segments::DigitalStraightSegment;
use crate::types::Pt2i;
use log::info;

/// Per-tile buckets of seed strokes, in tile-set grid order (rows from
/// south).
pub struct SeedMap {
    cols: usize,
    rows: usize,
    buckets: Vec<Vec<(Pt2i, Pt2i)>>,
}

impl SeedMap {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            buckets: vec![Vec::new(); cols * rows],
        }
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn bucket(&self, k: usize) -> &[(Pt2i, Pt2i)] {
        &self.buckets[k]
    }

    pub fn push(&mut self, k: usize, seed: (Pt2i, Pt2i)) {
        self.buckets[k].push(seed);
    }

    /// Total seed count.
    pub fn count(&self) -> usize {
        self.buckets.iter().map(|b| b.len()).sum()
    }

    /// Tile indices in boustrophedon order (every other row reversed).
    pub fn boustrophedon(&self) -> impl Iterator<Item = usize> + '_ {
        let cols = self.cols;
        (0..self.rows).flat_map(move |j| {
            (0..cols).map(move |i| j * cols + if j % 2 != 0 { cols - 1 - i } else { i })
        })
    }

    /// Rebuilds the map at doubled resolution: coordinates are doubled
    /// and each stroke is widened by one sub-pixel on its outer ends,
    /// re-bucketed on the doubled tile grid.
    pub fn halved(&self, vm_width: usize, vm_height: usize) -> SeedMap {
        let tw = vm_width / (2 * self.cols);
        let th = vm_height / (2 * self.rows);
        let mut out = SeedMap::new(self.cols * 2, self.rows * 2);
        let mut outliers = 0usize;
        for bucket in &self.buckets {
            for (p1, p2) in bucket {
                let kx = ((p1.x + p2.x) / 2) as usize / tw.max(1);
                let ky = ((p1.y + p2.y) / 2) as usize / th.max(1);
                if kx >= 2 * self.cols || ky >= 2 * self.rows {
                    outliers += 1;
                    continue;
                }
                let mut q1 = Pt2i::new(p1.x * 2, p1.y * 2);
                let mut q2 = Pt2i::new(p2.x * 2, p2.y * 2);
                if q2.x < q1.x {
                    q1.x += 1;
                } else {
                    q2.x += 1;
                }
                if q2.y < q1.y {
                    q1.y += 1;
                } else {
                    q2.y += 1;
                }
                out.push(ky * self.cols * 2 + kx, (q1, q2));
            }
        }
        if outliers != 0 {
            info!("{outliers} outliers when retiling seeds");
        }
        out
    }
}

/// Seed stroke sampling parameters.
#[derive(Clone, Copy, Debug)]
pub struct SeedGenerator {
    /// Minimal segment length to sample (pixels).
    pub min_bs_length: i32,
    /// Along-segment sampling step (pixels).
    pub seed_shift: i32,
    /// Full stroke width (pixels).
    pub seed_width: i32,
}

/// Outcome counts of one generation pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct SeedStats {
    pub kept: usize,
    pub short_segments: usize,
    pub outside: usize,
}

impl SeedGenerator {
    /// Samples seed strokes from the segments into `map`.
    ///
    /// Segment coordinates are image pixels (row 0 north) of the raster
    /// the segments were detected on; strokes land in tile-set grid
    /// coordinates (y up). With `kref` the raster is the pad anchored
    /// at that tile, of pixel height `image_height`; otherwise it is
    /// the whole map.
    pub fn generate<F>(
        &self,
        dss: &[DigitalStraightSegment],
        map: &mut SeedMap,
        tile_w: usize,
        tile_h: usize,
        image_height: usize,
        kref: Option<usize>,
        tile_exists: F,
    ) -> SeedStats
    where
        F: Fn(usize) -> bool,
    {
        let (tsw, tsh) = (map.cols(), map.rows());
        let (kx, ky) = match kref {
            Some(k) => (k % tsw, k / tsw),
            None => (0, 0),
        };
        let skx = (kx * tile_w) as f32;
        let sky = (ky * tile_h + image_height - 1) as f32;
        let mbsl2 = (self.min_bs_length as i64) * (self.min_bs_length as i64);
        let sw2 = (self.seed_width / 2) as f32;
        let mut stats = SeedStats::default();

        for seg in dss {
            if seg.length2() < mbsl2 {
                stats.short_segments += 1;
                continue;
            }
            let (x1r, y1r, x2r, y2r) = seg.naive_line();
            let (x1, y1) = (x1r.to_f32(), y1r.to_f32());
            let (x2, y2) = (x2r.to_f32(), y2r.to_f32());
            let ln = ((x2 - x1) * (x2 - x1) + (y2 - y1) * (y2 - y1)).sqrt();
            if ln <= 0.0 {
                continue;
            }
            let dx = (x2 - x1) / ln;
            let dy = (y2 - y1) / ln;
            let mut pos = 0.0f32;
            while pos <= ln {
                let pt1 = Pt2i::new(
                    (skx + x1 + pos * dx - sw2 * dy + 0.5).floor() as i32,
                    (sky - (y1 + pos * dy + sw2 * dx + 0.5).floor()) as i32,
                );
                let pt2 = Pt2i::new(
                    (skx + x1 + pos * dx + sw2 * dy + 0.5).floor() as i32,
                    (sky - (y1 + pos * dy - sw2 * dx + 0.5).floor()) as i32,
                );
                pos += self.seed_shift as f32;
                let (w_px, h_px) = ((tsw * tile_w) as i32, (tsh * tile_h) as i32);
                if pt1.x < 0
                    || pt1.x >= w_px
                    || pt1.y < 0
                    || pt1.y >= h_px
                    || pt2.x < 0
                    || pt2.x >= w_px
                    || pt2.y < 0
                    || pt2.y >= h_px
                {
                    stats.outside += 1;
                    continue;
                }
                let tilex = (((pt1.x + pt2.x) / 2) as usize / tile_w).min(tsw - 1);
                let tiley = (((pt1.y + pt2.y) / 2) as usize / tile_h).min(tsh - 1);
                let k = tiley * tsw + tilex;
                if tile_exists(k) {
                    map.push(k, (pt1, pt2));
                    stats.kept += 1;
                } else {
                    stats.outside += 1;
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strokes_cross_the_segment() {
        // A horizontal segment through the middle of a 100x100 map.
        let pixels: Vec<Pt2i> = (10..90).map(|x| Pt2i::new(x, 50)).collect();
        let dss = vec![DigitalStraightSegment::from_pixels(&pixels, 1, 0, 1.0).unwrap()];
        let mut map = SeedMap::new(1, 1);
        let gen = SeedGenerator {
            min_bs_length: 20,
            seed_shift: 12,
            seed_width: 10,
        };
        let stats = gen.generate(&dss, &mut map, 100, 100, 100, None, |_| true);
        assert!(stats.kept >= 6, "kept {}", stats.kept);
        assert_eq!(stats.short_segments, 0);
        for (p1, p2) in map.bucket(0) {
            // Strokes are vertical (perpendicular to the segment) and
            // of the requested width.
            assert_eq!(p1.x, p2.x);
            assert_eq!((p2.y - p1.y).abs(), 10);
        }
    }

    #[test]
    fn short_segments_are_dropped() {
        let pixels: Vec<Pt2i> = (0..10).map(|x| Pt2i::new(x, 5)).collect();
        let dss = vec![DigitalStraightSegment::from_pixels(&pixels, 1, 0, 1.0).unwrap()];
        let mut map = SeedMap::new(1, 1);
        let gen = SeedGenerator {
            min_bs_length: 80,
            seed_shift: 12,
            seed_width: 10,
        };
        let stats = gen.generate(&dss, &mut map, 64, 64, 64, None, |_| true);
        assert_eq!(stats.kept, 0);
        assert_eq!(stats.short_segments, 1);
    }

    #[test]
    fn boustrophedon_reverses_odd_rows() {
        let map = SeedMap::new(3, 2);
        let order: Vec<usize> = map.boustrophedon().collect();
        assert_eq!(order, vec![0, 1, 2, 5, 4, 3]);
    }

    #[test]
    fn halving_doubles_coordinates() {
        let mut map = SeedMap::new(1, 1);
        map.push(0, (Pt2i::new(10, 20), Pt2i::new(10, 30)));
        let halved = map.halved(64, 64);
        assert_eq!(halved.count(), 1);
        let all: Vec<_> = (0..4).flat_map(|k| halved.bucket(k).to_vec()).collect();
        let (q1, q2) = all[0];
        assert_eq!(q1.x.min(q2.x), 20);
        assert_eq!(q1.y.min(q2.y), 40);
        // One sub-pixel of widening on the outer ends.
        assert_eq!((q2.y - q1.y).abs(), 21);
    }
}
