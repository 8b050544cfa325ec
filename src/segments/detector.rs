use super::blurred::BlurredSegment;
use super::dss::DigitalStraightSegment;
use crate::gradient::VectorMap;
use crate::types::Pt2i;
use log::debug;

/// Tuning of the blurred segment detector.
#[derive(Clone, Copy, Debug)]
pub struct BsDetectorOptions {
    /// Maximal thickness of the enclosing strip (pixels).
    pub assigned_thickness: f64,
    /// Minimal gradient magnitude for seeds and absorbed pixels.
    pub gradient_threshold: i64,
    /// Orientation tolerance around the seed gradient (degrees).
    pub angle_tolerance_deg: f64,
    /// Minimal pixel count of a kept segment.
    pub min_size: usize,
    /// Consecutive ridge interruptions tolerated per growth sense.
    pub accept_lacks: usize,
    /// Detection cap per raster; 0 means unlimited.
    pub max_detections: usize,
}

impl Default for BsDetectorOptions {
    fn default() -> Self {
        Self {
            assigned_thickness: 7.0,
            gradient_threshold: 1000,
            angle_tolerance_deg: 25.0,
            min_size: 12,
            accept_lacks: 5,
            max_detections: 0,
        }
    }
}

/// Blurred segment detector over a gradient vector map.
pub struct BsDetector {
    opts: BsDetectorOptions,
    single_edge: bool,
    nfa: bool,
    segments: Vec<BlurredSegment>,
}

impl BsDetector {
    pub fn new() -> Self {
        Self {
            opts: BsDetectorOptions::default(),
            single_edge: true,
            nfa: true,
            segments: Vec::new(),
        }
    }

    #[inline]
    pub fn options(&self) -> &BsDetectorOptions {
        &self.opts
    }

    pub fn set_assigned_thickness(&mut self, val: f64) {
        if val > 0.0 {
            self.opts.assigned_thickness = val;
        }
    }

    pub fn set_max_detections(&mut self, val: usize) {
        self.opts.max_detections = val;
    }

    pub fn reset_max_detections(&mut self) {
        self.opts.max_detections = 0;
    }

    #[inline]
    pub fn is_single_edge_mode_on(&self) -> bool {
        self.single_edge
    }

    /// Toggles between merged (single) and polarity-split (double)
    /// edge detection.
    pub fn switch_single_or_double_edge(&mut self) {
        self.single_edge = !self.single_edge;
    }

    #[inline]
    pub fn is_nfa_on(&self) -> bool {
        self.nfa
    }

    pub fn switch_nfa(&mut self) {
        self.nfa = !self.nfa;
    }

    pub fn clear_all(&mut self) {
        self.segments.clear();
    }

    #[inline]
    pub fn blurred_segments(&self) -> &[BlurredSegment] {
        &self.segments
    }

    /// Detects all blurred segments of the map, replacing any previous
    /// detection.
    pub fn detect_all(&mut self, gmap: &VectorMap) {
        self.segments.clear();
        let (w, h) = (gmap.width(), gmap.height());
        let thr2 = self.opts.gradient_threshold * self.opts.gradient_threshold;
        let mut candidates: Vec<(i64, usize)> = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let m2 = gmap.magn2(x, y);
                if m2 >= thr2 && gmap.is_local_max(x, y) {
                    candidates.push((m2, y * w + x));
                }
            }
        }
        candidates.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        debug!("{} seed candidates", candidates.len());

        let mut used = vec![false; w * h];
        for (_, idx) in candidates {
            if used[idx] {
                continue;
            }
            let seed = Pt2i::new((idx % w) as i32, (idx / w) as i32);
            let bs = self.grow(gmap, &mut used, seed);
            if bs.len() >= self.opts.min_size && self.significant(&bs) {
                self.segments.push(bs);
                if self.opts.max_detections != 0 && self.segments.len() >= self.opts.max_detections
                {
                    break;
                }
            }
        }
        debug!("{} blurred segments kept", self.segments.len());
    }

    /// Copies the detections as digital straight segments.
    pub fn copy_digital_segments(&self, out: &mut Vec<DigitalStraightSegment>) {
        for bs in &self.segments {
            if let Some(dss) = bs.to_dss() {
                out.push(dss);
            }
        }
    }

    /// Grows a blurred segment from a seed pixel, both senses of the
    /// local tangent.
    fn grow(&self, gmap: &VectorMap, used: &mut [bool], seed: Pt2i) -> BlurredSegment {
        let (w, h) = (gmap.width() as i32, gmap.height() as i32);
        let thr2 = self.opts.gradient_threshold * self.opts.gradient_threshold;
        let cos_tol = self.opts.angle_tolerance_deg.to_radians().cos();
        let g0 = gmap.get(seed.x as usize, seed.y as usize);
        let g0n = (g0.norm2() as f64).sqrt();
        let (tx, ty) = (-g0.y as f64 / g0n, g0.x as f64 / g0n);
        let (nx, ny) = (g0.x as f64 / g0n, g0.y as f64 / g0n);
        // Lateral probe step, rounded to the dominant axis.
        let (pnx, pny) = if nx.abs() >= ny.abs() {
            (nx.signum() as i32, 0)
        } else {
            (0, ny.signum() as i32)
        };

        let mut bs = BlurredSegment::new();
        bs.add(seed);
        used[(seed.y * w + seed.x) as usize] = true;

        for sense in [1.0f64, -1.0] {
            let (dx, dy) = (tx * sense, ty * sense);
            let mut px = seed.x as f64 + 0.5;
            let mut py = seed.y as f64 + 0.5;
            let mut lacks = 0usize;
            loop {
                px += dx;
                py += dy;
                let cx = px.floor() as i32;
                let cy = py.floor() as i32;
                if cx < 0 || cy < 0 || cx >= w || cy >= h {
                    break;
                }
                let mut best: Option<(i64, Pt2i)> = None;
                for (qx, qy) in [(cx, cy), (cx + pnx, cy + pny), (cx - pnx, cy - pny)] {
                    if qx < 0 || qy < 0 || qx >= w || qy >= h {
                        continue;
                    }
                    let qi = (qy * w + qx) as usize;
                    if used[qi] {
                        continue;
                    }
                    let g = gmap.get(qx as usize, qy as usize);
                    let m2 = g.norm2();
                    if m2 < thr2 {
                        continue;
                    }
                    let dot = g.x as i64 * g0.x as i64 + g.y as i64 * g0.y as i64;
                    let aligned = if self.single_edge {
                        (dot * dot) as f64 >= cos_tol * cos_tol * (m2 * g0.norm2()) as f64
                    } else {
                        dot > 0
                            && (dot * dot) as f64 >= cos_tol * cos_tol * (m2 * g0.norm2()) as f64
                    };
                    if !aligned {
                        continue;
                    }
                    if best.map_or(true, |(bm, _)| m2 > bm) {
                        best = Some((m2, Pt2i::new(qx, qy)));
                    }
                }
                match best {
                    Some((_, p)) => {
                        used[(p.y * w + p.x) as usize] = true;
                        bs.add(p);
                        lacks = 0;
                        px = p.x as f64 + 0.5;
                        py = p.y as f64 + 0.5;
                        if bs.len() >= 8 && bs.strip_width() > self.opts.assigned_thickness {
                            return bs;
                        }
                    }
                    None => {
                        lacks += 1;
                        if lacks > self.opts.accept_lacks {
                            break;
                        }
                    }
                }
            }
        }
        bs
    }

    /// Density test standing in for the NFA significance filter: a
    /// meaningful ridge fills most of its span.
    fn significant(&self, bs: &BlurredSegment) -> bool {
        if !self.nfa {
            return true;
        }
        match bs.to_dss() {
            Some(dss) => {
                let span = (dss.length2() as f64).sqrt();
                bs.len() as f64 >= span * 0.75
            }
            None => false,
        }
    }
}

impl Default for BsDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_raster(w: usize, h: usize, edge_x: usize) -> Vec<u8> {
        let mut img = vec![20u8; w * h];
        for y in 0..h {
            for x in edge_x..w {
                img[y * w + x] = 220;
            }
        }
        img
    }

    #[test]
    fn detects_a_straight_vertical_edge() {
        let (w, h) = (64usize, 64usize);
        let img = step_raster(w, h, 32);
        let gmap = VectorMap::from_raster(w, h, &img);
        let mut det = BsDetector::new();
        if det.is_nfa_on() {
            det.switch_nfa();
        }
        det.detect_all(&gmap);
        assert!(!det.blurred_segments().is_empty());
        let mut dss = Vec::new();
        det.copy_digital_segments(&mut dss);
        let longest = dss.iter().map(|d| d.length2()).max().unwrap();
        assert!(longest >= 40 * 40, "longest span {longest}");
        // The dominant segment runs along x = 31..32.
        let best = dss.iter().max_by_key(|d| d.length2()).unwrap();
        let (x1, _, x2, _) = best.naive_line();
        assert!((x1.to_f32() - x2.to_f32()).abs() < 2.0);
    }

    #[test]
    fn flat_raster_yields_nothing() {
        let (w, h) = (32usize, 32usize);
        let img = vec![128u8; w * h];
        let gmap = VectorMap::from_raster(w, h, &img);
        let mut det = BsDetector::new();
        det.detect_all(&gmap);
        assert!(det.blurred_segments().is_empty());
    }

    #[test]
    fn detection_cap_is_honoured() {
        let (w, h) = (64usize, 64usize);
        let mut img = vec![20u8; w * h];
        // Several separate vertical edges.
        for stripe in [10usize, 25, 40, 55] {
            for y in 0..h {
                for x in stripe..(stripe + 5).min(w) {
                    img[y * w + x] = 220;
                }
            }
        }
        let gmap = VectorMap::from_raster(w, h, &img);
        let mut det = BsDetector::new();
        if det.is_nfa_on() {
            det.switch_nfa();
        }
        det.set_max_detections(2);
        det.detect_all(&gmap);
        assert!(det.blurred_segments().len() <= 2);
    }
}
