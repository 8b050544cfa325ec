//! Cross-section plateau detection.
//!
//! One scan of ground points, reduced to `(position, height)` pairs
//! along the cross-section, either contains an approximately
//! horizontal, bounded-width run of low points (the road surface) or
//! it does not. [`Plateau`] finds that run, classifies the outcome and
//! carries the estimates the tracker chains from scan to scan.

mod model;

pub use model::PlateauModel;

use crate::types::Pt2f;

/// Outcome of a plateau detection on one scan.
///
/// Ordered from worst to best so that retry loops can keep the most
/// promising candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PlateauStatus {
    /// A high step blocks both ends; tracking cannot continue through.
    Impassable,
    /// A plateau exists but hardly overlaps the reference window.
    OutOfPosition,
    /// The run is wider than a carriage track can be.
    TooWide,
    /// The run is narrower than the minimal track width.
    TooThin,
    /// No height window held enough samples.
    NoOptimalHeight,
    /// Acceptable plateau.
    Ok,
}

/// One detected (or attempted) cross-section plateau.
#[derive(Clone, Debug)]
pub struct Plateau {
    status: PlateauStatus,
    scan_shift: i32,
    s_int: f32,
    e_int: f32,
    s_est: f32,
    e_est: f32,
    min_height: f32,
    s_idx: usize,
    e_idx: usize,
    bounded_s: bool,
    bounded_e: bool,
    impassable: bool,
    consistent_height: bool,
    accepted: bool,
    deviation: f32,
    slope: f32,
    nb_points: usize,
}

impl Plateau {
    /// Fresh, undetected plateau for the scan at strip offset
    /// `scan_shift`.
    pub fn new(scan_shift: i32) -> Self {
        Self {
            status: PlateauStatus::NoOptimalHeight,
            scan_shift,
            s_int: 0.0,
            e_int: 0.0,
            s_est: 0.0,
            e_est: 0.0,
            min_height: f32::INFINITY,
            s_idx: 0,
            e_idx: 0,
            bounded_s: false,
            bounded_e: false,
            impassable: false,
            consistent_height: false,
            accepted: false,
            deviation: 0.0,
            slope: 0.0,
            nb_points: 0,
        }
    }

    /// Detects the plateau of a seed scan (no reference window).
    /// `pts` must be sorted by position. With `fixed_height` the height
    /// filtering is pinned instead of searched.
    pub fn detect(&mut self, model: &PlateauModel, pts: &[Pt2f], fixed_height: Option<f32>) -> bool {
        self.nb_points = pts.len();
        if pts.len() < model.min_count {
            self.status = PlateauStatus::NoOptimalHeight;
            return false;
        }
        let height = match fixed_height {
            Some(h) => Some(h),
            None => self.lowest_window(model, pts, None),
        };
        let hmin = match height {
            Some(h) => h,
            None => {
                self.status = PlateauStatus::NoOptimalHeight;
                return false;
            }
        };
        self.min_height = hmin;
        self.extract_run(model, pts, hmin, None);
        self.classify(model, None, 0.0, 1);
        self.probe_bounds(model, pts, hmin);
        self.consistent_height = self.status == PlateauStatus::Ok;
        self.status == PlateauStatus::Ok
    }

    /// Detects the plateau of a tracked scan against the reference
    /// window `(refs, refe, refh)`, laterally displaced by `shift`.
    /// `confdist` widens the tolerances after unconfirmed scans; the
    /// special value 0 marks a seed scan, where the window only bounds
    /// the search region and neither position nor height is gated.
    pub fn track(
        &mut self,
        model: &PlateauModel,
        pts: &[Pt2f],
        refs: f32,
        refe: f32,
        refh: f32,
        shift: f32,
        confdist: i32,
    ) -> bool {
        self.nb_points = pts.len();
        if pts.len() < model.min_count {
            self.status = PlateauStatus::NoOptimalHeight;
            return false;
        }
        let seed_scan = confdist == 0;
        let rs = refs + shift;
        let re = refe + shift;
        let cd = confdist.max(1) as f32;
        let htol = model.slope_tolerance * cd + model.thickness_tolerance;
        // Lateral band of interest around the reference window.
        let ext = if seed_scan {
            model.max_length
        } else {
            model.side_shift_tolerance * (re - rs).abs()
                + cd * model.plateau_search_distance
                + model.max_length
        };
        let band: Vec<(usize, Pt2f)> = pts
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| p.x >= rs - ext && p.x <= re + ext)
            .collect();
        if band.len() < model.min_count {
            self.status = PlateauStatus::NoOptimalHeight;
            return false;
        }
        let band_pts: Vec<Pt2f> = band.iter().map(|(_, p)| *p).collect();
        // Prefer a height window consistent with the reference height.
        let hmin = if seed_scan {
            self.lowest_window(model, &band_pts, None)
        } else {
            self.lowest_window(model, &band_pts, Some((refh - htol, refh + htol)))
                .or_else(|| self.lowest_window(model, &band_pts, None))
        };
        let hmin = match hmin {
            Some(h) => h,
            None => {
                self.status = PlateauStatus::NoOptimalHeight;
                return false;
            }
        };
        self.min_height = hmin;
        self.extract_run(model, &band_pts, hmin, Some((rs, re)));
        // Map run indices back to the full scan.
        if !band.is_empty() {
            self.s_idx = band[self.s_idx.min(band.len() - 1)].0;
            self.e_idx = band[self.e_idx.min(band.len() - 1)].0;
        }
        let gate = if seed_scan { None } else { Some((rs, re)) };
        self.classify(model, gate, refh, confdist);
        self.probe_bounds(model, pts, hmin);
        self.consistent_height = if seed_scan {
            self.status == PlateauStatus::Ok
        } else {
            (hmin - refh).abs() <= htol
        };
        self.status == PlateauStatus::Ok
    }

    /// Network-mode tracking form: the previous plateau acts as the
    /// reference pattern.
    pub fn track_with_ref(
        &mut self,
        model: &PlateauModel,
        pts: &[Pt2f],
        reference: &Plateau,
        confdist: i32,
        shift: f32,
    ) -> bool {
        self.track(
            model,
            pts,
            reference.internal_start(),
            reference.internal_end(),
            reference.min_height(),
            shift,
            confdist,
        )
    }

    /// Lowest base of a `2*tau` height window holding at least
    /// `min_count` samples, optionally constrained to a height band.
    fn lowest_window(
        &self,
        model: &PlateauModel,
        pts: &[Pt2f],
        height_band: Option<(f32, f32)>,
    ) -> Option<f32> {
        let mut heights: Vec<f32> = pts.iter().map(|p| p.y).collect();
        heights.sort_by(f32::total_cmp);
        let win = 2.0 * model.thickness_tolerance;
        let mut hi = 0usize;
        for lo in 0..heights.len() {
            let base = heights[lo];
            if let Some((bmin, bmax)) = height_band {
                if base < bmin {
                    continue;
                }
                if base > bmax {
                    return None;
                }
            }
            if hi < lo {
                hi = lo;
            }
            while hi + 1 < heights.len() && heights[hi + 1] <= base + win {
                hi += 1;
            }
            if hi + 1 - lo >= model.min_count {
                return Some(base);
            }
        }
        None
    }

    /// Extracts the best contiguous ground run and records its bounds
    /// and scan indices. `pts` must be sorted by position.
    fn extract_run(
        &mut self,
        model: &PlateauModel,
        pts: &[Pt2f],
        hmin: f32,
        reference: Option<(f32, f32)>,
    ) {
        let ground: Vec<(usize, f32)> = pts
            .iter()
            .enumerate()
            .filter(|(_, p)| p.y >= hmin && p.y <= hmin + model.thickness_tolerance)
            .map(|(i, p)| (i, p.x))
            .collect();
        if ground.is_empty() {
            self.s_int = 0.0;
            self.e_int = 0.0;
            self.s_est = 0.0;
            self.e_est = 0.0;
            return;
        }
        // Split into runs at gaps larger than max_gap.
        let mut best: Option<(usize, usize, f32)> = None;
        let mut run_start = 0usize;
        let mut i = 1usize;
        let close_run = |start: usize, end: usize, best: &mut Option<(usize, usize, f32)>| {
            let (s, e) = (ground[start].1, ground[end].1);
            let score = match reference {
                // A narrow window is a previous plateau: rank by
                // overlap. A wide window is a whole seed scan: rank by
                // proximity to its centre, so lateral probes matter.
                Some((rs, re)) if re - rs <= 2.0 * model.max_length => e.min(re) - s.max(rs),
                Some((rs, re)) => -((s + e) / 2.0 - (rs + re) / 2.0).abs(),
                None => e - s,
            };
            if best.map_or(true, |(_, _, bs)| score > bs) {
                *best = Some((start, end, score));
            }
        };
        while i < ground.len() {
            if ground[i].1 - ground[i - 1].1 > model.max_gap {
                close_run(run_start, i - 1, &mut best);
                run_start = i;
            }
            i += 1;
        }
        close_run(run_start, ground.len() - 1, &mut best);
        let (bs, be) = match best {
            Some((s, e, _)) => (s, e),
            None => return,
        };
        self.s_idx = ground[bs].0;
        self.e_idx = ground[be].0;
        self.s_int = ground[bs].1;
        self.e_int = ground[be].1;
        self.s_est = self.s_int;
        self.e_est = self.e_int;
    }

    /// Sets the status from the extracted run and the reference.
    fn classify(
        &mut self,
        model: &PlateauModel,
        reference: Option<(f32, f32)>,
        _refh: f32,
        _confdist: i32,
    ) {
        let width = self.e_int - self.s_int;
        if let Some((rs, re)) = reference {
            let rw = re - rs;
            if rw > 0.0 {
                let overlap = self.e_int.min(re) - self.s_int.max(rs);
                if overlap < model.side_shift_tolerance * rw {
                    self.status = PlateauStatus::OutOfPosition;
                    return;
                }
            }
        }
        self.status = if width < model.min_length {
            PlateauStatus::TooThin
        } else if width > model.max_length {
            PlateauStatus::TooWide
        } else {
            PlateauStatus::Ok
        };
    }

    /// Checks both ends for a bounding step (ditch or berm) and for an
    /// impassable obstacle.
    fn probe_bounds(&mut self, model: &PlateauModel, pts: &[Pt2f], hmin: f32) {
        let jump = model.thickness_tolerance * model.bs_max_tilt as f32 / 5.0;
        let mut high_s = false;
        let mut high_e = false;
        self.bounded_s = false;
        self.bounded_e = false;
        for p in pts {
            if p.x < self.s_int && p.x >= self.s_int - model.bound_probe {
                if p.y >= hmin + jump {
                    self.bounded_s = true;
                }
                if p.y >= hmin + model.impassable_step {
                    high_s = true;
                }
            } else if p.x > self.e_int && p.x <= self.e_int + model.bound_probe {
                if p.y >= hmin + jump {
                    self.bounded_e = true;
                }
                if p.y >= hmin + model.impassable_step {
                    high_e = true;
                }
            }
        }
        self.impassable = high_s && high_e;
    }

    #[inline]
    pub fn status(&self) -> PlateauStatus {
        self.status
    }

    #[inline]
    pub fn no_optimal_height(&self) -> bool {
        self.status == PlateauStatus::NoOptimalHeight
    }

    /// Whether the scan carried enough points to judge at all.
    #[inline]
    pub fn has_enough_points(&self, model: &PlateauModel) -> bool {
        self.nb_points >= model.min_count
    }

    #[inline]
    pub fn internal_start(&self) -> f32 {
        self.s_int
    }

    #[inline]
    pub fn internal_end(&self) -> f32 {
        self.e_int
    }

    #[inline]
    pub fn estimated_start(&self) -> f32 {
        self.s_est
    }

    #[inline]
    pub fn estimated_end(&self) -> f32 {
        self.e_est
    }

    #[inline]
    pub fn estimated_center(&self) -> f32 {
        (self.s_est + self.e_est) / 2.0
    }

    #[inline]
    pub fn estimated_width(&self) -> f32 {
        self.e_est - self.s_est
    }

    #[inline]
    pub fn min_height(&self) -> f32 {
        self.min_height
    }

    #[inline]
    pub fn start_index(&self) -> usize {
        self.s_idx
    }

    #[inline]
    pub fn end_index(&self) -> usize {
        self.e_idx
    }

    /// Whether a bounding step was found on both ends.
    #[inline]
    pub fn bounded(&self) -> bool {
        self.bounded_s && self.bounded_e
    }

    #[inline]
    pub fn bounded_start(&self) -> bool {
        self.bounded_s
    }

    #[inline]
    pub fn bounded_end(&self) -> bool {
        self.bounded_e
    }

    /// Bounded on both sides with an in-range width.
    pub fn reliable(&self, model: &PlateauModel) -> bool {
        let w = self.e_int - self.s_int;
        self.bounded() && w >= model.min_length && w <= model.max_length
    }

    /// Whether the detected extent is usable as the next reference.
    #[inline]
    pub fn possible(&self) -> bool {
        self.status == PlateauStatus::Ok
    }

    #[inline]
    pub fn consistent_height(&self) -> bool {
        self.consistent_height
    }

    #[inline]
    pub fn impassable(&self) -> bool {
        self.impassable
    }

    /// In-range width, regardless of bounds.
    pub fn consistent_width(&self, model: &PlateauModel) -> bool {
        let w = self.e_int - self.s_int;
        w >= model.min_length && w <= model.max_length
    }

    #[inline]
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn accept(&mut self) {
        self.accepted = true;
    }

    pub fn unaccept(&mut self) {
        self.accepted = false;
    }

    #[inline]
    pub fn scan_shift(&self) -> i32 {
        self.scan_shift
    }

    pub fn set_deviation(&mut self, d: f32) {
        self.deviation = d;
    }

    #[inline]
    pub fn estimated_deviation(&self) -> f32 {
        self.deviation
    }

    pub fn set_slope(&mut self, s: f32) {
        self.slope = s;
    }

    #[inline]
    pub fn estimated_slope(&self) -> f32 {
        self.slope
    }

    /// Trims the estimated extent to `max_length`, dropping the side
    /// reported unstable (`side < 0` trims the start).
    pub fn trim(&mut self, side: i32, max_length: f32) {
        if self.e_est - self.s_est > max_length {
            if side < 0 {
                self.s_est = self.e_est - max_length;
            } else if side > 0 {
                self.e_est = self.s_est + max_length;
            }
        }
    }

    /// Whether the cross position lies within the detected extent.
    pub fn contains(&self, pos: f32) -> bool {
        pos >= self.s_int && pos <= self.e_int
    }

    /// Whether this plateau is thinner than the other (retry ranking).
    pub fn thinner_than(&self, other: &Plateau) -> bool {
        self.estimated_width() < other.estimated_width()
    }

    /// Cross-track adjacency with another plateau: the extents overlap.
    pub fn is_connected_to(&self, other: &Plateau) -> bool {
        self.e_int.min(other.e_int) > self.s_int.max(other.s_int)
    }

    /// Whether this intermediate plateau fits on the line joining the
    /// plateau `far` (at `cdist` scans) and its neighbour `near`.
    pub fn fit(&self, near: &Plateau, far: &Plateau, cdist: i32) -> bool {
        if cdist <= 1 {
            return true;
        }
        let expected = far.estimated_center()
            + (near.estimated_center() - far.estimated_center()) * ((cdist - 1) as f32 / cdist as f32);
        self.contains(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cross-section of a 3 m wide road sunk 0.5 m into flat ground,
    /// road surface from 3.0 to 6.0 m.
    fn road_scan() -> Vec<Pt2f> {
        let mut pts = Vec::new();
        let mut s = 0.0f32;
        while s < 9.0 {
            let h = if (3.0..=6.0).contains(&s) { 10.0 } else { 10.5 };
            pts.push(Pt2f::new(s, h));
            s += 0.25;
        }
        pts
    }

    #[test]
    fn detects_a_sunken_road_plateau() {
        let model = PlateauModel::default();
        let mut pl = Plateau::new(0);
        assert!(pl.detect(&model, &road_scan(), None));
        assert_eq!(pl.status(), PlateauStatus::Ok);
        assert!((pl.min_height() - 10.0).abs() < 0.01);
        assert!((pl.internal_start() - 3.0).abs() <= 0.3);
        assert!((pl.internal_end() - 6.0).abs() <= 0.3);
        assert!(pl.bounded(), "road edges should bound the plateau");
        assert!(pl.reliable(&model));
    }

    #[test]
    fn thin_run_is_too_thin() {
        let model = PlateauModel::default();
        let mut pts = Vec::new();
        let mut s = 0.0f32;
        while s < 9.0 {
            let h = if (4.0..=5.0).contains(&s) { 10.0 } else { 10.6 };
            pts.push(Pt2f::new(s, h));
            s += 0.2;
        }
        let mut pl = Plateau::new(0);
        assert!(!pl.detect(&model, &pts, None));
        assert_eq!(pl.status(), PlateauStatus::TooThin);
    }

    #[test]
    fn boundary_width_is_accepted() {
        let model = PlateauModel::default();
        // Exactly min_length wide, on an exact binary sample grid.
        let pts: Vec<Pt2f> = (0..=64)
            .map(|i| {
                let s = i as f32 * 0.125;
                let h = if (3.0..=3.0 + model.min_length).contains(&s) {
                    10.0
                } else {
                    10.6
                };
                Pt2f::new(s, h)
            })
            .collect();
        let mut pl = Plateau::new(0);
        assert!(pl.detect(&model, &pts, None), "{:?}", pl.status());
    }

    #[test]
    fn empty_scan_reports_no_optimal_height() {
        let model = PlateauModel::default();
        let mut pl = Plateau::new(0);
        assert!(!pl.detect(&model, &[], None));
        assert_eq!(pl.status(), PlateauStatus::NoOptimalHeight);
        assert!(!pl.has_enough_points(&model));
    }

    #[test]
    fn tracking_rejects_displaced_plateaux() {
        let model = PlateauModel::default();
        let pts = road_scan();
        let mut pl = Plateau::new(0);
        // Reference far from the actual road: poor overlap.
        assert!(!pl.track(&model, &pts, 7.5, 9.5, 10.0, 0.0, 1));
        assert_eq!(pl.status(), PlateauStatus::OutOfPosition);
    }

    #[test]
    fn tracking_follows_the_reference() {
        let model = PlateauModel::default();
        let pts = road_scan();
        let mut pl = Plateau::new(0);
        assert!(pl.track(&model, &pts, 3.1, 5.9, 10.05, 0.0, 1));
        assert!(pl.consistent_height());
        assert!((pl.estimated_center() - 4.5).abs() < 0.4);
    }

    #[test]
    fn wall_on_both_sides_is_impassable() {
        let model = PlateauModel::default();
        let mut pts = Vec::new();
        let mut s = 0.0f32;
        while s < 9.0 {
            let h = if (3.0..=6.0).contains(&s) { 10.0 } else { 14.0 };
            pts.push(Pt2f::new(s, h));
            s += 0.25;
        }
        let mut pl = Plateau::new(0);
        pl.detect(&model, &pts, None);
        assert!(pl.impassable());
    }
}
