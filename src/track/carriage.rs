use super::DetectionStatus;
use crate::plateau::Plateau;
use crate::types::{Pt2f, Pt2i, Vr2f};

/// One attempted scan of a track: the plateau and the coarse display
/// pixels of the scan line it came from.
#[derive(Clone, Debug)]
pub struct ScanRecord {
    plateau: Plateau,
    dispix: Vec<Pt2i>,
}

/// A chain of cross-section plateaux indexed by scan number: 0 is the
/// seed scan, positive numbers grow on the left side, negative on the
/// right.
pub struct CarriageTrack {
    seed_p1: Pt2i,
    seed_p2: Pt2i,
    csize: f32,
    reversed: bool,
    center: Option<ScanRecord>,
    lefts: Vec<ScanRecord>,
    rights: Vec<ScanRecord>,
    status: DetectionStatus,
}

impl CarriageTrack {
    pub fn new() -> Self {
        Self {
            seed_p1: Pt2i::default(),
            seed_p2: Pt2i::default(),
            csize: 1.0,
            reversed: false,
            center: None,
            lefts: Vec::new(),
            rights: Vec::new(),
            status: DetectionStatus::None,
        }
    }

    pub fn set_detection_seed(&mut self, p1: Pt2i, p2: Pt2i, csize: f32) {
        self.seed_p1 = p1;
        self.seed_p2 = p2;
        self.csize = csize;
    }

    #[inline]
    pub fn seed_start(&self) -> Pt2i {
        self.seed_p1
    }

    #[inline]
    pub fn seed_end(&self) -> Pt2i {
        self.seed_p2
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.csize
    }

    #[inline]
    pub fn status(&self) -> DetectionStatus {
        self.status
    }

    pub fn set_status(&mut self, status: DetectionStatus) {
        self.status = status;
    }

    /// Installs the central scan.
    pub fn start(&mut self, plateau: Plateau, dispix: Vec<Pt2i>, reversed: bool) {
        self.center = Some(ScanRecord { plateau, dispix });
        self.reversed = reversed;
    }

    /// Drops one side before a fresh walk.
    pub fn clear_side(&mut self, on_right: bool) {
        if on_right {
            self.rights.clear();
        } else {
            self.lefts.clear();
        }
    }

    /// Appends the next scan of a side.
    pub fn add(&mut self, on_right: bool, plateau: Plateau, dispix: Vec<Pt2i>) {
        let rec = ScanRecord { plateau, dispix };
        if on_right {
            self.rights.push(rec);
        } else {
            self.lefts.push(rec);
        }
    }

    #[inline]
    pub fn left_scan_count(&self) -> i32 {
        self.lefts.len() as i32
    }

    #[inline]
    pub fn right_scan_count(&self) -> i32 {
        self.rights.len() as i32
    }

    pub fn plateau(&self, num: i32) -> Option<&Plateau> {
        self.record(num).map(|r| &r.plateau)
    }

    pub fn plateau_mut(&mut self, num: i32) -> Option<&mut Plateau> {
        self.record_mut(num).map(|r| &mut r.plateau)
    }

    fn record(&self, num: i32) -> Option<&ScanRecord> {
        match num {
            0 => self.center.as_ref(),
            n if n > 0 => self.lefts.get((n - 1) as usize),
            n => self.rights.get((-n - 1) as usize),
        }
    }

    fn record_mut(&mut self, num: i32) -> Option<&mut ScanRecord> {
        match num {
            0 => self.center.as_mut(),
            n if n > 0 => self.lefts.get_mut((n - 1) as usize),
            n => self.rights.get_mut((-n - 1) as usize),
        }
    }

    /// Marks the plateau at `num` accepted.
    pub fn accept(&mut self, num: i32) {
        if let Some(pl) = self.plateau_mut(num) {
            pl.accept();
        }
    }

    /// A track is valid when its central plateau was accepted.
    pub fn is_valid(&self) -> bool {
        self.center
            .as_ref()
            .map(|r| r.plateau.is_accepted())
            .unwrap_or(false)
    }

    fn accepted_range(&self) -> Option<(i32, i32)> {
        let mut lo = i32::MAX;
        let mut hi = i32::MIN;
        for num in -self.right_scan_count()..=self.left_scan_count() {
            if let Some(pl) = self.plateau(num) {
                if pl.is_accepted() {
                    lo = lo.min(num);
                    hi = hi.max(num);
                }
            }
        }
        if lo <= hi {
            Some((lo, hi))
        } else {
            None
        }
    }

    /// Scan count between the first and last accepted plateau.
    pub fn spread(&self) -> i32 {
        match self.accepted_range() {
            Some((lo, hi)) => hi - lo + 1,
            None => 0,
        }
    }

    /// Non-accepted scans inside the accepted range.
    pub fn nb_holes(&self) -> i32 {
        match self.accepted_range() {
            Some((lo, hi)) => {
                let mut holes = 0;
                for num in lo..=hi {
                    let acc = self
                        .plateau(num)
                        .map(|p| p.is_accepted())
                        .unwrap_or(false);
                    if !acc {
                        holes += 1;
                    }
                }
                holes
            }
            None => 0,
        }
    }

    /// Mean lateral displacement between successive accepted plateau
    /// centers, in metres per scan: the hecticness of the chain.
    pub fn relative_shift_length(&self) -> f32 {
        let (lo, hi) = match self.accepted_range() {
            Some(r) => r,
            None => return 0.0,
        };
        let mut total = 0.0f32;
        let mut prev: Option<f32> = None;
        for num in lo..=hi {
            if let Some(pl) = self.plateau(num) {
                if pl.is_accepted() {
                    let c = pl.estimated_center();
                    if let Some(p) = prev {
                        total += (c - p).abs();
                    }
                    prev = Some(c);
                }
            }
        }
        let spread = (hi - lo + 1) as f32;
        if spread > 0.0 {
            total / spread
        } else {
            0.0
        }
    }

    /// Drops accepted runs at both track ends shorter than
    /// `tail_min_size`, so the track ends on solid sequences. Returns
    /// whether no consistent sequence survives.
    pub fn prune(&mut self, tail_min_size: usize) -> bool {
        self.prune_side(1, tail_min_size);
        self.prune_side(-1, tail_min_size);
        (self.spread() as usize) < tail_min_size
    }

    fn prune_side(&mut self, sign: i32, tail_min_size: usize) {
        let count = if sign > 0 {
            self.left_scan_count()
        } else {
            self.right_scan_count()
        };
        let mut outer = count;
        loop {
            // Outermost accepted scan of the side.
            let mut i = outer;
            while i >= 1 {
                if self
                    .plateau(sign * i)
                    .map(|p| p.is_accepted())
                    .unwrap_or(false)
                {
                    break;
                }
                i -= 1;
            }
            if i < 1 {
                return;
            }
            // Length of the consecutive accepted run ending there.
            let mut j = i;
            while j >= 1
                && self
                    .plateau(sign * j)
                    .map(|p| p.is_accepted())
                    .unwrap_or(false)
            {
                j -= 1;
            }
            let run = (i - j) as usize;
            if run >= tail_min_size {
                return;
            }
            for k in (j + 1)..=i {
                if let Some(pl) = self.plateau_mut(sign * k) {
                    pl.unaccept();
                }
            }
            outer = j;
        }
    }

    /// Stroke frame: origin at the first seed pixel centre, unit vector
    /// along the stroke, stroke length in metres.
    fn stroke_frame(&self) -> (Pt2f, Vr2f, f32) {
        let p1f = Pt2f::new(
            self.csize * (self.seed_p1.x as f32 + 0.5),
            self.csize * (self.seed_p1.y as f32 + 0.5),
        );
        let p12 = Vr2f::new(
            self.csize * (self.seed_p2.x - self.seed_p1.x) as f32,
            self.csize * (self.seed_p2.y - self.seed_p1.y) as f32,
        );
        let l12 = p12.norm();
        (p1f, Vr2f::new(p12.x / l12, p12.y / l12), l12)
    }

    /// Display pixels of one accepted scan restricted to the plateau
    /// extent, in raster coordinates (row 0 north) scaled by `fact`.
    fn scan_points(
        &self,
        rec: &ScanRecord,
        map_h: i32,
        fact: f32,
        out: &mut Vec<Vec<Pt2i>>,
    ) {
        let (p1f, u, _) = self.stroke_frame();
        let pl = &rec.plateau;
        let mut row = Vec::new();
        for p in &rec.dispix {
            let pm = Pt2f::new(
                self.csize * (p.x as f32 + 0.5),
                self.csize * (p.y as f32 + 0.5),
            );
            let pos = p1f.vector_to(pm).dot(u);
            if pos >= pl.estimated_start() && pos <= pl.estimated_end() {
                let mx = ((p.x as f32 + 0.5) * fact) as i32;
                let my = map_h - 1 - ((p.y as f32 + 0.5) * fact) as i32;
                row.push(Pt2i::new(mx, my));
            }
        }
        if !row.is_empty() {
            out.push(row);
        }
    }

    /// Pixel runs of every accepted plateau, for rasterisation into the
    /// detection map (dimensions `map_w x map_h`, `iratio` map pixels
    /// per metre).
    pub fn points(&self, _map_w: i32, map_h: i32, iratio: f32) -> Vec<Vec<Pt2i>> {
        let fact = iratio * self.csize;
        let mut out = Vec::new();
        for num in -self.right_scan_count()..=self.left_scan_count() {
            if let Some(rec) = self.record(num) {
                if rec.plateau.is_accepted() {
                    self.scan_points(rec, map_h, fact, &mut out);
                }
            }
        }
        out
    }

    /// Like [`points`](Self::points) but keeps only plateaux adjacent
    /// to another accepted one.
    pub fn connected_points(&self, _map_w: i32, map_h: i32, iratio: f32) -> Vec<Vec<Pt2i>> {
        let fact = iratio * self.csize;
        let mut out = Vec::new();
        let lo = -self.right_scan_count();
        let hi = self.left_scan_count();
        let accepted = |n: i32| {
            self.plateau(n)
                .map(|p| p.is_accepted())
                .unwrap_or(false)
        };
        for num in lo..=hi {
            if !accepted(num) {
                continue;
            }
            if !(accepted(num - 1) || accepted(num + 1)) {
                continue;
            }
            if let Some(rec) = self.record(num) {
                self.scan_points(rec, map_h, fact, &mut out);
            }
        }
        out
    }

    /// Polyline vertices of the track in tile-grid coordinates (y up):
    /// with `centers` one centerline point per accepted plateau in
    /// `firsts`, otherwise the start bounds in `firsts` and the end
    /// bounds in `seconds`.
    pub fn position(&self, centers: bool, firsts: &mut Vec<Pt2i>, seconds: &mut Vec<Pt2i>) {
        let (p1f, u, _) = self.stroke_frame();
        let lo = -self.right_scan_count();
        let hi = self.left_scan_count();
        for num in lo..=hi {
            let rec = match self.record(num) {
                Some(r) => r,
                None => continue,
            };
            if !rec.plateau.is_accepted() || rec.dispix.is_empty() {
                continue;
            }
            // Scan line frame: the display pixels run along the stroke
            // direction on the scan supporting this plateau.
            let q = rec.dispix[0];
            let q0 = Pt2f::new(
                self.csize * (q.x as f32 + 0.5),
                self.csize * (q.y as f32 + 0.5),
            );
            let q0pos = p1f.vector_to(q0).dot(u);
            let at = |pos: f32| {
                let wx = q0.x + (pos - q0pos) * u.x;
                let wy = q0.y + (pos - q0pos) * u.y;
                Pt2i::new((wx / self.csize) as i32, (wy / self.csize) as i32)
            };
            if centers {
                firsts.push(at(rec.plateau.estimated_center()));
            } else {
                firsts.push(at(rec.plateau.estimated_start()));
                seconds.push(at(rec.plateau.estimated_end()));
            }
        }
    }
}

impl Default for CarriageTrack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plateau::PlateauModel;

    fn accepted_plateau(center: f32) -> Plateau {
        let model = PlateauModel::default();
        let mut pts = Vec::new();
        let mut s = center - 4.0;
        while s < center + 4.0 {
            let h = if (s - center).abs() <= 1.5 { 10.0 } else { 10.6 };
            pts.push(Pt2f::new(s, h));
            s += 0.25;
        }
        let mut pl = Plateau::new(0);
        pl.detect(&model, &pts, None);
        pl.accept();
        pl
    }

    fn failed_plateau() -> Plateau {
        Plateau::new(0)
    }

    #[test]
    fn spread_and_holes_cover_the_accepted_range() {
        let mut ct = CarriageTrack::new();
        ct.start(accepted_plateau(3.0), vec![], false);
        ct.add(false, accepted_plateau(3.1), vec![]);
        ct.add(false, failed_plateau(), vec![]);
        ct.add(false, accepted_plateau(3.2), vec![]);
        ct.add(true, accepted_plateau(2.9), vec![]);
        assert_eq!(ct.spread(), 5);
        assert_eq!(ct.nb_holes(), 1);
    }

    #[test]
    fn prune_removes_short_tails() {
        let mut ct = CarriageTrack::new();
        ct.start(accepted_plateau(3.0), vec![], false);
        for _ in 0..4 {
            ct.add(false, accepted_plateau(3.0), vec![]);
        }
        ct.add(false, failed_plateau(), vec![]);
        ct.add(false, accepted_plateau(3.0), vec![]);
        // Tail run of length 1 beyond the hole gets pruned with
        // tail_min_size 3; the run of 4 stays.
        assert!(!ct.prune(3));
        assert!(!ct.plateau(6).unwrap().is_accepted());
        assert!(ct.plateau(4).unwrap().is_accepted());
    }

    #[test]
    fn prune_reports_empty_tracks() {
        let mut ct = CarriageTrack::new();
        ct.start(accepted_plateau(3.0), vec![], false);
        ct.add(false, accepted_plateau(3.0), vec![]);
        // Every side run is shorter than the requested tail: no
        // consistent sequence survives.
        assert!(ct.prune(5));
    }

    #[test]
    fn straight_track_has_low_shift_length() {
        let mut ct = CarriageTrack::new();
        ct.start(accepted_plateau(3.0), vec![], false);
        for i in 1..=10 {
            ct.add(false, accepted_plateau(3.0 + 0.01 * i as f32), vec![]);
            ct.add(true, accepted_plateau(3.0 - 0.01 * i as f32), vec![]);
        }
        assert!(ct.relative_shift_length() < 0.05);
    }
}
