//! Directional scanning of a discrete strip.
//!
//! A scanner walks an oriented strip bounded by two parallel support
//! lines of normal `(a, b)`: the central scan spans the strip between
//! the bounds, and successive scans are unit parallel translations to
//! either side. Scan pixels follow the naive-line pattern of the
//! direction, so every emitted pixel `(x, y)` keeps `c2 <= a*x + b*y
//! <= c1` and stays inside the configured rectangle.
//!
//! The eight octants share one engine working in a canonical octant
//! (`a >= b >= 0`); a signed axis permutation maps canonical pixels
//! back to the caller's frame. Strip values `a*x + b*y` are invariant
//! under that permutation, so bounds bookkeeping needs no per-octant
//! code.

mod provider;

pub use provider::ScannerProvider;

use crate::types::Pt2i;

/// Signed axis permutation between caller and canonical frames.
#[derive(Clone, Copy, Debug)]
struct OctantMap {
    swap: bool,
    sx: i32,
    sy: i32,
}

impl OctantMap {
    /// Builds the map bringing `(a, b)` into `a' >= b' >= 0`.
    fn for_direction(a: i32, b: i32) -> Self {
        let (sx, sy) = (if a < 0 { -1 } else { 1 }, if b < 0 { -1 } else { 1 });
        Self {
            swap: a.abs() < b.abs(),
            sx,
            sy,
        }
    }

    #[inline]
    fn apply(&self, x: i32, y: i32) -> (i32, i32) {
        if self.swap {
            (self.sy * y, self.sx * x)
        } else {
            (self.sx * x, self.sy * y)
        }
    }

    #[inline]
    fn unapply(&self, x: i32, y: i32) -> (i32, i32) {
        if self.swap {
            (self.sx * y, self.sy * x)
        } else {
            (self.sx * x, self.sy * y)
        }
    }

    /// Whether the permutation mirrors orientation (swaps left and right).
    #[inline]
    fn mirrors(&self) -> bool {
        let det = if self.swap {
            -self.sx * self.sy
        } else {
            self.sx * self.sy
        };
        det < 0
    }
}

/// Inclusive pixel rectangle in canonical coordinates.
#[derive(Clone, Copy, Debug)]
struct CanonRect {
    xmin: i32,
    ymin: i32,
    xmax: i32,
    ymax: i32,
}

/// Adaptive directional scanner over a bounded rectangle.
#[derive(Clone)]
pub struct DirectionalScanner {
    rect: CanonRect,
    map: OctantMap,
    a: i64,
    b: i64,
    steps: Vec<bool>,
    dlc1: i64,
    dlc2: i64,
    templ_a: i64,
    templ_b: i64,
    templ_nu: i64,
    lcx: i32,
    lcy: i32,
    rcx: i32,
    rcy: i32,
    lst: usize,
    rst: usize,
    clearance: bool,
}

impl DirectionalScanner {
    /// Builds a scanner whose central scan joins the two support points
    /// `p1` and `p2` (`(a, b)` is their difference vector).
    pub fn between(width: i32, height: i32, p1: Pt2i, p2: Pt2i) -> Self {
        let (a, b) = (p2.x - p1.x, p2.y - p1.y);
        let map = OctantMap::for_direction(a, b);
        let (ca, cb) = {
            let (x, y) = map.apply(a, b);
            (x as i64, y as i64)
        };
        let v1 = strip_value(ca, cb, map.apply(p1.x, p1.y));
        let v2 = strip_value(ca, cb, map.apply(p2.x, p2.y));
        let (c1, c2) = (v1.max(v2), v1.min(v2));
        let hi = if v1 >= v2 { p1 } else { p2 };
        let (hx, hy) = map.apply(hi.x, hi.y);
        let mut sc = Self::raw(width, height, map, ca, cb, c1, c2, hx, hy);
        sc.anchor_ctor(hx, hy, c1);
        sc
    }

    /// Builds a scanner from a strip centred on `(cx, cy)` spanning
    /// `length` pattern steps.
    pub fn centered(width: i32, height: i32, a: i32, b: i32, center: Pt2i, length: i32) -> Self {
        let map = OctantMap::for_direction(a, b);
        let (ca, cb) = {
            let (x, y) = map.apply(a, b);
            (x as i64, y as i64)
        };
        let (cx, cy) = map.apply(center.x, center.y);
        let mut sc = Self::raw(width, height, map, ca, cb, 0, 0, cx, cy);
        let w2 = (length + 1) / 2;
        // Walk back half the length to the upper support line.
        let (mut x, mut y) = (cx, cy);
        let mut st = sc.steps.len();
        for _ in 0..w2 {
            st = if st == 0 { sc.steps.len() - 1 } else { st - 1 };
            if sc.steps[st] {
                y += 1;
            }
            x += 1;
        }
        sc.dlc1 = strip_value(sc.a, sc.b, (x, y));
        sc.lcx = x;
        sc.lcy = y;
        sc.rcx = x;
        sc.rcy = y;
        sc.lst = st % sc.steps.len();
        sc.rst = sc.lst;
        // And forward to the lower one.
        let (mut x, mut y) = (cx, cy);
        let mut st = 0usize;
        for _ in 0..w2 {
            x -= 1;
            if sc.steps[st] {
                y -= 1;
            }
            st = (st + 1) % sc.steps.len();
        }
        sc.dlc2 = strip_value(sc.a, sc.b, (x, y));
        sc.templ_nu = sc.dlc1 - sc.dlc2;
        sc
    }

    /// Builds a half-strip scanner from a start point and a lower
    /// support value `c`.
    pub fn half_strip(width: i32, height: i32, a: i32, b: i32, start: Pt2i, c: i64) -> Self {
        let map = OctantMap::for_direction(a, b);
        let (ca, cb) = {
            let (x, y) = map.apply(a, b);
            (x as i64, y as i64)
        };
        let (sx, sy) = map.apply(start.x, start.y);
        let c1 = strip_value(ca, cb, (sx, sy));
        Self::raw(width, height, map, ca, cb, c1, c, sx, sy)
    }

    /// Vertical/horizontal variant of [`between`](Self::between): the
    /// strip bounds follow the tilted direction but every scan runs
    /// strictly along the dominant axis. Preferred for highly tilted
    /// directions where the naive-line path would stair-step.
    pub fn vh_between(width: i32, height: i32, p1: Pt2i, p2: Pt2i) -> Self {
        let mut sc = Self::between(width, height, p1, p2);
        sc.steps = vec![false];
        sc.lst = 0;
        sc.rst = 0;
        sc
    }

    #[allow(clippy::too_many_arguments)]
    fn raw(
        width: i32,
        height: i32,
        map: OctantMap,
        ca: i64,
        cb: i64,
        c1: i64,
        c2: i64,
        cx: i32,
        cy: i32,
    ) -> Self {
        debug_assert!(ca >= cb && cb >= 0 && ca > 0);
        let g = gcd(ca, cb.max(1));
        let (ra, rb) = if cb == 0 { (1, 0) } else { (ca / g, cb / g) };
        let mut steps = Vec::with_capacity(ra as usize);
        let mut acc = 0i64;
        for _ in 0..ra {
            acc += rb;
            if acc >= ra {
                acc -= ra;
                steps.push(true);
            } else {
                steps.push(false);
            }
        }
        let rect = {
            let (x0, y0) = map.apply(0, 0);
            let (x1, y1) = map.apply(width - 1, height - 1);
            CanonRect {
                xmin: x0.min(x1),
                ymin: y0.min(y1),
                xmax: x0.max(x1),
                ymax: y0.max(y1),
            }
        };
        Self {
            rect,
            map,
            a: ca,
            b: cb,
            steps,
            dlc1: c1,
            dlc2: c2,
            templ_a: ca,
            templ_b: cb,
            templ_nu: c1 - c2,
            lcx: cx,
            lcy: cy,
            rcx: cx,
            rcy: cy,
            lst: 0,
            rst: 0,
            clearance: true,
        }
    }

    /// Walks back from `(hx, hy)` until the upper support line is
    /// reached, fixing the construction cursors.
    fn anchor_ctor(&mut self, hx: i32, hy: i32, c1: i64) {
        let (mut x, mut y) = (hx, hy);
        let mut st = self.steps.len();
        while strip_value(self.a, self.b, (x, y)) < c1 {
            st = if st == 0 { self.steps.len() - 1 } else { st - 1 };
            if self.steps[st] {
                y += 1;
            }
            x += 1;
        }
        self.lcx = x;
        self.lcy = y;
        self.rcx = x;
        self.rcy = y;
        self.lst = st % self.steps.len();
        self.rst = self.lst;
    }

    /// Deep copy for independent side walks.
    pub fn get_copy(&self) -> DirectionalScanner {
        self.clone()
    }

    /// Keeps appending across successive scans instead of clearing the
    /// output vector on each call.
    pub fn release_clearance(&mut self) {
        self.clearance = false;
    }

    /// Appends the central scan pixels; returns how many were emitted.
    pub fn first(&self, scan: &mut Vec<Pt2i>) -> usize {
        self.emit(self.lcx, self.lcy, self.lst, scan)
    }

    /// Advances the left cursor one strip position and appends that
    /// scan; returns 0 when the strip has left the rectangle.
    pub fn next_on_left(&mut self, scan: &mut Vec<Pt2i>) -> usize {
        if self.clearance {
            scan.clear();
        }
        self.lcy += 1;
        let (x, y, st) = self.anchor(self.lcx, self.lcy, self.lst);
        self.lcx = x;
        self.lcy = y;
        self.lst = st;
        self.emit(x, y, st, scan)
    }

    /// Advances the right cursor one strip position and appends that
    /// scan; returns 0 when the strip has left the rectangle.
    pub fn next_on_right(&mut self, scan: &mut Vec<Pt2i>) -> usize {
        if self.clearance {
            scan.clear();
        }
        self.rcy -= 1;
        let (x, y, st) = self.anchor(self.rcx, self.rcy, self.rst);
        self.rcx = x;
        self.rcy = y;
        self.rst = st;
        self.emit(x, y, st, scan)
    }

    /// Advances the left cursor by `skip` positions, then emits.
    pub fn skip_left(&mut self, scan: &mut Vec<Pt2i>, skip: i32) -> usize {
        if self.clearance {
            scan.clear();
        }
        self.lcy += skip;
        let (x, y, st) = self.anchor(self.lcx, self.lcy, self.lst);
        self.lcx = x;
        self.lcy = y;
        self.lst = st;
        self.emit(x, y, st, scan)
    }

    /// Advances the right cursor by `skip` positions, then emits.
    pub fn skip_right(&mut self, scan: &mut Vec<Pt2i>, skip: i32) -> usize {
        if self.clearance {
            scan.clear();
        }
        self.rcy -= skip;
        let (x, y, st) = self.anchor(self.rcx, self.rcy, self.rst);
        self.rcx = x;
        self.rcy = y;
        self.rst = st;
        self.emit(x, y, st, scan)
    }

    /// Rebinds the strip to direction `(a, b)` and perpendicular offset
    /// `c` for the next scans, preserving the construction thickness
    /// rescaled to the new direction norm.
    ///
    /// The pattern keeps the construction direction: rebinding is meant
    /// for re-centering on a moving reference (possibly expressed on a
    /// coarser grid), not for turning.
    pub fn bind_to(&mut self, a: i32, b: i32, c: i64) {
        let (ca, cb) = self.map.apply(a, b);
        let (mut ca, mut cb, mut c) = (ca as i64, cb as i64, c);
        if ca < 0 {
            ca = -ca;
            cb = -cb;
            c = -c;
        }
        let old_b = self.templ_b.abs();
        let old_n1 = self.templ_a + old_b;
        let old_ninf = self.templ_a.max(old_b);
        let new_a = ca.abs();
        let new_b = cb.abs();
        let new_n1 = new_a + new_b;
        let new_ninf = new_a.max(new_b);
        // Rescale by the norm giving the larger integer quotient, so
        // the rebound strip never loses thickness to rounding.
        let nu = if new_n1 * old_ninf > old_n1 * new_ninf {
            (self.templ_nu * new_n1) / old_n1
        } else {
            (self.templ_nu * new_ninf) / old_ninf
        };
        self.a = ca;
        self.b = cb;
        self.dlc1 = c + nu / 2;
        self.dlc2 = c - nu / 2;
    }

    /// Re-anchors a translated cursor onto the upper support line,
    /// following the pattern lattice.
    fn anchor(&self, cx: i32, cy: i32, cst: usize) -> (i32, i32, usize) {
        let (mut x, mut y) = (cx, cy);
        let mut st = cst;
        // Forward while above the upper bound.
        while x > self.rect.xmin
            && y > self.rect.ymin
            && strip_value(self.a, self.b, (x, y)) > self.dlc1
        {
            x -= 1;
            if self.steps[st] {
                y -= 1;
            }
            st = (st + 1) % self.steps.len();
        }
        // Back while below it.
        while x < self.rect.xmax - 1
            && y <= self.rect.ymax
            && strip_value(self.a, self.b, (x, y)) < self.dlc1
        {
            st = if st == 0 { self.steps.len() - 1 } else { st - 1 };
            if self.steps[st] {
                y += 1;
            }
            x += 1;
        }
        (x, y, st)
    }

    /// Emits the scan starting at `(x, y)`: pixels inside the rectangle
    /// while the strip value stays above the lower bound.
    fn emit(&self, x: i32, y: i32, st: usize, scan: &mut Vec<Pt2i>) -> usize {
        let (mut x, mut y) = (x, y);
        let mut st = st;
        let mut count = 0usize;
        // Skip the part of the scan before the rectangle.
        while (x > self.rect.xmax || y > self.rect.ymax)
            && strip_value(self.a, self.b, (x, y)) >= self.dlc2
        {
            x -= 1;
            if self.steps[st] {
                y -= 1;
            }
            st = (st + 1) % self.steps.len();
        }
        while strip_value(self.a, self.b, (x, y)) >= self.dlc2
            && x >= self.rect.xmin
            && y >= self.rect.ymin
        {
            let (ax, ay) = self.map.unapply(x, y);
            scan.push(Pt2i::new(ax, ay));
            count += 1;
            x -= 1;
            if self.steps[st] {
                y -= 1;
            }
            st = (st + 1) % self.steps.len();
        }
        count
    }

    /// Whether the canonical frame mirrors the caller's orientation.
    pub(crate) fn mirrored(&self) -> bool {
        self.map.mirrors()
    }
}

#[inline]
fn strip_value(a: i64, b: i64, (x, y): (i32, i32)) -> i64 {
    a * x as i64 + b * y as i64
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ok(p: Pt2i, a: i32, b: i32, c1: i64, c2: i64) -> bool {
        let v = a as i64 * p.x as i64 + b as i64 * p.y as i64;
        v >= c2.min(c1) && v <= c1.max(c2)
    }

    #[test]
    fn central_scan_joins_support_points() {
        let p1 = Pt2i::new(10, 10);
        let p2 = Pt2i::new(30, 20);
        let ds = DirectionalScanner::between(64, 64, p1, p2);
        let mut scan = Vec::new();
        let n = ds.first(&mut scan);
        assert!(n > 0);
        let (a, b) = (p2.x - p1.x, p2.y - p1.y);
        let c1 = (a * p1.x + b * p1.y).max(a * p2.x + b * p2.y) as i64;
        let c2 = (a * p1.x + b * p1.y).min(a * p2.x + b * p2.y) as i64;
        for p in &scan {
            assert!(strip_ok(*p, a, b, c1, c2));
            assert!(p.x >= 0 && p.x < 64 && p.y >= 0 && p.y < 64);
        }
        // The scan crosses the whole strip.
        assert!(scan.len() >= 20);
    }

    #[test]
    fn successive_scans_are_disjoint() {
        let p1 = Pt2i::new(12, 40);
        let p2 = Pt2i::new(40, 12);
        let mut ds = DirectionalScanner::between(64, 64, p1, p2);
        let mut seen = std::collections::HashSet::new();
        let mut scan = Vec::new();
        ds.first(&mut scan);
        for p in &scan {
            assert!(seen.insert(*p), "duplicate pixel {p:?} in central scan");
        }
        for _ in 0..5 {
            let mut next = Vec::new();
            if ds.next_on_left(&mut next) == 0 {
                break;
            }
            for p in &next {
                assert!(seen.insert(*p), "pixel {p:?} repeated across scans");
            }
        }
    }

    #[test]
    fn left_and_right_leave_on_opposite_sides() {
        let p1 = Pt2i::new(20, 30);
        let p2 = Pt2i::new(44, 30);
        let mut left = DirectionalScanner::between(64, 64, p1, p2);
        let mut right = left.get_copy();
        let mut lp = Vec::new();
        let mut rp = Vec::new();
        left.next_on_left(&mut lp);
        right.next_on_right(&mut rp);
        assert!(!lp.is_empty() && !rp.is_empty());
        // A horizontal stroke: side scans are the rows above and below.
        let ly = lp[0].y;
        let ry = rp[0].y;
        assert_eq!((ly - 30).abs(), 1);
        assert_eq!((ry - 30).abs(), 1);
        assert_ne!(ly, ry);
    }

    #[test]
    fn scans_exhaust_at_rectangle_border() {
        let p1 = Pt2i::new(2, 2);
        let p2 = Pt2i::new(12, 4);
        let mut ds = DirectionalScanner::between(16, 16, p1, p2);
        let mut scan = Vec::new();
        ds.first(&mut scan);
        let mut n = 0;
        loop {
            let mut s = Vec::new();
            if ds.next_on_left(&mut s) == 0 {
                break;
            }
            n += 1;
            assert!(n < 64, "scanner failed to terminate");
        }
    }

    #[test]
    fn vertical_stroke_scans_are_vertical_strips() {
        let p1 = Pt2i::new(8, 4);
        let p2 = Pt2i::new(8, 24);
        let mut ds = DirectionalScanner::between(32, 32, p1, p2);
        let mut scan = Vec::new();
        assert!(ds.first(&mut scan) > 0);
        for p in &scan {
            assert_eq!(p.x, 8);
        }
        let mut next = Vec::new();
        ds.next_on_left(&mut next);
        assert!(!next.is_empty());
        assert!(next.iter().all(|p| (p.x - 8).abs() == 1));
    }

    #[test]
    fn bind_to_keeps_the_wider_rescaled_strip() {
        // Construction direction (12, 2), rebind direction (4, 3): the
        // l1 and linf quotients disagree (74 vs 49 on a 148 thick
        // strip) and the larger one must win.
        let p1 = Pt2i::new(10, 30);
        let p2 = Pt2i::new(22, 32);
        let mut ds = DirectionalScanner::between(64, 64, p1, p2);
        ds.bind_to(4, 3, 4 * 16 + 3 * 31);
        let mut scan = Vec::new();
        assert!(ds.next_on_left(&mut scan) > 0);
        let vs: Vec<i64> = scan
            .iter()
            .map(|p| 4 * p.x as i64 + 3 * p.y as i64)
            .collect();
        let span = vs.iter().max().unwrap() - vs.iter().min().unwrap();
        // The linf rescaling would leave a span near 49 only.
        assert!(span > 60, "rebound strip span {span}");
    }

    #[test]
    fn vh_scans_stay_axis_aligned() {
        let p1 = Pt2i::new(10, 10);
        let p2 = Pt2i::new(30, 14);
        let mut ds = DirectionalScanner::vh_between(64, 64, p1, p2);
        let mut scan = Vec::new();
        assert!(ds.first(&mut scan) > 0);
        let y0 = scan[0].y;
        assert!(scan.iter().all(|p| p.y == y0), "tilted scan path");
        let mut next = Vec::new();
        ds.next_on_left(&mut next);
        assert!(!next.is_empty());
        let y1 = next[0].y;
        assert!(next.iter().all(|p| p.y == y1));
    }

    #[test]
    fn bind_to_shifts_the_next_scan() {
        let p1 = Pt2i::new(10, 16);
        let p2 = Pt2i::new(26, 16);
        let mut ds = DirectionalScanner::between(48, 48, p1, p2);
        // Recenter 4 pixels forward along the stroke direction.
        let c = 16 * ((10 + 26) / 2 + 4);
        ds.bind_to(16, 0, c as i64);
        let mut scan = Vec::new();
        ds.next_on_left(&mut scan);
        assert!(!scan.is_empty());
        let xs: Vec<i32> = scan.iter().map(|p| p.x).collect();
        let mid = (xs.iter().min().unwrap() + xs.iter().max().unwrap()) as f32 / 2.0;
        assert!((mid - 22.0).abs() <= 1.5, "recentred scan midpoint {mid}");
    }
}
