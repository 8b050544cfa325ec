use super::DirectionalScanner;
use crate::types::Pt2i;

/// Builds directional scanners over a fixed rectangle and reports the
/// orientation adjustments made to canonicalise the requested
/// direction.
///
/// When the input direction is brought into the canonical half-plane
/// (or mirrored by the octant mapping), the physical sides served by
/// `next_on_left` and `next_on_right` swap; callers walking both sides
/// compensate with [`is_last_scan_reversed`](Self::is_last_scan_reversed).
#[derive(Default)]
pub struct ScannerProvider {
    width: i32,
    height: i32,
    last_reversed: bool,
}

impl ScannerProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_size(&mut self, width: i32, height: i32) {
        self.width = width;
        self.height = height;
    }

    /// Scanner whose central scan joins `p1` and `p2`.
    pub fn get_scanner(&mut self, p1: Pt2i, p2: Pt2i) -> DirectionalScanner {
        let a = p2.x - p1.x;
        let b = p2.y - p1.y;
        let inverted = a < 0 || (a == 0 && b < 0);
        let (q1, q2) = if inverted { (p2, p1) } else { (p1, p2) };
        let ds = DirectionalScanner::between(self.width, self.height, q1, q2);
        self.last_reversed = inverted ^ ds.mirrored();
        ds
    }

    /// Axis-aligned scan variant of [`get_scanner`](Self::get_scanner),
    /// for directions close to vertical or horizontal.
    pub fn get_vh_scanner(&mut self, p1: Pt2i, p2: Pt2i) -> DirectionalScanner {
        let a = p2.x - p1.x;
        let b = p2.y - p1.y;
        let inverted = a < 0 || (a == 0 && b < 0);
        let (q1, q2) = if inverted { (p2, p1) } else { (p1, p2) };
        let ds = DirectionalScanner::vh_between(self.width, self.height, q1, q2);
        self.last_reversed = inverted ^ ds.mirrored();
        ds
    }

    /// Scanner centred on a pixel with an explicit direction and strip
    /// length.
    pub fn get_scanner_centered(
        &mut self,
        center: Pt2i,
        a: i32,
        b: i32,
        length: i32,
    ) -> DirectionalScanner {
        let inverted = a < 0 || (a == 0 && b < 0);
        let (ca, cb) = if inverted { (-a, -b) } else { (a, b) };
        let ds = DirectionalScanner::centered(self.width, self.height, ca, cb, center, length);
        self.last_reversed = inverted ^ ds.mirrored();
        ds
    }

    /// Whether the last built scanner swaps physical left and right.
    #[inline]
    pub fn is_last_scan_reversed(&self) -> bool {
        self.last_reversed
    }
}
